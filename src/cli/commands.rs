//! CLI command handlers.

use std::time::Duration;

use crate::client::{CreoleClient, PollBackoff, WaitOptions};
use crate::config::{redact, ClientConfig, ReceiverConfig};
use crate::error::{CreoleError, Result};
use crate::types::{CreateJobRequest, JobStatusResponse};

use super::{CreateArgs, ExpressArgs, ListArgs, ServeArgs, VoicesArgs, WaitArgs};

const RULE: &str = "==================================================";

fn section(title: &str) {
    println!("{RULE}");
    println!("{title}");
    println!("{RULE}");
}

/// Build a client, failing early when no API key is configured.
pub fn client_from_env(api_url: Option<String>) -> Result<CreoleClient> {
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = api_url {
        config = config.with_base_url(url);
    }
    config.require_api_key()?;
    Ok(CreoleClient::new(config))
}

/// Connection check: health, authentication, voices, models.
pub async fn check(client: &CreoleClient) -> Result<()> {
    let config = client.config();
    println!("Using API key: {}", config.api_key().map(redact).unwrap_or_default());
    println!("API URL: {}", config.base_url());
    println!("{}", "-".repeat(50));

    println!("\n1. Testing health endpoint...");
    let health = client.check_health().await?;
    println!("   API is {}", health.status);
    println!("   Version: {}", health.version.as_deref().unwrap_or("unknown"));

    println!("\n2. Testing authentication...");
    let balance = client.get_credit_balance().await?;
    println!("   Authentication successful!");
    println!("   Credits available: {}", balance.total_credits);
    println!(
        "   Subscription plan: {}",
        balance.subscription_plan.as_deref().unwrap_or("unknown")
    );

    // Catalog failures are reported but do not fail the check.
    println!("\n3. Testing voice endpoint...");
    match client.get_voices().await {
        Ok(voices) => {
            println!("   Found {} voices", voices.len());
            if let Some(first) = voices.first() {
                println!("   First voice: {}", first.name);
            }
        }
        Err(e) => println!("   Could not fetch voices: {e}"),
    }

    println!("\n4. Testing models endpoint...");
    match client.get_models().await {
        Ok(models) => {
            println!("   Found {} models", models.len());
            if let Some(first) = models.first() {
                println!("   First model: {}", first.name);
            }
        }
        Err(e) => println!("   Could not fetch models: {e}"),
    }

    println!("\n{RULE}");
    println!("API connection test completed successfully!");
    println!("{RULE}");
    Ok(())
}

pub async fn health(client: &CreoleClient) -> Result<()> {
    let health = client.check_health().await?;
    println!("API Status: {}", health.status);
    println!("Version: {}", health.version.as_deref().unwrap_or("unknown"));
    Ok(())
}

pub async fn credits(client: &CreoleClient) -> Result<()> {
    let balance = client.get_credit_balance().await?;
    section("Credit Balance");
    println!("Total Credits: {}", balance.total_credits);
    println!("Subscription Credits: {}", balance.subscription_credits);
    println!("Purchased Credits: {}", balance.purchased_credits);
    if let Some(plan) = balance.subscription_plan {
        println!("Plan: {plan}");
    }
    Ok(())
}

pub async fn profile(client: &CreoleClient) -> Result<()> {
    let profile = client.get_user_info().await?;
    println!("{}", serde_json::to_string_pretty(&profile)?);
    Ok(())
}

pub async fn voices(client: &CreoleClient, args: VoicesArgs) -> Result<()> {
    let voices = client.get_voices().await?;
    section("Available Voices");
    println!("Found {} voices:", voices.len());
    for voice in voices.iter().take(args.limit.unwrap_or(usize::MAX)) {
        println!("  - {} (ID: {})", voice.name, voice.voice_id);
        println!(
            "    Language: {}, Gender: {}",
            voice.language.as_deref().unwrap_or("-"),
            voice.gender.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

pub async fn models(client: &CreoleClient) -> Result<()> {
    let models = client.get_models().await?;
    section("Available Models");
    println!("Found {} models:", models.len());
    for model in &models {
        println!("  - {} (ID: {})", model.name, model.model_id);
        println!(
            "    Description: {}",
            model.description.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

pub async fn voice_settings(client: &CreoleClient) -> Result<()> {
    let settings = client.get_voice_settings().await?;
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

pub async fn create(client: &CreoleClient, args: CreateArgs) -> Result<()> {
    let voice_id = match args.voice {
        Some(v) => v,
        None => client
            .get_voices()
            .await?
            .into_iter()
            .next()
            .map(|v| v.voice_id)
            .unwrap_or_else(|| "voice_1".to_string()),
    };
    let model_id = match args.model {
        Some(m) => m,
        None => client
            .get_models()
            .await?
            .into_iter()
            .next()
            .map(|m| m.model_id)
            .unwrap_or_else(|| "model_1".to_string()),
    };

    let request = CreateJobRequest::builder()
        .text(args.text)
        .voice_id(voice_id)
        .model_id(model_id)
        .maybe_speed(args.speed)
        .maybe_webhook_url(args.webhook_url)
        .build();

    let job = client.create_job(&request).await?;
    section("TTS Job Created");
    println!("Job ID: {}", job.job_id);
    println!("Status: {}", job.status);
    println!("Credits used: {}", job.credits_used.unwrap_or(0.0));

    if args.wait {
        let options = WaitOptions::new(Duration::from_secs(args.timeout), Duration::from_secs(2));
        print_final(&client.wait_for_job(&job.job_id, options).await?);
    }
    Ok(())
}

pub async fn status(client: &CreoleClient, job_id: &str) -> Result<()> {
    let status = client.get_job_status(job_id).await?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

pub async fn job(client: &CreoleClient, job_id: &str) -> Result<()> {
    let details = client.get_job_details(job_id).await?;
    println!("{}", serde_json::to_string_pretty(&details)?);
    Ok(())
}

pub async fn list(client: &CreoleClient, args: ListArgs) -> Result<()> {
    let jobs = client.list_jobs(args.limit, args.offset).await?;
    section("Recent Jobs");
    println!("Recent {} jobs:", jobs.results.len());
    for job in &jobs.results {
        let short_id: String = job.job_id.chars().take(8).collect();
        let text: String = job.text.as_deref().unwrap_or("").chars().take(50).collect();
        println!("  - Job {short_id}...");
        println!("    Created: {}", job.created_at.as_deref().unwrap_or(""));
        println!("    Status: {}", job.status);
        println!("    Text: {text}...");
    }
    Ok(())
}

pub async fn cancel(client: &CreoleClient, job_id: &str) -> Result<()> {
    let response = client.cancel_job(job_id).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

pub async fn wait(client: &CreoleClient, args: WaitArgs) -> Result<()> {
    let mut options = WaitOptions::new(
        Duration::from_secs(args.timeout),
        Duration::from_secs(args.interval.max(1)),
    );
    if args.backoff {
        options = options.with_backoff(PollBackoff::Jittered {
            multiplier: 1.5,
            max_interval: Duration::from_secs(30),
        });
    }
    match client.wait_for_job(&args.job_id, options).await {
        Ok(status) => {
            print_final(&status);
            Ok(())
        }
        Err(err @ CreoleError::PollTimeout { .. }) => {
            println!(
                "Job {} did not complete within {} seconds",
                args.job_id, args.timeout
            );
            Err(err)
        }
        Err(e) => Err(e),
    }
}

pub async fn express(client: &CreoleClient, args: ExpressArgs) -> Result<()> {
    let audio = client.express_tts(&args.text, &args.voice).await?;
    tokio::fs::write(&args.output, &audio).await?;
    println!("Saved {} bytes to {}", audio.len(), args.output.display());
    Ok(())
}

pub async fn serve(args: ServeArgs) -> Result<()> {
    let mut config = ReceiverConfig::from_env()?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(dir) = args.download_dir {
        config.download_dir = dir;
    }
    if args.no_download {
        config.download_audio = false;
    }

    println!("{RULE}");
    println!("CreoleCentric Webhook Server");
    println!("{RULE}");
    println!("Server starting on http://localhost:{}", config.port);
    println!("Webhook endpoint: http://localhost:{}/webhook", config.port);
    println!("Press Ctrl+C to stop the server");
    println!("{RULE}");

    crate::webhook::server::serve(config).await
}

fn print_final(status: &JobStatusResponse) {
    section("Job Finished");
    println!("Final status: {}", status.status);
    if let Some(url) = &status.audio_url {
        println!("Audio URL: {url}");
    }
    if let Some(duration) = status.duration_seconds {
        println!("Duration: {duration} seconds");
    }
    if let Some(error) = &status.error_message {
        println!("Error: {error}");
    }
}
