//! CreoleCentric CLI binary entry point.

use creolecentric::cli::{commands, Cli, Commands};
use creolecentric::error::CreoleError;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("creolecentric=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse_args();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        if matches!(&e, CreoleError::Configuration(msg) if msg.contains("API_KEY")) {
            eprintln!("Set CREOLECENTRIC_API_KEY in your environment or in a .env file.");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> creolecentric::error::Result<()> {
    let command = match cli.command {
        Commands::Serve(args) => return commands::serve(args).await,
        other => other,
    };

    let client = commands::client_from_env(cli.api_url)?;
    match command {
        Commands::Check => commands::check(&client).await,
        Commands::Health => commands::health(&client).await,
        Commands::Credits => commands::credits(&client).await,
        Commands::Profile => commands::profile(&client).await,
        Commands::Voices(args) => commands::voices(&client, args).await,
        Commands::Models => commands::models(&client).await,
        Commands::VoiceSettings => commands::voice_settings(&client).await,
        Commands::Create(args) => commands::create(&client, args).await,
        Commands::Status(args) => commands::status(&client, &args.job_id).await,
        Commands::Job(args) => commands::job(&client, &args.job_id).await,
        Commands::List(args) => commands::list(&client, args).await,
        Commands::Cancel(args) => commands::cancel(&client, &args.job_id).await,
        Commands::Wait(args) => commands::wait(&client, args).await,
        Commands::Express(args) => commands::express(&client, args).await,
        Commands::Serve(args) => commands::serve(args).await,
    }
}
