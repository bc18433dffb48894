//! CLI entry point for the CreoleCentric client.

pub mod commands;

use clap::{Parser, Subcommand};

/// CreoleCentric TTS CLI
#[derive(Parser, Debug)]
#[command(name = "creolecentric", version, about = "CreoleCentric TTS API client and webhook receiver")]
pub struct Cli {
    /// Override the API base URL (defaults to CREOLECENTRIC_API_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Verify connectivity and authentication
    Check,
    /// Show API health
    Health,
    /// Show credit balance
    Credits,
    /// Show the current user's profile
    Profile,
    /// List available voices
    Voices(VoicesArgs),
    /// List available models
    Models,
    /// Show voice settings configuration
    VoiceSettings,
    /// Create a TTS job
    Create(CreateArgs),
    /// Show a job's status
    Status(JobArgs),
    /// Show full job details
    Job(JobArgs),
    /// List recent jobs
    List(ListArgs),
    /// Cancel a job
    Cancel(JobArgs),
    /// Poll a job until it finishes
    Wait(WaitArgs),
    /// Synthesize short text immediately and save the audio
    Express(ExpressArgs),
    /// Run the webhook receiver
    Serve(ServeArgs),
}

/// Arguments for `voices`.
#[derive(Parser, Debug)]
pub struct VoicesArgs {
    /// Show at most this many voices
    #[arg(short, long)]
    pub limit: Option<usize>,
}

/// Arguments for `create`.
#[derive(Parser, Debug)]
pub struct CreateArgs {
    /// Text to synthesize
    pub text: String,

    /// Voice id (defaults to the first available voice)
    #[arg(short, long)]
    pub voice: Option<String>,

    /// Model id (defaults to the first available model)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Speaking speed
    #[arg(long)]
    pub speed: Option<f64>,

    /// URL the service should send progress webhooks to
    #[arg(long)]
    pub webhook_url: Option<String>,

    /// Wait for the job to finish
    #[arg(short, long)]
    pub wait: bool,

    /// Seconds to wait when --wait is set
    #[arg(long, default_value_t = 60)]
    pub timeout: u64,
}

/// Arguments naming a single job.
#[derive(Parser, Debug)]
pub struct JobArgs {
    /// Job id
    pub job_id: String,
}

/// Arguments for `list`.
#[derive(Parser, Debug)]
pub struct ListArgs {
    #[arg(short, long, default_value_t = 10)]
    pub limit: u32,

    #[arg(short, long, default_value_t = 0)]
    pub offset: u32,
}

/// Arguments for `wait`.
#[derive(Parser, Debug)]
pub struct WaitArgs {
    /// Job id
    pub job_id: String,

    /// Maximum seconds to wait
    #[arg(short, long, default_value_t = 300)]
    pub timeout: u64,

    /// Seconds between status checks
    #[arg(short, long, default_value_t = 2)]
    pub interval: u64,

    /// Grow the interval with jitter between polls
    #[arg(long)]
    pub backoff: bool,
}

/// Arguments for `express`.
#[derive(Parser, Debug)]
pub struct ExpressArgs {
    /// Text to synthesize (short texts only)
    pub text: String,

    #[arg(short, long, default_value = "voice_1")]
    pub voice: String,

    /// Output file
    #[arg(short, long, default_value = "express.mp3")]
    pub output: std::path::PathBuf,
}

/// Arguments for `serve`; unset values come from the environment.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Port to listen on (defaults to PORT or 5000)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory for downloaded audio
    #[arg(long)]
    pub download_dir: Option<std::path::PathBuf>,

    /// Do not download delivered audio
    #[arg(long)]
    pub no_download: bool,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
