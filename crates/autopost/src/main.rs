//! autopost: scheduled content publisher
//!
//! Main binary with subcommands:
//! - `run`: the scheduler daemon (polling loop, publish pipeline)
//! - `status`: print configured jobs and their persisted next runs

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod daemon;
mod remote;
mod status;

#[derive(Parser)]
#[command(name = "autopost")]
#[command(about = "Scheduled content publisher", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler daemon
    Run {
        /// IANA timezone the slots are expressed in
        #[arg(long, env = "AUTOPOST_TZ", default_value = "Asia/Kolkata")]
        timezone: String,

        /// Image pool directory
        #[arg(long, env = "AUTOPOST_IMAGES_DIR", default_value = "content/images")]
        images_dir: PathBuf,

        /// Video pool directory
        #[arg(long, env = "AUTOPOST_VIDEOS_DIR", default_value = "content/videos")]
        videos_dir: PathBuf,

        /// Persisted schedule state file
        #[arg(long, env = "AUTOPOST_STATE_FILE", default_value = "scheduler_state.json")]
        state_file: PathBuf,

        /// JSON job table; the built-in three daily slots when omitted
        #[arg(long, env = "AUTOPOST_JOBS_FILE")]
        jobs_file: Option<PathBuf>,

        /// Base URL of the publish service (required unless --dry-run)
        #[arg(long, env = "AUTOPOST_PUBLISH_URL")]
        publish_url: Option<String>,

        /// Poll interval in seconds (lower it to accelerate tests)
        #[arg(long, env = "AUTOPOST_POLL_INTERVAL", default_value = "20")]
        poll_interval: u64,

        /// Run one pass then exit
        #[arg(long)]
        once: bool,

        /// Simulate without performing the external publish call
        #[arg(long)]
        dry_run: bool,
    },

    /// Print configured jobs and their persisted next runs
    Status {
        /// IANA timezone to render local times in
        #[arg(long, env = "AUTOPOST_TZ", default_value = "Asia/Kolkata")]
        timezone: String,

        /// Persisted schedule state file
        #[arg(long, env = "AUTOPOST_STATE_FILE", default_value = "scheduler_state.json")]
        state_file: PathBuf,

        /// JSON job table; the built-in three daily slots when omitted
        #[arg(long, env = "AUTOPOST_JOBS_FILE")]
        jobs_file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "autopost=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            timezone,
            images_dir,
            videos_dir,
            state_file,
            jobs_file,
            publish_url,
            poll_interval,
            once,
            dry_run,
        } => {
            daemon::run(daemon::RunConfig {
                timezone,
                images_dir,
                videos_dir,
                state_file,
                jobs_file,
                publish_url,
                poll_interval,
                once,
                dry_run,
            })
            .await
        }

        Commands::Status {
            timezone,
            state_file,
            jobs_file,
        } => status::run(&timezone, &state_file, jobs_file.as_deref()),
    }
}
