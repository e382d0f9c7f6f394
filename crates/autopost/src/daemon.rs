//! Run command: wire the pipeline and drive the scheduler loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use chrono_tz::Tz;
use miette::{Result, miette};
use tokio::sync::watch;
use tracing::info;

use autopost_content::{ContentPools, PublishPipeline, RetryPolicy, UploadExecutor};
use autopost_scheduler::{JobTable, JsonStateStore, Scheduler, warn_if_stale};

use crate::remote::{DisabledTransport, RemoteGenerator, RemotePublisher};

/// How many days behind a persisted next-run may be before we warn
/// about catch-up firings at startup.
const STALE_WARN_DAYS: i64 = 2;

/// Configuration for the run command.
pub struct RunConfig {
    pub timezone: String,
    pub images_dir: PathBuf,
    pub videos_dir: PathBuf,
    pub state_file: PathBuf,
    pub jobs_file: Option<PathBuf>,
    pub publish_url: Option<String>,
    pub poll_interval: u64,
    pub once: bool,
    pub dry_run: bool,
}

/// Load the job table from a JSON file, or the built-in default slots.
///
/// Duplicate slot times and unparsable files are fatal here, before any
/// state is touched.
pub fn load_job_table(jobs_file: Option<&Path>) -> Result<JobTable> {
    match jobs_file {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| miette!("failed to read jobs file {}: {}", path.display(), e))?;
            let table = JobTable::from_json(&raw).map_err(|e| miette!("{}", e))?;
            info!(path = %path.display(), jobs = table.len(), "loaded job table");
            Ok(table)
        }
        None => {
            info!("no jobs file given, using built-in default slots");
            Ok(JobTable::default_slots())
        }
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse()
        .map_err(|_| miette!("unknown timezone '{}'", name))
}

pub async fn run(config: RunConfig) -> Result<()> {
    let tz = parse_timezone(&config.timezone)?;
    let table = load_job_table(config.jobs_file.as_deref())?;

    let pools = ContentPools::new(&config.images_dir, &config.videos_dir);
    let policy = RetryPolicy::default();

    let pipeline = if config.dry_run {
        info!("dry-run mode: uploads and archiving are skipped");
        PublishPipeline::new(pools, UploadExecutor::new(Arc::new(DisabledTransport), policy))
            .dry_run(true)
    } else {
        // Publishing needs a concrete collaborator up front; there is
        // no runtime probing for one
        let base_url = config.publish_url.as_deref().ok_or_else(|| {
            miette!("--publish-url (AUTOPOST_PUBLISH_URL) is required unless --dry-run")
        })?;
        let publisher = RemotePublisher::new(base_url).map_err(|e| miette!("{}", e))?;
        let generator = RemoteGenerator::new(base_url).map_err(|e| miette!("{}", e))?;
        PublishPipeline::new(pools, UploadExecutor::new(Arc::new(publisher), policy))
            .with_generator(Arc::new(generator))
    };

    let store = JsonStateStore::new(&config.state_file);
    let mut scheduler = Scheduler::new(
        table,
        tz,
        store,
        Duration::from_secs(config.poll_interval),
    )
    .map_err(|e| miette!("{}", e))?;

    warn_if_stale(scheduler.state(), Utc::now(), STALE_WARN_DAYS);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping after the current tick");
            let _ = shutdown_tx.send(true);
        }
    });

    let handler = Arc::new(pipeline).into_handler();
    scheduler
        .run(shutdown_rx, handler, config.once)
        .await
        .map_err(|e| miette!("{}", e))?;

    Ok(())
}
