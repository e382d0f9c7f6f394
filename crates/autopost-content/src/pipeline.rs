//! The firing pipeline: select, caption, upload, archive.

use std::sync::{Arc, Mutex};

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{error, info, warn};

use autopost_scheduler::{FireHandler, FiringOutcome, Job};

use crate::{
    ContentError, ContentGenerator, ContentKind, ContentPools, UploadExecutor, UploadOutcome,
    archive_item,
};

/// Drives one job firing through selection, upload and archiving.
///
/// In dry-run mode selection still happens (so operators can see what
/// would have been posted) but the upload executor and the archiver are
/// skipped; the scheduler advances the job either way.
pub struct PublishPipeline {
    pools: ContentPools,
    executor: UploadExecutor,
    generator: Option<Arc<dyn ContentGenerator>>,
    rng: Mutex<StdRng>,
    dry_run: bool,
}

impl PublishPipeline {
    pub fn new(pools: ContentPools, executor: UploadExecutor) -> Self {
        Self {
            pools,
            executor,
            generator: None,
            rng: Mutex::new(StdRng::from_rng(&mut rand::rng())),
            dry_run: false,
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn ContentGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Replace the selection rng with a seeded one (tests).
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Execute one firing.
    ///
    /// An `Err` here is an unexpected fault (e.g. an unreadable pool
    /// directory); expected failure modes are regular outcomes.
    pub async fn fire(&self, job: &Job) -> Result<FiringOutcome, ContentError> {
        let item = {
            let mut rng = self.rng.lock().expect("selection rng lock poisoned");
            self.pools.select(job.kind, &mut *rng)?
        };

        let Some(item) = item else {
            warn!(job = %job.id, kind = ?job.kind, "no content available");
            return Ok(FiringOutcome::NoContent);
        };

        info!(
            job = %job.id,
            kind = %item.kind,
            path = %item.path.display(),
            "selected content"
        );

        if self.dry_run {
            info!(job = %job.id, path = %item.path.display(), "dry run, skipping upload and archive");
            return Ok(FiringOutcome::DryRun);
        }

        let caption = match (item.kind, &self.generator) {
            (ContentKind::Image, Some(generator)) => match generator.generate_caption().await {
                Ok(caption) => caption,
                Err(e) => {
                    error!(job = %job.id, error = %e, "caption generation failed, no content for this firing");
                    return Ok(FiringOutcome::NoContent);
                }
            },
            // No generator configured: publish captionless
            _ => String::new(),
        };

        match self.executor.publish(&item, &caption).await {
            UploadOutcome::Success(resp) => {
                info!(job = %job.id, post_id = ?resp.id, path = %item.path.display(), "published");
                if let Err(e) = archive_item(&item) {
                    warn!(job = %job.id, error = %e, "failed to archive published content");
                }
                Ok(FiringOutcome::Published)
            }
            UploadOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                error!(
                    job = %job.id,
                    attempts,
                    error = %last_error,
                    path = %item.path.display(),
                    "publish failed terminally"
                );
                Ok(FiringOutcome::Exhausted)
            }
        }
    }

    /// Adapt the pipeline into the scheduler's fire handler.
    pub fn into_handler(self: Arc<Self>) -> FireHandler {
        Box::new(move |job: Job| {
            let pipeline = Arc::clone(&self);
            Box::pin(async move { pipeline.fire(&job).await.map_err(|e| e.to_string()) })
        })
    }
}
