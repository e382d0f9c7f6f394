//! Content pools and selection.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use rand::RngExt;
use tracing::debug;

use autopost_scheduler::JobKind;

use crate::ContentError;

/// The kind of a concrete content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Image,
    Video,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Image => write!(f, "image"),
            ContentKind::Video => write!(f, "video"),
        }
    }
}

/// A file-like handle into a content pool, discovered at selection time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    pub path: PathBuf,
    pub kind: ContentKind,
}

/// One pool directory per content kind.
///
/// Pools are re-listed on every selection, never cached, so items added
/// or removed between firings are honored immediately.
#[derive(Debug, Clone)]
pub struct ContentPools {
    images_dir: PathBuf,
    videos_dir: PathBuf,
}

impl ContentPools {
    pub fn new(images_dir: impl Into<PathBuf>, videos_dir: impl Into<PathBuf>) -> Self {
        Self {
            images_dir: images_dir.into(),
            videos_dir: videos_dir.into(),
        }
    }

    pub fn dir(&self, kind: ContentKind) -> &Path {
        match kind {
            ContentKind::Image => &self.images_dir,
            ContentKind::Video => &self.videos_dir,
        }
    }

    /// List the candidate files in a pool, sorted by name.
    ///
    /// A missing pool directory is an empty pool, not an error. Only
    /// regular files count; the `archived/` subdirectory is therefore
    /// never picked up.
    pub fn list(&self, kind: ContentKind) -> Result<Vec<PathBuf>, ContentError> {
        let dir = self.dir(kind);
        if !dir.exists() {
            debug!(pool = %kind, path = %dir.display(), "pool directory missing, treating as empty");
            return Ok(Vec::new());
        }

        let scan_err = |source| ContentError::PoolScan {
            path: dir.to_path_buf(),
            source,
        };

        let mut files = Vec::new();
        for entry in fs::read_dir(dir).map_err(scan_err)? {
            let entry = entry.map_err(scan_err)?;
            if entry.file_type().map_err(scan_err)?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Pick a content item for a job's kind affinity.
    ///
    /// A specific affinity draws only from the matching pool. `Any`
    /// flips a coin between kinds when both pools have content. Returns
    /// `None` when nothing is available for this firing.
    pub fn select<R: RngExt>(
        &self,
        affinity: JobKind,
        rng: &mut R,
    ) -> Result<Option<ContentItem>, ContentError> {
        let kind = match affinity {
            JobKind::Image => ContentKind::Image,
            JobKind::Video => ContentKind::Video,
            JobKind::Any => {
                let have_images = !self.list(ContentKind::Image)?.is_empty();
                let have_videos = !self.list(ContentKind::Video)?.is_empty();
                match (have_images, have_videos) {
                    (true, true) => {
                        if rng.random_bool(0.5) {
                            ContentKind::Video
                        } else {
                            ContentKind::Image
                        }
                    }
                    (true, false) => ContentKind::Image,
                    (false, true) => ContentKind::Video,
                    (false, false) => return Ok(None),
                }
            }
        };

        let files = self.list(kind)?;
        if files.is_empty() {
            return Ok(None);
        }

        let path = files[rng.random_range(0..files.len())].clone();
        Ok(Some(ContentItem { path, kind }))
    }
}
