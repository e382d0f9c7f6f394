//! Post-success archiving.

use std::fs;
use std::path::PathBuf;

use tracing::info;

use crate::{ContentError, ContentItem};

/// Move a published item into the `archived/` subdirectory of its pool.
///
/// Best-effort housekeeping: the caller logs a failure and moves on,
/// publish success has already been recorded. Falls back to copy+remove
/// when a plain rename crosses filesystems.
pub fn archive_item(item: &ContentItem) -> Result<PathBuf, ContentError> {
    let archive_err = |source| ContentError::Archive {
        path: item.path.clone(),
        source,
    };

    let pool_dir = item.path.parent().ok_or_else(|| {
        archive_err(std::io::Error::other("item has no parent directory"))
    })?;
    let file_name = item.path.file_name().ok_or_else(|| {
        archive_err(std::io::Error::other("item has no file name"))
    })?;

    let archived_dir = pool_dir.join("archived");
    fs::create_dir_all(&archived_dir).map_err(archive_err)?;

    let dest = archived_dir.join(file_name);
    if let Err(rename_err) = fs::rename(&item.path, &dest) {
        // Cross-device move: copy then remove the original
        fs::copy(&item.path, &dest).map_err(|_| archive_err(rename_err))?;
        fs::remove_file(&item.path).map_err(archive_err)?;
    }

    info!(kind = %item.kind, dest = %dest.display(), "archived content");
    Ok(dest)
}
