//! Temp-file-then-rename publishing shared by the on-disk stores.
//!
//! Content is written under `<temp_dir>/<uuid>` and renamed into its final
//! location only once complete, so readers never observe a partial file under
//! a final name. Two writers racing on the same destination both rename
//! complete files; the last rename wins.

use goldenhammer_core::CacheError;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A fresh, unique temp path inside `temp_dir` (created if missing).
pub(crate) async fn temp_file(temp_dir: &Path) -> Result<PathBuf, CacheError> {
    tokio::fs::create_dir_all(temp_dir)
        .await
        .map_err(|e| CacheError::io(temp_dir, e))?;
    Ok(temp_dir.join(Uuid::new_v4().to_string()))
}

/// Move a finished temp file to `dest`, creating the shard directory first.
pub(crate) async fn publish(temp: &Path, dest: &Path) -> Result<(), CacheError> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| CacheError::io(parent, e))?;
    }

    if let Err(e) = tokio::fs::rename(temp, dest).await {
        discard(temp).await;
        return Err(CacheError::io(dest, e));
    }
    Ok(())
}

/// Best-effort removal of an abandoned temp file.
pub(crate) async fn discard(temp: &Path) {
    let _ = tokio::fs::remove_file(temp).await;
}

/// `<base>/<name[0]>/<name>`, or `None` when `name` is not a hex digest.
///
/// Rejecting anything but hex keeps lookups inside the store directory.
pub(crate) fn sharded_path(base: &Path, name: &str) -> Option<PathBuf> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    Some(base.join(&name[..1]).join(name))
}
