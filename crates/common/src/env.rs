//! Environment/runtime helpers
//!
//! Sanity checks to ensure expected directories exist at startup.

use std::path::Path;

use tracing::{info, warn};

/// Create every directory in `dirs` (recursively); fail on the first that cannot be created.
pub async fn ensure_dirs<P: AsRef<Path>>(dirs: &[P]) -> anyhow::Result<()> {
    for dir in dirs {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| anyhow::anyhow!("cannot create {}: {e}", dir.display()))?;
        info!(dir = %dir.display(), "directory ready");
    }
    Ok(())
}

/// Warn when an optional directory is missing; never fails.
pub async fn warn_if_missing(dir: &str) {
    if tokio::fs::metadata(dir).await.is_err() {
        warn!(%dir, "directory not found; static assets may 404");
    }
}
