//! Runtime environment helpers
//!
//! Thin wrapper around `common::env` so binaries can prepare the storage
//! layout through `service::runtime::ensure_env` without depending on `common`.

use configs::StorageConfig;

/// Create the upload, QR and backup directories; warn when the public root is missing.
pub async fn ensure_env(storage: &StorageConfig) -> anyhow::Result<()> {
    common::env::ensure_dirs(&[&storage.upload_dir, &storage.qr_dir, &storage.backup_dir]).await?;
    common::env::warn_if_missing(&storage.public_dir).await;
    Ok(())
}
