//! Media owned by entities: waiter photos and restaurant QR images.
//!
//! Both live as plain files under configured directories and are referenced
//! from records by bare file name.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::Luma;
use qrcode::QrCode;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::ServiceError;

/// Maximum photo size (5MB)
pub const MAX_PHOTO_SIZE: usize = 5 * 1024 * 1024;

/// Accepted photo extensions
pub const SUPPORTED_FORMATS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// Outcome of releasing a stored file. A missing file is not an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Release {
    Removed,
    AlreadyAbsent,
}

/// Uploaded photo as received from the client.
#[derive(Clone, Debug)]
pub struct PhotoUpload {
    pub file_name: String,
    pub data: Vec<u8>,
}

/// Storage for uploaded photos.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Persist a validated photo and return its stable reference.
    async fn save(&self, upload: PhotoUpload) -> Result<String, ServiceError>;
    /// Remove a stored photo; `AlreadyAbsent` when it was not there.
    async fn release(&self, reference: &str) -> Result<Release, ServiceError>;
}

/// Photos stored as files in one directory.
pub struct FsMediaStore {
    dir: PathBuf,
}

impl FsMediaStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl MediaStore for FsMediaStore {
    async fn save(&self, upload: PhotoUpload) -> Result<String, ServiceError> {
        let ext = validate_photo(&upload).await?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ServiceError::Io(format!("create {}: {e}", self.dir.display())))?;
        let reference = format!("{}.{}", Uuid::new_v4(), ext);
        let path = self.dir.join(&reference);
        tokio::fs::write(&path, &upload.data)
            .await
            .map_err(|e| ServiceError::Io(format!("write {}: {e}", path.display())))?;
        info!(reference = %reference, size = upload.data.len(), "photo_stored");
        Ok(reference)
    }

    async fn release(&self, reference: &str) -> Result<Release, ServiceError> {
        remove_in_dir(&self.dir, reference).await
    }
}

/// Check size, extension and that the bytes decode as an image; returns the lowercase extension.
pub async fn validate_photo(upload: &PhotoUpload) -> Result<String, ServiceError> {
    if upload.data.is_empty() {
        return Err(ServiceError::Validation("empty file provided".into()));
    }
    if upload.data.len() > MAX_PHOTO_SIZE {
        return Err(ServiceError::Validation(format!(
            "file too large, maximum size is {}MB",
            MAX_PHOTO_SIZE / 1024 / 1024
        )));
    }
    let ext = Path::new(&upload.file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .ok_or_else(|| ServiceError::Validation(format!("invalid file extension for: {}", upload.file_name)))?;
    if !SUPPORTED_FORMATS.contains(&ext.as_str()) {
        return Err(ServiceError::Validation(format!(
            "unsupported file format '{}', supported: {}",
            ext,
            SUPPORTED_FORMATS.join(", ")
        )));
    }

    let data = upload.data.clone();
    tokio::task::spawn_blocking(move || image::load_from_memory(&data).map(|_| ()))
        .await
        .map_err(|e| ServiceError::Io(e.to_string()))?
        .map_err(|e| ServiceError::Validation(format!("invalid image file ({ext}): {e}")))?;
    Ok(ext)
}

/// References must be bare file names so a record can never point outside its directory.
fn checked_path(dir: &Path, reference: &str) -> Result<PathBuf, ServiceError> {
    let bare = Path::new(reference).file_name().and_then(|n| n.to_str());
    if reference.is_empty() || bare != Some(reference) {
        return Err(ServiceError::Validation(format!("invalid media reference: {reference:?}")));
    }
    Ok(dir.join(reference))
}

async fn remove_in_dir(dir: &Path, reference: &str) -> Result<Release, ServiceError> {
    let path = checked_path(dir, reference)?;
    match tokio::fs::remove_file(&path).await {
        Ok(()) => Ok(Release::Removed),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "media already absent");
            Ok(Release::AlreadyAbsent)
        }
        Err(e) => Err(ServiceError::Io(format!("remove {}: {e}", path.display()))),
    }
}

/// Renders restaurant QR codes as PNG files.
pub struct QrWriter {
    dir: PathBuf,
    base_url: String,
}

impl QrWriter {
    pub fn new<P: Into<PathBuf>>(dir: P, base_url: &str) -> Self {
        Self { dir: dir.into(), base_url: base_url.trim_end_matches('/').to_string() }
    }

    /// The URL a restaurant's QR code encodes.
    pub fn target_for(&self, restaurant_id: Uuid) -> String {
        format!("{}/restaurants/{}", self.base_url, restaurant_id)
    }

    /// Write `qr_<id>.png` and return that file name.
    pub async fn generate(&self, restaurant_id: Uuid) -> Result<String, ServiceError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ServiceError::Io(format!("create {}: {e}", self.dir.display())))?;
        let file_name = models::restaurant::qr_file_name(restaurant_id);
        let path = self.dir.join(&file_name);
        let target = self.target_for(restaurant_id);

        tokio::task::spawn_blocking(move || -> Result<(), ServiceError> {
            let code = QrCode::new(target.as_bytes())
                .map_err(|e| ServiceError::Validation(format!("qr encode: {e}")))?;
            code.render::<Luma<u8>>()
                .build()
                .save(&path)
                .map_err(|e| ServiceError::Io(format!("write {}: {e}", path.display())))
        })
        .await
        .map_err(|e| ServiceError::Io(e.to_string()))??;

        debug!(restaurant_id = %restaurant_id, file = %file_name, "qr_generated");
        Ok(file_name)
    }

    pub async fn remove(&self, reference: &str) -> Result<Release, ServiceError> {
        remove_in_dir(&self.dir, reference).await
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
