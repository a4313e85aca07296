#![cfg(test)]
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use image::{DynamicImage, ImageBuffer, ImageFormat, Luma};
use migration::MigratorTrait;
use sea_orm::DatabaseConnection;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::media::{FsMediaStore, MediaStore, PhotoUpload, QrWriter, Release};
use crate::store::{EntityStore, MemoryStore};

// Ensure migrations run only once across the entire test process
static MIGRATED: OnceCell<()> = OnceCell::const_new();

/// Migrated PostgreSQL connection, or `None` when no database is configured.
pub async fn get_db() -> Result<Option<DatabaseConnection>, anyhow::Error> {
    let _ = dotenvy::dotenv();
    if std::env::var("SKIP_DB_TESTS").is_ok() {
        return Ok(None);
    }
    let Ok(url) = std::env::var("DATABASE_URL") else { return Ok(None) };
    let mut cfg = configs::DatabaseConfig { url, ..Default::default() };
    cfg.min_connections = 1;
    cfg.max_connections = 10;
    cfg.connect_timeout_secs = 10;
    cfg.acquire_timeout_secs = 10;

    let db = models::db::connect_with_config(&cfg).await?;
    MIGRATED
        .get_or_try_init(|| async { migration::Migrator::up(&db, None).await })
        .await?;
    Ok(Some(db))
}

pub fn temp_dir(prefix: &str) -> PathBuf {
    std::env::temp_dir().join(format!("rate_restaurant_{prefix}_{}", Uuid::new_v4()))
}

/// A tiny valid PNG.
pub fn png_bytes() -> Vec<u8> {
    let img = DynamicImage::ImageLuma8(ImageBuffer::<Luma<u8>, Vec<u8>>::from_pixel(4, 4, Luma([200])));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).expect("encode png");
    out.into_inner()
}

pub fn photo(name: &str) -> PhotoUpload {
    PhotoUpload { file_name: name.to_string(), data: png_bytes() }
}

/// Memory store plus media rooted in fresh temp directories.
pub struct Fixture {
    pub store: Arc<dyn EntityStore>,
    pub photos: Arc<FsMediaStore>,
    pub qr: Arc<QrWriter>,
    pub root: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let root = temp_dir("fixture");
        Self {
            store: Arc::new(MemoryStore::new()),
            photos: Arc::new(FsMediaStore::new(root.join("uploads"))),
            qr: Arc::new(QrWriter::new(root.join("qrcodes"), "http://localhost:3000")),
            root,
        }
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

/// Media store whose removals fail for references listed in `failing`.
pub struct FlakyMedia {
    pub inner: FsMediaStore,
    pub failing: Vec<String>,
}

#[async_trait]
impl MediaStore for FlakyMedia {
    async fn save(&self, upload: PhotoUpload) -> Result<String, ServiceError> {
        self.inner.save(upload).await
    }

    async fn release(&self, reference: &str) -> Result<Release, ServiceError> {
        if self.failing.iter().any(|f| f == reference) {
            return Err(ServiceError::Io(format!("permission denied: {reference}")));
        }
        self.inner.release(reference).await
    }
}
