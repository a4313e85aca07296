//! JSON backup of the three collections and restore into an empty store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::errors::ServiceError;
use crate::store::{CollectionCounts, EntityStore, RestoreOutcome, Snapshot};

pub const USERS_FILE: &str = "users.json";
pub const RESTAURANTS_FILE: &str = "restaurants.json";
pub const WAITERS_FILE: &str = "waiters.json";

#[derive(Clone, Debug, Serialize)]
pub struct BackupReport {
    pub dir: String,
    pub counts: CollectionCounts,
    pub files: Vec<String>,
}

#[derive(Clone)]
pub struct BackupService {
    store: Arc<dyn EntityStore>,
    dir: PathBuf,
}

impl BackupService {
    pub fn new<P: Into<PathBuf>>(store: Arc<dyn EntityStore>, dir: P) -> Self {
        Self { store, dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write every collection to its own pretty-printed JSON file, replacing earlier backups.
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    pub async fn backup(&self) -> Result<BackupReport, ServiceError> {
        let snapshot = Snapshot {
            users: self.store.list_users().await?,
            restaurants: self.store.list_restaurants().await?,
            waiters: self.store.list_waiters().await?,
        };
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ServiceError::Io(format!("create {}: {e}", self.dir.display())))?;

        let files = vec![
            self.write_json(RESTAURANTS_FILE, &snapshot.restaurants).await?,
            self.write_json(USERS_FILE, &snapshot.users).await?,
            self.write_json(WAITERS_FILE, &snapshot.waiters).await?,
        ];
        let counts = snapshot.counts();
        info!(users = counts.users, restaurants = counts.restaurants, waiters = counts.waiters, "backup_created");
        Ok(BackupReport { dir: self.dir.display().to_string(), counts, files })
    }

    /// Load all three files and insert them in one step, only into an empty store.
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    pub async fn restore(&self) -> Result<RestoreOutcome, ServiceError> {
        let current = self.store.counts().await?;
        if !current.is_empty() {
            warn!(?current, "restore skipped; store already has data");
            return Ok(RestoreOutcome::AlreadyPopulated { counts: current });
        }

        // parse everything before touching the store
        let snapshot = Snapshot {
            users: self.read_json(USERS_FILE).await?,
            restaurants: self.read_json(RESTAURANTS_FILE).await?,
            waiters: self.read_json(WAITERS_FILE).await?,
        };
        snapshot.validate()?;
        let outcome = self.store.restore(snapshot).await?;
        match &outcome {
            RestoreOutcome::Restored { counts } => {
                info!(users = counts.users, restaurants = counts.restaurants, waiters = counts.waiters, "backup_restored")
            }
            RestoreOutcome::AlreadyPopulated { counts } => warn!(?counts, "store populated during restore"),
        }
        Ok(outcome)
    }

    async fn write_json<T: Serialize>(&self, file: &str, items: &[T]) -> Result<String, ServiceError> {
        let path = self.dir.join(file);
        let body = serde_json::to_vec_pretty(items).map_err(|e| ServiceError::Io(format!("encode {file}: {e}")))?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| ServiceError::Io(format!("write {}: {e}", path.display())))?;
        Ok(path.display().to_string())
    }

    async fn read_json<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>, ServiceError> {
        let path = self.dir.join(file);
        let raw = tokio::fs::read(&path)
            .await
            .map_err(|e| ServiceError::Io(format!("read {}: {e}", path.display())))?;
        serde_json::from_slice(&raw).map_err(|e| ServiceError::Validation(format!("malformed {file}: {e}")))
    }
}
