//! Entity store abstraction over the three collections (users, restaurants, waiters).
//!
//! Two implementations: [`SeaOrmStore`] for PostgreSQL and [`MemoryStore`]
//! for tests and `database.url = "memory://"` deployments.

pub mod memory;
pub mod seaorm;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use models::{
    rating::{self, Rating, Ratings},
    restaurant, user, waiter,
};

use crate::errors::ServiceError;
use crate::rating::RatingOutcome;

pub use memory::MemoryStore;
pub use seaorm::SeaOrmStore;

/// Change applied to a target's ratings inside one atomic store operation.
pub type RatingMutation = Box<dyn FnOnce(&mut Vec<Rating>) -> Result<RatingOutcome, ServiceError> + Send>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionCounts {
    pub users: u64,
    pub restaurants: u64,
    pub waiters: u64,
}

impl CollectionCounts {
    pub fn is_empty(&self) -> bool {
        self.users == 0 && self.restaurants == 0 && self.waiters == 0
    }
}

/// Full contents of the store, as written to and read from backups.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub users: Vec<user::Model>,
    pub restaurants: Vec<restaurant::Model>,
    pub waiters: Vec<waiter::Model>,
}

impl Snapshot {
    pub fn counts(&self) -> CollectionCounts {
        CollectionCounts {
            users: self.users.len() as u64,
            restaurants: self.restaurants.len() as u64,
            waiters: self.waiters.len() as u64,
        }
    }

    /// Check the data-model rules a store relies on but cannot see inside
    /// the rating documents: unique ids and names, scores in range, one
    /// rating per rater per target, and every waiter's restaurant present.
    pub fn validate(&self) -> Result<(), ServiceError> {
        let mut user_ids = HashSet::new();
        let mut usernames = HashSet::new();
        for u in &self.users {
            if !user_ids.insert(u.id) {
                return Err(invalid(format!("duplicate user id {}", u.id)));
            }
            if !usernames.insert(u.username.as_str()) {
                return Err(invalid(format!("duplicate username {}", u.username)));
            }
        }

        let mut restaurant_ids = HashSet::new();
        let mut restaurant_names = HashSet::new();
        for r in &self.restaurants {
            if !restaurant_ids.insert(r.id) {
                return Err(invalid(format!("duplicate restaurant id {}", r.id)));
            }
            if !restaurant_names.insert(r.name.as_str()) {
                return Err(invalid(format!("duplicate restaurant name {}", r.name)));
            }
            check_ratings(&r.ratings, "restaurant", r.id)?;
        }

        let mut waiter_ids = HashSet::new();
        for w in &self.waiters {
            if !waiter_ids.insert(w.id) {
                return Err(invalid(format!("duplicate waiter id {}", w.id)));
            }
            if !restaurant_ids.contains(&w.restaurant_id) {
                return Err(invalid(format!("waiter {} references unknown restaurant {}", w.id, w.restaurant_id)));
            }
            check_ratings(&w.ratings, "waiter", w.id)?;
        }
        Ok(())
    }
}

fn invalid(msg: String) -> ServiceError {
    ServiceError::Validation(format!("backup rejected: {msg}"))
}

fn check_ratings(ratings: &Ratings, kind: &str, id: Uuid) -> Result<(), ServiceError> {
    let mut raters = HashSet::new();
    for r in ratings.as_slice() {
        rating::validate_score(r.score).map_err(|e| invalid(format!("{kind} {id}: {e}")))?;
        if !raters.insert(r.rated_by) {
            return Err(invalid(format!("{kind} {id} rated twice by {}", r.rated_by)));
        }
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RestoreOutcome {
    Restored { counts: CollectionCounts },
    /// Nothing was written because the store already held data.
    AlreadyPopulated { counts: CollectionCounts },
}

/// Persistence operations used by the services.
///
/// Lists are ordered by name (users by username). Inserting a duplicate
/// username or restaurant name fails with `DuplicateName`; inserting a waiter
/// for a missing restaurant fails with `NotFound`.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn find_user(&self, id: Uuid) -> Result<Option<user::Model>, ServiceError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<user::Model>, ServiceError>;
    async fn insert_user(&self, user: user::Model) -> Result<user::Model, ServiceError>;
    async fn list_users(&self) -> Result<Vec<user::Model>, ServiceError>;

    async fn find_restaurant(&self, id: Uuid) -> Result<Option<restaurant::Model>, ServiceError>;
    async fn find_restaurant_by_name(&self, name: &str) -> Result<Option<restaurant::Model>, ServiceError>;
    async fn insert_restaurant(&self, restaurant: restaurant::Model) -> Result<restaurant::Model, ServiceError>;
    async fn list_restaurants(&self) -> Result<Vec<restaurant::Model>, ServiceError>;
    /// Fails while waiters still reference the restaurant.
    async fn delete_restaurant(&self, id: Uuid) -> Result<bool, ServiceError>;
    /// Run `mutation` against the restaurant's ratings and persist the result atomically.
    async fn mutate_restaurant_ratings(
        &self,
        id: Uuid,
        mutation: RatingMutation,
    ) -> Result<(restaurant::Model, RatingOutcome), ServiceError>;

    async fn find_waiter(&self, id: Uuid) -> Result<Option<waiter::Model>, ServiceError>;
    async fn insert_waiter(&self, waiter: waiter::Model) -> Result<waiter::Model, ServiceError>;
    async fn list_waiters(&self) -> Result<Vec<waiter::Model>, ServiceError>;
    async fn list_waiters_by_restaurant(&self, restaurant_id: Uuid) -> Result<Vec<waiter::Model>, ServiceError>;
    async fn delete_waiter(&self, id: Uuid) -> Result<bool, ServiceError>;
    async fn mutate_waiter_ratings(
        &self,
        id: Uuid,
        mutation: RatingMutation,
    ) -> Result<(waiter::Model, RatingOutcome), ServiceError>;

    async fn counts(&self) -> Result<CollectionCounts, ServiceError>;
    /// Insert a whole snapshot, all or nothing, if and only if the store is empty.
    async fn restore(&self, snapshot: Snapshot) -> Result<RestoreOutcome, ServiceError>;
}

/// Open the store selected by `[database]`.
pub async fn connect(cfg: &configs::DatabaseConfig) -> anyhow::Result<Arc<dyn EntityStore>> {
    if cfg.is_memory() {
        tracing::warn!("using in-memory store; data is lost on restart");
        return Ok(Arc::new(MemoryStore::default()));
    }
    let db = models::db::connect_with_config(cfg).await?;
    Ok(Arc::new(SeaOrmStore::new(db)))
}
