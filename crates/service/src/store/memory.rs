use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use models::{rating::Ratings, restaurant, user, waiter};

use super::{CollectionCounts, EntityStore, RatingMutation, RestoreOutcome, Snapshot};
use crate::errors::ServiceError;
use crate::rating::RatingOutcome;

/// In-process store. One lock guards all collections, so every operation,
/// including `restore`, is atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Snapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted<T: Clone, K: Ord>(items: &[T], key: impl Fn(&T) -> K) -> Vec<T> {
    let mut v = items.to_vec();
    v.sort_by_key(key);
    v
}

fn apply(ratings: &mut Ratings, mutation: RatingMutation) -> Result<RatingOutcome, ServiceError> {
    // work on a copy so a failed mutation leaves the record untouched
    let mut working = ratings.0.clone();
    let outcome = mutation(&mut working)?;
    ratings.0 = working;
    Ok(outcome)
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<user::Model>, ServiceError> {
        Ok(self.inner.read().await.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<user::Model>, ServiceError> {
        Ok(self.inner.read().await.users.iter().find(|u| u.username == username).cloned())
    }

    async fn insert_user(&self, user: user::Model) -> Result<user::Model, ServiceError> {
        let mut data = self.inner.write().await;
        if data.users.iter().any(|u| u.username == user.username || u.id == user.id) {
            return Err(ServiceError::DuplicateName(format!("username {} already taken", user.username)));
        }
        data.users.push(user.clone());
        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<user::Model>, ServiceError> {
        Ok(sorted(&self.inner.read().await.users, |u| u.username.clone()))
    }

    async fn find_restaurant(&self, id: Uuid) -> Result<Option<restaurant::Model>, ServiceError> {
        Ok(self.inner.read().await.restaurants.iter().find(|r| r.id == id).cloned())
    }

    async fn find_restaurant_by_name(&self, name: &str) -> Result<Option<restaurant::Model>, ServiceError> {
        Ok(self.inner.read().await.restaurants.iter().find(|r| r.name == name).cloned())
    }

    async fn insert_restaurant(&self, restaurant: restaurant::Model) -> Result<restaurant::Model, ServiceError> {
        let mut data = self.inner.write().await;
        if data.restaurants.iter().any(|r| r.name == restaurant.name || r.id == restaurant.id) {
            return Err(ServiceError::DuplicateName(format!("restaurant {} already exists", restaurant.name)));
        }
        data.restaurants.push(restaurant.clone());
        Ok(restaurant)
    }

    async fn list_restaurants(&self) -> Result<Vec<restaurant::Model>, ServiceError> {
        Ok(sorted(&self.inner.read().await.restaurants, |r| r.name.clone()))
    }

    async fn delete_restaurant(&self, id: Uuid) -> Result<bool, ServiceError> {
        let mut data = self.inner.write().await;
        if data.waiters.iter().any(|w| w.restaurant_id == id) {
            return Err(ServiceError::Db(format!("restaurant {id} is still referenced by waiters")));
        }
        let before = data.restaurants.len();
        data.restaurants.retain(|r| r.id != id);
        Ok(data.restaurants.len() != before)
    }

    async fn mutate_restaurant_ratings(
        &self,
        id: Uuid,
        mutation: RatingMutation,
    ) -> Result<(restaurant::Model, RatingOutcome), ServiceError> {
        let mut data = self.inner.write().await;
        let found = data
            .restaurants
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ServiceError::not_found("restaurant"))?;
        let outcome = apply(&mut found.ratings, mutation)?;
        Ok((found.clone(), outcome))
    }

    async fn find_waiter(&self, id: Uuid) -> Result<Option<waiter::Model>, ServiceError> {
        Ok(self.inner.read().await.waiters.iter().find(|w| w.id == id).cloned())
    }

    async fn insert_waiter(&self, waiter: waiter::Model) -> Result<waiter::Model, ServiceError> {
        let mut data = self.inner.write().await;
        if !data.restaurants.iter().any(|r| r.id == waiter.restaurant_id) {
            return Err(ServiceError::not_found("restaurant"));
        }
        if data.waiters.iter().any(|w| w.id == waiter.id) {
            return Err(ServiceError::Db(format!("waiter {} already exists", waiter.id)));
        }
        data.waiters.push(waiter.clone());
        Ok(waiter)
    }

    async fn list_waiters(&self) -> Result<Vec<waiter::Model>, ServiceError> {
        Ok(sorted(&self.inner.read().await.waiters, |w| w.name.clone()))
    }

    async fn list_waiters_by_restaurant(&self, restaurant_id: Uuid) -> Result<Vec<waiter::Model>, ServiceError> {
        let data = self.inner.read().await;
        let mine: Vec<_> = data.waiters.iter().filter(|w| w.restaurant_id == restaurant_id).cloned().collect();
        Ok(sorted(&mine, |w| w.name.clone()))
    }

    async fn delete_waiter(&self, id: Uuid) -> Result<bool, ServiceError> {
        let mut data = self.inner.write().await;
        let before = data.waiters.len();
        data.waiters.retain(|w| w.id != id);
        Ok(data.waiters.len() != before)
    }

    async fn mutate_waiter_ratings(
        &self,
        id: Uuid,
        mutation: RatingMutation,
    ) -> Result<(waiter::Model, RatingOutcome), ServiceError> {
        let mut data = self.inner.write().await;
        let found = data
            .waiters
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or_else(|| ServiceError::not_found("waiter"))?;
        let outcome = apply(&mut found.ratings, mutation)?;
        Ok((found.clone(), outcome))
    }

    async fn counts(&self) -> Result<CollectionCounts, ServiceError> {
        Ok(self.inner.read().await.counts())
    }

    async fn restore(&self, snapshot: Snapshot) -> Result<RestoreOutcome, ServiceError> {
        let mut data = self.inner.write().await;
        let current = data.counts();
        if !current.is_empty() {
            return Ok(RestoreOutcome::AlreadyPopulated { counts: current });
        }
        // the unique and foreign key constraints a database would apply
        snapshot.validate()?;
        let counts = snapshot.counts();
        *data = snapshot;
        Ok(RestoreOutcome::Restored { counts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rating::{apply_rating, RatingPolicy};
    use chrono::Utc;

    #[tokio::test]
    async fn duplicate_names_rejected() -> Result<(), anyhow::Error> {
        let store = MemoryStore::new();
        store.insert_restaurant(restaurant::Model::new(Uuid::new_v4(), "Bistro A")?).await?;
        let err = store.insert_restaurant(restaurant::Model::new(Uuid::new_v4(), "Bistro A")?).await.unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateName(_)));

        store.insert_user(user::Model::new("u", "h".into(), user::Role::Normal)?).await?;
        let err = store.insert_user(user::Model::new("u", "h".into(), user::Role::Normal)?).await.unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateName(_)));
        Ok(())
    }

    #[tokio::test]
    async fn waiter_requires_restaurant_and_blocks_its_deletion() -> Result<(), anyhow::Error> {
        let store = MemoryStore::new();
        let orphan = waiter::Model::new(Uuid::new_v4(), "Ana", "a.png".into())?;
        assert!(matches!(store.insert_waiter(orphan).await, Err(ServiceError::NotFound(_))));

        let r = store.insert_restaurant(restaurant::Model::new(Uuid::new_v4(), "Trattoria")?).await?;
        let w = store.insert_waiter(waiter::Model::new(r.id, "Ana", "a.png".into())?).await?;
        assert!(store.delete_restaurant(r.id).await.is_err());
        assert!(store.delete_waiter(w.id).await?);
        assert!(store.delete_restaurant(r.id).await?);
        assert!(!store.delete_restaurant(r.id).await?);
        Ok(())
    }

    #[tokio::test]
    async fn failed_mutation_leaves_ratings_untouched() -> Result<(), anyhow::Error> {
        let store = MemoryStore::new();
        let r = store.insert_restaurant(restaurant::Model::new(Uuid::new_v4(), "Bistro")?).await?;
        let rater = Uuid::new_v4();
        let add = |score: u8| -> RatingMutation {
            Box::new(move |seq| apply_rating(seq, rater, score, Utc::now(), RatingPolicy::RejectDuplicate))
        };
        store.mutate_restaurant_ratings(r.id, add(80)).await?;
        assert!(matches!(store.mutate_restaurant_ratings(r.id, add(60)).await, Err(ServiceError::DuplicateRating)));

        let stored = store.find_restaurant(r.id).await?.expect("restaurant");
        assert_eq!(stored.ratings.len(), 1);
        assert_eq!(stored.ratings.as_slice()[0].score, 80);
        Ok(())
    }

    #[tokio::test]
    async fn restore_only_into_empty_store() -> Result<(), anyhow::Error> {
        let store = MemoryStore::new();
        let mut snap = Snapshot::default();
        snap.restaurants.push(restaurant::Model::new(Uuid::new_v4(), "Bistro")?);
        let out = store.restore(snap.clone()).await?;
        assert!(matches!(out, RestoreOutcome::Restored { counts } if counts.restaurants == 1));

        let out = store.restore(snap).await?;
        assert!(matches!(out, RestoreOutcome::AlreadyPopulated { counts } if counts.restaurants == 1));
        assert_eq!(store.counts().await?.restaurants, 1);
        Ok(())
    }
}
