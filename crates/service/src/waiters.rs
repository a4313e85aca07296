use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use models::waiter;

use crate::errors::ServiceError;
use crate::media::{MediaStore, PhotoUpload, Release};
use crate::rating::{apply_rating, average, AverageRating, RatingPolicy};
use crate::restaurants::RatingReceipt;
use crate::store::{EntityStore, RatingMutation};

/// Waiter as shown on a restaurant page.
#[derive(Clone, Debug, Serialize)]
pub struct WaiterSummary {
    pub id: Uuid,
    pub name: String,
    pub picture: String,
    pub average: AverageRating,
    pub rating_count: usize,
}

impl From<&waiter::Model> for WaiterSummary {
    fn from(w: &waiter::Model) -> Self {
        Self {
            id: w.id,
            name: w.name.clone(),
            picture: w.picture.clone(),
            average: average(w.ratings.as_slice()),
            rating_count: w.ratings.len(),
        }
    }
}

/// Admin listing row; `restaurant_name` is `None` if the restaurant vanished.
#[derive(Clone, Debug, Serialize)]
pub struct WaiterListing {
    #[serde(flatten)]
    pub waiter: WaiterSummary,
    pub restaurant_id: Uuid,
    pub restaurant_name: Option<String>,
}

#[derive(Clone, Debug)]
pub struct NewWaiter {
    pub restaurant_id: Uuid,
    pub name: String,
    pub picture: PhotoUpload,
}

#[derive(Clone)]
pub struct WaiterService {
    store: Arc<dyn EntityStore>,
    photos: Arc<dyn MediaStore>,
}

impl WaiterService {
    pub fn new(store: Arc<dyn EntityStore>, photos: Arc<dyn MediaStore>) -> Self {
        Self { store, photos }
    }

    /// Store the photo and insert the waiter; the photo is released again if the insert fails.
    #[instrument(skip(self, input), fields(restaurant_id = %input.restaurant_id, name = %input.name))]
    pub async fn create(&self, input: NewWaiter) -> Result<waiter::Model, ServiceError> {
        let name = waiter::validate_name(&input.name)?;
        if self.store.find_restaurant(input.restaurant_id).await?.is_none() {
            return Err(ServiceError::not_found("restaurant"));
        }

        let picture = self.photos.save(input.picture).await?;
        let inserted = match waiter::Model::new(input.restaurant_id, &name, picture.clone()) {
            Ok(model) => self.store.insert_waiter(model).await,
            Err(e) => Err(e.into()),
        };
        match inserted {
            Ok(created) => {
                info!(waiter_id = %created.id, picture = %created.picture, "waiter_created");
                Ok(created)
            }
            Err(e) => {
                if let Err(cleanup) = self.photos.release(&picture).await {
                    warn!(error = %cleanup, picture = %picture, "orphaned waiter photo");
                }
                Err(e)
            }
        }
    }

    pub async fn list_with_restaurants(&self) -> Result<Vec<WaiterListing>, ServiceError> {
        let names: HashMap<Uuid, String> = self
            .store
            .list_restaurants()
            .await?
            .into_iter()
            .map(|r| (r.id, r.name))
            .collect();
        Ok(self
            .store
            .list_waiters()
            .await?
            .iter()
            .map(|w| WaiterListing {
                waiter: WaiterSummary::from(w),
                restaurant_id: w.restaurant_id,
                restaurant_name: names.get(&w.restaurant_id).cloned(),
            })
            .collect())
    }

    /// Record `rater`'s score; a repeated rating replaces the earlier one.
    #[instrument(skip(self))]
    pub async fn rate(&self, id: Uuid, rater: Uuid, score: u8) -> Result<RatingReceipt, ServiceError> {
        let now = Utc::now();
        let mutation: RatingMutation = Box::new(move |seq| apply_rating(seq, rater, score, now, RatingPolicy::Overwrite));
        let (updated, outcome) = self.store.mutate_waiter_ratings(id, mutation).await?;
        info!(waiter_id = %id, rater = %rater, score, ?outcome, "waiter_rated");
        Ok(RatingReceipt { target_id: id, outcome, average: average(updated.ratings.as_slice()) })
    }

    /// Release the photo, then delete the record. A photo that exists but
    /// cannot be removed keeps the record in place.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<Release, ServiceError> {
        let found = self.store.find_waiter(id).await?.ok_or_else(|| ServiceError::not_found("waiter"))?;
        let release = self.photos.release(&found.picture).await?;
        if !self.store.delete_waiter(id).await? {
            return Err(ServiceError::not_found("waiter"));
        }
        info!(waiter_id = %id, ?release, "waiter_deleted");
        Ok(release)
    }
}
