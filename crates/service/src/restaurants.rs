//! Restaurant lifecycle: creation with QR code, listing, rating and the
//! cascading delete that takes the restaurant's waiters with it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use models::{restaurant, waiter};

use crate::errors::ServiceError;
use crate::media::{MediaStore, QrWriter, Release};
use crate::rating::{apply_rating, average, AverageRating, RatingOutcome, RatingPolicy};
use crate::store::{EntityStore, RatingMutation};
use crate::waiters::WaiterSummary;

/// Restaurant as shown in listings.
#[derive(Clone, Debug, Serialize)]
pub struct RestaurantSummary {
    pub id: Uuid,
    pub name: String,
    pub qr_code: String,
    pub average: AverageRating,
    pub rating_count: usize,
}

impl From<&restaurant::Model> for RestaurantSummary {
    fn from(r: &restaurant::Model) -> Self {
        Self {
            id: r.id,
            name: r.name.clone(),
            qr_code: r.qr_code.clone(),
            average: average(r.ratings.as_slice()),
            rating_count: r.ratings.len(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct RestaurantDetail {
    #[serde(flatten)]
    pub restaurant: RestaurantSummary,
    pub waiters: Vec<WaiterSummary>,
}

/// Result of one accepted rating.
#[derive(Clone, Debug, Serialize)]
pub struct RatingReceipt {
    pub target_id: Uuid,
    pub outcome: RatingOutcome,
    pub average: AverageRating,
}

/// What happened to one waiter's photo during a cascade.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum PhotoCleanup {
    Removed,
    AlreadyAbsent,
    Failed(String),
    /// The cleanup task never reported back.
    Aborted,
}

impl From<Release> for PhotoCleanup {
    fn from(r: Release) -> Self {
        match r {
            Release::Removed => PhotoCleanup::Removed,
            Release::AlreadyAbsent => PhotoCleanup::AlreadyAbsent,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct WaiterCleanup {
    pub waiter_id: Uuid,
    pub name: String,
    pub photo: PhotoCleanup,
    pub record_deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of deleting a restaurant together with its waiters.
#[derive(Clone, Debug, Serialize)]
pub struct CascadeReport {
    pub restaurant_id: Uuid,
    pub waiters: Vec<WaiterCleanup>,
    pub restaurant_deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<PhotoCleanup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CascadeReport {
    /// True when the restaurant and every waiter record are gone.
    pub fn is_complete(&self) -> bool {
        self.restaurant_deleted && self.waiters.iter().all(|w| w.record_deleted)
    }
}

#[derive(Clone)]
pub struct RestaurantService {
    store: Arc<dyn EntityStore>,
    photos: Arc<dyn MediaStore>,
    qr: Arc<QrWriter>,
}

impl RestaurantService {
    pub fn new(store: Arc<dyn EntityStore>, photos: Arc<dyn MediaStore>, qr: Arc<QrWriter>) -> Self {
        Self { store, photos, qr }
    }

    /// Create a restaurant and its QR image. The QR file is removed again if the insert fails.
    #[instrument(skip(self))]
    pub async fn create(&self, name: &str) -> Result<restaurant::Model, ServiceError> {
        let name = restaurant::validate_name(name)?;
        if self.store.find_restaurant_by_name(&name).await?.is_some() {
            return Err(ServiceError::DuplicateName(format!("restaurant {name} already exists")));
        }

        let id = Uuid::new_v4();
        let qr_file = self.qr.generate(id).await?;
        let model = restaurant::Model::new(id, &name)?;
        match self.store.insert_restaurant(model).await {
            Ok(created) => {
                info!(restaurant_id = %created.id, name = %created.name, qr = %created.qr_code, "restaurant_created");
                Ok(created)
            }
            Err(e) => {
                if let Err(cleanup) = self.qr.remove(&qr_file).await {
                    warn!(error = %cleanup, file = %qr_file, "orphaned qr image");
                }
                Err(e)
            }
        }
    }

    pub async fn list(&self) -> Result<Vec<RestaurantSummary>, ServiceError> {
        Ok(self.store.list_restaurants().await?.iter().map(RestaurantSummary::from).collect())
    }

    pub async fn find(&self, id: Uuid) -> Result<restaurant::Model, ServiceError> {
        self.store.find_restaurant(id).await?.ok_or_else(|| ServiceError::not_found("restaurant"))
    }

    /// Restaurant with its average and each waiter's average.
    pub async fn detail(&self, id: Uuid) -> Result<RestaurantDetail, ServiceError> {
        let found = self.find(id).await?;
        let waiters = self.store.list_waiters_by_restaurant(id).await?;
        Ok(RestaurantDetail {
            restaurant: RestaurantSummary::from(&found),
            waiters: waiters.iter().map(WaiterSummary::from).collect(),
        })
    }

    /// Record `rater`'s score; a second rating from the same user is refused.
    #[instrument(skip(self))]
    pub async fn rate(&self, id: Uuid, rater: Uuid, score: u8) -> Result<RatingReceipt, ServiceError> {
        let now = Utc::now();
        let mutation: RatingMutation =
            Box::new(move |seq| apply_rating(seq, rater, score, now, RatingPolicy::RejectDuplicate));
        let (updated, outcome) = self.store.mutate_restaurant_ratings(id, mutation).await?;
        info!(restaurant_id = %id, rater = %rater, score, "restaurant_rated");
        Ok(RatingReceipt { target_id: id, outcome, average: average(updated.ratings.as_slice()) })
    }

    /// Delete every waiter of the restaurant concurrently, then the restaurant itself.
    ///
    /// A photo that cannot be removed is reported but does not keep its
    /// waiter record. The restaurant is only deleted once all of its waiter
    /// records are gone.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<CascadeReport, ServiceError> {
        let found = self.find(id).await?;
        let waiters = self.store.list_waiters_by_restaurant(id).await?;

        let mut pending: HashMap<Uuid, String> = waiters.iter().map(|w| (w.id, w.name.clone())).collect();
        let mut set = JoinSet::new();
        for w in waiters {
            let store = self.store.clone();
            let photos = self.photos.clone();
            set.spawn(async move { cleanup_waiter(store, photos, w).await });
        }

        let mut cleanups = Vec::with_capacity(pending.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(done) => {
                    pending.remove(&done.waiter_id);
                    cleanups.push(done);
                }
                Err(e) => warn!(error = %e, "waiter cleanup task failed"),
            }
        }
        for (waiter_id, name) in pending {
            cleanups.push(WaiterCleanup {
                waiter_id,
                name,
                photo: PhotoCleanup::Aborted,
                record_deleted: false,
                error: Some("cleanup task did not complete".into()),
            });
        }
        cleanups.sort_by(|a, b| a.name.cmp(&b.name));

        let mut report = CascadeReport {
            restaurant_id: id,
            waiters: cleanups,
            restaurant_deleted: false,
            qr_code: None,
            error: None,
        };
        if !report.waiters.iter().all(|w| w.record_deleted) {
            warn!(restaurant_id = %id, "restaurant kept; some waiters could not be deleted");
            report.error = Some("some waiters could not be deleted".into());
            return Ok(report);
        }

        match self.store.delete_restaurant(id).await {
            Ok(deleted) => report.restaurant_deleted = deleted,
            Err(e) => {
                warn!(restaurant_id = %id, error = %e, "restaurant delete failed");
                report.error = Some(e.to_string());
                return Ok(report);
            }
        }
        report.qr_code = Some(match self.qr.remove(&found.qr_code).await {
            Ok(release) => release.into(),
            Err(e) => {
                warn!(file = %found.qr_code, error = %e, "qr image not removed");
                PhotoCleanup::Failed(e.to_string())
            }
        });
        info!(restaurant_id = %id, waiters = report.waiters.len(), "restaurant_deleted");
        Ok(report)
    }
}

async fn cleanup_waiter(store: Arc<dyn EntityStore>, photos: Arc<dyn MediaStore>, w: waiter::Model) -> WaiterCleanup {
    let photo = match photos.release(&w.picture).await {
        Ok(release) => release.into(),
        Err(e) => {
            warn!(waiter_id = %w.id, picture = %w.picture, error = %e, "waiter photo not removed");
            PhotoCleanup::Failed(e.to_string())
        }
    };
    let (record_deleted, error) = match store.delete_waiter(w.id).await {
        Ok(deleted) => (deleted, None),
        Err(e) => (false, Some(e.to_string())),
    };
    debug!(waiter_id = %w.id, record_deleted, "waiter cleaned up");
    WaiterCleanup { waiter_id: w.id, name: w.name, photo, record_deleted, error }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::FsMediaStore;
    use crate::test_support::{photo, Fixture, FlakyMedia};

    fn service(fx: &Fixture) -> RestaurantService {
        RestaurantService::new(fx.store.clone(), fx.photos.clone(), fx.qr.clone())
    }

    async fn add_waiter(fx: &Fixture, restaurant_id: Uuid, name: &str) -> waiter::Model {
        let picture = fx.photos.save(photo(&format!("{name}.png"))).await.unwrap();
        fx.store.insert_waiter(waiter::Model::new(restaurant_id, name, picture).unwrap()).await.unwrap()
    }

    #[tokio::test]
    async fn bistro_a_gets_qr_and_name_is_unique() {
        let fx = Fixture::new();
        let svc = service(&fx);
        let created = svc.create("Bistro A").await.unwrap();
        assert_eq!(created.qr_code, format!("qr_{}.png", created.id));
        assert!(fx.qr.dir().join(&created.qr_code).exists());

        let err = svc.create(" Bistro A ").await.unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateName(_)));
        assert_eq!(svc.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn blank_name_is_validation_error() {
        let fx = Fixture::new();
        assert!(matches!(service(&fx).create("  ").await, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn second_rating_by_same_user_rejected() {
        let fx = Fixture::new();
        let svc = service(&fx);
        let r = svc.create("Bistro A").await.unwrap();
        let user = Uuid::new_v4();

        let first = svc.rate(r.id, user, 80).await.unwrap();
        assert_eq!(first.outcome, RatingOutcome::Inserted);
        let err = svc.rate(r.id, user, 60).await.unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateRating));

        let detail = svc.detail(r.id).await.unwrap();
        assert_eq!(detail.restaurant.average, AverageRating::Score(80));
        assert_eq!(detail.restaurant.rating_count, 1);
    }

    #[tokio::test]
    async fn rating_unknown_restaurant_is_not_found() {
        let fx = Fixture::new();
        let err = service(&fx).rate(Uuid::new_v4(), Uuid::new_v4(), 50).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_cascades_to_waiters_and_media() {
        let fx = Fixture::new();
        let svc = service(&fx);
        let r = svc.create("Trattoria").await.unwrap();
        let other = svc.create("Other").await.unwrap();
        let a = add_waiter(&fx, r.id, "Ana").await;
        let b = add_waiter(&fx, r.id, "Bruno").await;
        let keep = add_waiter(&fx, other.id, "Carla").await;
        // one photo already gone
        fx.photos.release(&b.picture).await.unwrap();

        let report = svc.delete(r.id).await.unwrap();
        assert!(report.is_complete());
        assert_eq!(report.waiters.len(), 2);
        assert_eq!(report.waiters[0].photo, PhotoCleanup::Removed);
        assert_eq!(report.waiters[1].photo, PhotoCleanup::AlreadyAbsent);
        assert_eq!(report.qr_code, Some(PhotoCleanup::Removed));

        assert!(fx.store.find_restaurant(r.id).await.unwrap().is_none());
        assert!(fx.store.find_waiter(a.id).await.unwrap().is_none());
        assert!(fx.store.find_waiter(b.id).await.unwrap().is_none());
        assert!(!fx.photos.dir().join(&a.picture).exists());
        assert!(fx.store.find_waiter(keep.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn cascade_continues_past_failing_photo_release() {
        let fx = Fixture::new();
        let seed = service(&fx);
        let r = seed.create("Bistro B").await.unwrap();
        let a = add_waiter(&fx, r.id, "Ana").await;
        let b = add_waiter(&fx, r.id, "Bruno").await;

        let flaky = Arc::new(FlakyMedia { inner: FsMediaStore::new(fx.photos.dir()), failing: vec![a.picture.clone()] });
        let svc = RestaurantService::new(fx.store.clone(), flaky, fx.qr.clone());
        let report = svc.delete(r.id).await.unwrap();

        assert!(matches!(report.waiters[0].photo, PhotoCleanup::Failed(_)));
        assert_eq!(report.waiters[1].photo, PhotoCleanup::Removed);
        assert!(report.waiters.iter().all(|w| w.record_deleted));
        assert!(report.restaurant_deleted);
        assert!(fx.store.find_waiter(b.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_unknown_restaurant_is_not_found() {
        let fx = Fixture::new();
        assert!(matches!(service(&fx).delete(Uuid::new_v4()).await, Err(ServiceError::NotFound(_))));
    }
}
