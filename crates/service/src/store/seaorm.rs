use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use tracing::{debug, instrument};
use uuid::Uuid;

use models::{rating::Ratings, restaurant, user, waiter};

use super::{CollectionCounts, EntityStore, RatingMutation, RestoreOutcome, Snapshot};
use crate::errors::ServiceError;
use crate::rating::RatingOutcome;

/// PostgreSQL-backed store.
pub struct SeaOrmStore {
    pub db: DatabaseConnection,
}

impl SeaOrmStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

/// Unique violations become `DuplicateName(what)`; everything else stays a db error.
fn map_insert_err(e: DbErr, what: String) -> ServiceError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => ServiceError::DuplicateName(what),
        Some(SqlErr::ForeignKeyConstraintViolation(_)) => ServiceError::not_found("restaurant"),
        _ => ServiceError::from(e),
    }
}

async fn count_all<C: ConnectionTrait>(conn: &C) -> Result<CollectionCounts, DbErr> {
    Ok(CollectionCounts {
        users: user::Entity::find().count(conn).await?,
        restaurants: restaurant::Entity::find().count(conn).await?,
        waiters: waiter::Entity::find().count(conn).await?,
    })
}

fn apply(ratings: &Ratings, mutation: RatingMutation) -> Result<(Ratings, RatingOutcome), ServiceError> {
    let mut working = ratings.0.clone();
    let outcome = mutation(&mut working)?;
    Ok((Ratings(working), outcome))
}

#[async_trait]
impl EntityStore for SeaOrmStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<user::Model>, ServiceError> {
        Ok(user::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<user::Model>, ServiceError> {
        Ok(user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(&self.db)
            .await?)
    }

    async fn insert_user(&self, user: user::Model) -> Result<user::Model, ServiceError> {
        let what = format!("username {} already taken", user.username);
        user.into_active_model()
            .reset_all()
            .insert(&self.db)
            .await
            .map_err(|e| map_insert_err(e, what))
    }

    async fn list_users(&self) -> Result<Vec<user::Model>, ServiceError> {
        Ok(user::Entity::find().order_by_asc(user::Column::Username).all(&self.db).await?)
    }

    async fn find_restaurant(&self, id: Uuid) -> Result<Option<restaurant::Model>, ServiceError> {
        Ok(restaurant::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn find_restaurant_by_name(&self, name: &str) -> Result<Option<restaurant::Model>, ServiceError> {
        Ok(restaurant::Entity::find()
            .filter(restaurant::Column::Name.eq(name))
            .one(&self.db)
            .await?)
    }

    async fn insert_restaurant(&self, restaurant: restaurant::Model) -> Result<restaurant::Model, ServiceError> {
        let what = format!("restaurant {} already exists", restaurant.name);
        restaurant
            .into_active_model()
            .reset_all()
            .insert(&self.db)
            .await
            .map_err(|e| map_insert_err(e, what))
    }

    async fn list_restaurants(&self) -> Result<Vec<restaurant::Model>, ServiceError> {
        Ok(restaurant::Entity::find()
            .order_by_asc(restaurant::Column::Name)
            .all(&self.db)
            .await?)
    }

    async fn delete_restaurant(&self, id: Uuid) -> Result<bool, ServiceError> {
        let res = restaurant::Entity::delete_by_id(id).exec(&self.db).await?;
        Ok(res.rows_affected > 0)
    }

    #[instrument(skip(self, mutation))]
    async fn mutate_restaurant_ratings(
        &self,
        id: Uuid,
        mutation: RatingMutation,
    ) -> Result<(restaurant::Model, RatingOutcome), ServiceError> {
        let txn = self.db.begin().await?;
        let current = restaurant::Entity::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("restaurant"))?;
        // dropping txn on the error path rolls back and releases the row lock
        let (ratings, outcome) = apply(&current.ratings, mutation)?;
        let mut active: restaurant::ActiveModel = current.into();
        active.ratings = Set(ratings);
        let updated = active.update(&txn).await?;
        txn.commit().await?;
        debug!(?outcome, count = updated.ratings.len(), "restaurant ratings saved");
        Ok((updated, outcome))
    }

    async fn find_waiter(&self, id: Uuid) -> Result<Option<waiter::Model>, ServiceError> {
        Ok(waiter::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn insert_waiter(&self, waiter: waiter::Model) -> Result<waiter::Model, ServiceError> {
        let what = format!("waiter {} already exists", waiter.id);
        waiter
            .into_active_model()
            .reset_all()
            .insert(&self.db)
            .await
            .map_err(|e| map_insert_err(e, what))
    }

    async fn list_waiters(&self) -> Result<Vec<waiter::Model>, ServiceError> {
        Ok(waiter::Entity::find().order_by_asc(waiter::Column::Name).all(&self.db).await?)
    }

    async fn list_waiters_by_restaurant(&self, restaurant_id: Uuid) -> Result<Vec<waiter::Model>, ServiceError> {
        Ok(waiter::Entity::find()
            .filter(waiter::Column::RestaurantId.eq(restaurant_id))
            .order_by_asc(waiter::Column::Name)
            .all(&self.db)
            .await?)
    }

    async fn delete_waiter(&self, id: Uuid) -> Result<bool, ServiceError> {
        let res = waiter::Entity::delete_by_id(id).exec(&self.db).await?;
        Ok(res.rows_affected > 0)
    }

    #[instrument(skip(self, mutation))]
    async fn mutate_waiter_ratings(
        &self,
        id: Uuid,
        mutation: RatingMutation,
    ) -> Result<(waiter::Model, RatingOutcome), ServiceError> {
        let txn = self.db.begin().await?;
        let current = waiter::Entity::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("waiter"))?;
        let (ratings, outcome) = apply(&current.ratings, mutation)?;
        let mut active: waiter::ActiveModel = current.into();
        active.ratings = Set(ratings);
        let updated = active.update(&txn).await?;
        txn.commit().await?;
        debug!(?outcome, count = updated.ratings.len(), "waiter ratings saved");
        Ok((updated, outcome))
    }

    async fn counts(&self) -> Result<CollectionCounts, ServiceError> {
        Ok(count_all(&self.db).await?)
    }

    #[instrument(skip(self, snapshot), fields(users = snapshot.users.len(), restaurants = snapshot.restaurants.len(), waiters = snapshot.waiters.len()))]
    async fn restore(&self, snapshot: Snapshot) -> Result<RestoreOutcome, ServiceError> {
        let txn = self.db.begin().await?;
        let current = count_all(&txn).await?;
        if !current.is_empty() {
            return Ok(RestoreOutcome::AlreadyPopulated { counts: current });
        }
        let counts = snapshot.counts();
        let Snapshot { users, restaurants, waiters } = snapshot;

        // parents before children so the waiter foreign key holds
        if !users.is_empty() {
            user::Entity::insert_many(users.into_iter().map(|m| m.into_active_model().reset_all()))
                .exec_without_returning(&txn)
                .await?;
        }
        if !restaurants.is_empty() {
            restaurant::Entity::insert_many(restaurants.into_iter().map(|m| m.into_active_model().reset_all()))
                .exec_without_returning(&txn)
                .await?;
        }
        if !waiters.is_empty() {
            waiter::Entity::insert_many(waiters.into_iter().map(|m| m.into_active_model().reset_all()))
                .exec_without_returning(&txn)
                .await?;
        }
        txn.commit().await?;
        Ok(RestoreOutcome::Restored { counts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rating::{apply_rating, RatingPolicy};
    use crate::test_support::get_db;
    use chrono::Utc;
    use std::sync::Arc;

    #[tokio::test]
    async fn concurrent_overwrites_keep_one_record_per_rater() -> Result<(), anyhow::Error> {
        let Some(db) = get_db().await? else { return Ok(()) };
        let store = Arc::new(SeaOrmStore::new(db));

        let r = store
            .insert_restaurant(restaurant::Model::new(Uuid::new_v4(), &format!("Lock Test {}", Uuid::new_v4()))?)
            .await?;
        let w = store.insert_waiter(waiter::Model::new(r.id, "Ana", "ana.png".into())?).await?;

        let raters: Vec<Uuid> = (0..6).map(|_| Uuid::new_v4()).collect();
        let mut handles = Vec::new();
        for round in 0..2u8 {
            for rater in raters.clone() {
                let store = store.clone();
                handles.push(tokio::spawn(async move {
                    let mutation: RatingMutation = Box::new(move |seq| {
                        apply_rating(seq, rater, 50 + round, Utc::now(), RatingPolicy::Overwrite)
                    });
                    store.mutate_waiter_ratings(w.id, mutation).await
                }));
            }
        }
        for h in handles {
            h.await??;
        }

        let stored = store.find_waiter(w.id).await?.expect("waiter");
        assert_eq!(stored.ratings.len(), raters.len());
        for rater in &raters {
            assert!(stored.ratings.by_rater(*rater).is_some());
        }

        store.delete_waiter(w.id).await?;
        assert!(store.delete_restaurant(r.id).await?);
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_duplicate_restaurant_ratings_keep_the_first() -> Result<(), anyhow::Error> {
        let Some(db) = get_db().await? else { return Ok(()) };
        let store = Arc::new(SeaOrmStore::new(db));

        let r = store
            .insert_restaurant(restaurant::Model::new(Uuid::new_v4(), &format!("Reject Test {}", Uuid::new_v4()))?)
            .await?;
        let rater = Uuid::new_v4();
        let mut handles = Vec::new();
        for score in 40..48u8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let mutation: RatingMutation = Box::new(move |seq| {
                    apply_rating(seq, rater, score, Utc::now(), RatingPolicy::RejectDuplicate)
                });
                store.mutate_restaurant_ratings(r.id, mutation).await
            }));
        }
        let (mut accepted, mut rejected) = (0, 0);
        for h in handles {
            match h.await? {
                Ok(_) => accepted += 1,
                Err(ServiceError::DuplicateRating) => rejected += 1,
                Err(e) => return Err(e.into()),
            }
        }
        assert_eq!((accepted, rejected), (1, 7));

        let stored = store.find_restaurant(r.id).await?.expect("restaurant");
        assert_eq!(stored.ratings.len(), 1);
        assert!(stored.ratings.by_rater(rater).is_some());

        assert!(store.delete_restaurant(r.id).await?);
        Ok(())
    }

    #[tokio::test]
    async fn failed_restore_rolls_back_every_collection() -> Result<(), anyhow::Error> {
        let Some(db) = get_db().await? else { return Ok(()) };
        let store = SeaOrmStore::new(db);

        // the users and the restaurant insert fine; the waiter then breaks the foreign key
        let user = user::Model::new(&format!("restore_{}", Uuid::new_v4()), "h".into(), user::Role::Normal)?;
        let bistro = restaurant::Model::new(Uuid::new_v4(), &format!("Restore Test {}", Uuid::new_v4()))?;
        let orphan = waiter::Model::new(Uuid::new_v4(), "Ghost", "ghost.png".into())?;
        let snapshot = Snapshot { users: vec![user.clone()], restaurants: vec![bistro.clone()], waiters: vec![orphan.clone()] };

        let before = store.counts().await?;
        match store.restore(snapshot).await {
            // other tests share the database; a populated store writes nothing either way
            Ok(RestoreOutcome::AlreadyPopulated { .. }) => {}
            Ok(RestoreOutcome::Restored { .. }) => anyhow::bail!("restore with an orphan waiter committed"),
            Err(_) if before.is_empty() => assert!(store.counts().await?.is_empty()),
            Err(_) => {}
        }
        assert!(store.find_user(user.id).await?.is_none());
        assert!(store.find_restaurant(bistro.id).await?.is_none());
        assert!(store.find_waiter(orphan.id).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn unique_and_foreign_key_violations_are_mapped() -> Result<(), anyhow::Error> {
        let Some(db) = get_db().await? else { return Ok(()) };
        let store = SeaOrmStore::new(db);

        let name = format!("Dup Test {}", Uuid::new_v4());
        let r = store.insert_restaurant(restaurant::Model::new(Uuid::new_v4(), &name)?).await?;
        let dup = store.insert_restaurant(restaurant::Model::new(Uuid::new_v4(), &name)?).await;
        assert!(matches!(dup, Err(ServiceError::DuplicateName(_))));

        let orphan = store.insert_waiter(waiter::Model::new(Uuid::new_v4(), "Ghost", "g.png".into())?).await;
        assert!(matches!(orphan, Err(ServiceError::NotFound(_))));

        assert!(store.delete_restaurant(r.id).await?);
        Ok(())
    }
}
