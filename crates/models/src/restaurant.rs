use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors;
use crate::rating::Ratings;
use crate::waiter;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "restaurants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub name: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub ratings: Ratings,
    pub qr_code: String,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation { Waiter }

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Relation::Waiter => Entity::has_many(waiter::Entity).into(),
        }
    }
}

impl Related<waiter::Entity> for Entity {
    fn to() -> RelationDef { Relation::Waiter.def() }
}

impl ActiveModelBehavior for ActiveModel {}

pub fn validate_name(name: &str) -> Result<String, errors::ModelError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(errors::ModelError::Validation("restaurant name required".into()));
    }
    if trimmed.len() > 255 {
        return Err(errors::ModelError::Validation("restaurant name too long (<=255)".into()));
    }
    Ok(trimmed.to_string())
}

/// File name of the QR image for a restaurant id.
pub fn qr_file_name(id: Uuid) -> String {
    format!("qr_{id}.png")
}

impl Model {
    /// Fresh restaurant with no ratings; the QR reference is derived from `id`.
    pub fn new(id: Uuid, name: &str) -> Result<Self, errors::ModelError> {
        let name = validate_name(name)?;
        Ok(Self { id, name, ratings: Ratings::default(), qr_code: qr_file_name(id) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_derives_qr_from_id_and_trims_name() {
        let id = Uuid::new_v4();
        let r = Model::new(id, "  Bistro A ").unwrap();
        assert_eq!(r.name, "Bistro A");
        assert_eq!(r.qr_code, format!("qr_{id}.png"));
        assert!(r.ratings.is_empty());
    }

    #[test]
    fn blank_name_rejected() {
        assert!(Model::new(Uuid::new_v4(), "   ").is_err());
    }
}
