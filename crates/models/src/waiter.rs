use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors;
use crate::rating::Ratings;
use crate::restaurant;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "waiters")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub name: String,
    pub picture: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub ratings: Ratings,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation { Restaurant }

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Relation::Restaurant => Entity::belongs_to(restaurant::Entity)
                .from(Column::RestaurantId)
                .to(restaurant::Column::Id)
                .into(),
        }
    }
}

impl Related<restaurant::Entity> for Entity {
    fn to() -> RelationDef { Relation::Restaurant.def() }
}

impl ActiveModelBehavior for ActiveModel {}

pub fn validate_name(name: &str) -> Result<String, errors::ModelError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(errors::ModelError::Validation("waiter name required".into()));
    }
    if trimmed.len() > 255 {
        return Err(errors::ModelError::Validation("waiter name too long (<=255)".into()));
    }
    Ok(trimmed.to_string())
}

impl Model {
    pub fn new(restaurant_id: Uuid, name: &str, picture: String) -> Result<Self, errors::ModelError> {
        let name = validate_name(name)?;
        if picture.trim().is_empty() {
            return Err(errors::ModelError::Validation("picture required".into()));
        }
        Ok(Self { id: Uuid::new_v4(), restaurant_id, name, picture, ratings: Ratings::default() })
    }
}
