use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    #[sea_orm(string_value = "normal")]
    Normal,
    #[sea_orm(string_value = "admin")]
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Normal => "normal",
            Role::Admin => "admin",
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

pub fn validate_username(username: &str) -> Result<String, errors::ModelError> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        return Err(errors::ModelError::Validation("username required".into()));
    }
    if trimmed.len() > 128 {
        return Err(errors::ModelError::Validation("username too long (<=128)".into()));
    }
    Ok(trimmed.to_string())
}

impl Model {
    pub fn new(username: &str, password_hash: String, role: Role) -> Result<Self, errors::ModelError> {
        let username = validate_username(username)?;
        if password_hash.trim().is_empty() {
            return Err(errors::ModelError::Validation("password hash required".into()));
        }
        Ok(Self { id: Uuid::new_v4(), username, password_hash, role })
    }
}
