//! Rating records embedded in restaurants and waiters.

use chrono::{DateTime, Utc};
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ModelError;

/// Highest accepted score; the lowest is 0.
pub const MAX_SCORE: u8 = 100;

/// One rater's score for one target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    pub score: u8,
    pub rated_by: Uuid,
    pub rated_at: DateTime<Utc>,
}

impl Rating {
    pub fn new(score: u8, rated_by: Uuid, rated_at: DateTime<Utc>) -> Result<Self, ModelError> {
        validate_score(score)?;
        Ok(Self { score, rated_by, rated_at })
    }
}

pub fn validate_score(score: u8) -> Result<(), ModelError> {
    if score > MAX_SCORE {
        return Err(ModelError::Validation(format!("rating must be between 0 and {MAX_SCORE}")));
    }
    Ok(())
}

/// Ordered rating sequence stored as one JSONB document column.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct Ratings(pub Vec<Rating>);

impl Ratings {
    pub fn as_slice(&self) -> &[Rating] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn by_rater(&self, rater: Uuid) -> Option<&Rating> {
        self.0.iter().find(|r| r.rated_by == rater)
    }
}

impl From<Vec<Rating>> for Ratings {
    fn from(v: Vec<Rating>) -> Self {
        Self(v)
    }
}
