use serde::{Deserialize, Serialize};
use uuid::Uuid;

use models::user::{self, Role};

/// Registration input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterInput {
    pub username: String,
    pub password: String,
}

/// Login input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

/// Domain user (business view, no password hash)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}

impl From<user::Model> for AuthUser {
    fn from(u: user::Model) -> Self {
        Self { id: u.id, username: u.username, role: u.role }
    }
}

/// Login result: who logged in and where to send them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub user: AuthUser,
    pub landing: String,
}

impl AuthSession {
    pub fn for_user(user: AuthUser) -> Self {
        let landing = if user.role == Role::Admin { "/admin" } else { "/" };
        Self { user, landing: landing.to_string() }
    }
}
