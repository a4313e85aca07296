//! Access gate evaluated before privileged operations.

use models::user::Role;

use crate::errors::ServiceError;
use crate::session::SessionUser;

/// Result of checking a session against a required role.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Allowed,
    /// No session identity.
    RedirectToLogin,
    /// Logged in, but the role is insufficient.
    RedirectToHome,
}

impl Access {
    pub fn redirect_target(&self) -> Option<&'static str> {
        match self {
            Access::Allowed => None,
            Access::RedirectToLogin => Some("/login"),
            Access::RedirectToHome => Some("/"),
        }
    }

    /// Error form for callers that cannot answer with a redirect.
    pub fn into_result(self) -> Result<(), ServiceError> {
        match self {
            Access::Allowed => Ok(()),
            Access::RedirectToLogin => Err(ServiceError::Unauthorized),
            Access::RedirectToHome => Err(ServiceError::Forbidden),
        }
    }
}

/// `Normal` admits any logged-in user; `Admin` admits admins only.
pub fn check(session: Option<&SessionUser>, required: Role) -> Access {
    match (session, required) {
        (None, _) => Access::RedirectToLogin,
        (Some(_), Role::Normal) => Access::Allowed,
        (Some(u), Role::Admin) if u.role == Role::Admin => Access::Allowed,
        (Some(_), Role::Admin) => Access::RedirectToHome,
    }
}
