//! Auth module: domain types, errors and the registration/login service.
//!
//! Users are persisted through the shared [`EntityStore`](crate::store::EntityStore);
//! passwords are stored as argon2 PHC strings.

pub mod domain;
pub mod errors;
pub mod service;

pub use service::AuthService;
