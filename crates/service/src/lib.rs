//! Service layer for the rating application.
//! - Business rules (rating policies, access gate, cascade delete) live here.
//! - Persistence goes through the `EntityStore` trait; media through `MediaStore`.
//! - Reuses validation and entity definitions in `models` crate.

pub mod errors;
pub mod rating;
pub mod access;
pub mod session;
pub mod media;
pub mod store;
pub mod auth;
pub mod restaurants;
pub mod waiters;
pub mod backup;
pub mod runtime;
#[cfg(test)]
pub mod test_support;

pub use errors::ServiceError;
