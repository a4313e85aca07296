use std::sync::Arc;

use argon2::{Argon2, password_hash::{PasswordHasher, PasswordVerifier, SaltString}, PasswordHash};
use rand::rngs::OsRng;
use tracing::{info, debug, instrument};

use models::user::{self, Role};

use super::domain::{RegisterInput, LoginInput, AuthUser, AuthSession};
use super::errors::AuthError;
use crate::store::EntityStore;

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 8;

/// Auth business service independent of web framework
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn EntityStore>,
}

impl AuthService {
    pub fn new(store: Arc<dyn EntityStore>) -> Self { Self { store } }

    /// Register a new `normal` user with a hashed password.
    ///
    /// # Examples
    /// ```
    /// use service::auth::{AuthService, domain::RegisterInput};
    /// use service::store::MemoryStore;
    /// use std::sync::Arc;
    /// let svc = AuthService::new(Arc::new(MemoryStore::new()));
    /// let input = RegisterInput { username: "alice".into(), password: "Secret123".into() };
    /// let user = tokio_test::block_on(svc.register(input)).unwrap();
    /// assert_eq!(user.username, "alice");
    /// ```
    #[instrument(skip(self, input), fields(username = %input.username))]
    pub async fn register(&self, input: RegisterInput) -> Result<AuthUser, AuthError> {
        self.create_with_role(input, Role::Normal).await
    }

    /// Same rules as [`register`](Self::register), but the account gets the admin role.
    #[instrument(skip(self, input), fields(username = %input.username))]
    pub async fn create_admin(&self, input: RegisterInput) -> Result<AuthUser, AuthError> {
        self.create_with_role(input, Role::Admin).await
    }

    async fn create_with_role(&self, input: RegisterInput, role: Role) -> Result<AuthUser, AuthError> {
        let username = user::validate_username(&input.username).map_err(|e| AuthError::Validation(e.to_string()))?;
        if input.password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(format!("password too short (>={MIN_PASSWORD_LEN})")));
        }
        if let Some(existing) = self.store.find_user_by_username(&username).await? {
            debug!("user exists: {}", existing.username);
            return Err(AuthError::Conflict);
        }

        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(input.password.as_bytes(), &salt)
            .map_err(|e| AuthError::HashError(e.to_string()))?
            .to_string();

        let model = user::Model::new(&username, hash, role).map_err(|e| AuthError::Validation(e.to_string()))?;
        // a concurrent registration can still win the unique index; that maps to Conflict
        let created = self.store.insert_user(model).await?;
        info!(user_id = %created.id, username = %created.username, role = created.role.as_str(), "user_registered");
        Ok(created.into())
    }

    /// Verify credentials and pick the landing page.
    ///
    /// # Examples
    /// ```
    /// use service::auth::{AuthService, domain::{RegisterInput, LoginInput}};
    /// use service::store::MemoryStore;
    /// use std::sync::Arc;
    /// let svc = AuthService::new(Arc::new(MemoryStore::new()));
    /// let _ = tokio_test::block_on(svc.register(RegisterInput { username: "u".into(), password: "Passw0rd".into() }));
    /// let session = tokio_test::block_on(svc.login(LoginInput { username: "u".into(), password: "Passw0rd".into() })).unwrap();
    /// assert_eq!(session.user.username, "u");
    /// assert_eq!(session.landing, "/");
    /// ```
    #[instrument(skip(self, input), fields(username = %input.username))]
    pub async fn login(&self, input: LoginInput) -> Result<AuthSession, AuthError> {
        let user = self.store
            .find_user_by_username(input.username.trim())
            .await?
            .ok_or(AuthError::NotFound)?;

        let parsed = PasswordHash::new(&user.password_hash).map_err(|e| AuthError::HashError(e.to_string()))?;
        if Argon2::default().verify_password(input.password.as_bytes(), &parsed).is_err() {
            return Err(AuthError::Unauthorized);
        }

        info!(user_id = %user.id, "user_logged_in");
        Ok(AuthSession::for_user(user.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn svc() -> AuthService {
        AuthService::new(Arc::new(MemoryStore::new()))
    }

    fn input(username: &str, password: &str) -> RegisterInput {
        RegisterInput { username: username.into(), password: password.into() }
    }

    #[tokio::test]
    async fn register_then_login() {
        let svc = svc();
        let user = svc.register(input("  carol ", "longenough")).await.unwrap();
        assert_eq!(user.username, "carol");
        assert_eq!(user.role, Role::Normal);

        let session = svc.login(LoginInput { username: "carol".into(), password: "longenough".into() }).await.unwrap();
        assert_eq!(session.user.id, user.id);
        assert_eq!(session.landing, "/");
    }

    #[tokio::test]
    async fn admin_lands_on_admin_page() {
        let svc = svc();
        svc.create_admin(input("root", "adminpass")).await.unwrap();
        let session = svc.login(LoginInput { username: "root".into(), password: "adminpass".into() }).await.unwrap();
        assert_eq!(session.user.role, Role::Admin);
        assert_eq!(session.landing, "/admin");
    }

    #[tokio::test]
    async fn register_rejects_bad_input_and_duplicates() {
        let svc = svc();
        assert!(matches!(svc.register(input("   ", "longenough")).await, Err(AuthError::Validation(_))));
        assert!(matches!(svc.register(input("dave", "short")).await, Err(AuthError::Validation(_))));
        svc.register(input("dave", "longenough")).await.unwrap();
        let err = svc.register(input("dave", "otherpass")).await.unwrap_err();
        assert!(matches!(err, AuthError::Conflict));
        assert_eq!(err.code(), 1002);
    }

    #[tokio::test]
    async fn login_distinguishes_unknown_user_and_bad_password() {
        let svc = svc();
        svc.register(input("erin", "longenough")).await.unwrap();
        let unknown = svc.login(LoginInput { username: "nobody".into(), password: "x".into() }).await.unwrap_err();
        assert!(matches!(unknown, AuthError::NotFound));
        assert_eq!(unknown.to_string(), "user not found");

        let wrong = svc.login(LoginInput { username: "erin".into(), password: "wrongpass".into() }).await.unwrap_err();
        assert!(matches!(wrong, AuthError::Unauthorized));
        assert_eq!(wrong.to_string(), "incorrect password");
    }

    #[tokio::test]
    async fn stored_hash_is_not_the_password() {
        let store = Arc::new(MemoryStore::new());
        let svc = AuthService::new(store.clone());
        svc.register(input("frank", "longenough")).await.unwrap();
        let stored = store.find_user_by_username("frank").await.unwrap().unwrap();
        assert!(stored.password_hash.starts_with("$argon2"));
        assert!(!stored.password_hash.contains("longenough"));
    }
}
