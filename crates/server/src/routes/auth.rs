use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Extension, Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use configs::AppConfig;
use models::user::Role;
use service::{
    access::{self, Access},
    auth::{domain::{AuthUser, LoginInput, RegisterInput}, AuthService},
    backup::BackupService,
    media::{FsMediaStore, MediaStore, QrWriter},
    restaurants::RestaurantService,
    session::{SessionStore, SessionUser},
    store::EntityStore,
    waiters::WaiterService,
};

use crate::errors::ApiError;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "sid";

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ServerState {
    pub sessions: Arc<SessionStore>,
    pub auth: AuthService,
    pub restaurants: RestaurantService,
    pub waiters: WaiterService,
    pub backup: BackupService,
    pub config: Arc<AppConfig>,
}

impl ServerState {
    /// Wire services over `store` using the storage and session settings in `config`.
    pub fn new(store: Arc<dyn EntityStore>, config: AppConfig) -> Self {
        let photos: Arc<dyn MediaStore> = Arc::new(FsMediaStore::new(&config.storage.upload_dir));
        let qr = Arc::new(QrWriter::new(&config.storage.qr_dir, &config.storage.public_base_url));
        Self {
            sessions: Arc::new(SessionStore::new(Duration::from_secs(config.session.ttl_secs))),
            auth: AuthService::new(store.clone()),
            restaurants: RestaurantService::new(store.clone(), photos.clone(), qr),
            waiters: WaiterService::new(store.clone(), photos),
            backup: BackupService::new(store, &config.storage.backup_dir),
            config: Arc::new(config),
        }
    }

    /// Session user behind the request's `sid` cookie, if any.
    pub fn session_user(&self, jar: &CookieJar) -> Option<SessionUser> {
        let id = jar.get(SESSION_COOKIE).and_then(|c| Uuid::parse_str(c.value()).ok())?;
        self.sessions.get(&id)
    }
}

#[derive(Serialize)]
pub struct LoginOutput {
    pub user: AuthUser,
    pub redirect: String,
}

#[utoipa::path(post, path = "/auth/register", tag = "auth", request_body = crate::openapi::CredentialsDoc, responses((status = 200, description = "Registered"), (status = 400, description = "Bad Request"), (status = 409, description = "Username taken")))]
pub async fn register(State(state): State<ServerState>, Json(input): Json<RegisterInput>) -> Result<Json<AuthUser>, ApiError> {
    let user = state.auth.register(input).await?;
    Ok(Json(user))
}

#[utoipa::path(post, path = "/auth/login", tag = "auth", request_body = crate::openapi::CredentialsDoc, responses((status = 200, description = "Logged in, sets the sid cookie"), (status = 401, description = "Unknown user or incorrect password")))]
pub async fn login(State(state): State<ServerState>, jar: CookieJar, Json(input): Json<LoginInput>) -> Result<(CookieJar, Json<LoginOutput>), ApiError> {
    let session = state.auth.login(input).await?;
    let sid = state.sessions.create(SessionUser {
        id: session.user.id,
        username: session.user.username.clone(),
        role: session.user.role,
    });

    let mut cookie = Cookie::new(SESSION_COOKIE, sid.to_string());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_secure(false);
    cookie.set_same_site(SameSite::Lax);
    let jar = jar.add(cookie);
    Ok((jar, Json(LoginOutput { user: session.user, redirect: session.landing })))
}

#[utoipa::path(post, path = "/auth/logout", tag = "auth", responses((status = 204, description = "Session destroyed")))]
pub async fn logout(State(state): State<ServerState>, jar: CookieJar) -> (CookieJar, StatusCode) {
    if let Some(id) = jar.get(SESSION_COOKIE).and_then(|c| Uuid::parse_str(c.value()).ok()) {
        state.sessions.destroy(&id);
    }
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, StatusCode::NO_CONTENT)
}

#[utoipa::path(get, path = "/auth/me", tag = "auth", responses((status = 200, description = "Current session user"), (status = 303, description = "Not logged in")))]
pub async fn me(Extension(user): Extension<SessionUser>) -> Json<SessionUser> {
    Json(user)
}

/// `GET /login` and `GET /register`: logged-in users are sent home.
pub async fn entry_page(State(state): State<ServerState>, jar: CookieJar) -> Response {
    match state.session_user(&jar) {
        Some(_) => Redirect::to("/").into_response(),
        None => Json(serde_json::json!({"session": null})).into_response(),
    }
}

/// API clients asking for JSON get a 401/403 body instead of a redirect.
fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"))
}

async fn gate(state: ServerState, jar: CookieJar, mut req: Request, next: Next, required: Role) -> Response {
    let user = state.session_user(&jar);
    match access::check(user.as_ref(), required) {
        Access::Allowed => {
            if let Some(user) = user {
                req.extensions_mut().insert(user);
            }
            next.run(req).await
        }
        denied => {
            if wants_json(req.headers()) {
                if let Err(e) = denied.into_result() {
                    return ApiError::from(e).into_response();
                }
            }
            let target = denied.redirect_target().unwrap_or("/login");
            debug!(path = %req.uri().path(), %target, "access denied");
            Redirect::to(target).into_response()
        }
    }
}

/// Any logged-in user may pass.
pub async fn require_login(State(state): State<ServerState>, jar: CookieJar, req: Request, next: Next) -> Response {
    gate(state, jar, req, next, Role::Normal).await
}

/// Only admins may pass; other users are sent home.
pub async fn require_admin(State(state): State<ServerState>, jar: CookieJar, req: Request, next: Next) -> Response {
    gate(state, jar, req, next, Role::Admin).await
}
