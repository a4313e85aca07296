use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use common::types::Health;
use service::media::MAX_PHOTO_SIZE;

use crate::openapi::ApiDoc;

pub mod admin;
pub mod auth;
pub mod backup;
pub mod restaurants;
pub mod waiters;

use auth::ServerState;

#[utoipa::path(get, path = "/health", tag = "health", responses((status = 200, description = "OK", body = crate::openapi::HealthResponse)))]
pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

/// Build the full application router: public pages, rating routes behind
/// `require_login`, admin routes behind `require_admin`, static media and docs.
pub fn build_router(state: ServerState, cors: CorsLayer) -> Router {
    let public_dir = ServeDir::new(&state.config.storage.public_dir);

    // Public routes
    let public = Router::new()
        .route("/health", get(health))
        .route("/", get(restaurants::list))
        .route("/restaurants", get(restaurants::list))
        .route("/restaurants/:id", get(restaurants::detail))
        .route("/login", get(auth::entry_page))
        .route("/register", get(auth::entry_page))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .nest_service("/public", public_dir);

    // Logged-in users
    let rating = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/restaurants/:id/rate/:rating", post(restaurants::rate))
        .route("/waiters/:id/rate/:rating", post(waiters::rate))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_login));

    // Admins only
    let admin_routes = Router::new()
        .route("/admin", get(admin::home))
        .route("/admin/restaurants", get(admin::list_restaurants).post(admin::create_restaurant))
        .route("/admin/restaurants/:id", delete(admin::delete_restaurant))
        .route(
            "/admin/waiters",
            get(admin::list_waiters)
                .post(admin::create_waiter)
                .layer(DefaultBodyLimit::max(MAX_PHOTO_SIZE + 64 * 1024)),
        )
        .route("/admin/waiters/:id", delete(admin::delete_waiter))
        .route("/admin/backup", post(backup::backup))
        .route("/admin/restore", post(backup::restore))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_admin));

    // Compose
    public
        .merge(rating)
        .merge(admin_routes)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
                // 5xx and transport failures at ERROR
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}
