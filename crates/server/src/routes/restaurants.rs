use axum::{
    extract::{Path, State},
    Extension, Json,
};
use uuid::Uuid;

use service::{
    rating::parse_score,
    restaurants::{RatingReceipt, RestaurantDetail, RestaurantSummary},
    session::SessionUser,
};

use crate::errors::ApiError;
use crate::routes::auth::ServerState;

#[utoipa::path(get, path = "/restaurants", tag = "restaurants", responses((status = 200, description = "All restaurants with their average rating")))]
pub async fn list(State(state): State<ServerState>) -> Result<Json<Vec<RestaurantSummary>>, ApiError> {
    Ok(Json(state.restaurants.list().await?))
}

#[utoipa::path(get, path = "/restaurants/{id}", tag = "restaurants", params(("id" = Uuid, Path, description = "Restaurant id")), responses((status = 200, description = "Restaurant with waiters"), (status = 404, description = "Not Found")))]
pub async fn detail(State(state): State<ServerState>, Path(id): Path<Uuid>) -> Result<Json<RestaurantDetail>, ApiError> {
    Ok(Json(state.restaurants.detail(id).await?))
}

#[utoipa::path(post, path = "/restaurants/{id}/rate/{rating}", tag = "restaurants",
    params(("id" = Uuid, Path, description = "Restaurant id"), ("rating" = String, Path, description = "Score 0..=100")),
    responses((status = 200, description = "Rating recorded"), (status = 400, description = "Invalid score"), (status = 409, description = "Already rated")))]
pub async fn rate(
    State(state): State<ServerState>,
    Extension(user): Extension<SessionUser>,
    Path((id, rating)): Path<(Uuid, String)>,
) -> Result<Json<RatingReceipt>, ApiError> {
    let score = parse_score(&rating)?;
    Ok(Json(state.restaurants.rate(id, user.id, score).await?))
}
