use axum::{
    extract::{Path, State},
    Extension, Json,
};
use uuid::Uuid;

use service::{rating::parse_score, restaurants::RatingReceipt, session::SessionUser};

use crate::errors::ApiError;
use crate::routes::auth::ServerState;

/// A repeated rating by the same user replaces the earlier one.
#[utoipa::path(post, path = "/waiters/{id}/rate/{rating}", tag = "waiters",
    params(("id" = Uuid, Path, description = "Waiter id"), ("rating" = String, Path, description = "Score 0..=100")),
    responses((status = 200, description = "Rating recorded or replaced"), (status = 400, description = "Invalid score"), (status = 404, description = "Not Found")))]
pub async fn rate(
    State(state): State<ServerState>,
    Extension(user): Extension<SessionUser>,
    Path((id, rating)): Path<(Uuid, String)>,
) -> Result<Json<RatingReceipt>, ApiError> {
    let score = parse_score(&rating)?;
    Ok(Json(state.waiters.rate(id, user.id, score).await?))
}
