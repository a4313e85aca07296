use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Redirect,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use models::{restaurant, waiter};
use service::{
    media::{PhotoUpload, Release},
    restaurants::{CascadeReport, RestaurantSummary},
    waiters::{NewWaiter, WaiterListing},
};

use crate::errors::ApiError;
use crate::routes::auth::ServerState;

#[derive(Debug, Deserialize)]
pub struct NewRestaurant {
    pub name: String,
}

pub async fn home() -> Redirect {
    Redirect::to("/admin/restaurants")
}

#[utoipa::path(get, path = "/admin/restaurants", tag = "admin", responses((status = 200, description = "OK"), (status = 303, description = "Not an admin")))]
pub async fn list_restaurants(State(state): State<ServerState>) -> Result<Json<Vec<RestaurantSummary>>, ApiError> {
    Ok(Json(state.restaurants.list().await?))
}

#[utoipa::path(post, path = "/admin/restaurants", tag = "admin", request_body = crate::openapi::NewRestaurantDoc, responses((status = 201, description = "Created with QR code"), (status = 400, description = "Bad Request"), (status = 409, description = "Name taken")))]
pub async fn create_restaurant(
    State(state): State<ServerState>,
    Json(input): Json<NewRestaurant>,
) -> Result<(StatusCode, Json<restaurant::Model>), ApiError> {
    let created = state.restaurants.create(&input.name).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Responds 200 when everything is gone, 500 with the same report otherwise.
#[utoipa::path(delete, path = "/admin/restaurants/{id}", tag = "admin", params(("id" = Uuid, Path, description = "Restaurant id")), responses((status = 200, description = "Restaurant and waiters deleted"), (status = 404, description = "Not Found"), (status = 500, description = "Partial cleanup report")))]
pub async fn delete_restaurant(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<CascadeReport>), ApiError> {
    let report = state.restaurants.delete(id).await?;
    let status = if report.is_complete() { StatusCode::OK } else { StatusCode::INTERNAL_SERVER_ERROR };
    Ok((status, Json(report)))
}

#[utoipa::path(get, path = "/admin/waiters", tag = "admin", responses((status = 200, description = "Waiters with restaurant names")))]
pub async fn list_waiters(State(state): State<ServerState>) -> Result<Json<Vec<WaiterListing>>, ApiError> {
    Ok(Json(state.waiters.list_with_restaurants().await?))
}

/// Multipart form with `name`, `restaurant_id` and a `picture` file.
#[utoipa::path(post, path = "/admin/waiters", tag = "admin", responses((status = 201, description = "Created"), (status = 400, description = "Bad form or image"), (status = 404, description = "Unknown restaurant")))]
pub async fn create_waiter(
    State(state): State<ServerState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<waiter::Model>), ApiError> {
    let mut name = None;
    let mut restaurant_id = None;
    let mut picture = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError::BadRequest(e.to_string()))? {
        let key = field.name().unwrap_or_default().to_string();
        match key.as_str() {
            "name" => name = Some(field.text().await.map_err(|e| ApiError::BadRequest(e.to_string()))?),
            "restaurant_id" => {
                let raw = field.text().await.map_err(|e| ApiError::BadRequest(e.to_string()))?;
                let id = Uuid::parse_str(raw.trim())
                    .map_err(|_| ApiError::BadRequest(format!("invalid restaurant_id: {raw}")))?;
                restaurant_id = Some(id);
            }
            "picture" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(|e| ApiError::BadRequest(e.to_string()))?;
                picture = Some(PhotoUpload { file_name, data: data.to_vec() });
            }
            _ => {}
        }
    }

    let input = NewWaiter {
        name: name.ok_or_else(|| ApiError::BadRequest("missing field: name".into()))?,
        restaurant_id: restaurant_id.ok_or_else(|| ApiError::BadRequest("missing field: restaurant_id".into()))?,
        picture: picture.ok_or_else(|| ApiError::BadRequest("missing field: picture".into()))?,
    };
    let created = state.waiters.create(input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(delete, path = "/admin/waiters/{id}", tag = "admin", params(("id" = Uuid, Path, description = "Waiter id")), responses((status = 200, description = "Deleted"), (status = 404, description = "Not Found")))]
pub async fn delete_waiter(State(state): State<ServerState>, Path(id): Path<Uuid>) -> Result<Json<serde_json::Value>, ApiError> {
    let photo: Release = state.waiters.delete(id).await?;
    Ok(Json(serde_json::json!({"deleted": id, "photo": photo})))
}
