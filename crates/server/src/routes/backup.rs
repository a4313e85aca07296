use axum::{extract::State, Json};
use serde::Serialize;

use common::types::Message;
use service::{backup::BackupReport, store::RestoreOutcome};

use crate::errors::ApiError;
use crate::routes::auth::ServerState;

#[derive(Serialize)]
pub struct BackupOutput {
    #[serde(flatten)]
    pub message: Message,
    pub report: BackupReport,
}

#[derive(Serialize)]
pub struct RestoreOutput {
    #[serde(flatten)]
    pub message: Message,
    pub result: RestoreOutcome,
}

#[utoipa::path(post, path = "/admin/backup", tag = "backup", responses((status = 200, description = "Backup files written"), (status = 303, description = "Not an admin")))]
pub async fn backup(State(state): State<ServerState>) -> Result<Json<BackupOutput>, ApiError> {
    let report = state.backup.backup().await?;
    Ok(Json(BackupOutput { message: Message::new("Backup created successfully"), report }))
}

#[utoipa::path(post, path = "/admin/restore", tag = "backup", responses((status = 200, description = "Restored, or skipped because data exists"), (status = 400, description = "Malformed backup file")))]
pub async fn restore(State(state): State<ServerState>) -> Result<Json<RestoreOutput>, ApiError> {
    let result = state.backup.restore().await?;
    let message = match result {
        RestoreOutcome::Restored { .. } => Message::new("Backup data loaded successfully"),
        RestoreOutcome::AlreadyPopulated { .. } => {
            Message::new("Data already exists in the database. Skipping loading backup data.")
        }
    };
    Ok(Json(RestoreOutput { message, result }))
}
