//! Notification intake routes.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use courier_common::error::AppError;
use courier_common::types::Notification;
use courier_notifier::SubmitRequest;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notifications", post(submit_notification))
        .route("/users/{user_id}/notifications", get(list_notifications))
        .route("/api/notifications", post(submit_notification))
        .route("/api/users/{user_id}/notifications", get(list_notifications))
}

/// POST /notifications — Accept a notification for asynchronous delivery.
///
/// Returns as soon as the record is stored and enqueued; delivery outcome is
/// visible through the list endpoint. Undecodable bodies are reported as
/// validation errors.
async fn submit_notification(
    State(state): State<AppState>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Notification>), AppError> {
    let Json(request) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    let notification = state.notifications.submit(request).await?;
    Ok((StatusCode::CREATED, Json(notification)))
}

/// GET /users/:user_id/notifications — All notifications for a user.
async fn list_notifications(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<Vec<Notification>> {
    Json(state.notifications.list(&user_id))
}
