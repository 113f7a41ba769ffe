//! Intake: validate a submission, store it as pending and enqueue it.

use serde::Deserialize;

use courier_common::error::AppError;
use courier_common::types::{DeliveryStatus, Notification};

use crate::queue::QueueClient;
use crate::store::NotificationStore;

/// Message returned to the submitter when the queue rejects a notification.
pub const ENQUEUE_FAILED: &str = "Failed to send notification";

/// Raw submission. Every field is required; they are optional here so a
/// missing field surfaces as a validation error rather than a decode error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub user_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub content: Option<String>,
}

impl SubmitRequest {
    pub fn new(
        user_id: impl Into<String>,
        kind: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            user_id: Some(user_id.into()),
            kind: Some(kind.into()),
            content: Some(content.into()),
        }
    }
}

/// Entry point used by the HTTP layer.
#[derive(Clone)]
pub struct NotificationService {
    store: NotificationStore,
    queue: QueueClient,
}

impl NotificationService {
    pub fn new(store: NotificationStore, queue: QueueClient) -> Self {
        Self { store, queue }
    }

    /// Create, store and enqueue a notification, returning it as `pending`.
    ///
    /// Fails with [`AppError::Validation`] when a field is missing or empty.
    /// If the enqueue fails the stored record is marked `failed` and an
    /// [`AppError::Internal`] carrying [`ENQUEUE_FAILED`] is returned.
    pub async fn submit(&self, request: SubmitRequest) -> Result<Notification, AppError> {
        let missing: Vec<&str> = [
            ("userId", &request.user_id),
            ("type", &request.kind),
            ("content", &request.content),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().is_none_or(str::is_empty))
        .map(|(name, _)| name)
        .collect();

        let (Some(user_id), Some(kind), Some(content), true) = (
            request.user_id,
            request.kind,
            request.content,
            missing.is_empty(),
        ) else {
            return Err(AppError::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        };

        let notification = Notification::new(user_id, kind, content);
        self.store.append(&notification.user_id, notification.clone());

        if let Err(e) = self.queue.enqueue(&notification).await {
            tracing::error!(
                notification_id = %notification.id,
                error = %e,
                "Enqueue failed, marking notification failed"
            );
            self.store.update_status(
                &notification.user_id,
                notification.id,
                DeliveryStatus::Failed,
            );
            return Err(AppError::Internal(ENQUEUE_FAILED.to_string()));
        }

        tracing::info!(
            notification_id = %notification.id,
            user_id = %notification.user_id,
            channel = %notification.kind,
            "Notification accepted"
        );
        Ok(notification)
    }

    /// Notifications for a user in submission order; empty when unknown.
    pub fn list(&self, user_id: &str) -> Vec<Notification> {
        self.store.list_for(user_id)
    }
}
