use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Notification delivery status.
///
/// Transitions only move forward: `Pending` to either terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Failed,
}

impl DeliveryStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Failed)
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStatus::Pending => write!(f, "pending"),
            DeliveryStatus::Delivered => write!(f, "delivered"),
            DeliveryStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Supported delivery channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationType {
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "sms")]
    Sms,
    #[serde(rename = "in-app")]
    InApp,
}

impl NotificationType {
    pub const ALL: [NotificationType; 3] = [
        NotificationType::Email,
        NotificationType::Sms,
        NotificationType::InApp,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NotificationType::Email => "email",
            NotificationType::Sms => "sms",
            NotificationType::InApp => "in-app",
        }
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NotificationType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// A notification record. Also the queue message payload: every enqueue
/// carries a full snapshot, including the `retries` count for that attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_id: String,
    /// Raw channel name as submitted. Unsupported values are kept so the
    /// dispatcher can fail them through the normal retry path.
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    pub status: DeliveryStatus,
    pub created_at: DateTime<Utc>,
    pub retries: u32,
}

impl Notification {
    /// Create a fresh pending record with no retries.
    pub fn new(
        user_id: impl Into<String>,
        kind: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            kind: kind.into(),
            content: content.into(),
            status: DeliveryStatus::Pending,
            created_at: Utc::now(),
            retries: 0,
        }
    }

    /// The channel this record targets, if it is one we support.
    pub fn notification_type(&self) -> Option<NotificationType> {
        self.kind.parse().ok()
    }
}
