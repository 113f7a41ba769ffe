//! Channel sender capabilities.
//!
//! A [`Sender`] performs the actual delivery for one notification type. The
//! shipped senders only log; real transports plug in through
//! [`SenderRegistry::register`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use courier_common::types::NotificationType;

/// Failure of a single dispatch attempt. Always handled by the retry policy,
/// never surfaced to the submitter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("unsupported notification type '{0}'")]
    UnknownType(String),

    #[error("{channel} delivery rejected: {reason}")]
    Rejected { channel: String, reason: String },

    #[error("sender timed out after {0:?}")]
    Timeout(Duration),

    #[error("sender aborted: {0}")]
    Aborted(String),
}

impl SendError {
    pub fn rejected(channel: NotificationType, reason: impl Into<String>) -> Self {
        SendError::Rejected {
            channel: channel.to_string(),
            reason: reason.into(),
        }
    }
}

/// Delivers one notification's content to one user.
#[async_trait]
pub trait Sender: Send + Sync {
    async fn send(&self, user_id: &str, content: &str) -> Result<(), SendError>;
}

/// Stand-in transport that records the delivery in the log.
#[derive(Debug, Clone, Copy)]
pub struct LogSender {
    channel: NotificationType,
}

impl LogSender {
    pub fn new(channel: NotificationType) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl Sender for LogSender {
    async fn send(&self, user_id: &str, content: &str) -> Result<(), SendError> {
        tracing::info!(
            channel = %self.channel,
            user_id,
            content_len = content.len(),
            "Notification delivered"
        );
        Ok(())
    }
}

/// Maps each supported notification type to its sender.
#[derive(Clone, Default)]
pub struct SenderRegistry {
    senders: HashMap<NotificationType, Arc<dyn Sender>>,
}

impl SenderRegistry {
    /// Empty registry; every type resolves to [`SendError::UnknownType`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with a [`LogSender`] for every supported type.
    pub fn with_defaults() -> Self {
        NotificationType::ALL
            .into_iter()
            .fold(Self::new(), |registry, channel| {
                registry.register(channel, LogSender::new(channel))
            })
    }

    /// Install (or replace) the sender for `channel`.
    pub fn register(mut self, channel: NotificationType, sender: impl Sender + 'static) -> Self {
        self.senders.insert(channel, Arc::new(sender));
        self
    }

    /// Look up the sender for a raw type string.
    pub fn resolve(&self, kind: &str) -> Result<Arc<dyn Sender>, SendError> {
        kind.parse::<NotificationType>()
            .ok()
            .and_then(|channel| self.senders.get(&channel).cloned())
            .ok_or_else(|| SendError::UnknownType(kind.to_string()))
    }
}

impl std::fmt::Debug for SenderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SenderRegistry")
            .field("channels", &self.senders.keys().collect::<Vec<_>>())
            .finish()
    }
}
