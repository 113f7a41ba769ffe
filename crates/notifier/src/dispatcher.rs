//! Per-notification delivery state machine.
//!
//! Each queue delivery is one dispatch attempt:
//! 1. Resolve the sender for the notification type (unknown types fail)
//! 2. Invoke it on its own task, bounded by the optional send timeout; a
//!    panicking sender counts as a failed attempt
//! 3. On success mark the record `delivered`
//! 4. On failure either schedule a delayed redelivery of the updated
//!    snapshot (record stays `pending`) or mark it `failed` once the retry
//!    budget is spent
//!
//! Errors never leave the dispatcher; the outcome is reported as a value.

use std::sync::Arc;
use std::time::Duration;

use courier_common::config::AppConfig;
use courier_common::types::{DeliveryStatus, Notification};

use crate::queue::QueueClient;
use crate::retry::RetryPolicy;
use crate::sender::{SendError, SenderRegistry};
use crate::store::NotificationStore;

/// How a dispatch attempt resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    /// Redelivery number `retries` is queued after `delay`.
    RetryScheduled { retries: u32, delay: Duration },
    Failed,
    /// The record was already terminal; a duplicate delivery.
    Skipped,
}

#[derive(Clone)]
pub struct Dispatcher {
    store: NotificationStore,
    queue: QueueClient,
    senders: Arc<SenderRegistry>,
    policy: RetryPolicy,
    send_timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(
        store: NotificationStore,
        queue: QueueClient,
        senders: SenderRegistry,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            queue,
            senders: Arc::new(senders),
            policy,
            send_timeout: None,
        }
    }

    pub fn from_config(
        store: NotificationStore,
        queue: QueueClient,
        senders: SenderRegistry,
        config: &AppConfig,
    ) -> Self {
        Self::new(store, queue, senders, RetryPolicy::from_config(config))
            .with_send_timeout(config.send_timeout())
    }

    /// Bound every sender invocation; `None` waits indefinitely.
    pub fn with_send_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run one dispatch attempt for the snapshot carried by a queue message.
    pub async fn dispatch(&self, notification: Notification) -> DispatchOutcome {
        if let Some(current) = self.store.get(&notification.user_id, notification.id) {
            if current.status.is_terminal() {
                tracing::debug!(
                    notification_id = %notification.id,
                    status = %current.status,
                    "Skipping delivery of terminal notification"
                );
                return DispatchOutcome::Skipped;
            }
        }

        match self.attempt(&notification).await {
            Ok(()) => {
                self.store.update_status(
                    &notification.user_id,
                    notification.id,
                    DeliveryStatus::Delivered,
                );
                tracing::info!(
                    notification_id = %notification.id,
                    user_id = %notification.user_id,
                    channel = %notification.kind,
                    retries = notification.retries,
                    "Notification delivered"
                );
                DispatchOutcome::Delivered
            }
            Err(e) => self.handle_failure(notification, e),
        }
    }

    async fn attempt(&self, notification: &Notification) -> Result<(), SendError> {
        let sender = self.senders.resolve(&notification.kind)?;
        let user_id = notification.user_id.clone();
        let content = notification.content.clone();
        let mut send = tokio::spawn(async move { sender.send(&user_id, &content).await });

        let joined = match self.send_timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut send).await {
                Ok(joined) => joined,
                Err(_) => {
                    send.abort();
                    return Err(SendError::Timeout(limit));
                }
            },
            None => send.await,
        };

        joined.map_err(|e| SendError::Aborted(e.to_string()))?
    }

    fn handle_failure(&self, mut notification: Notification, error: SendError) -> DispatchOutcome {
        let Some(retries) = self.policy.next_retry(notification.retries) else {
            self.store.update_status(
                &notification.user_id,
                notification.id,
                DeliveryStatus::Failed,
            );
            tracing::error!(
                notification_id = %notification.id,
                user_id = %notification.user_id,
                retries = notification.retries,
                error = %error,
                "Notification failed, retries exhausted"
            );
            return DispatchOutcome::Failed;
        };

        notification.retries = retries;
        self.store.record_retry(&notification.user_id, notification.id, retries);

        let delay = self.policy.delay_for(retries);
        tracing::warn!(
            notification_id = %notification.id,
            retries,
            max_retries = self.policy.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Delivery failed, redelivery scheduled"
        );

        self.schedule_redelivery(notification, delay);
        DispatchOutcome::RetryScheduled { retries, delay }
    }

    /// Re-enqueue the snapshot after `delay` on a detached task. The task owns
    /// its copy of the record; if the publish fails the record is failed so
    /// it still reaches a terminal state.
    fn schedule_redelivery(&self, notification: Notification, delay: Duration) {
        let queue = self.queue.clone();
        let store = self.store.clone();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = queue.enqueue(&notification).await {
                tracing::error!(
                    notification_id = %notification.id,
                    error = %e,
                    "Redelivery enqueue failed, marking notification failed"
                );
                store.update_status(
                    &notification.user_id,
                    notification.id,
                    DeliveryStatus::Failed,
                );
            }
        });
    }
}
