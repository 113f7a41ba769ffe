//! Work queue client.
//!
//! [`QueueClient`] owns serialization and the consumption loop; the storage
//! mechanics sit behind [`QueueBackend`] so the same loop runs against Redis
//! in production and an in-process channel in tests.

mod memory;
mod redis_list;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use courier_common::config::{AppConfig, QueueBackendKind};
use courier_common::error::AppError;
use courier_common::types::Notification;

pub use self::memory::MemoryQueue;
pub use self::redis_list::RedisQueue;

/// A message handed out by [`QueueBackend::receive`] that has not been
/// acknowledged yet.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Backend-assigned tag used to acknowledge the message.
    pub tag: u64,
    /// Raw serialized payload.
    pub payload: String,
}

/// Publish/receive/ack primitives of an at-least-once queue.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    async fn publish(&self, payload: String) -> Result<(), AppError>;

    /// Wait for the next message. `Ok(None)` means the queue was closed.
    async fn receive(&self) -> Result<Option<Delivery>, AppError>;

    async fn ack(&self, delivery: &Delivery) -> Result<(), AppError>;
}

/// Shared handle used by intake (publish) and the worker (consume).
#[derive(Clone)]
pub struct QueueClient {
    backend: Arc<dyn QueueBackend>,
}

impl QueueClient {
    pub fn new(backend: Arc<dyn QueueBackend>) -> Self {
        Self { backend }
    }

    /// Client over a fresh in-process queue.
    pub fn in_memory() -> (Self, Arc<MemoryQueue>) {
        let queue = Arc::new(MemoryQueue::new());
        (Self::new(queue.clone()), queue)
    }

    /// Connect to the configured backend.
    ///
    /// Redis connections are retried up to `QUEUE_CONNECT_RETRIES` times with
    /// linear backoff (retry `n` waits `n * QUEUE_CONNECT_BACKOFF_MS`);
    /// exhausting them yields [`AppError::QueueConnection`]. Call once at
    /// startup.
    pub async fn connect(config: &AppConfig) -> Result<Self, AppError> {
        match config.queue_backend {
            QueueBackendKind::Memory => {
                tracing::info!("Using in-memory queue backend");
                Ok(Self::in_memory().0)
            }
            QueueBackendKind::Redis => {
                let poll_interval = config.queue_poll_interval();
                let queue = connect_with_retry(
                    config.queue_connect_retries,
                    config.queue_connect_backoff(),
                    || {
                        let url = config.redis_url.clone();
                        let name = config.queue_name.clone();
                        async move { RedisQueue::connect(&url, &name, poll_interval).await }
                    },
                )
                .await?;
                Ok(Self::new(Arc::new(queue)))
            }
        }
    }

    /// Serialize and publish a notification snapshot.
    pub async fn enqueue(&self, notification: &Notification) -> Result<(), AppError> {
        let payload = serde_json::to_string(notification)?;
        self.backend.publish(payload).await?;

        tracing::debug!(
            notification_id = %notification.id,
            retries = notification.retries,
            "Notification enqueued"
        );
        Ok(())
    }

    /// Run the consumption loop until the queue closes or a receive fails.
    ///
    /// Each message is handled on its own task so a slow handler never holds
    /// up the loop; at most `concurrency` handlers run at once. A message is
    /// acknowledged once its handler returns, whatever the outcome, including
    /// a panic. Payloads that fail to deserialize are acknowledged and
    /// dropped. When the queue closes, in-flight handlers are awaited before
    /// returning.
    pub async fn consume<H, Fut>(&self, handler: H, concurrency: usize) -> Result<(), AppError>
    where
        H: Fn(Notification) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let capacity = concurrency.max(1);
        let limiter = Arc::new(Semaphore::new(capacity));

        while let Some(delivery) = self.backend.receive().await? {
            let permit = limiter
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| AppError::Internal("worker limiter closed".to_string()))?;

            let notification = match serde_json::from_str::<Notification>(&delivery.payload) {
                Ok(notification) => notification,
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping malformed queue message");
                    ack_logged(self.backend.as_ref(), &delivery).await;
                    continue;
                }
            };

            let handler = handler.clone();
            let backend = self.backend.clone();
            tokio::spawn(async move {
                let notification_id = notification.id;
                if let Err(e) = tokio::spawn(handler(notification)).await {
                    tracing::error!(
                        notification_id = %notification_id,
                        tag = delivery.tag,
                        error = %e,
                        "Queue handler aborted"
                    );
                }
                ack_logged(backend.as_ref(), &delivery).await;
                drop(permit);
            });
        }

        tracing::info!("Queue closed, waiting for in-flight deliveries");
        let _drained = limiter
            .acquire_many(capacity as u32)
            .await
            .map_err(|_| AppError::Internal("worker limiter closed".to_string()))?;
        tracing::info!("Consumption loop finished");
        Ok(())
    }
}

async fn ack_logged(backend: &dyn QueueBackend, delivery: &Delivery) {
    if let Err(e) = backend.ack(delivery).await {
        tracing::error!(tag = delivery.tag, error = %e, "Failed to acknowledge queue message");
    }
}

/// Run `connect`, retrying up to `retries` times after the first failure.
/// Retry `n` is preceded by a `step * n` wait.
pub async fn connect_with_retry<T, F, Fut>(
    retries: u32,
    step: Duration,
    mut connect: F,
) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut retry = 0;

    loop {
        let e = match connect().await {
            Ok(conn) => return Ok(conn),
            Err(e) => e,
        };

        if retry == retries {
            return Err(AppError::QueueConnection {
                attempts: retry + 1,
                reason: e.to_string(),
            });
        }

        retry += 1;
        let wait = step * retry;
        tracing::warn!(
            retry,
            max_retries = retries,
            retry_in_ms = wait.as_millis() as u64,
            error = %e,
            "Queue connection failed, retrying"
        );
        tokio::time::sleep(wait).await;
    }
}
