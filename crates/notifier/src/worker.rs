//! Long-running consumer that feeds queue deliveries to the dispatcher.

use courier_common::error::AppError;

use crate::dispatcher::Dispatcher;
use crate::queue::QueueClient;

/// Single consumption loop over the notification queue.
pub struct NotificationWorker {
    queue: QueueClient,
    dispatcher: Dispatcher,
    concurrency: usize,
}

impl NotificationWorker {
    pub fn new(queue: QueueClient, dispatcher: Dispatcher, concurrency: usize) -> Self {
        Self {
            queue,
            dispatcher,
            concurrency,
        }
    }

    /// Consume until the queue closes or a receive fails. Every message is
    /// acknowledged once its dispatch attempt has resolved, whether that was
    /// a delivery, a scheduled redelivery or a terminal failure.
    pub async fn run(self) -> Result<(), AppError> {
        let policy = self.dispatcher.policy();
        tracing::info!(
            concurrency = self.concurrency,
            max_retries = policy.max_retries,
            worst_case_ms = policy.worst_case_total().as_millis() as u64,
            "Notification worker started"
        );

        let dispatcher = self.dispatcher;
        self.queue
            .consume(
                move |notification| {
                    let dispatcher = dispatcher.clone();
                    async move {
                        let notification_id = notification.id;
                        let outcome = dispatcher.dispatch(notification).await;
                        tracing::debug!(
                            notification_id = %notification_id,
                            ?outcome,
                            "Dispatch attempt resolved"
                        );
                    }
                },
                self.concurrency,
            )
            .await
    }
}
