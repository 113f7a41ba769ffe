//! Redis list used as a reliable queue.
//!
//! Producers `LPUSH` onto `<name>`. The consumer atomically moves the oldest
//! message into `<name>:processing` with `LMOVE` and removes it from there
//! with `LREM` once acknowledged, so a message is never lost between
//! receive and ack. Anything still sitting in the processing list at
//! startup belonged to a consumer that died mid-delivery and is put back.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use redis::Client;
use redis::aio::ConnectionManager;

use courier_common::error::AppError;

use super::{Delivery, QueueBackend};

pub struct RedisQueue {
    conn: ConnectionManager,
    queue_key: String,
    processing_key: String,
    poll_interval: Duration,
    next_tag: AtomicU64,
}

impl RedisQueue {
    /// Open a connection and recover messages orphaned by a previous run.
    pub async fn connect(
        redis_url: &str,
        queue_name: &str,
        poll_interval: Duration,
    ) -> Result<Self, AppError> {
        let client = Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;

        let queue = Self {
            conn,
            queue_key: queue_name.to_string(),
            processing_key: processing_key(queue_name),
            poll_interval,
            next_tag: AtomicU64::new(1),
        };

        let recovered = queue.recover_in_flight().await?;
        tracing::info!(
            queue = %queue.queue_key,
            recovered,
            "Connected to Redis queue"
        );
        Ok(queue)
    }

    /// Move every message left in the processing list back to the consume
    /// end of the queue.
    async fn recover_in_flight(&self) -> Result<u64, AppError> {
        let mut conn = self.conn.clone();
        let mut recovered = 0u64;
        loop {
            let moved: Option<String> = redis::cmd("LMOVE")
                .arg(&self.processing_key)
                .arg(&self.queue_key)
                .arg("RIGHT")
                .arg("RIGHT")
                .query_async(&mut conn)
                .await?;
            if moved.is_none() {
                break;
            }
            recovered += 1;
        }

        if recovered > 0 {
            tracing::warn!(
                queue = %self.queue_key,
                recovered,
                "Requeued unacknowledged messages from a previous run"
            );
        }
        Ok(recovered)
    }
}

#[async_trait]
impl QueueBackend for RedisQueue {
    async fn publish(&self, payload: String) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("LPUSH")
            .arg(&self.queue_key)
            .arg(payload)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn receive(&self) -> Result<Option<Delivery>, AppError> {
        let mut conn = self.conn.clone();
        loop {
            // LMOVE queue processing RIGHT LEFT
            // Returns None when the queue is empty
            let payload: Option<String> = redis::cmd("LMOVE")
                .arg(&self.queue_key)
                .arg(&self.processing_key)
                .arg("RIGHT")
                .arg("LEFT")
                .query_async(&mut conn)
                .await?;

            if let Some(payload) = payload {
                return Ok(Some(Delivery {
                    tag: self.next_tag.fetch_add(1, Ordering::Relaxed),
                    payload,
                }));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let removed: i64 = redis::cmd("LREM")
            .arg(&self.processing_key)
            .arg(1)
            .arg(&delivery.payload)
            .query_async(&mut conn)
            .await?;

        if removed == 0 {
            tracing::warn!(
                tag = delivery.tag,
                queue = %self.queue_key,
                "Acknowledged message was not in the processing list"
            );
        }
        Ok(())
    }
}

fn processing_key(queue_name: &str) -> String {
    format!("{}:processing", queue_name)
}
