use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, mpsc};

use courier_common::error::AppError;

use super::{Delivery, QueueBackend};

/// In-process queue backed by an unbounded channel.
///
/// Handed-out messages are tracked until acknowledged so tests can assert
/// that nothing is left unacked. Nothing survives the process.
pub struct MemoryQueue {
    sender: Mutex<Option<mpsc::UnboundedSender<Delivery>>>,
    receiver: Mutex<mpsc::UnboundedReceiver<Delivery>>,
    next_tag: AtomicU64,
    unacked: DashMap<u64, String>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            sender: Mutex::new(Some(tx)),
            receiver: Mutex::new(rx),
            next_tag: AtomicU64::new(1),
            unacked: DashMap::new(),
        }
    }

    /// Stop accepting publishes. Messages already queued are still handed
    /// out, after which `receive` returns `None`.
    pub async fn close(&self) {
        self.sender.lock().await.take();
    }

    /// Messages received but not yet acknowledged.
    pub fn unacked(&self) -> usize {
        self.unacked.len()
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueBackend for MemoryQueue {
    async fn publish(&self, payload: String) -> Result<(), AppError> {
        let delivery = Delivery {
            tag: self.next_tag.fetch_add(1, Ordering::Relaxed),
            payload,
        };
        let sender = self.sender.lock().await;
        sender
            .as_ref()
            .ok_or_else(|| AppError::Queue("queue is closed".to_string()))?
            .send(delivery)
            .map_err(|_| AppError::Queue("queue is closed".to_string()))
    }

    async fn receive(&self) -> Result<Option<Delivery>, AppError> {
        let delivery = self.receiver.lock().await.recv().await;
        if let Some(delivery) = &delivery {
            self.unacked.insert(delivery.tag, delivery.payload.clone());
        }
        Ok(delivery)
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), AppError> {
        self.unacked.remove(&delivery.tag);
        Ok(())
    }
}
