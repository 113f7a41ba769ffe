//! In-memory notification store, partitioned by user.
//!
//! Each user's records live in one `DashMap` entry, so writes to the same
//! user are serialized by the entry lock while different users only contend
//! when they hash to the same shard. Records are never evicted.

use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use courier_common::types::{DeliveryStatus, Notification};

/// Shared handle to the notification records. Cloning is cheap.
#[derive(Debug, Clone, Default)]
pub struct NotificationStore {
    users: Arc<DashMap<String, Vec<Notification>>>,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record to the user's sequence, creating it if needed.
    pub fn append(&self, user_id: &str, record: Notification) {
        self.users
            .entry(user_id.to_string())
            .or_default()
            .push(record);
    }

    /// All records for a user in insertion order. Empty for unknown users.
    pub fn list_for(&self, user_id: &str) -> Vec<Notification> {
        self.users
            .get(user_id)
            .map(|records| records.value().clone())
            .unwrap_or_default()
    }

    pub fn get(&self, user_id: &str, id: Uuid) -> Option<Notification> {
        self.users
            .get(user_id)
            .and_then(|records| records.iter().find(|r| r.id == id).cloned())
    }

    /// Overwrite the status of a pending record.
    ///
    /// Returns `false` without touching anything when the record does not
    /// exist or is already terminal.
    pub fn update_status(&self, user_id: &str, id: Uuid, status: DeliveryStatus) -> bool {
        self.modify_pending(user_id, id, |record| record.status = status)
    }

    /// Store the retry counter carried by the snapshot about to be re-enqueued.
    pub fn record_retry(&self, user_id: &str, id: Uuid, retries: u32) -> bool {
        self.modify_pending(user_id, id, |record| record.retries = retries)
    }

    fn modify_pending(
        &self,
        user_id: &str,
        id: Uuid,
        apply: impl FnOnce(&mut Notification),
    ) -> bool {
        let Some(mut records) = self.users.get_mut(user_id) else {
            return false;
        };
        match records.iter_mut().find(|r| r.id == id) {
            Some(record) if !record.status.is_terminal() => {
                apply(record);
                true
            }
            Some(record) => {
                tracing::debug!(
                    notification_id = %id,
                    status = %record.status,
                    "Ignoring update to terminal notification"
                );
                false
            }
            None => false,
        }
    }
}
