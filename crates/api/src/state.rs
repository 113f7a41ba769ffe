//! Shared application state for the Axum API server.

use courier_common::config::AppConfig;
use courier_notifier::NotificationService;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub notifications: NotificationService,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(notifications: NotificationService, config: AppConfig) -> Self {
        Self {
            notifications,
            config,
        }
    }
}
