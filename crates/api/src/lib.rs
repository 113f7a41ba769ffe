//! HTTP intake API for Courier.
//!
//! Endpoints:
//! - GET  /health — liveness check
//! - POST /notifications — submit a notification for delivery
//! - GET  /users/{user_id}/notifications — list a user's notifications
//!
//! Both notification routes are also served under `/api`.

pub mod routes;
pub mod server;
pub mod state;
