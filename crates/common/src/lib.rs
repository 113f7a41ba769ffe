//! Shared configuration, error taxonomy and domain types for Courier.

pub mod config;
pub mod error;
pub mod types;
