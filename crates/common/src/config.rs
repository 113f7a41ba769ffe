use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// Which queue backend the worker and intake publish to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackendKind {
    Redis,
    Memory,
}

impl FromStr for QueueBackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(QueueBackendKind::Redis),
            "memory" => Ok(QueueBackendKind::Memory),
            other => Err(anyhow::anyhow!(
                "QUEUE_BACKEND must be 'redis' or 'memory', got '{}'",
                other
            )),
        }
    }
}

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Redis connection string
    pub redis_url: String,

    /// Queue implementation (default: redis)
    pub queue_backend: QueueBackendKind,

    /// Redis list key used as the work queue
    pub queue_name: String,

    /// Idle poll interval of the Redis receive loop in milliseconds (default: 250)
    pub queue_poll_interval_ms: u64,

    /// Connection retries after the first failed attempt (default: 5)
    pub queue_connect_retries: u32,

    /// Linear backoff step between connection attempts in milliseconds; retry
    /// `n` waits `n * step` (default: 2000)
    pub queue_connect_backoff_ms: u64,

    /// Maximum number of redelivery attempts per notification (default: 3)
    pub max_retries: u32,

    /// Delay step per retry in milliseconds; retry `n` waits `n * step` (default: 5000)
    pub retry_base_delay_ms: u64,

    /// Sender invocation timeout in milliseconds, `0` disables (default: 30000)
    pub send_timeout_ms: u64,

    /// Maximum number of dispatches in flight at once (default: 32)
    pub worker_concurrency: usize,

    /// API listen host
    pub api_host: String,

    /// First API listen port tried
    pub api_port: u16,

    /// Consecutive ports tried when the listen port is taken (default: 10)
    pub api_port_search_limit: u16,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            queue_backend: std::env::var("QUEUE_BACKEND")
                .unwrap_or_else(|_| "redis".to_string())
                .parse()?,
            queue_name: std::env::var("QUEUE_NAME")
                .unwrap_or_else(|_| "notifications".to_string()),
            queue_poll_interval_ms: parse_var("QUEUE_POLL_INTERVAL_MS", 250)?,
            queue_connect_retries: parse_var("QUEUE_CONNECT_RETRIES", 5)?,
            queue_connect_backoff_ms: parse_var("QUEUE_CONNECT_BACKOFF_MS", 2000)?,
            max_retries: parse_var("MAX_RETRIES", 3)?,
            retry_base_delay_ms: parse_var("RETRY_BASE_DELAY_MS", 5000)?,
            send_timeout_ms: parse_var("SEND_TIMEOUT_MS", 30_000)?,
            worker_concurrency: parse_var("WORKER_CONCURRENCY", 32)?,
            api_host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            api_port: parse_var("API_PORT", 3000)?,
            api_port_search_limit: parse_var("API_PORT_SEARCH_LIMIT", 10)?,
        })
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    /// `None` when the timeout is disabled.
    pub fn send_timeout(&self) -> Option<Duration> {
        (self.send_timeout_ms > 0).then(|| Duration::from_millis(self.send_timeout_ms))
    }

    pub fn queue_poll_interval(&self) -> Duration {
        Duration::from_millis(self.queue_poll_interval_ms)
    }

    pub fn queue_connect_backoff(&self) -> Duration {
        Duration::from_millis(self.queue_connect_backoff_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            queue_backend: QueueBackendKind::Redis,
            queue_name: "notifications".to_string(),
            queue_poll_interval_ms: 250,
            queue_connect_retries: 5,
            queue_connect_backoff_ms: 2000,
            max_retries: 3,
            retry_base_delay_ms: 5000,
            send_timeout_ms: 30_000,
            worker_concurrency: 32,
            api_host: "0.0.0.0".to_string(),
            api_port: 3000,
            api_port_search_limit: 10,
        }
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> anyhow::Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| {
            anyhow::anyhow!(
                "{} must be a valid {}",
                key,
                std::any::type_name::<T>()
            )
        }),
        Err(_) => Ok(default),
    }
}
