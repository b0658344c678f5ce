use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::dispatch::{DispatchOptions, RetryPolicy};

/// Process configuration, read once from the environment at startup.
#[derive(Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub database_url: String,
    pub jwt_secret: String,
    /// Hex-encoded 32-byte key for encrypting channel credentials at rest.
    pub credentials_encryption_key: String,
    /// Maximum accepted webhook payload size in bytes.
    pub max_payload_bytes: usize,
    pub dispatch_worker_count: usize,
    pub dispatch_queue_size: usize,
    pub sync_deadline_secs: u64,
    pub attempt_timeout_secs: u64,
    pub retry_max_attempts: u32,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
    pub retry_jitter_ms: u64,
}

fn required(key: &str) -> Result<String, String> {
    env::var(key).map_err(|_| format!("{key} must be set"))
}

fn parsed_or<T: FromStr>(key: &str, default: T) -> Result<T, String> {
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| format!("{key} is not a valid value")),
        Err(_) => Ok(default),
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, String> {
        Ok(ServerConfig {
            listen_addr: env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            credentials_encryption_key: required("CREDENTIALS_ENCRYPTION_KEY")?,
            max_payload_bytes: parsed_or("MAX_PAYLOAD_BYTES", 256 * 1024)?,
            dispatch_worker_count: parsed_or("DISPATCH_WORKER_COUNT", 4)?,
            dispatch_queue_size: parsed_or("DISPATCH_QUEUE_SIZE", 1024)?,
            sync_deadline_secs: parsed_or("SYNC_DEADLINE_SECS", 15)?,
            attempt_timeout_secs: parsed_or("ATTEMPT_TIMEOUT_SECS", 10)?,
            retry_max_attempts: parsed_or("RETRY_MAX_ATTEMPTS", 3)?,
            retry_base_ms: parsed_or("RETRY_BASE_MS", 500)?,
            retry_max_ms: parsed_or("RETRY_MAX_MS", 30_000)?,
            retry_jitter_ms: parsed_or("RETRY_JITTER_MS", 250)?,
        })
    }

    pub fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            sync_deadline: Duration::from_secs(self.sync_deadline_secs),
            attempt_timeout: Duration::from_secs(self.attempt_timeout_secs),
            retry: RetryPolicy {
                max_attempts: self.retry_max_attempts,
                base_delay: Duration::from_millis(self.retry_base_ms),
                max_delay: Duration::from_millis(self.retry_max_ms),
                jitter: Duration::from_millis(self.retry_jitter_ms),
            },
        }
    }
}
