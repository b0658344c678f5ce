use serde::{Deserialize, Serialize};
use std::fmt;

/// Delivery mechanism implemented by a sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
pub enum ChannelKind {
    Telegram,
    Email,
    Slack,
    Webhook,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Telegram => write!(f, "telegram"),
            ChannelKind::Email => write!(f, "email"),
            ChannelKind::Slack => write!(f, "slack"),
            ChannelKind::Webhook => write!(f, "webhook"),
        }
    }
}

/// How many of a topic's resolved channels receive an event, and in what
/// order. Unknown wire values are rejected at topic create/update time by
/// serde, never at dispatch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
pub enum SendingStrategy {
    /// Every resolved routing is dispatched; outcomes are aggregated.
    Broadcast,
    /// Routings are attempted in priority order until one succeeds.
    PriorityFailover,
}

impl Default for SendingStrategy {
    fn default() -> Self {
        SendingStrategy::Broadcast
    }
}

impl fmt::Display for SendingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendingStrategy::Broadcast => write!(f, "broadcast"),
            SendingStrategy::PriorityFailover => write!(f, "priority_failover"),
        }
    }
}

/// Whether dispatch blocks the producer or runs on the worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
pub enum ExecutionMode {
    Sync,
    Async,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        ExecutionMode::Async
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Sync => write!(f, "sync"),
            ExecutionMode::Async => write!(f, "async"),
        }
    }
}

/// Lifecycle of an accepted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Processing,
    /// Every selected delivery succeeded (or there was nothing to deliver).
    Completed,
    /// Broadcast only: some deliveries succeeded, some failed.
    Partial,
    Failed,
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageStatus::Pending => write!(f, "pending"),
            MessageStatus::Processing => write!(f, "processing"),
            MessageStatus::Completed => write!(f, "completed"),
            MessageStatus::Partial => write!(f, "partial"),
            MessageStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of a single delivery attempt, as recorded for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
pub enum DeliveryStatus {
    Succeeded,
    Failed,
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryStatus::Succeeded => write!(f, "succeeded"),
            DeliveryStatus::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_wire_values_are_closed() {
        let s: SendingStrategy = serde_json::from_str("\"priority_failover\"").unwrap();
        assert_eq!(s, SendingStrategy::PriorityFailover);
        assert!(serde_json::from_str::<SendingStrategy>("\"round_robin\"").is_err());
    }

    #[test]
    fn mode_wire_values_are_closed() {
        let m: ExecutionMode = serde_json::from_str("\"sync\"").unwrap();
        assert_eq!(m, ExecutionMode::Sync);
        assert!(serde_json::from_str::<ExecutionMode>("\"deferred\"").is_err());
    }
}
