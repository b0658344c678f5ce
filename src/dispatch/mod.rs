use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::db::enums::{DeliveryStatus, MessageStatus, SendingStrategy};
use crate::db::models::{Message, NewDeliveryRecord, Topic};
use crate::db::store::{Store, StoreError};
use crate::notifications::senders::{RenderedMessage, SenderError, SenderRegistry};

pub mod renderer;
pub mod resolver;
pub mod scheduler;
pub mod strategy;

pub use resolver::ResolvedRoute;
pub use scheduler::DispatchWorkerPool;

/// Engine tuning, read once at startup.
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Overall deadline for a synchronous dispatch.
    pub sync_deadline: Duration,
    /// Time budget for a single sender invocation.
    pub attempt_timeout: Duration,
    /// Retry behavior for asynchronous execution.
    pub retry: RetryPolicy,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            sync_deadline: Duration::from_secs(15),
            attempt_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

/// Bounded retry with exponential backoff, applied per channel attempt in
/// async execution. This re-attempts the SAME channel after a transient
/// failure; it is unrelated to priority failover, which moves on to the
/// next channel once a route is considered failed.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per route, including the first (minimum 1).
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound of the random jitter added to each delay.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries (synchronous execution).
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    /// Delay before re-attempting after the given 1-based failed attempt.
    pub fn backoff_delay(&self, failed_attempt: u32) -> Duration {
        let exp = failed_attempt.saturating_sub(1).min(16);
        let base = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(exp))
            .min(self.max_delay);
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return base;
        }
        base + Duration::from_millis(rand::random_range(0..=jitter_ms))
    }
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("message {0} not found")]
    MessageNotFound(i64),
    #[error("topic {0} not found")]
    TopicNotFound(i64),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// Aggregated result of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// Every selected delivery succeeded (failover: one did).
    Delivered,
    /// Broadcast only: some deliveries succeeded, some failed.
    Partial,
    /// Every candidate channel failed.
    AllChannelsFailed,
    /// The topic has no usable routings; accepted but delivered nowhere.
    NoRoutingsConfigured,
    /// The synchronous deadline expired before the strategy finished.
    TimedOut,
}

/// Outcome of delivering to one route, all retries included.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDelivery {
    pub channel_id: i64,
    pub channel_name: String,
    /// Sender invocations spent on this route (0 if rendering failed
    /// before any send).
    pub attempts: u32,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The engine's output contract: one structured record per dispatch,
/// returned to sync producers and persisted per-attempt for the audit view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    pub message_id: i64,
    pub topic_id: i64,
    pub strategy: SendingStrategy,
    pub outcome: DispatchOutcome,
    pub deliveries: Vec<RouteDelivery>,
}

/// Routing-resolution and dispatch-orchestration engine.
///
/// Reads topics/channels/routings through the [`Store`], renders each
/// message, and executes delivery under the topic's sending strategy.
/// Execution timing (inline vs worker pool) lives in [`scheduler`].
pub struct DispatchService {
    store: Arc<dyn Store>,
    senders: Arc<SenderRegistry>,
    options: DispatchOptions,
}

impl DispatchService {
    pub fn new(store: Arc<dyn Store>, senders: Arc<SenderRegistry>, options: DispatchOptions) -> Self {
        Self {
            store,
            senders,
            options,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// Runs the full pipeline for one accepted message: resolve, render,
    /// deliver under the topic's strategy, aggregate, audit. No overall
    /// deadline; synchronous callers wrap this via
    /// [`DispatchService::dispatch_sync`].
    pub async fn dispatch_message(
        &self,
        message_id: i64,
        retry: &RetryPolicy,
    ) -> Result<DispatchReport, DispatchError> {
        let message = self
            .store
            .message_by_id(message_id)
            .await?
            .ok_or(DispatchError::MessageNotFound(message_id))?;
        self.store
            .set_message_status(message.id, MessageStatus::Processing)
            .await?;

        let Some(topic) = self.store.topic_by_id(message.topic_id).await? else {
            self.mark(message.id, MessageStatus::Failed).await;
            return Err(DispatchError::TopicNotFound(message.topic_id));
        };

        let routes = match resolver::resolve_routes(self.store.as_ref(), topic.id).await {
            Ok(routes) => routes,
            Err(err) => {
                self.mark(message.id, MessageStatus::Failed).await;
                return Err(err.into());
            }
        };

        if routes.is_empty() {
            // Reportable, non-fatal: the event is accepted but goes nowhere.
            debug!(topic_id = topic.id, message_id, "no routings configured");
            self.mark(message.id, MessageStatus::Completed).await;
            return Ok(DispatchReport {
                message_id,
                topic_id: topic.id,
                strategy: topic.sending_strategy,
                outcome: DispatchOutcome::NoRoutingsConfigured,
                deliveries: Vec::new(),
            });
        }

        let deliveries = match topic.sending_strategy {
            SendingStrategy::Broadcast => {
                strategy::broadcast(self, &topic, &message, &routes, retry).await
            }
            SendingStrategy::PriorityFailover => {
                strategy::priority_failover(self, &topic, &message, &routes, retry).await
            }
        };

        let outcome = aggregate_outcome(topic.sending_strategy, &deliveries);
        self.mark(message.id, message_status_for(outcome)).await;

        Ok(DispatchReport {
            message_id,
            topic_id: topic.id,
            strategy: topic.sending_strategy,
            outcome,
            deliveries,
        })
    }

    /// Delivers one resolved route: render the template, then invoke the
    /// sender under the per-attempt timeout, retrying transient failures
    /// per `retry`. Every attempt is recorded for audit.
    pub(crate) async fn deliver_route(
        &self,
        topic: &Topic,
        message: &Message,
        route: &ResolvedRoute,
        retry: &RetryPolicy,
    ) -> RouteDelivery {
        let channel = &route.channel;

        let rendered = match renderer::render(
            &route.routing.message_template,
            &route.routing.variable_mappings,
            &message.payload,
        ) {
            Ok(body) => RenderedMessage {
                title: topic.name.clone(),
                body,
            },
            Err(err) => {
                // A render failure is a failed delivery attempt for this
                // route only; it is permanent, so no sender runs.
                self.audit(message.id, channel.id, 1, DeliveryStatus::Failed, &err.to_string())
                    .await;
                return RouteDelivery {
                    channel_id: channel.id,
                    channel_name: channel.name.clone(),
                    attempts: 0,
                    succeeded: false,
                    error: Some(err.to_string()),
                };
            }
        };

        let Some(sender) = self.senders.get(channel.kind) else {
            let detail = format!("no sender registered for channel kind {}", channel.kind);
            self.audit(message.id, channel.id, 1, DeliveryStatus::Failed, &detail)
                .await;
            return RouteDelivery {
                channel_id: channel.id,
                channel_name: channel.name.clone(),
                attempts: 0,
                succeeded: false,
                error: Some(detail),
            };
        };

        let max_attempts = retry.max_attempts.max(1);
        let mut last_error = String::new();
        for attempt in 1..=max_attempts {
            let result = match tokio::time::timeout(
                self.options.attempt_timeout,
                sender.send(&channel.credentials, &rendered),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(SenderError::Timeout),
            };

            match result {
                Ok(()) => {
                    self.audit(message.id, channel.id, attempt as i32, DeliveryStatus::Succeeded, "")
                        .await;
                    return RouteDelivery {
                        channel_id: channel.id,
                        channel_name: channel.name.clone(),
                        attempts: attempt,
                        succeeded: true,
                        error: None,
                    };
                }
                Err(err) => {
                    last_error = err.to_string();
                    self.audit(message.id, channel.id, attempt as i32, DeliveryStatus::Failed, &last_error)
                        .await;
                    if !err.is_transient() {
                        debug!(
                            channel_id = channel.id,
                            message_id = message.id,
                            error = %last_error,
                            "permanent delivery failure"
                        );
                        return RouteDelivery {
                            channel_id: channel.id,
                            channel_name: channel.name.clone(),
                            attempts: attempt,
                            succeeded: false,
                            error: Some(last_error),
                        };
                    }
                    if attempt < max_attempts {
                        tokio::time::sleep(retry.backoff_delay(attempt)).await;
                    }
                }
            }
        }

        RouteDelivery {
            channel_id: channel.id,
            channel_name: channel.name.clone(),
            attempts: max_attempts,
            succeeded: false,
            error: Some(last_error),
        }
    }

    async fn audit(
        &self,
        message_id: i64,
        channel_id: i64,
        attempt: i32,
        status: DeliveryStatus,
        detail: &str,
    ) {
        let record = NewDeliveryRecord {
            message_id,
            channel_id,
            attempt,
            status,
            detail: detail.to_string(),
        };
        if let Err(err) = self.store.record_delivery(record).await {
            warn!(message_id, channel_id, error = %err, "failed to record delivery attempt");
        }
    }

    async fn mark(&self, message_id: i64, status: MessageStatus) {
        if let Err(err) = self.store.set_message_status(message_id, status).await {
            warn!(message_id, error = %err, "failed to update message status");
        }
    }
}

fn aggregate_outcome(strategy: SendingStrategy, deliveries: &[RouteDelivery]) -> DispatchOutcome {
    let succeeded = deliveries.iter().filter(|d| d.succeeded).count();
    match strategy {
        SendingStrategy::Broadcast => {
            if succeeded == deliveries.len() {
                DispatchOutcome::Delivered
            } else if succeeded == 0 {
                DispatchOutcome::AllChannelsFailed
            } else {
                DispatchOutcome::Partial
            }
        }
        SendingStrategy::PriorityFailover => {
            if succeeded > 0 {
                DispatchOutcome::Delivered
            } else {
                DispatchOutcome::AllChannelsFailed
            }
        }
    }
}

fn message_status_for(outcome: DispatchOutcome) -> MessageStatus {
    match outcome {
        DispatchOutcome::Delivered | DispatchOutcome::NoRoutingsConfigured => {
            MessageStatus::Completed
        }
        DispatchOutcome::Partial => MessageStatus::Partial,
        DispatchOutcome::AllChannelsFailed | DispatchOutcome::TimedOut => MessageStatus::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            jitter: Duration::ZERO,
        };
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(350));
        assert_eq!(policy.backoff_delay(4), Duration::from_millis(350));
    }

    #[test]
    fn broadcast_aggregation_tracks_partial_success() {
        let delivery = |succeeded| RouteDelivery {
            channel_id: 1,
            channel_name: "c".into(),
            attempts: 1,
            succeeded,
            error: None,
        };
        assert_eq!(
            aggregate_outcome(SendingStrategy::Broadcast, &[delivery(true), delivery(true)]),
            DispatchOutcome::Delivered
        );
        assert_eq!(
            aggregate_outcome(SendingStrategy::Broadcast, &[delivery(true), delivery(false)]),
            DispatchOutcome::Partial
        );
        assert_eq!(
            aggregate_outcome(SendingStrategy::Broadcast, &[delivery(false)]),
            DispatchOutcome::AllChannelsFailed
        );
    }

    #[test]
    fn failover_aggregation_is_all_or_nothing() {
        let delivery = |succeeded| RouteDelivery {
            channel_id: 1,
            channel_name: "c".into(),
            attempts: 1,
            succeeded,
            error: None,
        };
        assert_eq!(
            aggregate_outcome(
                SendingStrategy::PriorityFailover,
                &[delivery(false), delivery(true)]
            ),
            DispatchOutcome::Delivered
        );
        assert_eq!(
            aggregate_outcome(SendingStrategy::PriorityFailover, &[delivery(false)]),
            DispatchOutcome::AllChannelsFailed
        );
    }
}
