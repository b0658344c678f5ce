use futures::future::join_all;
use tracing::debug;

use crate::db::models::{Message, Topic};
use crate::dispatch::{DispatchService, ResolvedRoute, RetryPolicy, RouteDelivery};

/// Delivers to every resolved route. Routes run concurrently — there is no
/// ordering guarantee between channels — but every outcome is collected
/// before the aggregate result is produced, and a failure on one route
/// never aborts its siblings.
pub(crate) async fn broadcast(
    service: &DispatchService,
    topic: &Topic,
    message: &Message,
    routes: &[ResolvedRoute],
    retry: &RetryPolicy,
) -> Vec<RouteDelivery> {
    join_all(
        routes
            .iter()
            .map(|route| service.deliver_route(topic, message, route, retry)),
    )
    .await
}

/// Attempts routes strictly in resolver order (priority descending); the
/// first success short-circuits the sequence. On exhaustion the caller
/// reports `AllChannelsFailed` with every attempt's error attached.
pub(crate) async fn priority_failover(
    service: &DispatchService,
    topic: &Topic,
    message: &Message,
    routes: &[ResolvedRoute],
    retry: &RetryPolicy,
) -> Vec<RouteDelivery> {
    let mut deliveries = Vec::new();
    for route in routes {
        let delivery = service.deliver_route(topic, message, route, retry).await;
        let succeeded = delivery.succeeded;
        deliveries.push(delivery);
        if succeeded {
            break;
        }
        debug!(
            message_id = message.id,
            channel_id = route.channel.id,
            "failing over to next channel"
        );
    }
    deliveries
}
