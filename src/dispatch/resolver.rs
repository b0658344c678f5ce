use tracing::debug;

use crate::db::models::{Channel, Routing};
use crate::db::store::{Store, StoreError};

/// A routing joined with its (enabled) destination channel.
#[derive(Debug, Clone)]
pub struct ResolvedRoute {
    pub routing: Routing,
    pub channel: Channel,
}

/// Returns the routings applicable to an event on `topic_id`, joined with
/// their channels, minus routings whose channel has been deleted or
/// disabled. The result is a total order: priority descending (higher
/// values first), ties broken by ascending channel id — stable and
/// reproducible across calls with unchanged data.
///
/// An empty result is not an error; the caller reports it as
/// "no routings configured".
pub async fn resolve_routes(
    store: &dyn Store,
    topic_id: i64,
) -> Result<Vec<ResolvedRoute>, StoreError> {
    let routings = store.routings_by_topic(topic_id).await?;

    let mut routes = Vec::with_capacity(routings.len());
    for routing in routings {
        match store.channel_by_id(routing.channel_id).await? {
            Some(channel) if channel.enabled => routes.push(ResolvedRoute { routing, channel }),
            Some(channel) => {
                debug!(topic_id, channel_id = channel.id, "skipping disabled channel");
            }
            None => {
                debug!(
                    topic_id,
                    channel_id = routing.channel_id,
                    "skipping routing to missing channel"
                );
            }
        }
    }

    // The store already orders its scan, but the ordering contract belongs
    // to the resolver, not to whichever backend happens to serve it.
    routes.sort_by(|a, b| {
        b.routing
            .priority
            .cmp(&a.routing.priority)
            .then(a.routing.channel_id.cmp(&b.routing.channel_id))
    });
    Ok(routes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::enums::{ChannelKind, ExecutionMode, SendingStrategy};
    use crate::db::models::{NewChannel, NewRouting, NewTopic};
    use crate::db::store::MemStore;
    use crate::notifications::credentials::ChannelCredentials;

    async fn seed_channel(store: &MemStore, user_id: i64, enabled: bool) -> i64 {
        store
            .create_channel(NewChannel {
                user_id,
                name: format!("chan-{enabled}"),
                kind: ChannelKind::Slack,
                credentials: ChannelCredentials::Slack {
                    webhook_url: "https://hooks.slack.example/T/B".into(),
                },
                enabled,
            })
            .await
            .unwrap()
            .id
    }

    async fn seed_routing(store: &MemStore, topic_id: i64, channel_id: i64, priority: i32) {
        store
            .create_routing(NewRouting {
                topic_id,
                channel_id,
                priority,
                variable_mappings: serde_json::json!({}),
                message_template: String::new(),
            })
            .await
            .unwrap();
    }

    async fn seed_topic(store: &MemStore, user_id: i64) -> i64 {
        store
            .create_topic(NewTopic {
                user_id,
                name: "deploys".into(),
                webhook_key: "key".into(),
                sending_strategy: SendingStrategy::Broadcast,
                execution_mode: ExecutionMode::Sync,
                description: String::new(),
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn orders_by_priority_desc_then_channel_id_asc() {
        let store = MemStore::new();
        let user = store.create_user("ada", "h").await.unwrap();
        let topic_id = seed_topic(&store, user.id).await;

        let low = seed_channel(&store, user.id, true).await;
        let tie_a = seed_channel(&store, user.id, true).await;
        let tie_b = seed_channel(&store, user.id, true).await;

        seed_routing(&store, topic_id, low, 1).await;
        seed_routing(&store, topic_id, tie_b, 5).await;
        seed_routing(&store, topic_id, tie_a, 5).await;

        let routes = resolve_routes(&store, topic_id).await.unwrap();
        let order: Vec<i64> = routes.iter().map(|r| r.channel.id).collect();
        assert_eq!(order, vec![tie_a, tie_b, low]);

        // Reproducible on repeated calls with unchanged data.
        let again = resolve_routes(&store, topic_id).await.unwrap();
        assert_eq!(
            again.iter().map(|r| r.channel.id).collect::<Vec<_>>(),
            order
        );
    }

    #[tokio::test]
    async fn drops_disabled_channels() {
        let store = MemStore::new();
        let user = store.create_user("ada", "h").await.unwrap();
        let topic_id = seed_topic(&store, user.id).await;

        let enabled = seed_channel(&store, user.id, true).await;
        let disabled = seed_channel(&store, user.id, false).await;
        seed_routing(&store, topic_id, enabled, 0).await;
        seed_routing(&store, topic_id, disabled, 9).await;

        let routes = resolve_routes(&store, topic_id).await.unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].channel.id, enabled);
    }

    #[tokio::test]
    async fn empty_topic_resolves_to_no_routes() {
        let store = MemStore::new();
        let user = store.create_user("ada", "h").await.unwrap();
        let topic_id = seed_topic(&store, user.id).await;
        assert!(resolve_routes(&store, topic_id).await.unwrap().is_empty());
    }
}
