use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use notihub::db::enums::{ChannelKind, ExecutionMode, SendingStrategy};
use notihub::db::models::{NewChannel, NewRouting, NewTopic, Topic};
use notihub::db::store::{MemStore, Store};
use notihub::dispatch::{DispatchOptions, DispatchService, RetryPolicy};
use notihub::notifications::credentials::ChannelCredentials;
use notihub::notifications::senders::{
    NotificationSender, RenderedMessage, SenderError, SenderRegistry,
};

/// Scripted sender for tests. Channels are told apart by their slack
/// webhook URL; unscripted sends succeed.
pub struct MockSender {
    calls: Mutex<Vec<String>>,
    scripts: Mutex<HashMap<String, VecDeque<Result<(), SenderError>>>>,
    delays: Mutex<HashMap<String, Duration>>,
}

impl MockSender {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            scripts: Mutex::new(HashMap::new()),
            delays: Mutex::new(HashMap::new()),
        })
    }

    /// Queues outcomes for a channel key; once drained, sends succeed.
    pub async fn script(&self, key: &str, results: Vec<Result<(), SenderError>>) {
        self.scripts
            .lock()
            .await
            .insert(key.to_string(), results.into_iter().collect());
    }

    /// Makes every send on `key` take `delay` before responding.
    pub async fn set_delay(&self, key: &str, delay: Duration) {
        self.delays.lock().await.insert(key.to_string(), delay);
    }

    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl NotificationSender for MockSender {
    async fn send(
        &self,
        credentials: &ChannelCredentials,
        _message: &RenderedMessage,
    ) -> Result<(), SenderError> {
        let key = match credentials {
            ChannelCredentials::Slack { webhook_url } => webhook_url.clone(),
            other => panic!("mock sender got unexpected credentials: {other:?}"),
        };

        let delay = self.delays.lock().await.get(&key).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.calls.lock().await.push(key.clone());
        let mut scripts = self.scripts.lock().await;
        match scripts.get_mut(&key).and_then(|queue| queue.pop_front()) {
            Some(result) => result,
            None => Ok(()),
        }
    }
}

pub struct Harness {
    pub store: Arc<MemStore>,
    pub sender: Arc<MockSender>,
    pub service: Arc<DispatchService>,
    pub user_id: i64,
}

/// Store + mock-sender dispatch service with fast test timings.
pub async fn harness() -> Harness {
    let store = Arc::new(MemStore::new());
    let sender = MockSender::new();

    let mut registry = SenderRegistry::new();
    registry.register(ChannelKind::Slack, sender.clone());

    let options = DispatchOptions {
        sync_deadline: Duration::from_millis(500),
        attempt_timeout: Duration::from_secs(1),
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: Duration::ZERO,
        },
    };

    let service = Arc::new(DispatchService::new(
        store.clone() as Arc<dyn Store>,
        Arc::new(registry),
        options,
    ));

    let user = store.create_user("ada", "hash").await.unwrap();

    Harness {
        store,
        sender,
        service,
        user_id: user.id,
    }
}

impl Harness {
    pub async fn topic(
        &self,
        key: &str,
        strategy: SendingStrategy,
        mode: ExecutionMode,
    ) -> Topic {
        self.store
            .create_topic(NewTopic {
                user_id: self.user_id,
                name: "deploys".into(),
                webhook_key: key.into(),
                sending_strategy: strategy,
                execution_mode: mode,
                description: String::new(),
            })
            .await
            .unwrap()
    }

    /// Slack channel identified by `key`, routed from `topic` at `priority`.
    pub async fn route(&self, topic_id: i64, key: &str, priority: i32) -> i64 {
        self.route_with_template(topic_id, key, priority, "deploy finished", serde_json::json!({}))
            .await
    }

    pub async fn route_with_template(
        &self,
        topic_id: i64,
        key: &str,
        priority: i32,
        template: &str,
        mappings: serde_json::Value,
    ) -> i64 {
        let channel = self
            .store
            .create_channel(NewChannel {
                user_id: self.user_id,
                name: key.into(),
                kind: ChannelKind::Slack,
                credentials: ChannelCredentials::Slack {
                    webhook_url: key.into(),
                },
                enabled: true,
            })
            .await
            .unwrap();
        self.store
            .create_routing(NewRouting {
                topic_id,
                channel_id: channel.id,
                priority,
                variable_mappings: mappings,
                message_template: template.into(),
            })
            .await
            .unwrap();
        channel.id
    }

    pub async fn message(&self, topic_id: i64) -> i64 {
        self.store
            .create_message(topic_id, serde_json::json!({"event": "deploy"}))
            .await
            .unwrap()
            .id
    }
}

pub fn transient() -> SenderError {
    SenderError::Network("connection reset".into())
}

pub fn permanent() -> SenderError {
    SenderError::Rejected("bad request".into())
}
