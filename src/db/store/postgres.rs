use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::db::enums::{ChannelKind, MessageStatus};
use crate::db::models::{
    Channel, DeliveryRecord, Message, NewChannel, NewDeliveryRecord, NewRouting, NewTopic,
    Routing, Topic, User,
};
use crate::db::store::{Store, StoreError};
use crate::notifications::credentials::ChannelCredentials;
use crate::services::crypto;

/// Postgres-backed [`Store`]. Channel credentials are AES-256-GCM encrypted
/// before they reach the database and decrypted on the way out; everything
/// else maps straight onto the row types in `db::models`.
pub struct PgStore {
    pool: PgPool,
    credentials_key: String,
}

/// Raw `channels` row; `credentials` is the hex crypto envelope.
#[derive(FromRow)]
struct ChannelRow {
    id: i64,
    user_id: i64,
    name: String,
    kind: ChannelKind,
    credentials: String,
    enabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PgStore {
    pub fn new(pool: PgPool, credentials_key: String) -> Self {
        Self {
            pool,
            credentials_key,
        }
    }

    fn seal_credentials(&self, credentials: &ChannelCredentials) -> Result<String, StoreError> {
        let plain = serde_json::to_string(credentials)?;
        Ok(crypto::encrypt(&plain, &self.credentials_key)?)
    }

    fn open_channel_row(&self, row: ChannelRow) -> Result<Channel, StoreError> {
        let plain = crypto::decrypt(&row.credentials, &self.credentials_key)?;
        let credentials: ChannelCredentials = serde_json::from_str(&plain)?;
        Ok(Channel {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            kind: row.kind,
            credentials,
            enabled: row.enabled,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn map_insert_err(err: sqlx::Error, what: &'static str) -> StoreError {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate(what),
        other => StoreError::Database(other),
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (username, password_hash) VALUES ($1, $2) RETURNING *",
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_insert_err(e, "username"))
    }

    async fn user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn create_channel(&self, new: NewChannel) -> Result<Channel, StoreError> {
        let sealed = self.seal_credentials(&new.credentials)?;
        let row = sqlx::query_as::<_, ChannelRow>(
            "INSERT INTO channels (user_id, name, kind, credentials, enabled) \
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(new.user_id)
        .bind(&new.name)
        .bind(new.kind)
        .bind(&sealed)
        .bind(new.enabled)
        .fetch_one(&self.pool)
        .await?;
        self.open_channel_row(row)
    }

    async fn channel_by_id(&self, id: i64) -> Result<Option<Channel>, StoreError> {
        let row = sqlx::query_as::<_, ChannelRow>("SELECT * FROM channels WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| self.open_channel_row(r)).transpose()
    }

    async fn channels_by_user(&self, user_id: i64) -> Result<Vec<Channel>, StoreError> {
        let rows = sqlx::query_as::<_, ChannelRow>(
            "SELECT * FROM channels WHERE user_id = $1 ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| self.open_channel_row(r))
            .collect()
    }

    async fn update_channel(&self, channel: &Channel) -> Result<Channel, StoreError> {
        let sealed = self.seal_credentials(&channel.credentials)?;
        let row = sqlx::query_as::<_, ChannelRow>(
            "UPDATE channels SET name = $2, kind = $3, credentials = $4, enabled = $5, \
             updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(channel.id)
        .bind(&channel.name)
        .bind(channel.kind)
        .bind(&sealed)
        .bind(channel.enabled)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("channel"))?;
        self.open_channel_row(row)
    }

    async fn delete_channel(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM channels WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("channel"));
        }
        Ok(())
    }

    async fn create_topic(&self, new: NewTopic) -> Result<Topic, StoreError> {
        sqlx::query_as::<_, Topic>(
            "INSERT INTO topics (user_id, name, webhook_key, sending_strategy, execution_mode, description) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(new.user_id)
        .bind(&new.name)
        .bind(&new.webhook_key)
        .bind(new.sending_strategy)
        .bind(new.execution_mode)
        .bind(&new.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_insert_err(e, "webhook key"))
    }

    async fn topic_by_id(&self, id: i64) -> Result<Option<Topic>, StoreError> {
        Ok(
            sqlx::query_as::<_, Topic>("SELECT * FROM topics WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn topics_by_user(&self, user_id: i64) -> Result<Vec<Topic>, StoreError> {
        Ok(sqlx::query_as::<_, Topic>(
            "SELECT * FROM topics WHERE user_id = $1 ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn topic_by_webhook_key(&self, webhook_key: &str) -> Result<Option<Topic>, StoreError> {
        Ok(
            sqlx::query_as::<_, Topic>("SELECT * FROM topics WHERE webhook_key = $1")
                .bind(webhook_key)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn webhook_key_in_use(&self, webhook_key: &str) -> Result<bool, StoreError> {
        Ok(sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM topics WHERE webhook_key = $1)",
        )
        .bind(webhook_key)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn update_topic(&self, topic: &Topic) -> Result<Topic, StoreError> {
        sqlx::query_as::<_, Topic>(
            "UPDATE topics SET name = $2, sending_strategy = $3, execution_mode = $4, \
             description = $5, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(topic.id)
        .bind(&topic.name)
        .bind(topic.sending_strategy)
        .bind(topic.execution_mode)
        .bind(&topic.description)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("topic"))
    }

    async fn delete_topic(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM topics WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("topic"));
        }
        Ok(())
    }

    async fn rotate_webhook_key(&self, topic_id: i64, new_key: &str) -> Result<Topic, StoreError> {
        // Single UPDATE: concurrent authentication reads see either the old
        // key or the new one, never both and never neither.
        sqlx::query_as::<_, Topic>(
            "UPDATE topics SET webhook_key = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(topic_id)
        .bind(new_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_insert_err(e, "webhook key"))?
        .ok_or(StoreError::NotFound("topic"))
    }

    async fn create_routing(&self, new: NewRouting) -> Result<Routing, StoreError> {
        sqlx::query_as::<_, Routing>(
            "INSERT INTO routings (topic_id, channel_id, priority, variable_mappings, message_template) \
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(new.topic_id)
        .bind(new.channel_id)
        .bind(new.priority)
        .bind(&new.variable_mappings)
        .bind(&new.message_template)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_insert_err(e, "routing"))
    }

    async fn routing(&self, topic_id: i64, channel_id: i64) -> Result<Option<Routing>, StoreError> {
        Ok(sqlx::query_as::<_, Routing>(
            "SELECT * FROM routings WHERE topic_id = $1 AND channel_id = $2",
        )
        .bind(topic_id)
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn routings_by_topic(&self, topic_id: i64) -> Result<Vec<Routing>, StoreError> {
        Ok(sqlx::query_as::<_, Routing>(
            "SELECT * FROM routings WHERE topic_id = $1 ORDER BY priority DESC, channel_id ASC",
        )
        .bind(topic_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn routings_by_channel(&self, channel_id: i64) -> Result<Vec<Routing>, StoreError> {
        Ok(sqlx::query_as::<_, Routing>(
            "SELECT * FROM routings WHERE channel_id = $1 ORDER BY topic_id",
        )
        .bind(channel_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn update_routing(&self, routing: &Routing) -> Result<Routing, StoreError> {
        sqlx::query_as::<_, Routing>(
            "UPDATE routings SET priority = $3, variable_mappings = $4, message_template = $5, \
             updated_at = NOW() WHERE topic_id = $1 AND channel_id = $2 RETURNING *",
        )
        .bind(routing.topic_id)
        .bind(routing.channel_id)
        .bind(routing.priority)
        .bind(&routing.variable_mappings)
        .bind(&routing.message_template)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound("routing"))
    }

    async fn delete_routing(&self, topic_id: i64, channel_id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM routings WHERE topic_id = $1 AND channel_id = $2")
            .bind(topic_id)
            .bind(channel_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("routing"));
        }
        Ok(())
    }

    async fn create_message(
        &self,
        topic_id: i64,
        payload: serde_json::Value,
    ) -> Result<Message, StoreError> {
        Ok(sqlx::query_as::<_, Message>(
            "INSERT INTO messages (topic_id, payload) VALUES ($1, $2) RETURNING *",
        )
        .bind(topic_id)
        .bind(&payload)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn message_by_id(&self, id: i64) -> Result<Option<Message>, StoreError> {
        Ok(
            sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn set_message_status(&self, id: i64, status: MessageStatus) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE messages SET status = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(status)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("message"));
        }
        Ok(())
    }

    async fn messages_by_topic(
        &self,
        topic_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, StoreError> {
        Ok(sqlx::query_as::<_, Message>(
            "SELECT * FROM messages WHERE topic_id = $1 ORDER BY id DESC LIMIT $2 OFFSET $3",
        )
        .bind(topic_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn record_delivery(
        &self,
        new: NewDeliveryRecord,
    ) -> Result<DeliveryRecord, StoreError> {
        Ok(sqlx::query_as::<_, DeliveryRecord>(
            "INSERT INTO delivery_records (message_id, channel_id, attempt, status, detail) \
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(new.message_id)
        .bind(new.channel_id)
        .bind(new.attempt)
        .bind(new.status)
        .bind(&new.detail)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn deliveries_by_message(
        &self,
        message_id: i64,
    ) -> Result<Vec<DeliveryRecord>, StoreError> {
        Ok(sqlx::query_as::<_, DeliveryRecord>(
            "SELECT * FROM delivery_records WHERE message_id = $1 ORDER BY id",
        )
        .bind(message_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
