//! SQLite-backed audit store using sqlx.

use {
    async_trait::async_trait,
    sqlx::{SqlitePool, sqlite::SqlitePoolOptions},
};

use crate::{
    Result,
    record::{ActionRecord, ErrorRecord, WebhookRecord},
    store::AuditStore,
};

type WebhookRow = (
    i64,
    String,
    Option<String>,
    String,
    bool,
    Option<String>,
    Option<String>,
    Option<i64>,
    i64,
);

const WEBHOOK_COLUMNS: &str = "id, source, event_type, payload, processed_successfully,
     error_message, routed_to_bot, target_channel_id, created_at";

fn webhook_from_row(r: WebhookRow) -> WebhookRecord {
    WebhookRecord {
        id: r.0,
        source: r.1,
        event_type: r.2,
        payload: r.3,
        processed_successfully: r.4,
        error_message: r.5,
        routed_to_bot: r.6,
        target_channel_id: r.7,
        created_at: r.8,
    }
}

/// SQLite-backed persistence for the audit tables.
pub struct SqliteAuditStore {
    pool: SqlitePool,
}

impl SqliteAuditStore {
    /// Open a dedicated pool and run migrations.
    ///
    /// For a shared pool use [`SqliteAuditStore::with_pool`] after calling
    /// [`crate::run_migrations`].
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        crate::run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    /// Create a store using an existing pool (migrations must already be run).
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditStore for SqliteAuditStore {
    async fn save_action(&self, record: &ActionRecord) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO action_log (bot_name, chat_id, message_text, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&record.bot_name)
        .bind(record.chat_id)
        .bind(&record.message_text)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn save_error(&self, record: &ErrorRecord) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO error_log (bot_name, error_message, stack_trace, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&record.bot_name)
        .bind(&record.error_message)
        .bind(&record.stack_trace)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn save_webhook(&self, record: &WebhookRecord) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO webhook_event
             (source, event_type, payload, processed_successfully, error_message,
              routed_to_bot, target_channel_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.source)
        .bind(&record.event_type)
        .bind(&record.payload)
        .bind(record.processed_successfully)
        .bind(&record.error_message)
        .bind(&record.routed_to_bot)
        .bind(record.target_channel_id)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn count_unique_chats_since(&self, since_ms: i64) -> Result<i64> {
        let (count,) = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(DISTINCT chat_id) FROM action_log WHERE created_at >= ?",
        )
        .bind(since_ms)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn recent_errors(&self, limit: u32) -> Result<Vec<ErrorRecord>> {
        let rows = sqlx::query_as::<_, (i64, String, String, Option<String>, i64)>(
            "SELECT id, bot_name, error_message, stack_trace, created_at
             FROM error_log
             ORDER BY created_at DESC, id DESC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| ErrorRecord {
                id: r.0,
                bot_name: r.1,
                error_message: r.2,
                stack_trace: r.3,
                created_at: r.4,
            })
            .collect())
    }

    async fn recent_webhooks(&self, source: &str, limit: u32) -> Result<Vec<WebhookRecord>> {
        let sql = format!(
            "SELECT {WEBHOOK_COLUMNS} FROM webhook_event
             WHERE source = ?
             ORDER BY created_at DESC, id DESC
             LIMIT ?"
        );
        let rows = sqlx::query_as::<_, WebhookRow>(&sql)
            .bind(source)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(webhook_from_row).collect())
    }

    async fn failed_webhooks_since(&self, since_ms: i64) -> Result<Vec<WebhookRecord>> {
        let sql = format!(
            "SELECT {WEBHOOK_COLUMNS} FROM webhook_event
             WHERE processed_successfully = 0 AND created_at >= ?
             ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, WebhookRow>(&sql)
            .bind(since_ms)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(webhook_from_row).collect())
    }

    async fn count_webhooks_since(&self, source: &str, since_ms: i64) -> Result<i64> {
        let (count,) = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM webhook_event WHERE source = ? AND created_at >= ?",
        )
        .bind(source)
        .bind(since_ms)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
