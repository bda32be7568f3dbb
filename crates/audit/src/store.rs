//! Persistence trait for audit rows.

use async_trait::async_trait;

use crate::{
    Result,
    record::{ActionRecord, ErrorRecord, WebhookRecord},
};

/// Append-only sink for audit rows plus the read queries the admin surface
/// needs. Implementations must tolerate concurrent writers.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Persist an action row and return its id.
    async fn save_action(&self, record: &ActionRecord) -> Result<i64>;
    async fn save_error(&self, record: &ErrorRecord) -> Result<i64>;
    async fn save_webhook(&self, record: &WebhookRecord) -> Result<i64>;

    /// Distinct chat ids with at least one action at or after `since_ms`.
    async fn count_unique_chats_since(&self, since_ms: i64) -> Result<i64>;
    /// Most recent error rows, newest first.
    async fn recent_errors(&self, limit: u32) -> Result<Vec<ErrorRecord>>;
    /// Most recent webhook rows for one source, newest first.
    async fn recent_webhooks(&self, source: &str, limit: u32) -> Result<Vec<WebhookRecord>>;
    async fn failed_webhooks_since(&self, since_ms: i64) -> Result<Vec<WebhookRecord>>;
    async fn count_webhooks_since(&self, source: &str, since_ms: i64) -> Result<i64>;
}
