//! In-memory store for testing.

use std::sync::{
    Mutex,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;

use crate::{
    Error, Result,
    record::{ActionRecord, ErrorRecord, WebhookRecord},
    store::AuditStore,
};

#[derive(Default)]
struct Tables {
    next_id: i64,
    actions: Vec<ActionRecord>,
    errors: Vec<ErrorRecord>,
    webhooks: Vec<WebhookRecord>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory audit store. No persistence, for tests only.
///
/// [`MemoryAuditStore::fail_writes`] makes every save return
/// [`Error::Unavailable`], which lets callers exercise their degraded paths.
#[derive(Default)]
pub struct MemoryAuditStore {
    tables: Mutex<Tables>,
    failing: AtomicBool,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn actions(&self) -> Vec<ActionRecord> {
        self.tables
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .actions
            .clone()
    }

    pub fn errors(&self) -> Vec<ErrorRecord> {
        self.tables
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .errors
            .clone()
    }

    pub fn webhooks(&self) -> Vec<WebhookRecord> {
        self.tables
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .webhooks
            .clone()
    }

    fn check_writable(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::unavailable("writes disabled"));
        }
        Ok(())
    }
}

fn newest_first<T: Clone>(rows: &[T], created_at: impl Fn(&T) -> (i64, i64)) -> Vec<T> {
    let mut out = rows.to_vec();
    out.sort_by_key(|r| std::cmp::Reverse(created_at(r)));
    out
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn save_action(&self, record: &ActionRecord) -> Result<i64> {
        self.check_writable()?;
        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        let id = tables.next_id();
        tables.actions.push(ActionRecord {
            id,
            ..record.clone()
        });
        Ok(id)
    }

    async fn save_error(&self, record: &ErrorRecord) -> Result<i64> {
        self.check_writable()?;
        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        let id = tables.next_id();
        tables.errors.push(ErrorRecord {
            id,
            ..record.clone()
        });
        Ok(id)
    }

    async fn save_webhook(&self, record: &WebhookRecord) -> Result<i64> {
        self.check_writable()?;
        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        let id = tables.next_id();
        tables.webhooks.push(WebhookRecord {
            id,
            ..record.clone()
        });
        Ok(id)
    }

    async fn count_unique_chats_since(&self, since_ms: i64) -> Result<i64> {
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        let mut chats: Vec<i64> = tables
            .actions
            .iter()
            .filter(|a| a.created_at >= since_ms)
            .map(|a| a.chat_id)
            .collect();
        chats.sort_unstable();
        chats.dedup();
        Ok(chats.len() as i64)
    }

    async fn recent_errors(&self, limit: u32) -> Result<Vec<ErrorRecord>> {
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        let mut rows = newest_first(&tables.errors, |r| (r.created_at, r.id));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn recent_webhooks(&self, source: &str, limit: u32) -> Result<Vec<WebhookRecord>> {
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        let mut rows = newest_first(&tables.webhooks, |r| (r.created_at, r.id));
        rows.retain(|r| r.source == source);
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn failed_webhooks_since(&self, since_ms: i64) -> Result<Vec<WebhookRecord>> {
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        let mut rows = newest_first(&tables.webhooks, |r| (r.created_at, r.id));
        rows.retain(|r| !r.processed_successfully && r.created_at >= since_ms);
        Ok(rows)
    }

    async fn count_webhooks_since(&self, source: &str, since_ms: i64) -> Result<i64> {
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        Ok(tables
            .webhooks
            .iter()
            .filter(|r| r.source == source && r.created_at >= since_ms)
            .count() as i64)
    }
}
