//! Append-only audit trail: inbound actions, captured handler failures and
//! webhook processing outcomes.
//!
//! Persistence goes through [`AuditStore`]; [`store_sqlite::SqliteAuditStore`]
//! is the production backend, [`store_memory::MemoryAuditStore`] backs tests.
//! Action records are written off the hot path by [`writer::AuditWriter`].

pub mod error;
pub mod record;
pub mod store;
pub mod store_memory;
pub mod store_sqlite;
pub mod writer;

pub use {
    error::{Error, Result},
    record::{ActionRecord, ErrorRecord, WebhookRecord},
    store::AuditStore,
    writer::{AuditWriter, AuditWriterHandle},
};

/// Run database migrations for the audit tables.
///
/// Creates `action_log`, `error_log` and `webhook_event`. Call at startup
/// before constructing [`store_sqlite::SqliteAuditStore::with_pool`].
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}
