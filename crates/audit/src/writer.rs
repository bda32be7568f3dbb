//! Bounded background writer for action records.
//!
//! Submitting never blocks the caller: when the buffer is full the record is
//! dropped and counted. Shutdown stops intake and drains whatever is already
//! buffered before the task exits.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use {
    tokio::{sync::mpsc, task::JoinHandle},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::{record::ActionRecord, store::AuditStore};

/// Cloneable submission side of the writer.
#[derive(Clone)]
pub struct AuditWriter {
    tx: mpsc::Sender<ActionRecord>,
    dropped: Arc<AtomicU64>,
}

/// Owns the writer task. Call [`AuditWriterHandle::shutdown`] to flush.
pub struct AuditWriterHandle {
    cancel: CancellationToken,
    task: JoinHandle<u64>,
    dropped: Arc<AtomicU64>,
}

impl AuditWriter {
    /// Spawn the writer task with room for `capacity` pending records.
    pub fn spawn(store: Arc<dyn AuditStore>, capacity: usize) -> (Self, AuditWriterHandle) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let cancel = CancellationToken::new();
        let dropped = Arc::new(AtomicU64::new(0));

        let task = tokio::spawn(run(store, rx, cancel.clone()));

        (
            Self {
                tx,
                dropped: Arc::clone(&dropped),
            },
            AuditWriterHandle {
                cancel,
                task,
                dropped,
            },
        )
    }

    /// Queue a record for persistence without waiting.
    pub fn submit(&self, record: ActionRecord) {
        match self.tx.try_send(record) {
            Ok(()) => {},
            Err(mpsc::error::TrySendError::Full(record)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    bot = %record.bot_name,
                    chat_id = record.chat_id,
                    "audit buffer full, dropping action record"
                );
            },
            Err(mpsc::error::TrySendError::Closed(record)) => {
                debug!(bot = %record.bot_name, "audit writer closed, dropping action record");
            },
        }
    }

    /// Records dropped because the buffer was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl AuditWriterHandle {
    /// Stop accepting records, persist everything already buffered and wait
    /// for the task. Returns the number of records written over its lifetime.
    pub async fn shutdown(self) -> u64 {
        self.cancel.cancel();
        let written = match self.task.await {
            Ok(written) => written,
            Err(e) => {
                warn!(error = %e, "audit writer task failed");
                0
            },
        };
        info!(
            written,
            dropped = self.dropped.load(Ordering::Relaxed),
            "audit writer stopped"
        );
        written
    }
}

async fn run(
    store: Arc<dyn AuditStore>,
    mut rx: mpsc::Receiver<ActionRecord>,
    cancel: CancellationToken,
) -> u64 {
    let mut written = 0u64;
    loop {
        tokio::select! {
            biased;
            record = rx.recv() => match record {
                Some(record) => written += persist(store.as_ref(), &record).await,
                None => break,
            },
            () = cancel.cancelled() => {
                rx.close();
                while let Some(record) = rx.recv().await {
                    written += persist(store.as_ref(), &record).await;
                }
                break;
            },
        }
    }
    written
}

async fn persist(store: &dyn AuditStore, record: &ActionRecord) -> u64 {
    match store.save_action(record).await {
        Ok(_) => 1,
        Err(e) => {
            warn!(bot = %record.bot_name, error = %e, "failed to persist action record");
            0
        },
    }
}
