//! In-process queue transport.
//!
//! Messages live only as long as the process. Delivery accounting follows
//! the usual broker contract: every delivery must be settled, retried
//! messages are redelivered until the queue's delivery limit, and rejected or
//! exhausted messages move to the dead-letter queue.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use {
    async_trait::async_trait,
    tokio::sync::{Mutex as AsyncMutex, mpsc},
    tokio_util::sync::CancellationToken,
    tracing::{debug, warn},
};

use crate::{
    Error, Result,
    transport::{Delivery, DeliveryOutcome, QueueSpec, QueueTransport},
};

struct Pending {
    body: Vec<u8>,
    /// Deliveries already made for this message.
    attempts: u32,
}

struct QueueState {
    spec: QueueSpec,
    tx: mpsc::UnboundedSender<Pending>,
    rx: Arc<AsyncMutex<mpsc::UnboundedReceiver<Pending>>>,
}

#[derive(Default)]
pub struct MemoryTransport {
    queues: Mutex<HashMap<String, QueueState>>,
    outstanding: Mutex<HashMap<u64, Delivery>>,
    next_id: AtomicU64,
    closed: CancellationToken,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn enqueue(&self, queue: &str, pending: Pending) -> Result<()> {
        let queues = self.queues.lock().unwrap_or_else(|e| e.into_inner());
        let state = queues
            .get(queue)
            .ok_or_else(|| Error::unknown_queue(queue))?;
        state.tx.send(pending).map_err(|_| Error::Closed)
    }

    fn spec_of(&self, queue: &str) -> Result<QueueSpec> {
        let queues = self.queues.lock().unwrap_or_else(|e| e.into_inner());
        queues
            .get(queue)
            .map(|s| s.spec.clone())
            .ok_or_else(|| Error::unknown_queue(queue))
    }

    fn dead_letter(&self, spec: &QueueSpec, delivery: Delivery, reason: &str) -> Result<()> {
        match &spec.dead_letter {
            Some(dlq) => {
                warn!(
                    queue = %spec.name,
                    dead_letter = %dlq,
                    attempt = delivery.attempt,
                    reason,
                    "dead-lettering message"
                );
                self.enqueue(dlq, Pending {
                    body: delivery.body,
                    attempts: 0,
                })
            },
            None => {
                warn!(
                    queue = %spec.name,
                    attempt = delivery.attempt,
                    reason,
                    "discarding message, queue has no dead-letter target"
                );
                Ok(())
            },
        }
    }
}

#[async_trait]
impl QueueTransport for MemoryTransport {
    async fn declare(&self, spec: &QueueSpec) -> Result<()> {
        let mut queues = self.queues.lock().unwrap_or_else(|e| e.into_inner());
        queues.entry(spec.name.clone()).or_insert_with(|| {
            debug!(queue = %spec.name, "declared queue");
            let (tx, rx) = mpsc::unbounded_channel();
            QueueState {
                spec: spec.clone(),
                tx,
                rx: Arc::new(AsyncMutex::new(rx)),
            }
        });
        Ok(())
    }

    async fn publish(&self, queue: &str, body: Vec<u8>) -> Result<()> {
        if self.closed.is_cancelled() {
            return Err(Error::Closed);
        }
        self.enqueue(queue, Pending { body, attempts: 0 })
    }

    async fn next_delivery(&self, queue: &str) -> Result<Option<Delivery>> {
        let rx = {
            let queues = self.queues.lock().unwrap_or_else(|e| e.into_inner());
            let state = queues
                .get(queue)
                .ok_or_else(|| Error::unknown_queue(queue))?;
            Arc::clone(&state.rx)
        };

        let pending = tokio::select! {
            biased;
            () = self.closed.cancelled() => return Ok(None),
            pending = async { rx.lock().await.recv().await } => pending,
        };
        let Some(pending) = pending else {
            return Ok(None);
        };

        let delivery = Delivery {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            queue: queue.to_string(),
            body: pending.body,
            attempt: pending.attempts + 1,
        };
        self.outstanding
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(delivery.id, delivery.clone());
        Ok(Some(delivery))
    }

    async fn settle(&self, delivery: &Delivery, outcome: DeliveryOutcome) -> Result<()> {
        let delivery = self
            .outstanding
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&delivery.id)
            .ok_or(Error::UnknownDelivery { id: delivery.id })?;
        let spec = self.spec_of(&delivery.queue)?;

        match outcome {
            DeliveryOutcome::Ack => Ok(()),
            DeliveryOutcome::Reject => self.dead_letter(&spec, delivery, "rejected"),
            DeliveryOutcome::Retry if delivery.attempt >= spec.max_deliveries => {
                self.dead_letter(&spec, delivery, "delivery limit reached")
            },
            DeliveryOutcome::Retry => self.enqueue(&spec.name, Pending {
                body: delivery.body,
                attempts: delivery.attempt,
            }),
        }
    }

    fn close(&self) {
        self.closed.cancel();
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, std::time::Duration};

    async fn transport() -> MemoryTransport {
        let t = MemoryTransport::new();
        t.declare(&QueueSpec::new("dlq")).await.unwrap();
        t.declare(&QueueSpec::new("work").with_dead_letter("dlq", 3))
            .await
            .unwrap();
        t
    }

    async fn next(t: &MemoryTransport, queue: &str) -> Delivery {
        tokio::time::timeout(Duration::from_secs(1), t.next_delivery(queue))
            .await
            .expect("delivery timed out")
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_ack_removes_message() {
        let t = transport().await;
        t.publish("work", b"a".to_vec()).await.unwrap();

        let d = next(&t, "work").await;
        assert_eq!(d.body, b"a");
        assert_eq!(d.attempt, 1);
        t.settle(&d, DeliveryOutcome::Ack).await.unwrap();

        let err = t.settle(&d, DeliveryOutcome::Ack).await.unwrap_err();
        assert!(matches!(err, Error::UnknownDelivery { .. }));
    }

    #[tokio::test]
    async fn test_retry_until_dead_letter() {
        let t = transport().await;
        t.publish("work", b"flaky".to_vec()).await.unwrap();

        for expected in 1..=3 {
            let d = next(&t, "work").await;
            assert_eq!(d.attempt, expected);
            t.settle(&d, DeliveryOutcome::Retry).await.unwrap();
        }

        let dead = next(&t, "dlq").await;
        assert_eq!(dead.body, b"flaky");
        assert_eq!(dead.attempt, 1);
    }

    #[tokio::test]
    async fn test_reject_dead_letters_immediately() {
        let t = transport().await;
        t.publish("work", b"poison".to_vec()).await.unwrap();

        let d = next(&t, "work").await;
        t.settle(&d, DeliveryOutcome::Reject).await.unwrap();

        assert_eq!(next(&t, "dlq").await.body, b"poison");
    }

    #[tokio::test]
    async fn test_close_wakes_waiting_consumer() {
        let t = Arc::new(transport().await);
        let waiter = {
            let t = Arc::clone(&t);
            tokio::spawn(async move { t.next_delivery("work").await })
        };
        tokio::task::yield_now().await;
        t.close();

        let got = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(got.is_none());
        assert!(matches!(
            t.publish("work", vec![]).await.unwrap_err(),
            Error::Closed
        ));
    }

    #[tokio::test]
    async fn test_unknown_queue() {
        let t = MemoryTransport::new();
        assert!(matches!(
            t.publish("nope", vec![]).await.unwrap_err(),
            Error::UnknownQueue { .. }
        ));
    }
}
