//! Consumer pool: N tasks pulling from one queue.

use std::sync::Arc;

use {
    async_trait::async_trait,
    tokio::task::JoinHandle,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::transport::{Delivery, DeliveryOutcome, QueueTransport};

/// Processes one delivery and decides how it is settled.
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    async fn handle(&self, delivery: &Delivery) -> DeliveryOutcome;
}

pub struct ConsumerPool {
    queue: String,
    cancel: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

impl ConsumerPool {
    /// Spawn `consumers` workers on `queue`.
    ///
    /// Cancellation only interrupts the wait for the next delivery; a delivery
    /// already being handled is finished and settled first.
    pub fn spawn(
        transport: Arc<dyn QueueTransport>,
        queue: impl Into<String>,
        consumers: usize,
        handler: Arc<dyn DeliveryHandler>,
        cancel: CancellationToken,
    ) -> Self {
        let queue = queue.into();
        let workers = (0..consumers.max(1))
            .map(|worker| {
                tokio::spawn(run_worker(
                    worker,
                    Arc::clone(&transport),
                    queue.clone(),
                    Arc::clone(&handler),
                    cancel.clone(),
                ))
            })
            .collect();
        info!(queue = %queue, consumers = consumers.max(1), "consumer pool started");
        Self {
            queue,
            cancel,
            workers,
        }
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Cancel and wait for every worker.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for worker in self.workers {
            if let Err(e) = worker.await {
                warn!(queue = %self.queue, error = %e, "consumer task failed");
            }
        }
        info!(queue = %self.queue, "consumer pool stopped");
    }
}

async fn run_worker(
    worker: usize,
    transport: Arc<dyn QueueTransport>,
    queue: String,
    handler: Arc<dyn DeliveryHandler>,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            () = cancel.cancelled() => break,
            next = transport.next_delivery(&queue) => next,
        };

        let delivery = match next {
            Ok(Some(delivery)) => delivery,
            Ok(None) => break,
            Err(e) => {
                warn!(queue = %queue, worker, error = %e, "failed to receive delivery");
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(std::time::Duration::from_secs(1)) => continue,
                }
            },
        };

        let outcome = handler.handle(&delivery).await;
        debug!(
            queue = %queue,
            worker,
            delivery = delivery.id,
            attempt = delivery.attempt,
            ?outcome,
            "settling delivery"
        );
        if let Err(e) = transport.settle(&delivery, outcome).await {
            warn!(queue = %queue, worker, error = %e, "failed to settle delivery");
        }
    }
    debug!(queue = %queue, worker, "consumer exiting");
}
