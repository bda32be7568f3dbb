//! Broker abstraction.

use std::sync::Arc;

use {async_trait::async_trait, serde::Serialize};

use crate::Result;

/// Declaration of one queue and its dead-letter policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSpec {
    pub name: String,
    /// Where rejected or exhausted messages go. `None` discards them.
    pub dead_letter: Option<String>,
    /// Deliveries allowed before a retried message is dead-lettered.
    pub max_deliveries: u32,
}

impl QueueSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dead_letter: None,
            max_deliveries: u32::MAX,
        }
    }

    #[must_use]
    pub fn with_dead_letter(mut self, queue: impl Into<String>, max_deliveries: u32) -> Self {
        self.dead_letter = Some(queue.into());
        self.max_deliveries = max_deliveries.max(1);
        self
    }
}

/// A message handed to a consumer. Must be settled exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub id: u64,
    pub queue: String,
    pub body: Vec<u8>,
    /// 1 on first delivery, incremented on every redelivery.
    pub attempt: u32,
}

/// How a consumer settles a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Processed; remove the message.
    Ack,
    /// Transient failure; redeliver unless the delivery limit is reached.
    Retry,
    /// The message can never be processed; dead-letter it now.
    Reject,
}

#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Create `spec.name` if missing. Idempotent.
    async fn declare(&self, spec: &QueueSpec) -> Result<()>;

    async fn publish(&self, queue: &str, body: Vec<u8>) -> Result<()>;

    /// Wait for the next message on `queue`. Returns `None` once the
    /// transport is closed.
    async fn next_delivery(&self, queue: &str) -> Result<Option<Delivery>>;

    async fn settle(&self, delivery: &Delivery, outcome: DeliveryOutcome) -> Result<()>;

    /// Stop handing out deliveries. Pending consumers observe `None`.
    fn close(&self);
}

/// Publishes JSON messages to one queue.
#[derive(Clone)]
pub struct Publisher {
    transport: Arc<dyn QueueTransport>,
    queue: String,
}

impl Publisher {
    pub fn new(transport: Arc<dyn QueueTransport>, queue: impl Into<String>) -> Self {
        Self {
            transport,
            queue: queue.into(),
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub async fn publish_json<T: Serialize + Sync>(&self, message: &T) -> Result<()> {
        let body = serde_json::to_vec(message)?;
        self.transport.publish(&self.queue, body).await
    }
}
