//! Queue plumbing between the chat sessions and the outside world.
//!
//! Inbound updates are published to the ingress queue as
//! [`InboundEnvelope`]s; replies arrive on the egress queue as
//! [`ReplyEnvelope`]s and are consumed by a [`ConsumerPool`]. The broker is
//! abstracted behind [`QueueTransport`]: [`AmqpTransport`] talks to RabbitMQ,
//! [`MemoryTransport`] keeps everything in process.

pub mod amqp;
pub mod envelope;
pub mod error;
pub mod memory;
pub mod topology;
pub mod transport;
pub mod worker;

pub use {
    amqp::AmqpTransport,
    envelope::{InboundEnvelope, ReplyEnvelope},
    error::{Error, Result},
    memory::MemoryTransport,
    topology::Topology,
    transport::{Delivery, DeliveryOutcome, Publisher, QueueSpec, QueueTransport},
    worker::{ConsumerPool, DeliveryHandler},
};
