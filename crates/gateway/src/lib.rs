//! Gateway: wires the bot sessions, queues, audit trail and webhook server
//! into one running platform.
//!
//! Lifecycle:
//! 1. Open the audit database and start the background writer
//! 2. Declare the queue topology
//! 3. Build one session handle per configured bot and start the registry
//! 4. Start the reply consumers on the egress queue
//! 5. Serve the webhook HTTP API
//!
//! Shutdown runs the same steps in reverse; see [`platform::Platform`].

pub mod bots;
pub mod egress;
pub mod error;
pub mod notify;
pub mod platform;
pub mod routing;
pub mod server;
pub mod webhook;

#[cfg(test)]
pub(crate) mod testing;

pub use {
    error::{Error, Result},
    platform::Platform,
};
