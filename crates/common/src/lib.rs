//! Shared error definitions, text and time helpers used across all botdeck crates.

pub mod error;
pub mod text;
pub mod time;

pub use error::FromMessage;
