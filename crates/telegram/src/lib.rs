//! Telegram Bot API transport for botdeck.
//!
//! Implements the session substrate and outbound sender with teloxide:
//! manual long polling via `getUpdates`, HTML sends with a plain-text
//! fallback, and `RetryAfter` handling.

pub mod error;
pub mod format;
pub mod outbound;
pub mod substrate;

pub use {outbound::TelegramOutbound, substrate::TelegramSubstrate};
