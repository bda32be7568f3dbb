use thiserror::Error;

/// Startup and shutdown failures of the platform itself. Everything that
/// happens per event or per webhook is handled where it occurs.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Audit(#[from] botdeck_audit::Error),

    #[error(transparent)]
    Queue(#[from] botdeck_queue::Error),

    #[error(transparent)]
    Telegram(#[from] botdeck_telegram::error::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
