use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("queue transport is closed")]
    Closed,

    #[error("unknown queue: {name}")]
    UnknownQueue { name: String },

    #[error("delivery {id} is not outstanding")]
    UnknownDelivery { id: u64 },

    #[error("invalid envelope: {message}")]
    InvalidEnvelope { message: String },

    #[error("broker refused message for queue {queue}")]
    Nacked { queue: String },

    #[error(transparent)]
    Amqp(#[from] lapin::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn unknown_queue(name: impl Into<String>) -> Self {
        Self::UnknownQueue { name: name.into() }
    }

    #[must_use]
    pub fn invalid_envelope(message: impl Into<String>) -> Self {
        Self::InvalidEnvelope {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
