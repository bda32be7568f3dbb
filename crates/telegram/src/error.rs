use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Telegram(#[from] teloxide::RequestError),

    #[error("failed to build telegram HTTP client: {message}")]
    Client { message: String },

    #[error("invalid photo url '{url}': {message}")]
    InvalidUrl { url: String, message: String },
}

impl From<Error> for botdeck_channels::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Telegram(teloxide::RequestError::Api(
                teloxide::ApiError::TerminatedByOtherGetUpdates,
            )) => Self::conflict("terminated by other getUpdates request"),
            other => Self::external("telegram request", other),
        }
    }
}

impl Error {
    #[must_use]
    pub fn client(message: impl Into<String>) -> Self {
        Self::Client {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
