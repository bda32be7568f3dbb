use {
    anyhow::Result,
    async_trait::async_trait,
    std::{future::Future, time::Duration},
    teloxide::{
        RequestError,
        payloads::{SendMessageSetters, SendPhotoSetters},
        prelude::*,
        types::{ChatId, InputFile, ParseMode},
    },
    tracing::{debug, info, warn},
};

use botdeck_channels::{Outbound, TextFormat};

use crate::{
    error::Error,
    format::{self, TELEGRAM_CAPTION_LIMIT, TELEGRAM_MAX_MESSAGE_LEN},
};

const TELEGRAM_RETRY_AFTER_MAX_RETRIES: usize = 4;

/// Outbound message sender for one Telegram bot.
#[derive(Clone)]
pub struct TelegramOutbound {
    bot: Bot,
    account_id: String,
}

impl TelegramOutbound {
    pub fn new(bot: Bot, account_id: impl Into<String>) -> Self {
        Self {
            bot,
            account_id: account_id.into(),
        }
    }

    async fn send_chunk(&self, chat_id: i64, chunk: &str, format: TextFormat) -> Result<()> {
        let chat = ChatId(chat_id);
        if format == TextFormat::Plain {
            self.run_with_retry(chat_id, "send message (plain)", || {
                let req = self.bot.send_message(chat, chunk);
                async move { req.await }
            })
            .await?;
            return Ok(());
        }

        match self
            .run_with_retry(chat_id, "send message (html)", || {
                let req = self.bot.send_message(chat, chunk).parse_mode(ParseMode::Html);
                async move { req.await }
            })
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(
                    account_id = %self.account_id,
                    chat_id,
                    error = %e,
                    "telegram HTML send failed, retrying as plain text"
                );
                let plain = format::html_to_plain(chunk);
                self.run_with_retry(chat_id, "send message (plain)", || {
                    let req = self.bot.send_message(chat, plain.as_str());
                    async move { req.await }
                })
                .await?;
                Ok(())
            },
        }
    }

    /// Run a request, honouring `RetryAfter` up to a fixed number of times.
    async fn run_with_retry<T, F, Fut>(
        &self,
        chat_id: i64,
        operation: &'static str,
        mut request: F,
    ) -> std::result::Result<T, RequestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, RequestError>>,
    {
        let mut retries = 0usize;

        loop {
            match request().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let Some(wait) = retry_after_duration(&err) else {
                        return Err(err);
                    };

                    if retries >= TELEGRAM_RETRY_AFTER_MAX_RETRIES {
                        warn!(
                            account_id = %self.account_id,
                            chat_id,
                            operation,
                            retries,
                            retry_after_secs = wait.as_secs(),
                            "telegram rate limit persisted after retries"
                        );
                        return Err(err);
                    }

                    retries += 1;
                    warn!(
                        account_id = %self.account_id,
                        chat_id,
                        operation,
                        retries,
                        retry_after_secs = wait.as_secs(),
                        "telegram rate limited, waiting before retry"
                    );
                    tokio::time::sleep(wait).await;
                },
            }
        }
    }
}

fn retry_after_duration(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::RetryAfter(wait) => Some(wait.duration()),
        _ => None,
    }
}

#[async_trait]
impl Outbound for TelegramOutbound {
    async fn send_text(&self, chat_id: i64, text: &str, format: TextFormat) -> Result<()> {
        let chunks = format::chunk_message(text, TELEGRAM_MAX_MESSAGE_LEN);
        debug!(
            account_id = %self.account_id,
            chat_id,
            text_len = text.len(),
            chunk_count = chunks.len(),
            "telegram outbound text send start"
        );

        for chunk in &chunks {
            self.send_chunk(chat_id, chunk, format).await?;
        }

        info!(
            account_id = %self.account_id,
            chat_id,
            chunk_count = chunks.len(),
            "telegram outbound text sent"
        );
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        photo_url: &str,
        caption: &str,
        format: TextFormat,
    ) -> Result<()> {
        let url = reqwest::Url::parse(photo_url).map_err(|e| Error::InvalidUrl {
            url: photo_url.to_string(),
            message: e.to_string(),
        })?;

        // Captions are short; cut plain text so HTML tags are never split.
        let caption = if caption.len() > TELEGRAM_CAPTION_LIMIT {
            let plain = match format {
                TextFormat::Html => format::html_to_plain(caption),
                TextFormat::Plain => caption.to_string(),
            };
            (
                format::truncate_at_char_boundary(&plain, TELEGRAM_CAPTION_LIMIT).to_string(),
                TextFormat::Plain,
            )
        } else {
            (caption.to_string(), format)
        };

        self.run_with_retry(chat_id, "send photo", || {
            let mut req = self
                .bot
                .send_photo(ChatId(chat_id), InputFile::url(url.clone()))
                .caption(caption.0.as_str());
            if caption.1 == TextFormat::Html {
                req = req.parse_mode(ParseMode::Html);
            }
            async move { req.await }
        })
        .await
        .map_err(Error::from)?;

        info!(
            account_id = %self.account_id,
            chat_id,
            "telegram outbound photo sent"
        );
        Ok(())
    }
}
