//! Semantic validation of a loaded configuration.
//!
//! Parsing already enforces types; this pass checks cross-references between
//! sections (alert bot, reply bot), uniqueness of bot names and values that
//! would make a bot impossible to start.

use std::{collections::HashSet, path::PathBuf};

use secrecy::ExposeSecret;

use crate::{
    env_subst::has_placeholder,
    schema::{BotRole, BotdeckConfig},
};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "bots[1].token"
    pub path: String,
    pub message: String,
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(&mut self, severity: Severity, path: impl Into<String>, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate `config`.
#[must_use]
pub fn validate(config: &BotdeckConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    if config.bots.is_empty() {
        result.push(Severity::Warning, "bots", "no bots configured");
    }

    let mut seen = HashSet::new();
    for (i, bot) in config.bots.iter().enumerate() {
        let path = format!("bots[{i}]");
        if bot.name.trim().is_empty() {
            result.push(Severity::Error, format!("{path}.name"), "bot name is empty");
        } else if !seen.insert(bot.name.to_lowercase()) {
            result.push(
                Severity::Error,
                format!("{path}.name"),
                format!("duplicate bot name '{}'", bot.name),
            );
        }

        let token = bot.token.expose_secret();
        if token.is_empty() {
            result.push(Severity::Error, format!("{path}.token"), "token is empty");
        } else if has_placeholder(token) {
            result.push(
                Severity::Error,
                format!("{path}.token"),
                "token references an unset environment variable",
            );
        }

        if bot.role == BotRole::Media && bot.channel_id.is_none() {
            result.push(
                Severity::Error,
                format!("{path}.channel_id"),
                format!("media bot '{}' needs a channel_id", bot.name),
            );
        }
    }

    let has_admin = config.bot_with_role(BotRole::Admin).is_some();
    if has_admin && config.admin.chat_id.is_none() {
        result.push(
            Severity::Error,
            "admin.chat_id",
            "an admin bot is configured but no operator chat_id is set",
        );
    }

    if config.bot(&config.admin.alert_bot).is_none() {
        result.push(
            Severity::Warning,
            "admin.alert_bot",
            format!(
                "alert bot '{}' is not configured; failures will only be logged",
                config.admin.alert_bot
            ),
        );
    }

    match &config.queue.reply_bot {
        Some(name) if config.bot(name).is_none() => result.push(
            Severity::Error,
            "queue.reply_bot",
            format!("reply bot '{name}' is not configured"),
        ),
        None if config.bot_with_role(BotRole::Gateway).is_none() => result.push(
            Severity::Warning,
            "queue.reply_bot",
            "no reply bot and no gateway bot; replies without a token cannot be sent",
        ),
        _ => {},
    }

    match config.queue.url.as_ref().map(|url| url.expose_secret()) {
        None => result.push(
            Severity::Info,
            "queue.url",
            "not set; queues stay in process and no external worker can consume updates",
        ),
        Some(url) if has_placeholder(url) => result.push(
            Severity::Error,
            "queue.url",
            "url references an unset environment variable",
        ),
        Some(url) if !(url.starts_with("amqp://") || url.starts_with("amqps://")) => result.push(
            Severity::Error,
            "queue.url",
            "expected an amqp:// or amqps:// url",
        ),
        Some(_) => {},
    }
    if config.queue.prefetch == 0 {
        result.push(Severity::Error, "queue.prefetch", "must be at least 1");
    }

    if config.queue.max_deliveries == 0 {
        result.push(
            Severity::Error,
            "queue.max_deliveries",
            "must be at least 1",
        );
    }
    if config.queue.consumers == 0 {
        result.push(Severity::Error, "queue.consumers", "must be at least 1");
    }
    if config.audit.buffer == 0 {
        result.push(Severity::Error, "audit.buffer", "must be at least 1");
    }

    result
}
