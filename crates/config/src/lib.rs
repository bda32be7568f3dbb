//! Configuration loading, env substitution and validation.
//!
//! Config files: `botdeck.toml`, `botdeck.yaml`, `botdeck.yml` or `botdeck.json`
//! Searched in `./` then `~/.config/botdeck/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{config_dir, find_config_file, load_config},
    schema::{
        AdminConfig, AuditConfig, BotConfig, BotRole, BotdeckConfig, DatabaseConfig, MediaConfig,
        QueueConfig, ServerConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
