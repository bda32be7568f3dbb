//! Typed shapes of the third-party webhook payloads.
//!
//! Every field is optional and unknown fields are ignored: the senders add
//! fields between versions and omit others depending on the event type.

pub mod radarr;
pub mod sonarr;
pub mod truenas;

use serde::{Deserialize, Deserializer};

pub use {
    radarr::RadarrWebhook,
    sonarr::SonarrWebhook,
    truenas::{Severity, TrueNasAlert},
};

/// Where a webhook came from. Also the `source` column of the audit row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WebhookSource {
    Radarr,
    Sonarr,
    TrueNas,
}

impl WebhookSource {
    pub const ALL: [Self; 3] = [Self::Radarr, Self::Sonarr, Self::TrueNas];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Radarr => "radarr",
            Self::Sonarr => "sonarr",
            Self::TrueNas => "truenas",
        }
    }

    /// Human-facing product name.
    pub fn label(self) -> &'static str {
        match self {
            Self::Radarr => "Radarr",
            Self::Sonarr => "Sonarr",
            Self::TrueNas => "TrueNAS",
        }
    }
}

impl std::fmt::Display for WebhookSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Release details shared by the Radarr and Sonarr payloads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReleaseInfo {
    pub quality: Option<String>,
    pub quality_version: Option<i64>,
    pub release_group: Option<String>,
    pub release_title: Option<String>,
    pub indexer: Option<String>,
    pub size: Option<i64>,
}

pub(crate) fn event_is(event_type: Option<&str>, expected: &str) -> bool {
    event_type.is_some_and(|t| t.eq_ignore_ascii_case(expected))
}

/// Accept a string, number or boolean where a string is expected.
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}
