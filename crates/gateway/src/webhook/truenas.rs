use serde::Deserialize;

use super::lenient_string;

/// TrueNAS SCALE alert delivered through the generic webhook alert service.
///
/// The shape differs between releases: the text may arrive as `message` or
/// `text`, and some fields are sent as numbers.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TrueNasAlert {
    /// `CRITICAL`, `WARNING`, `INFO`, ...
    #[serde(deserialize_with = "lenient_string")]
    pub level: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub message: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub datetime: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub node: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub text: Option<String>,
    /// Alert type, e.g. `DiskTemp` or `PoolStatus`.
    #[serde(deserialize_with = "lenient_string")]
    pub key: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub klass: Option<String>,
    pub dismissed: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl Severity {
    pub fn emoji(self) -> &'static str {
        match self {
            Self::Critical => "🚨",
            Self::Warning => "⚠️",
            Self::Info => "ℹ️",
        }
    }
}

impl TrueNasAlert {
    /// Unknown or missing levels are treated as informational.
    pub fn severity(&self) -> Severity {
        match self.level.as_deref().map(str::to_ascii_uppercase).as_deref() {
            Some("CRITICAL" | "ALERT" | "EMERGENCY" | "ERROR") => Severity::Critical,
            Some("WARNING" | "WARN") => Severity::Warning,
            _ => Severity::Info,
        }
    }

    pub fn level(&self) -> &str {
        self.level.as_deref().unwrap_or("UNKNOWN")
    }

    pub fn alert_message(&self) -> &str {
        [self.message.as_deref(), self.text.as_deref()]
            .into_iter()
            .flatten()
            .find(|m| !m.trim().is_empty())
            .unwrap_or("TrueNAS Alert (no message body)")
    }

    pub fn node_name(&self) -> &str {
        self.node.as_deref().unwrap_or("Unknown Node")
    }

    pub fn alert_type(&self) -> &str {
        self.key.as_deref().unwrap_or("General Alert")
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest, serde_json::json};

    #[rstest]
    #[case(json!("CRITICAL"), Severity::Critical)]
    #[case(json!("alert"), Severity::Critical)]
    #[case(json!("Warning"), Severity::Warning)]
    #[case(json!("WARN"), Severity::Warning)]
    #[case(json!("NOTICE"), Severity::Info)]
    #[case(json!(null), Severity::Info)]
    fn severity_from_level(#[case] level: serde_json::Value, #[case] expected: Severity) {
        let alert: TrueNasAlert = serde_json::from_value(json!({ "level": level })).unwrap();
        assert_eq!(alert.severity(), expected);
    }

    #[test]
    fn text_is_used_when_message_is_blank() {
        let alert: TrueNasAlert = serde_json::from_value(json!({
            "message": "  ",
            "text": "Pool tank is DEGRADED",
            "key": "PoolStatus",
            "node": "nas01"
        }))
        .unwrap();
        assert_eq!(alert.alert_message(), "Pool tank is DEGRADED");
        assert_eq!(alert.alert_type(), "PoolStatus");
        assert_eq!(alert.node_name(), "nas01");
    }

    #[test]
    fn numeric_fields_are_accepted_as_text() {
        let alert: TrueNasAlert = serde_json::from_value(json!({
            "id": 42,
            "datetime": 1_717_171_717,
            "dismissed": false
        }))
        .unwrap();
        assert_eq!(alert.id.as_deref(), Some("42"));
        assert_eq!(alert.datetime.as_deref(), Some("1717171717"));
        assert_eq!(alert.alert_message(), "TrueNAS Alert (no message body)");
        assert_eq!(alert.node_name(), "Unknown Node");
        assert_eq!(alert.alert_type(), "General Alert");
        assert_eq!(alert.level(), "UNKNOWN");
    }
}
