use chrono::{TimeZone, Utc};

/// Current wall-clock time as milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Milliseconds at 00:00 UTC of the day containing `ms`.
#[must_use]
pub fn start_of_utc_day_ms(ms: i64) -> i64 {
    let Some(at) = Utc.timestamp_millis_opt(ms).single() else {
        return ms;
    };
    at.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc().timestamp_millis())
        .unwrap_or(ms)
}

/// Render `ms` as `HH:MM:SS` (UTC).
#[must_use]
pub fn format_clock(ms: i64) -> String {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|at| at.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".into())
}
