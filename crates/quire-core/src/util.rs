//! Small helpers shared by config parsing, wire decoding, and sessions

/// Trimmed text, or `None` when absent or blank
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// `http://` or `https://` followed by at least a host
pub fn is_http_url(value: &str) -> bool {
    ["http://", "https://"].iter().any(|scheme| {
        value
            .strip_prefix(scheme)
            .is_some_and(|rest| !rest.trim().is_empty())
    })
}

/// Wall-clock Unix milliseconds, as stamped on documents and conflicts
pub fn unix_millis_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
