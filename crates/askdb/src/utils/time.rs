use std::time::Instant;

use anyhow::{Context, Result};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub fn now_utc_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("failed to format current time as RFC3339")
}

/// Falls back to the unix epoch when formatting fails so callers that only
/// annotate output never have to handle an error.
#[must_use]
pub fn now_utc_rfc3339_lossy() -> String {
    now_utc_rfc3339().unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

#[must_use]
pub fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[must_use]
pub fn unique_id(prefix: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos() as u64);
    format!("{prefix}-{nanos:016x}")
}
