//! Polling interval strings: `{integer}{s|m|h|d}`, e.g. `30s`, `5m`, `1d`.

use crate::error::{TriggerError, TriggerResult};
use lazy_static::lazy_static;
use regex::Regex;
use std::time::Duration;

/// Interval used when none is configured.
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(60);

lazy_static! {
    static ref INTERVAL: Regex = Regex::new(r"^(\d+)([smhd])$").expect("interval pattern is valid");
}

/// Parse a polling interval. The result is always strictly positive.
pub fn parse_interval(text: &str) -> TriggerResult<Duration> {
    let invalid = || {
        TriggerError::config(format!(
            "Polling interval '{}' is invalid, expected {{integer}}{{s|m|h|d}} such as '30s' or '5m'",
            text
        ))
    };

    let caps = INTERVAL.captures(text.trim()).ok_or_else(invalid)?;
    let amount: u64 = caps[1].parse().map_err(|_| invalid())?;
    let unit = match &caps[2] {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => 24 * 60 * 60,
    };

    let secs = amount.checked_mul(unit).ok_or_else(invalid)?;
    if secs == 0 {
        return Err(TriggerError::config("Polling interval must be greater than zero"));
    }
    Ok(Duration::from_secs(secs))
}

/// Parse an optional interval, using [`DEFAULT_POLLING_INTERVAL`] when absent.
pub fn parse_optional_interval(text: Option<&str>) -> TriggerResult<Duration> {
    match text {
        None => Ok(DEFAULT_POLLING_INTERVAL),
        Some(t) if t.trim().is_empty() => Err(TriggerError::config(
            "Polling interval must not be empty",
        )),
        Some(t) => parse_interval(t),
    }
}

/// Render a duration back into the shortest exact interval string.
pub fn format_interval(interval: Duration) -> String {
    let secs = interval.as_secs();
    match secs {
        s if s != 0 && s % 86_400 == 0 => format!("{}d", s / 86_400),
        s if s != 0 && s % 3_600 == 0 => format!("{}h", s / 3_600),
        s if s != 0 && s % 60 == 0 => format!("{}m", s / 60),
        s => format!("{}s", s),
    }
}
