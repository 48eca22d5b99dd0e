//! Human-friendly duration strings ("30s", "5m", "1h").

use std::time::Duration;

use crate::config::ConfigError;

/// Parse a duration like `"30s"`, `"5m"`, `"1h30m"` or a bare number of seconds.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|_| ConfigError::InvalidDuration(s.to_string()))
}
