//! # Duration Parsing
//!
//! Parses the duration strings used in `BackupBucket` specs.

use anyhow::Result;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

static DURATION_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d+[smhd])+$").expect("duration format regex is valid")
});

static DURATION_COMPONENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<number>\d+)(?P<unit>[smhd])").expect("duration component regex is valid")
});

/// Parse a duration string into `std::time::Duration`
/// Supports one or more `<number><unit>` components: "30s", "24h", "7d", "1h30m"
/// Zero is accepted ("0s"); callers decide whether zero is meaningful
pub fn parse_duration(duration_str: &str) -> Result<Duration> {
    let duration_trimmed = duration_str.trim();

    if duration_trimmed.is_empty() {
        return Err(anyhow::anyhow!("Duration string cannot be empty"));
    }

    let duration_lower = duration_trimmed.to_lowercase();

    if !DURATION_FORMAT.is_match(&duration_lower) {
        return Err(anyhow::anyhow!(
            "Invalid duration format '{}'. Expected format: <number><unit>[<number><unit>...] (e.g., '24h', '7d', '1h30m')",
            duration_trimmed
        ));
    }

    let mut total_seconds: u64 = 0;
    for captures in DURATION_COMPONENT.captures_iter(&duration_lower) {
        let number_str = &captures["number"];
        let number: u64 = number_str.parse().map_err(|e| {
            anyhow::anyhow!(
                "Invalid duration number '{}' in '{}': {}",
                number_str,
                duration_trimmed,
                e
            )
        })?;

        let multiplier = match &captures["unit"] {
            "s" => 1,
            "m" => 60,
            "h" => 3600,
            "d" => 86400,
            unit => {
                return Err(anyhow::anyhow!(
                    "Invalid unit '{}' in duration '{}'. Expected: s, m, h, or d",
                    unit,
                    duration_trimmed
                ));
            }
        };

        total_seconds = number
            .checked_mul(multiplier)
            .and_then(|secs| total_seconds.checked_add(secs))
            .ok_or_else(|| anyhow::anyhow!("Duration '{}' is too large", duration_trimmed))?;
    }

    Ok(Duration::from_secs(total_seconds))
}
