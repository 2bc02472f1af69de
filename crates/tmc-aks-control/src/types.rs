//! Engine configuration and wait-timeout parsing.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ControlError, Result};

/// Value of `ready_wait_timeout` that selects the configured default.
pub const DEFAULT_TIMEOUT_KEYWORD: &str = "default";

/// Configuration for the cluster resource engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Delay between two status checks while waiting (milliseconds).
    #[serde(default = "ResourceConfig::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Wait timeout used when `ready_wait_timeout` is `"default"` (seconds).
    #[serde(default = "ResourceConfig::default_ready_timeout_secs")]
    pub default_ready_timeout_secs: u64,
    /// Delete the cluster with `force`, leaving the Azure resources behind.
    #[serde(default)]
    pub force_delete: bool,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: Self::default_poll_interval_ms(),
            default_ready_timeout_secs: Self::default_ready_timeout_secs(),
            force_delete: false,
        }
    }
}

impl ResourceConfig {
    const fn default_poll_interval_ms() -> u64 {
        10_000
    }

    const fn default_ready_timeout_secs() -> u64 {
        30 * 60
    }

    /// Configuration with the given poll interval and default timeout.
    #[must_use]
    pub fn with_timings(poll_interval: Duration, default_ready_timeout: Duration) -> Self {
        Self {
            poll_interval_ms: u64::try_from(poll_interval.as_millis()).unwrap_or(u64::MAX),
            default_ready_timeout_secs: default_ready_timeout.as_secs(),
            force_delete: false,
        }
    }

    /// Delay between two status checks.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Wait timeout used for `"default"`.
    #[must_use]
    pub const fn default_ready_timeout(&self) -> Duration {
        Duration::from_secs(self.default_ready_timeout_secs)
    }

    /// Resolve a `ready_wait_timeout` value.
    ///
    /// Empty and `"default"` map to [`ResourceConfig::default_ready_timeout`].
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InvalidTimeout` if the value does not parse or
    /// is zero.
    pub fn ready_timeout(&self, value: &str) -> Result<Duration> {
        let value = value.trim();
        if value.is_empty() || value == DEFAULT_TIMEOUT_KEYWORD {
            return Ok(self.default_ready_timeout());
        }
        match parse_duration(value) {
            Some(timeout) if !timeout.is_zero() => Ok(timeout),
            _ => Err(ControlError::InvalidTimeout(value.to_string())),
        }
    }
}

/// Parse a Go-style duration such as `5ms`, `45s`, `1.5h` or `1h30m`.
///
/// Supported units are `ns`, `us` (or `µs`), `ms`, `s`, `m` and `h`. Every
/// number needs a unit; a bare `0` is not accepted.
#[must_use]
pub fn parse_duration(input: &str) -> Option<Duration> {
    if input.is_empty() {
        return None;
    }

    let mut rest = input;
    let mut total: u128 = 0;

    while !rest.is_empty() {
        let int_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let (int_part, after) = rest.split_at(int_end);

        let (frac_part, after) = match after.strip_prefix('.') {
            Some(stripped) => {
                let end = stripped
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(stripped.len());
                stripped.split_at(end)
            }
            None => ("", after),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }

        let unit_end = after
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(after.len());
        let (unit, next) = after.split_at(unit_end);
        let scale = unit_nanos(unit)?;

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().ok()?
        };
        let mut value = whole.checked_mul(scale)?;

        if !frac_part.is_empty() {
            let digits: u128 = frac_part.parse().ok()?;
            let denom = 10u128.checked_pow(u32::try_from(frac_part.len()).ok()?)?;
            value = value.checked_add(digits.checked_mul(scale)? / denom)?;
        }

        total = total.checked_add(value)?;
        rest = next;
    }

    Some(Duration::from_nanos(u64::try_from(total).ok()?))
}

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(1_000),
        "ms" => Some(1_000_000),
        "s" => Some(1_000_000_000),
        "m" => Some(60 * 1_000_000_000),
        "h" => Some(3_600 * 1_000_000_000),
        _ => None,
    }
}
