//! Rate-limit header interpretation
//!
//! Zenodo reports its quota on every response through three headers:
//! `X-RateLimit-Limit`, `X-RateLimit-Remaining` and `X-RateLimit-Reset`
//! (epoch seconds). A snapshot exists only when all three parse.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RESET_HEADER: &str = "x-ratelimit-reset";

/// Extra wait added on top of the server reset time to absorb clock skew
pub const CLOCK_SKEW_BUFFER: Duration = Duration::from_secs(1);

/// Decoded `{limit, remaining, reset}` triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    /// Requests allowed in the current window
    pub limit: i64,
    /// Requests left in the current window
    pub remaining: i64,
    /// Epoch second at which the window resets
    pub reset_epoch_seconds: i64,
}

impl RateLimitSnapshot {
    /// Parse the snapshot from response headers
    ///
    /// Returns `None` as soon as one header is missing or not an integer.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        Some(Self {
            limit: header_as_i64(headers, LIMIT_HEADER)?,
            remaining: header_as_i64(headers, REMAINING_HEADER)?,
            reset_epoch_seconds: header_as_i64(headers, RESET_HEADER)?,
        })
    }

    /// Time to wait before the quota allows another request
    pub fn wait_duration(&self) -> Duration {
        self.wait_duration_at(chrono::Utc::now().timestamp())
    }

    /// Same as [`wait_duration`](Self::wait_duration) with an explicit clock
    pub fn wait_duration_at(&self, now_epoch_seconds: i64) -> Duration {
        if self.remaining > 0 {
            return Duration::ZERO;
        }
        let until_reset = self.reset_epoch_seconds.saturating_sub(now_epoch_seconds).max(0);
        Duration::from_secs(until_reset as u64) + CLOCK_SKEW_BUFFER
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining <= 0
    }

    /// Reset time as a UTC timestamp, when it is representable
    pub fn reset_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.reset_epoch_seconds, 0)
    }
}

impl fmt::Display for RateLimitSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}, resets at ", self.remaining, self.limit)?;
        match self.reset_at() {
            Some(reset) => write!(f, "{}", reset.to_rfc3339()),
            None => write!(f, "{}", self.reset_epoch_seconds),
        }
    }
}

fn header_as_i64(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<i64>().ok())
}
