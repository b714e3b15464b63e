//! Fixed-window request throttling.
//!
//! The pieces are modular:
//! - [`Policy`]: named, immutable quota configuration.
//! - [`WindowStore`] (in `store`): the injectable in-memory counter map.
//! - [`ThrottleLayer`] (in `middleware`): tower middleware that checks the
//!   store before the inner service runs.
//!
//! Throttling here is best-effort and process-local: counters live in memory
//! and vanish on restart, which is acceptable for an anti-abuse mechanism
//! where a missed window only admits a few extra requests.

use crate::error::HandlerError;
use chrono::{DateTime, SecondsFormat, Utc};
use std::time::{Duration, SystemTime};
use thiserror::Error;

pub mod middleware;
pub mod store;

pub use middleware::{ThrottleError, ThrottleLayer, ThrottleService};
pub use store::WindowStore;

/// Response header carrying the window quota.
pub const HEADER_LIMIT: &str = "X-RateLimit-Limit";
/// Response header carrying the remaining quota.
pub const HEADER_REMAINING: &str = "X-RateLimit-Remaining";
/// Response header carrying the window expiry as an ISO-8601 timestamp.
pub const HEADER_RESET: &str = "X-RateLimit-Reset";

/// Client identifier used when no forwarding header is present.
pub const FALLBACK_CLIENT_ID: &str = "127.0.0.1";

/// Errors returned by policy configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("max_requests must be > 0")]
    ZeroQuota,
    #[error("window must be non-zero")]
    ZeroWindow,
}

/// Immutable throttling policy: a quota of requests per fixed window.
///
/// Policies are compared by name inside the store, so two policies sharing a
/// name share windows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    name: String,
    max_requests: u32,
    window: Duration,
}

impl Policy {
    pub fn new(
        name: impl Into<String>,
        max_requests: u32,
        window: Duration,
    ) -> Result<Self, PolicyError> {
        if max_requests == 0 {
            return Err(PolicyError::ZeroQuota);
        }
        if window.is_zero() {
            return Err(PolicyError::ZeroWindow);
        }
        Ok(Self { name: name.into(), max_requests, window })
    }

    /// 5 requests per minute, for abuse-prone endpoints such as contact forms.
    pub fn strict() -> Self {
        Self { name: "strict".into(), max_requests: 5, window: Duration::from_secs(60) }
    }

    /// 30 requests per minute, the default for form submissions.
    pub fn standard() -> Self {
        Self { name: "standard".into(), max_requests: 30, window: Duration::from_secs(60) }
    }

    /// 120 requests per minute, for read-mostly endpoints.
    pub fn relaxed() -> Self {
        Self { name: "relaxed".into(), max_requests: 120, window: Duration::from_secs(60) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

/// Verdict of a single rate-limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: SystemTime,
}

impl RateLimitResult {
    /// The `X-RateLimit-*` header pairs for callers echoing the verdict over
    /// HTTP; the reset value is RFC 3339 in UTC.
    pub fn header_values(&self) -> [(&'static str, String); 3] {
        let reset = DateTime::<Utc>::from(self.reset_at)
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        [
            (HEADER_LIMIT, self.limit.to_string()),
            (HEADER_REMAINING, self.remaining.to_string()),
            (HEADER_RESET, reset),
        ]
    }

    /// Time until the window resets, from the caller's `now`.
    pub fn retry_after(&self, now: SystemTime) -> Duration {
        self.reset_at.duration_since(now).unwrap_or_default()
    }

    /// Shape a denial as the typed rate-limit error, for handlers that
    /// classify throttling like any other failure.
    pub fn to_error(&self, now: SystemTime) -> HandlerError {
        HandlerError::RateLimited { retry_after: Some(self.retry_after(now)) }
    }
}

/// Derive the client identifier from forwarding headers.
///
/// `lookup` resolves a lowercase header name to its value, keeping this crate
/// agnostic of the HTTP framework. Order: first `x-forwarded-for` entry, then
/// `x-real-ip`, then `cf-connecting-ip`, then [`FALLBACK_CLIENT_ID`].
pub fn client_id_from_headers<'a, F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<&'a str>,
{
    if let Some(forwarded) = lookup("x-forwarded-for") {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    for header in ["x-real-ip", "cf-connecting-ip"] {
        if let Some(value) = lookup(header) {
            let value = value.trim();
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }
    FALLBACK_CLIENT_ID.to_string()
}
