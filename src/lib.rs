#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # Guardrail
//!
//! Resilience primitives for async request handlers: fixed-window rate
//! limiting, typed error classification, and retry with exponential backoff.
//!
//! ## Features
//!
//! - **Rate limiting**: an injectable in-memory [`WindowStore`] of fixed
//!   windows keyed by `(policy, client id)`, with named [`Policy`] presets, a
//!   background sweep, and a tower [`ThrottleLayer`].
//! - **Error classification**: a closed [`ErrorKind`] taxonomy with stable
//!   codes and HTTP statuses, and a [`Classifier`] that reduces any caught
//!   error (or panic) to a client-safe [`ClassifiedError`] while logging the
//!   original.
//! - **Retry**: [`RetryPolicy`] with constant/linear/exponential [`Backoff`],
//!   optional [`Jitter`], and injectable sleepers for instant tests.
//!
//! ## Quick Start
//!
//! ```rust
//! use guardrail::{Policy, WindowStore};
//!
//! let store = WindowStore::new();
//! let verdict = store.check("203.0.113.7", &Policy::standard());
//! assert!(verdict.allowed);
//! assert_eq!(verdict.remaining, 29);
//! ```

pub mod backoff;
pub mod classify;
pub mod error;
pub mod jitter;
pub mod rate_limit;
pub mod retry;
pub mod time;

// Re-exports
pub use backoff::{Backoff, BackoffError};
pub use classify::{ActionResult, CapturingSink, Classifier, ErrorSink, TracingSink};
pub use error::{BoxError, ClassifiedError, ErrorKind, HandlerError};
pub use jitter::Jitter;
pub use rate_limit::{
    client_id_from_headers, Policy, RateLimitResult, ThrottleError, ThrottleLayer, WindowStore,
};
pub use retry::{RetryPolicy, RetryPolicyBuilder};
pub use time::{
    Clock, ManualClock, NoopSleeper, RecordingSleeper, Sleeper, SystemClock, TokioSleeper,
};
