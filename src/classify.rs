//! Error classification: the uniform boundary between handlers and callers.
//!
//! [`Classifier::classify`] maps any caught error into a [`ClassifiedError`]
//! with a stable code and HTTP status. Recognized [`HandlerError`] kinds keep
//! their structured details; anything else becomes `internal`, with the
//! message replaced by a fixed safe string when redaction is on. The full
//! original error always reaches the injected [`ErrorSink`] before the reduced
//! shape is returned.
//!
//! [`Classifier::run`] is the handler wrapper: it awaits an action and turns
//! success, error, and even panic into an [`ActionResult`], so the caller
//! never has to distinguish "the handler failed" from "the handler returned a
//! structured failure".

use crate::error::{BoxError, ClassifiedError, ErrorKind, HandlerError};
use futures::FutureExt;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

/// Message substituted for internal errors when redaction is enabled.
pub const REDACTED_MESSAGE: &str = "An unexpected error occurred";

/// Logging collaborator receiving the full original error.
///
/// The classification result never depends on the sink: a panicking
/// implementation is contained by the classifier.
pub trait ErrorSink: Send + Sync + std::fmt::Debug {
    fn record(&self, error: &(dyn std::error::Error + 'static), context: Option<&Value>);
}

/// Default sink emitting a `tracing` error event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn record(&self, error: &(dyn std::error::Error + 'static), context: Option<&Value>) {
        match context {
            Some(context) => tracing::error!(error = %error, %context, "handler error"),
            None => tracing::error!(error = %error, "handler error"),
        }
    }
}

/// Test sink that captures recorded errors instead of logging them.
#[derive(Debug, Default, Clone)]
pub struct CapturingSink {
    records: Arc<Mutex<Vec<(String, Option<Value>)>>>,
}

impl CapturingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(String, Option<Value>)> {
        self.records.lock().unwrap().clone()
    }
}

impl ErrorSink for CapturingSink {
    fn record(&self, error: &(dyn std::error::Error + 'static), context: Option<&Value>) {
        self.records.lock().unwrap().push((error.to_string(), context.cloned()));
    }
}

/// Maps caught errors into client-safe shapes.
///
/// Redaction is an explicit constructor argument rather than an environment
/// lookup, so both modes are testable in one process.
#[derive(Debug, Clone)]
pub struct Classifier {
    redact_internal: bool,
    sink: Arc<dyn ErrorSink>,
}

impl Classifier {
    /// `redact_internal = true` is the production configuration: internal and
    /// unrecognized error messages are replaced with [`REDACTED_MESSAGE`].
    pub fn new(redact_internal: bool) -> Self {
        Self { redact_internal, sink: Arc::new(TracingSink) }
    }

    /// Replace the logging collaborator.
    pub fn with_sink<S>(mut self, sink: S) -> Self
    where
        S: ErrorSink + 'static,
    {
        self.sink = Arc::new(sink);
        self
    }

    /// Classify a caught error. Total: always returns a well-formed result.
    pub fn classify(&self, error: &(dyn std::error::Error + 'static)) -> ClassifiedError {
        self.classify_with_context(error, None)
    }

    /// Classify with an optional structured context that is only logged,
    /// never returned to the caller.
    pub fn classify_with_context(
        &self,
        error: &(dyn std::error::Error + 'static),
        context: Option<&Value>,
    ) -> ClassifiedError {
        // A misbehaving sink must not disturb the classification result.
        let _ = std::panic::catch_unwind(AssertUnwindSafe(|| self.sink.record(error, context)));
        match error.downcast_ref::<HandlerError>() {
            Some(handler) => self.shape(handler),
            None => self.internal(error.to_string()),
        }
    }

    /// Run a handler action to a uniform [`ActionResult`].
    ///
    /// Panics inside the action are caught and classified as internal, so no
    /// failure mode escapes unshaped.
    pub async fn run<T, Fut>(&self, action: Fut) -> ActionResult<T>
    where
        Fut: Future<Output = Result<T, BoxError>>,
    {
        match AssertUnwindSafe(action).catch_unwind().await {
            Ok(Ok(data)) => ActionResult::Success(data),
            Ok(Err(error)) => ActionResult::Failure(self.classify(error.as_ref())),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                ActionResult::Failure(self.classify(&HandlerError::Internal(message)))
            }
        }
    }

    fn shape(&self, error: &HandlerError) -> ClassifiedError {
        let kind = error.kind();
        match error {
            HandlerError::Validation { message, details } => {
                let classified = ClassifiedError::new(kind, message.clone());
                match details {
                    Some(details) => classified.with_details(details.clone()),
                    None => classified,
                }
            }
            HandlerError::RateLimited { retry_after } => {
                let classified = ClassifiedError::new(kind, error.to_string());
                match retry_after {
                    Some(wait) => classified
                        .with_details(serde_json::json!({ "retry_after_secs": wait.as_secs() })),
                    None => classified,
                }
            }
            HandlerError::Internal(message) => self.internal(message.clone()),
            _ => ClassifiedError::new(kind, error.to_string()),
        }
    }

    fn internal(&self, message: String) -> ClassifiedError {
        let message = if self.redact_internal { REDACTED_MESSAGE.to_string() } else { message };
        ClassifiedError::new(ErrorKind::Internal, message)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// Uniform boundary shape returned by wrapped handlers.
///
/// Serializes as `{ "success": true, "data": … }` or
/// `{ "success": false, "error": …, "code": …, "details": … }`.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionResult<T> {
    Success(T),
    Failure(ClassifiedError),
}

impl<T> ActionResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, ActionResult::Success(_))
    }

    pub fn failure(&self) -> Option<&ClassifiedError> {
        match self {
            ActionResult::Failure(error) => Some(error),
            ActionResult::Success(_) => None,
        }
    }

    pub fn into_result(self) -> Result<T, ClassifiedError> {
        match self {
            ActionResult::Success(data) => Ok(data),
            ActionResult::Failure(error) => Err(error),
        }
    }
}

impl<T: Serialize> Serialize for ActionResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ActionResult::Success(data) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("success", &true)?;
                map.serialize_entry("data", data)?;
                map.end()
            }
            ActionResult::Failure(error) => {
                let entries = if error.details.is_some() { 4 } else { 3 };
                let mut map = serializer.serialize_map(Some(entries))?;
                map.serialize_entry("success", &false)?;
                map.serialize_entry("error", &error.message)?;
                map.serialize_entry("code", error.kind.code())?;
                if let Some(details) = &error.details {
                    map.serialize_entry("details", details)?;
                }
                map.end()
            }
        }
    }
}
