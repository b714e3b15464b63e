//! Typed error taxonomy for request handlers.
//!
//! [`HandlerError`] is the closed set of failures a handler raises;
//! [`ErrorKind`] maps each to a stable wire code and HTTP status;
//! [`ClassifiedError`] is the reduced, client-safe shape produced by the
//! classifier in [`crate::classify`].

use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Boxed error type accepted at handler boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Closed set of error kinds, each with a stable code and HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Validation,
    Authentication,
    Authorization,
    NotFound,
    RateLimit,
    ExternalService,
    Internal,
}

impl ErrorKind {
    /// Default HTTP status for this kind.
    pub fn status(&self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::Authentication => 401,
            ErrorKind::Authorization => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::RateLimit => 429,
            ErrorKind::ExternalService => 503,
            ErrorKind::Internal => 500,
        }
    }

    /// Stable wire code, matching the serde representation.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Authentication => "authentication",
            ErrorKind::Authorization => "authorization",
            ErrorKind::NotFound => "not-found",
            ErrorKind::RateLimit => "rate-limit",
            ErrorKind::ExternalService => "external-service",
            ErrorKind::Internal => "internal",
        }
    }
}

/// The failures a request handler raises.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Caller-supplied input failed a constraint. `details` carries the
    /// structured payload (e.g. which fields failed) through to the client.
    #[error("{message}")]
    Validation { message: String, details: Option<Value> },

    /// Missing or invalid credentials.
    #[error("{0}")]
    Authentication(String),

    /// Authenticated but insufficient privilege.
    #[error("{0}")]
    Authorization(String),

    /// Referenced resource does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Quota exceeded for the current window.
    #[error("rate limit exceeded")]
    RateLimited { retry_after: Option<Duration> },

    /// A downstream collaborator (email API, storage) failed.
    #[error("{service} is unavailable")]
    ExternalService {
        service: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Unclassified application failure.
    #[error("{0}")]
    Internal(String),
}

impl HandlerError {
    pub fn validation(message: impl Into<String>) -> Self {
        HandlerError::Validation { message: message.into(), details: None }
    }

    pub fn validation_with(message: impl Into<String>, details: Value) -> Self {
        HandlerError::Validation { message: message.into(), details: Some(details) }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        HandlerError::NotFound(resource.into())
    }

    pub fn external(service: impl Into<String>) -> Self {
        HandlerError::ExternalService { service: service.into(), source: None }
    }

    pub fn external_with(service: impl Into<String>, source: BoxError) -> Self {
        HandlerError::ExternalService { service: service.into(), source: Some(source) }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        HandlerError::Internal(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            HandlerError::Validation { .. } => ErrorKind::Validation,
            HandlerError::Authentication(_) => ErrorKind::Authentication,
            HandlerError::Authorization(_) => ErrorKind::Authorization,
            HandlerError::NotFound(_) => ErrorKind::NotFound,
            HandlerError::RateLimited { .. } => ErrorKind::RateLimit,
            HandlerError::ExternalService { .. } => ErrorKind::ExternalService,
            HandlerError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// The reduced, serializable result of classifying a caught error.
///
/// Constructed fresh per classification, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
    pub http_status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), http_status: kind.status(), details: None }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl std::fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.kind.code())
    }
}

impl std::error::Error for ClassifiedError {}
