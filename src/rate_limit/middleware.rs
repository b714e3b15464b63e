//! Tower middleware enforcing a fixed-window policy per request.
//!
//! The layer holds a shared [`WindowStore`], a [`Policy`], and a key-extraction
//! closure. Denied requests short-circuit with
//! [`ThrottleError::Throttled`] before the inner service runs; the verdict it
//! carries has everything an HTTP adapter needs for a 429 response and its
//! `X-RateLimit-*` headers.

use super::{Policy, RateLimitResult, WindowStore};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

/// Error type produced by [`ThrottleService`].
#[derive(Debug)]
pub enum ThrottleError<E> {
    /// The inner service failed.
    Inner(E),
    /// The request exceeded the window quota.
    Throttled(RateLimitResult),
}

impl<E> ThrottleError<E> {
    pub fn is_throttled(&self) -> bool {
        matches!(self, ThrottleError::Throttled(_))
    }

    pub fn into_inner(self) -> Option<E> {
        match self {
            ThrottleError::Inner(error) => Some(error),
            ThrottleError::Throttled(_) => None,
        }
    }

    /// The denial verdict, if this is a throttle rejection.
    pub fn verdict(&self) -> Option<&RateLimitResult> {
        match self {
            ThrottleError::Throttled(verdict) => Some(verdict),
            ThrottleError::Inner(_) => None,
        }
    }
}

impl<E: std::fmt::Display> std::fmt::Display for ThrottleError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThrottleError::Inner(error) => write!(f, "{error}"),
            ThrottleError::Throttled(verdict) => {
                write!(f, "rate limit exceeded (limit {} per window)", verdict.limit)
            }
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for ThrottleError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ThrottleError::Inner(error) => Some(error),
            ThrottleError::Throttled(_) => None,
        }
    }
}

/// Layer applying a throttling policy to a service.
pub struct ThrottleLayer<F> {
    store: Arc<WindowStore>,
    policy: Policy,
    key: Arc<F>,
}

impl<F> ThrottleLayer<F> {
    /// `key` extracts the client identifier from a request, typically via
    /// [`super::client_id_from_headers`].
    pub fn new(store: Arc<WindowStore>, policy: Policy, key: F) -> Self {
        Self { store, policy, key: Arc::new(key) }
    }
}

impl<F> Clone for ThrottleLayer<F> {
    fn clone(&self) -> Self {
        Self { store: self.store.clone(), policy: self.policy.clone(), key: self.key.clone() }
    }
}

impl<S, F> Layer<S> for ThrottleLayer<F> {
    type Service = ThrottleService<S, F>;

    fn layer(&self, inner: S) -> Self::Service {
        ThrottleService {
            inner,
            store: self.store.clone(),
            policy: self.policy.clone(),
            key: self.key.clone(),
        }
    }
}

/// Service produced by [`ThrottleLayer`].
pub struct ThrottleService<S, F> {
    inner: S,
    store: Arc<WindowStore>,
    policy: Policy,
    key: Arc<F>,
}

impl<S: Clone, F> Clone for ThrottleService<S, F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            store: self.store.clone(),
            policy: self.policy.clone(),
            key: self.key.clone(),
        }
    }
}

impl<S, F, Req> Service<Req> for ThrottleService<S, F>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    F: Fn(&Req) -> String + Send + Sync + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = ThrottleError<S::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(ThrottleError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        // The check is synchronous; only the inner call is awaited.
        let verdict = self.store.check(&(self.key)(&req), &self.policy);
        let mut inner = self.inner.clone();
        Box::pin(async move {
            if !verdict.allowed {
                return Err(ThrottleError::Throttled(verdict));
            }
            inner.call(req).await.map_err(ThrottleError::Inner)
        })
    }
}
