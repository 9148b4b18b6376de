//! A request timeout whose duration can be changed after the client is built.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A duration shared between clones, stored with millisecond precision.
#[derive(Debug, Clone)]
pub struct SharedDuration {
    millis: Arc<AtomicU64>,
}

impl SharedDuration {
    /// Create a new shared duration
    pub fn new(duration: Duration) -> Self {
        Self {
            millis: Arc::new(AtomicU64::new(as_millis(duration))),
        }
    }

    /// Get the duration stored here.
    pub fn get(&self) -> Duration {
        Duration::from_millis(self.millis.load(Ordering::Acquire))
    }

    /// Set the duration stored here, for every clone.
    pub fn set(&self, duration: Duration) {
        self.millis.store(as_millis(duration), Ordering::Release);
    }
}

fn as_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// A layer to apply a timeout using a [`SharedDuration`]
#[derive(Debug, Clone)]
pub struct SharedTimeoutLayer {
    timeout: SharedDuration,
}

impl SharedTimeoutLayer {
    /// Create a new shared timeout layer with the given timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout: SharedDuration::new(timeout),
        }
    }

    /// Get the shared duration used by this layer.
    pub fn timeout(&self) -> &SharedDuration {
        &self.timeout
    }
}

impl<S> tower::Layer<S> for SharedTimeoutLayer {
    type Service = TimeoutService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimeoutService {
            service: inner,
            timeout: self.timeout.clone(),
        }
    }
}

/// A [tower::Service] which fails requests with
/// [`hyperdriver::client::Error::RequestTimeout`] once the shared duration passes.
#[derive(Debug, Clone)]
pub struct TimeoutService<S> {
    service: S,
    timeout: SharedDuration,
}

impl<S, R> tower::Service<R> for TimeoutService<S>
where
    S: tower::Service<R, Error = hyperdriver::client::Error>,
{
    type Response = S::Response;
    type Error = hyperdriver::client::Error;
    type Future = TimeoutFuture<S::Future>;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&mut self, req: R) -> Self::Future {
        TimeoutFuture {
            inner: tokio::time::timeout(self.timeout.get(), self.service.call(req)),
        }
    }
}

/// Response future for [`TimeoutService`].
#[pin_project::pin_project]
#[derive(Debug)]
pub struct TimeoutFuture<F> {
    #[pin]
    inner: tokio::time::Timeout<F>,
}

impl<F, T> std::future::Future for TimeoutFuture<F>
where
    F: std::future::Future<Output = Result<T, hyperdriver::client::Error>>,
{
    type Output = Result<T, hyperdriver::client::Error>;

    fn poll(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        self.project()
            .inner
            .poll(cx)
            .map(|result| result.unwrap_or(Err(hyperdriver::client::Error::RequestTimeout)))
    }
}
