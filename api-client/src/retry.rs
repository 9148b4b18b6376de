use std::time::Duration;

use http::{Method, StatusCode};
use hyperdriver::Body;
use tower::retry::Policy;

/// Retry policy for idempotent requests, with exponential backoff.
///
/// Only `GET` and `HEAD` are ever retried. A request is retried after a transport
/// error, a `408`/`504`, any other `5xx`, or a `429` (honouring `Retry-After` in seconds).
/// Requests that hit the client timeout are not retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    remaining: usize,
    delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// A policy allowing up to `attempts` retries after the first try.
    pub fn new(attempts: usize) -> Self {
        Self {
            remaining: attempts,
            delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }

    /// A policy which never retries.
    pub fn none() -> Self {
        Self::new(0)
    }

    /// Set the first backoff delay and the ceiling it doubles up to.
    pub fn with_backoff(mut self, delay: Duration, max_delay: Duration) -> Self {
        self.delay = delay;
        self.max_delay = max_delay;
        self
    }

    /// Number of retries left.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    fn advance(&mut self, wait: Duration) -> tokio::time::Sleep {
        self.remaining -= 1;
        self.delay = self.delay.saturating_mul(2).min(self.max_delay);
        tokio::time::sleep(wait)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

fn is_idempotent(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD)
}

fn retry_after(headers: &http::HeaderMap) -> Option<Duration> {
    headers
        .get(http::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

impl Policy<http::Request<Body>, http::Response<Body>, hyperdriver::client::Error>
    for RetryPolicy
{
    type Future = tokio::time::Sleep;

    fn retry(
        &mut self,
        req: &mut http::Request<Body>,
        result: &mut Result<http::Response<Body>, hyperdriver::client::Error>,
    ) -> Option<Self::Future> {
        if self.remaining == 0 || !is_idempotent(req.method()) {
            return None;
        }

        let wait = match result {
            Ok(res) => match res.status() {
                StatusCode::TOO_MANY_REQUESTS => {
                    tracing::debug!("retrying request to {} due to rate limit", req.uri());
                    retry_after(res.headers())
                        .map(|wait| wait.min(self.max_delay))
                        .unwrap_or(self.delay)
                }
                status if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT => {
                    tracing::debug!(%status, "retrying request to {}", req.uri());
                    self.delay
                }
                _ => return None,
            },
            Err(hyperdriver::client::Error::RequestTimeout) => return None,
            Err(error) => {
                tracing::warn!(%error, "retrying request to {} due to error", req.uri());
                self.delay
            }
        };

        Some(self.advance(wait))
    }

    fn clone_request(&mut self, req: &http::Request<Body>) -> Option<http::Request<Body>> {
        if self.remaining == 0 || !is_idempotent(req.method()) {
            return None;
        }
        try_clone_request(req)
    }
}

fn try_clone_request(req: &http::Request<Body>) -> Option<http::Request<Body>> {
    let body = req.body().try_clone()?;

    let mut next = http::Request::new(body);
    *next.method_mut() = req.method().clone();
    *next.uri_mut() = req.uri().clone();
    *next.version_mut() = req.version();
    *next.headers_mut() = req.headers().clone();
    *next.extensions_mut() = req.extensions().clone();

    Some(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_after_is_read_in_seconds() {
        let mut headers = http::HeaderMap::new();
        headers.insert(http::header::RETRY_AFTER, "3".parse().unwrap());
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(3)));

        headers.insert(
            http::header::RETRY_AFTER,
            "Wed, 21 Oct 2015 07:28:00 GMT".parse().unwrap(),
        );
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn only_reads_are_idempotent() {
        assert!(is_idempotent(&Method::GET));
        assert!(is_idempotent(&Method::HEAD));
        assert!(!is_idempotent(&Method::DELETE));
        assert!(!is_idempotent(&Method::POST));
    }

    #[tokio::test]
    async fn backoff_doubles_up_to_ceiling() {
        let mut policy = RetryPolicy::new(3)
            .with_backoff(Duration::from_millis(1), Duration::from_millis(3));

        drop(policy.advance(Duration::ZERO));
        assert_eq!(policy.delay, Duration::from_millis(2));
        drop(policy.advance(Duration::ZERO));
        assert_eq!(policy.delay, Duration::from_millis(3));
        assert_eq!(policy.remaining(), 1);
    }
}
