//! A scripted transport for testing API clients without a network.
//!
//! Responses are registered per method and path (optionally with a query). Every
//! request is recorded, and requests which are still waiting on a response are
//! counted so tests can observe concurrency and cancellation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode, Uri};
use parking_lot::Mutex;

/// A canned response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    delay: Option<Duration>,
    hang: bool,
}

impl MockResponse {
    /// An empty response with `status`.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            delay: None,
            hang: false,
        }
    }

    /// A `200 OK` response with a JSON body.
    pub fn json(value: &serde_json::Value) -> Self {
        Self::new(StatusCode::OK)
            .header("content-type", "application/json")
            .body(value.to_string())
    }

    /// A response which never arrives.
    pub fn pending() -> Self {
        Self {
            hang: true,
            ..Self::new(StatusCode::OK)
        }
    }

    /// Add a header. Names must be lowercase.
    pub fn header(mut self, name: &'static str, value: &str) -> Self {
        let value = HeaderValue::from_str(value).expect("mock header value is valid");
        self.headers.append(HeaderName::from_static(name), value);
        self
    }

    /// Set the body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Wait before responding.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn to_response(&self) -> http::Response<hyperdriver::Body> {
        let mut response = http::Response::new(hyperdriver::Body::from(self.body.clone()));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers.clone();
        response
    }
}

/// A request seen by the [`MockService`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Request method.
    pub method: Method,
    /// Full request URI.
    pub uri: Uri,
    /// Request headers, after authentication was applied.
    pub headers: HeaderMap,
}

impl RecordedRequest {
    fn matches(&self, method: &Method, path: &str) -> bool {
        self.method == *method
            && (self.uri.path() == path
                || self.uri.path_and_query().is_some_and(|pq| pq.as_str() == path))
    }
}

#[derive(Debug, Default)]
struct MockState {
    routes: Mutex<HashMap<(Method, String), MockResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

/// Tracks a request from the moment it is sent until its future completes or is dropped.
struct InFlight(Arc<MockState>);

impl InFlight {
    fn start(state: Arc<MockState>) -> Self {
        let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        state.peak.fetch_max(now, Ordering::SeqCst);
        InFlight(state)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A [`tower::Service`] that answers from registered [`MockResponse`]s.
///
/// Clones share routes and recordings. Unregistered routes answer `404 Not Found`.
#[derive(Debug, Default, Clone)]
pub struct MockService {
    state: Arc<MockState>,
}

impl MockService {
    /// An empty mock, which answers `404` to everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a response. `path` may include a query, which must then match exactly.
    pub fn on(&self, method: Method, path: &str, response: MockResponse) {
        self.state
            .routes
            .lock()
            .insert((method, path.to_owned()), response);
    }

    /// Register a response to `GET path`.
    pub fn get(&self, path: &str, response: MockResponse) {
        self.on(Method::GET, path, response)
    }

    /// Register a response to `DELETE path`.
    pub fn delete(&self, path: &str, response: MockResponse) {
        self.on(Method::DELETE, path, response)
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().clone()
    }

    /// Number of requests received for `method` and `path` (with or without query).
    pub fn count(&self, method: Method, path: &str) -> usize {
        self.state
            .requests
            .lock()
            .iter()
            .filter(|req| req.matches(&method, path))
            .count()
    }

    /// Requests which have been sent but have neither completed nor been dropped.
    pub fn in_flight(&self) -> usize {
        self.state.in_flight.load(Ordering::SeqCst)
    }

    /// The highest number of requests that were in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.state.peak.load(Ordering::SeqCst)
    }

    fn lookup(&self, method: &Method, uri: &Uri) -> Option<MockResponse> {
        let routes = self.state.routes.lock();
        let exact = uri.path_and_query().map(|pq| pq.as_str().to_owned());
        exact
            .and_then(|key| routes.get(&(method.clone(), key)))
            .or_else(|| routes.get(&(method.clone(), uri.path().to_owned())))
            .cloned()
    }
}

impl tower::Service<http::Request<hyperdriver::Body>> for MockService {
    type Response = http::Response<hyperdriver::Body>;
    type Error = hyperdriver::client::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<hyperdriver::Body>) -> Self::Future {
        self.state.requests.lock().push(RecordedRequest {
            method: req.method().clone(),
            uri: req.uri().clone(),
            headers: req.headers().clone(),
        });

        let response = self
            .lookup(req.method(), req.uri())
            .unwrap_or_else(|| MockResponse::new(StatusCode::NOT_FOUND));
        let guard = InFlight::start(self.state.clone());

        Box::pin(async move {
            let _guard = guard;
            if response.hang {
                std::future::pending::<()>().await;
            }
            if let Some(delay) = response.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(response.to_response())
        })
    }
}
