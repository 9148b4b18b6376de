//! A small HTTP client for JSON APIs, built on hyperdriver and tower.
//!
//! [`ApiClient`] owns a base URI, an [`Authentication`] mechanism, and a
//! tower service stack (authentication, retry, timeout) over a hyperdriver transport.
//! Service crates wrap an `ApiClient` and add their own typed endpoints.
#![allow(clippy::arc_with_non_send_sync)]

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use http::Method;
use http::Uri;
use hyperdriver::service::SharedService;
use tower::ServiceExt;

mod authentication;
mod error;
pub mod link;
pub mod mock;
pub mod request;
pub mod response;
mod retry;
mod secret;
mod timeout;
pub mod uri;

pub use self::authentication::{
    basic_auth, Authentication, AuthenticationLayer, AuthenticationService, BasicAuth,
};
pub use self::error::{Error, HttpResponseError};
pub use self::request::RequestBuilder;
pub use self::response::ApiResponse;
pub use self::retry::RetryPolicy;
pub use self::secret::Secret;
pub use self::timeout::{SharedDuration, SharedTimeoutLayer, TimeoutService};
use self::uri::UriExtension as _;

/// Per-request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings for the service stack underneath an [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Deadline for each attempt of a request/response exchange.
    pub timeout: Duration,

    /// Retry policy applied to idempotent requests.
    pub retry: RetryPolicy,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::none(),
        }
    }
}

/// A client for accessing APIs over HTTP / HTTPS
///
/// Useful inner object to wrap for individual API clients. Cloning is cheap,
/// and clones share the service stack and timeout.
#[derive(Debug, Clone)]
pub struct ApiClient<A> {
    base: Uri,
    inner: hyperdriver::client::SharedClientService<hyperdriver::Body, hyperdriver::Body>,
    timeout: SharedDuration,
    authentication: PhantomData<fn() -> A>,
}

impl<A> ApiClient<A>
where
    A: Authentication + Send + Sync + 'static,
{
    /// Create a new API Client over a TCP/TLS transport with custom options.
    pub fn with_options(base: Uri, authentication: A, options: ClientOptions) -> Self {
        let transport = hyperdriver::Client::build_tcp_http()
            .with_default_tls()
            .build_service();

        Self::new_with_inner_service(base, authentication, options, transport)
    }

    /// Create a new API Client which sends requests through `inner`.
    ///
    /// This is how tests substitute a [`mock::MockService`] for the network.
    pub fn new_with_inner_service<S>(
        base: Uri,
        authentication: A,
        options: ClientOptions,
        inner: S,
    ) -> Self
    where
        S: tower::Service<
                http::Request<hyperdriver::Body>,
                Response = http::Response<hyperdriver::Body>,
                Error = hyperdriver::client::Error,
            > + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        let timeout = SharedTimeoutLayer::new(options.timeout);
        let shared = timeout.timeout().clone();

        let service = tower::ServiceBuilder::new()
            .layer(SharedService::layer())
            .layer(AuthenticationLayer::new(Arc::new(authentication)))
            .layer(tower::retry::RetryLayer::new(options.retry))
            .layer(timeout)
            .service(inner);

        ApiClient {
            base,
            inner: service,
            timeout: shared,
            authentication: PhantomData,
        }
    }
}

impl<A> ApiClient<A> {
    /// The per-request timeout currently in use.
    pub fn timeout(&self) -> Duration {
        self.timeout.get()
    }

    /// Change the per-request timeout for this client and all of its clones.
    pub fn set_timeout(&self, timeout: Duration) {
        self.timeout.set(timeout)
    }

    /// Start building a request with `method` against `endpoint`, relative to the base URI.
    pub fn request(&self, method: Method, endpoint: &str) -> RequestBuilder<A>
    where
        A: Clone,
    {
        let uri = self.base.clone().join(endpoint);
        RequestBuilder::new(self.clone(), uri, method)
    }

    /// Start building a GET request.
    pub fn get(&self, endpoint: &str) -> RequestBuilder<A>
    where
        A: Clone,
    {
        self.request(Method::GET, endpoint)
    }

    /// Start building a DELETE request.
    pub fn delete(&self, endpoint: &str) -> RequestBuilder<A>
    where
        A: Clone,
    {
        self.request(Method::DELETE, endpoint)
    }

    /// Send a fully built request through the service stack.
    pub async fn execute(
        &self,
        req: http::Request<hyperdriver::Body>,
    ) -> Result<ApiResponse, hyperdriver::client::Error> {
        let parts = request::parts(&req);

        let response = self.inner.clone().oneshot(req).await?;
        Ok(ApiResponse::new(parts, response))
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use http::StatusCode;

    use super::*;
    use crate::mock::{MockResponse, MockService};

    static_assertions::assert_impl_all!(ApiClient<Option<BasicAuth>>: Send, Sync);
    static_assertions::assert_impl_all!(Error: Send, Sync);

    fn client(mock: &MockService, auth: Option<BasicAuth>) -> ApiClient<Option<BasicAuth>> {
        ApiClient::new_with_inner_service(
            "http://registry.test/".parse().unwrap(),
            auth,
            ClientOptions::default(),
            mock.clone(),
        )
    }

    #[test]
    fn extensions_produce_send_futures() {
        let mock = MockService::new();
        let client = client(&mock, None);
        let builder = client.get("frobulator");

        fn assert_send<T: Send>(_t: T) {}

        let fut = builder.send();
        assert_send(fut);
    }

    #[tokio::test]
    async fn mock_client_works() {
        let mock = MockService::new();
        mock.get("/v2/", MockResponse::new(StatusCode::OK).body("{}"));

        let client = client(&mock, None);
        let response = client.get("/v2/").send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), "{}");
    }

    #[tokio::test]
    async fn basic_auth_is_attached() {
        let mock = MockService::new();
        mock.get("/v2/", MockResponse::new(StatusCode::OK));

        let client = client(&mock, Some(BasicAuth::new("admin", Some("secret"))));
        client.get("/v2/").send().await.unwrap();

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].headers[http::header::AUTHORIZATION],
            "Basic YWRtaW46c2VjcmV0"
        );
    }

    #[tokio::test]
    async fn anonymous_sends_no_authorization() {
        let mock = MockService::new();
        mock.get("/v2/", MockResponse::new(StatusCode::OK));

        let client = client(&mock, None);
        client.get("/v2/").send().await.unwrap();

        assert!(!mock.requests()[0]
            .headers
            .contains_key(http::header::AUTHORIZATION));
    }

    #[tokio::test]
    async fn shared_timeout_expires() {
        let mock = MockService::new();
        mock.get("/slow", MockResponse::pending());

        let client = client(&mock, None);
        client.set_timeout(Duration::from_millis(20));
        assert_eq!(client.timeout(), Duration::from_millis(20));

        let err = client.get("/slow").send().await.unwrap_err();
        assert!(err.is_timeout(), "expected a timeout, got {err:?}");
        assert_eq!(mock.in_flight(), 0);
    }

    #[tokio::test]
    async fn idempotent_requests_are_retried() {
        let mock = MockService::new();
        mock.get("/flaky", MockResponse::new(StatusCode::SERVICE_UNAVAILABLE));
        mock.delete("/flaky", MockResponse::new(StatusCode::SERVICE_UNAVAILABLE));

        let options = ClientOptions {
            retry: RetryPolicy::new(2).with_backoff(Duration::from_millis(1), Duration::from_millis(2)),
            ..Default::default()
        };
        let client: ApiClient<()> = ApiClient::new_with_inner_service(
            "http://registry.test/".parse().unwrap(),
            (),
            options,
            mock.clone(),
        );

        let response = client.get("/flaky").send().await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(mock.count(Method::GET, "/flaky"), 3);

        let response = client.delete("/flaky").send().await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(mock.count(Method::DELETE, "/flaky"), 1);
    }
}
