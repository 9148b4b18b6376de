//! Building and sending requests through an [`ApiClient`].

use http::{header::HeaderValue, HeaderName, Uri};
use serde::Serialize;

use crate::error::Error;
use crate::uri::UriExtension as _;
use crate::{response::ApiResponse, ApiClient};

/// Snapshot of the method, URI and headers of a request, kept alongside its response.
pub(crate) fn parts<B>(req: &http::Request<B>) -> http::request::Parts {
    let (mut parts, _) = http::Request::new(()).into_parts();
    parts.method = req.method().clone();
    parts.uri = req.uri().clone();
    parts.version = req.version();
    parts.headers = req.headers().clone();
    parts
}

/// A request under construction.
///
/// Problems found while building (a bad header, an unencodable query) are held
/// until [`RequestBuilder::send`], so builder calls can be chained.
#[derive(Debug)]
pub struct RequestBuilder<A> {
    req: http::request::Builder,
    client: ApiClient<A>,
    error: Option<Error>,
}

impl<A> RequestBuilder<A> {
    pub(crate) fn new(
        client: ApiClient<A>,
        uri: Result<Uri, http::Error>,
        method: http::Method,
    ) -> Self {
        let req = http::Request::builder().method(method);
        let (req, error) = match uri {
            Ok(uri) => (req.uri(uri), None),
            Err(error) => (req, Some(Error::Build(error))),
        };

        Self {
            req,
            client,
            error,
        }
    }

    /// Add a header to the request.
    pub fn header<K, V>(mut self, key: K, value: V) -> Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        self.req = self.req.header(key, value);
        self
    }

    /// Append url-encoded query parameters to the request URI.
    pub fn query<T: Serialize + ?Sized>(mut self, query: &T) -> Self {
        if self.error.is_some() {
            return self;
        }

        let encoded = match serde_urlencoded::to_string(query) {
            Ok(encoded) => encoded,
            Err(error) => {
                self.error = Some(Error::Query(error));
                return self;
            }
        };

        if encoded.is_empty() {
            return self;
        }

        let Some(uri) = self.req.uri_ref().cloned() else {
            return self;
        };

        match uri.with_query(&encoded) {
            Ok(uri) => self.req = self.req.uri(uri),
            Err(error) => self.error = Some(Error::Build(error)),
        }
        self
    }

    /// Send the request, returning the response whatever its status.
    pub async fn send(self) -> Result<ApiResponse, Error> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let req = self.req.body(hyperdriver::Body::empty())?;
        Ok(self.client.execute(req).await?)
    }
}

#[cfg(test)]
mod tests {
    use http::{Method, StatusCode};

    use crate::mock::{MockResponse, MockService};
    use crate::{ApiClient, ClientOptions};

    fn client(mock: &MockService) -> ApiClient<()> {
        ApiClient::new_with_inner_service(
            "http://registry.test".parse().unwrap(),
            (),
            ClientOptions::default(),
            mock.clone(),
        )
    }

    #[tokio::test]
    async fn query_is_appended() {
        let mock = MockService::new();
        mock.get("/v2/_catalog?n=50", MockResponse::new(StatusCode::OK));

        let client = client(&mock);
        let response = client
            .get("/v2/_catalog")
            .query(&[("n", 50)])
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.uri().query(), Some("n=50"));
    }

    #[tokio::test]
    async fn query_extends_existing_query() {
        let mock = MockService::new();
        let client = client(&mock);
        client
            .get("/v2/_catalog?last=b")
            .query(&[("n", 2)])
            .send()
            .await
            .unwrap();

        let requests = mock.requests();
        assert_eq!(requests[0].uri.query(), Some("last=b&n=2"));
        assert_eq!(mock.count(Method::GET, "/v2/_catalog"), 1);
    }

    #[tokio::test]
    async fn invalid_path_fails_at_send() {
        let mock = MockService::new();
        let client = client(&mock);

        let err = client.get("/v2/bad name/tags/list").send().await.unwrap_err();
        assert!(matches!(err, crate::Error::Build(_)), "{err:?}");
        assert!(mock.requests().is_empty());
    }
}
