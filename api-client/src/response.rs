//! Responses returned by an [`crate::ApiClient`].

use bytes::Bytes;
use http_body_util::BodyExt as _;
use hyperdriver::Body;

use crate::error::Error;

/// An HTTP response, kept together with the parts of the request which produced it.
#[derive(Debug)]
pub struct ApiResponse {
    request: http::request::Parts,
    response: http::response::Parts,
    body: Body,
}

impl ApiResponse {
    /// Wrap a response and the request that generated it.
    pub fn new(request: http::request::Parts, response: http::Response<Body>) -> Self {
        let (response, body) = response.into_parts();
        Self {
            request,
            response,
            body,
        }
    }

    /// Status code of the response.
    pub fn status(&self) -> http::StatusCode {
        self.response.status
    }

    /// Headers of the response.
    pub fn headers(&self) -> &http::HeaderMap {
        &self.response.headers
    }

    /// URI of the request that generated the response.
    pub fn uri(&self) -> &http::Uri {
        &self.request.uri
    }

    /// Collect the whole body.
    pub async fn bytes(self) -> Result<Bytes, Error> {
        let collected = self
            .body
            .collect()
            .await
            .map_err(|err| Error::ResponseBody(err.into()))?;
        Ok(collected.to_bytes())
    }

    /// Collect the body as UTF-8 text.
    pub async fn text(self) -> Result<String, Error> {
        let bytes = self.bytes().await?;
        String::from_utf8(bytes.to_vec()).map_err(|err| Error::ResponseBody(err.into()))
    }
}
