//! Error types for API Clients
use std::fmt;

use http::StatusCode;
use thiserror::Error;

use crate::response::ApiResponse;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// An error occured while sending or recieving an HTTP request
#[derive(Debug, Error)]
pub enum Error {
    /// An HTTP response error occured
    #[error(transparent)]
    Response(#[from] HttpResponseError),

    /// An error occured while recieving the response body
    #[error("Error reading response body: {0}")]
    ResponseBody(#[source] BoxError),

    /// The response body was not the expected JSON document
    #[error("Error decoding response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// An error occured while sending the request
    #[error(transparent)]
    Request(hyperdriver::client::Error),

    /// The request could not be assembled
    #[error("Invalid request: {0}")]
    Build(#[from] http::Error),

    /// The query string could not be encoded
    #[error("Invalid query string: {0}")]
    Query(#[from] serde_urlencoded::ser::Error),

    /// The per-request deadline passed before a response arrived
    #[error("Request timed out")]
    Timeout,
}

impl Error {
    /// Whether this error was caused by a request deadline, at either the request
    /// or the client level.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::Timeout | Error::Request(hyperdriver::client::Error::RequestTimeout)
        )
    }
}

impl From<hyperdriver::client::Error> for Error {
    fn from(error: hyperdriver::client::Error) -> Self {
        match error {
            hyperdriver::client::Error::RequestTimeout => Error::Timeout,
            other => Error::Request(other),
        }
    }
}

/// A server returned an error response
#[derive(Debug, Clone)]
pub struct HttpResponseError {
    /// The HTTP status code of the response
    pub status: StatusCode,

    /// The message body of the response
    pub message: String,
}

impl HttpResponseError {
    /// Create a new HTTP response error from a response
    pub async fn from_response(response: ApiResponse) -> Self {
        let status = response.status();
        let message = response
            .text()
            .await
            .unwrap_or_else(|err| format!("Failed to read response body: {}", err));

        Self { status, message }
    }
}

impl fmt::Display for HttpResponseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "HTTP {} response: {}", self.status, self.message)
    }
}

impl std::error::Error for HttpResponseError {}
