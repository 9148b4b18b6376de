//! Error types for the registry

use http::StatusCode;

/// Why an upstream registry call failed.
///
/// A `404 Not Found` is not an error here; it is reported as [`crate::Outcome::Missing`].
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The registry answered with a non-success status
    #[error("{path}: registry answered {status}: {message}")]
    Status {
        /// Upstream path requested
        path: String,
        /// Status code returned
        status: StatusCode,
        /// Response body, if any
        message: String,
    },

    /// The configured request timeout elapsed
    #[error("{path}: request timed out")]
    Timeout {
        /// Upstream path requested
        path: String,
    },

    /// The request could not be sent or the connection failed
    #[error("{path}: request failed: {source}")]
    Request {
        /// Upstream path requested
        path: String,
        /// Underlying client error
        #[source]
        source: api_client::Error,
    },

    /// The response body could not be read or decoded
    #[error("{path}: invalid response body: {source}")]
    Body {
        /// Upstream path requested
        path: String,
        /// Underlying client error
        #[source]
        source: api_client::Error,
    },

    /// A repository name or reference is not valid in a registry path
    #[error("invalid name: {0:?}")]
    InvalidName(String),
}

impl RegistryError {
    pub(crate) fn from_client(path: &str, error: api_client::Error) -> Self {
        let path = path.to_owned();
        match error {
            error if error.is_timeout() => RegistryError::Timeout { path },
            api_client::Error::Response(response) => RegistryError::Status {
                path,
                status: response.status,
                message: response.message,
            },
            error @ (api_client::Error::ResponseBody(_) | api_client::Error::Decode(_)) => {
                RegistryError::Body {
                    path,
                    source: error,
                }
            }
            error => RegistryError::Request {
                path,
                source: error,
            },
        }
    }

    /// Whether the configured timeout caused this error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, RegistryError::Timeout { .. })
    }

    /// The upstream status code, for [`RegistryError::Status`].
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RegistryError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
