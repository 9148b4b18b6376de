//! The result type returned by every registry operation.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::RegistryError;

/// What became of a registry operation.
///
/// Unlike a `Result`, an `Outcome` separates an entity the registry does not
/// know ([`Outcome::Missing`]) from a failed call ([`Outcome::Failed`]) and from
/// a call abandoned by its caller ([`Outcome::Cancelled`]).
#[derive(Debug)]
#[must_use]
pub enum Outcome<T> {
    /// The operation completed.
    Found(T),
    /// The registry does not know the entity.
    Missing,
    /// The registry could not be queried, or answered with an error.
    Failed(RegistryError),
    /// The cancellation token fired before the operation completed.
    Cancelled,
}

impl<T> Outcome<T> {
    /// Whether the operation completed.
    pub fn is_found(&self) -> bool {
        matches!(self, Outcome::Found(_))
    }

    /// Whether the operation was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    /// The value, if the operation completed.
    pub fn into_option(self) -> Option<T> {
        match self {
            Outcome::Found(value) => Some(value),
            _ => None,
        }
    }

    /// The failure, for [`Outcome::Failed`].
    pub fn error(&self) -> Option<&RegistryError> {
        match self {
            Outcome::Failed(error) => Some(error),
            _ => None,
        }
    }
}

impl<T> Outcome<Vec<T>> {
    /// The items, or an empty list for any outcome other than `Found`.
    pub fn into_items(self) -> Vec<T> {
        self.into_option().unwrap_or_default()
    }
}

/// Why an internal step stopped short of a value.
#[derive(Debug)]
pub(crate) enum Stop {
    Missing,
    Failed(RegistryError),
}

impl Stop {
    /// Log at warning level, for lookups whose failure is tolerated.
    pub(crate) fn warn(&self, context: &str) {
        match self {
            Stop::Missing => tracing::warn!("{context}: not found"),
            Stop::Failed(error) => tracing::warn!(%error, "{context}"),
        }
    }

    /// Log at error level, for calls the operation depends on.
    pub(crate) fn error(&self, context: &str) {
        match self {
            Stop::Missing => tracing::error!("{context}: not found"),
            Stop::Failed(error) => tracing::error!(%error, "{context}"),
        }
    }
}

impl From<RegistryError> for Stop {
    fn from(error: RegistryError) -> Self {
        Stop::Failed(error)
    }
}

impl<T> From<Result<T, Stop>> for Outcome<T> {
    fn from(result: Result<T, Stop>) -> Self {
        match result {
            Ok(value) => Outcome::Found(value),
            Err(Stop::Missing) => Outcome::Missing,
            Err(Stop::Failed(error)) => Outcome::Failed(error),
        }
    }
}

/// Run `operation` until it finishes or `cancel` fires, whichever is first.
///
/// On cancellation the operation future is dropped, which aborts its in-flight requests.
pub(crate) async fn guarded<T, F>(cancel: &CancellationToken, operation: F) -> Outcome<T>
where
    F: Future<Output = Result<T, Stop>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::debug!("operation cancelled");
            Outcome::Cancelled
        }
        result = operation => result.into(),
    }
}
