//! URI utilities.

use camino::Utf8Path;
use http::uri::PathAndQuery;
use http::Uri;

/// Serialize and Deserialize a URI to and from a string.
pub mod serde {
    use http::Uri;
    use serde::{Deserialize as _, Deserializer};

    /// Deserialize a URI from a string, requiring a scheme and host.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Uri, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let uri: Uri = s.parse().map_err(serde::de::Error::custom)?;
        if uri.scheme().is_none() || uri.authority().is_none() {
            return Err(serde::de::Error::custom(format!(
                "expected an absolute URL, got {s:?}"
            )));
        }
        Ok(uri)
    }

    /// Serialize a URI as a string
    pub fn serialize<S>(uri: &Uri, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(uri)
    }
}

/// Extension trait for URIs.
pub trait UriExtension: Sized {
    /// Join a path (which may carry a query) onto this URI's path.
    ///
    /// Absolute paths replace the existing path.
    fn join<P: AsRef<str>>(self, path: P) -> Result<Uri, http::Error>;

    /// Append an already-encoded query string to any existing query.
    fn with_query(self, query: &str) -> Result<Uri, http::Error>;
}

impl UriExtension for Uri {
    fn join<P: AsRef<str>>(self, path: P) -> Result<Uri, http::Error> {
        let mut parts = self.into_parts();

        let base = parts
            .path_and_query
            .as_ref()
            .map(PathAndQuery::path)
            .unwrap_or("/");
        let joined = Utf8Path::new(base).join(path.as_ref());

        parts.path_and_query = Some(PathAndQuery::from_maybe_shared(joined.into_string())?);
        Ok(Uri::from_parts(parts)?)
    }

    fn with_query(self, query: &str) -> Result<Uri, http::Error> {
        let mut parts = self.into_parts();

        let combined = match parts.path_and_query.as_ref() {
            Some(pq) => match pq.query() {
                Some(existing) if !existing.is_empty() => {
                    format!("{}?{existing}&{query}", pq.path())
                }
                _ => format!("{}?{query}", pq.path()),
            },
            None => format!("/?{query}"),
        };

        parts.path_and_query = Some(PathAndQuery::from_maybe_shared(combined)?);
        Ok(Uri::from_parts(parts)?)
    }
}
