//! Configuration for the registry client and the panel server.

use std::net::SocketAddr;
use std::time::Duration;

use api_client::{BasicAuth, ClientOptions, RetryPolicy, Secret};
use http::Uri;
use serde::Deserialize;

/// How [`crate::TagInfo::size`] is computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SizeStrategy {
    /// The character length of the manifest digest. Cheap, but not a byte count.
    #[default]
    DigestLength,
    /// The sum of the config and layer sizes listed in the manifest.
    ManifestLayers,
}

/// Connection settings for the upstream registry (`[registry]` in the config file).
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Registry base URL.
    #[serde(with = "api_client::uri::serde")]
    pub url: Uri,

    /// Per-request timeout, in seconds.
    pub timeout_seconds: u64,

    /// User name for Basic authentication. Requests are anonymous without one.
    pub username: Option<String>,

    /// Password for Basic authentication.
    pub password: Option<Secret>,

    /// Upstream requests one operation may have in flight at once.
    pub concurrency: usize,

    /// Extra attempts for failed `GET` requests.
    pub retries: usize,

    /// Catalog page size, sent as `?n=`.
    pub page_size: Option<usize>,

    /// How tag sizes are computed.
    pub size_strategy: SizeStrategy,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: Uri::from_static("http://localhost:5000"),
            timeout_seconds: 30,
            username: None,
            password: None,
            concurrency: 4,
            retries: 0,
            page_size: None,
            size_strategy: SizeStrategy::default(),
        }
    }
}

impl RegistryConfig {
    /// Per-request timeout, at least one second.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.max(1))
    }

    /// Fan-out width, at least one.
    pub fn concurrency(&self) -> usize {
        self.concurrency.max(1)
    }

    /// Basic credentials, when a user name is configured.
    pub fn credentials(&self) -> Option<BasicAuth> {
        self.username
            .as_ref()
            .map(|username| BasicAuth::new(username.clone(), self.password.clone()))
    }

    pub(crate) fn client_options(&self) -> ClientOptions {
        ClientOptions {
            timeout: self.timeout(),
            retry: RetryPolicy::new(self.retries),
        }
    }
}

/// Settings for the panel HTTP server (`[server]` in the config file).
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to listen on.
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 5280)),
        }
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PanelConfig {
    /// Upstream registry.
    pub registry: RegistryConfig,
    /// Panel server.
    pub server: ServerConfig,
}
