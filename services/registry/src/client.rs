//! The registry client: repository, tag and manifest lookups.

use std::collections::HashSet;

use api_client::{ApiClient, BasicAuth, RequestBuilder};
use bytes::Bytes;
use chrono::Utc;
use futures::stream::{self, StreamExt as _};
use http::{HeaderMap, StatusCode, header};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::config::{RegistryConfig, SizeStrategy};
use crate::error::RegistryError;
use crate::manifest::{
    DOCKER_CONTENT_DIGEST, MANIFEST_V2, approximate_size_from_digest, manifest_layer_size,
    media_type, validate_reference, validate_repository,
};
use crate::models::{Catalog, ManifestInfo, RepositoryDetailInfo, RepositoryInfo, TagInfo, TagList};
use crate::outcome::{Outcome, Stop, guarded};

type Auth = Option<BasicAuth>;

/// A successful response, read in full while its permit was held.
#[derive(Debug)]
pub(crate) struct Fetched {
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
}

/// Limits the upstream requests one operation has in flight.
///
/// Permits are taken per HTTP exchange, never across nested lookups, so a fan-out
/// inside a fan-out cannot starve itself.
#[derive(Debug)]
pub(crate) struct FanOut {
    permits: Semaphore,
    width: usize,
}

impl FanOut {
    pub(crate) fn new(width: usize) -> Self {
        let width = width.max(1);
        Self {
            permits: Semaphore::new(width),
            width,
        }
    }

    pub(crate) fn width(&self) -> usize {
        self.width
    }
}

/// A client for a Docker Registry HTTP API V2 server.
///
/// Cloning is cheap; clones share the connection pool and settings. Each operation
/// takes a [`CancellationToken`] and returns an [`Outcome`].
#[derive(Debug, Clone)]
pub struct RegistryClient {
    client: ApiClient<Auth>,
    concurrency: usize,
    page_size: Option<usize>,
    size_strategy: SizeStrategy,
}

impl RegistryClient {
    /// Connect to the registry described by `config`.
    pub fn new(config: &RegistryConfig) -> Self {
        let client = ApiClient::with_options(
            config.url.clone(),
            config.credentials(),
            config.client_options(),
        );
        Self::from_api_client(config, client)
    }

    /// Send requests through `transport` instead of the network.
    pub fn with_transport<S>(config: &RegistryConfig, transport: S) -> Self
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
        let client = ApiClient::new_with_inner_service(
            config.url.clone(),
            config.credentials(),
            config.client_options(),
            transport,
        );
        Self::from_api_client(config, client)
    }

    fn from_api_client(config: &RegistryConfig, client: ApiClient<Auth>) -> Self {
        Self {
            client,
            concurrency: config.concurrency(),
            page_size: config.page_size,
            size_strategy: config.size_strategy,
        }
    }

    /// The underlying HTTP client.
    pub fn api_client(&self) -> &ApiClient<Auth> {
        &self.client
    }

    pub(crate) fn fan_out(&self) -> FanOut {
        FanOut::new(self.concurrency)
    }

    /// List every repository in the catalog, with its tag count.
    ///
    /// A repository whose tags cannot be listed is reported with zero tags.
    #[tracing::instrument(skip_all)]
    pub async fn list_repositories(
        &self,
        cancel: &CancellationToken,
    ) -> Outcome<Vec<RepositoryInfo>> {
        let fanout = self.fan_out();
        guarded(cancel, self.repositories(&fanout)).await
    }

    /// A repository and all of its tags.
    ///
    /// A repository with no tags is found with an empty tag list; one the registry
    /// does not know is [`Outcome::Missing`].
    #[tracing::instrument(skip(self, cancel))]
    pub async fn get_repository(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Outcome<RepositoryDetailInfo> {
        let fanout = self.fan_out();
        guarded(cancel, self.repository_detail(&fanout, name)).await
    }

    /// Every tag of `repository`, in registry order, each resolved to its manifest digest.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn list_tags(
        &self,
        repository: &str,
        cancel: &CancellationToken,
    ) -> Outcome<Vec<TagInfo>> {
        let fanout = self.fan_out();
        guarded(cancel, self.tags(&fanout, repository)).await
    }

    /// Fetch the manifest for a tag or digest.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn get_manifest(
        &self,
        repository: &str,
        reference: &str,
        cancel: &CancellationToken,
    ) -> Outcome<ManifestInfo> {
        let fanout = self.fan_out();
        guarded(cancel, self.manifest(&fanout, repository, reference)).await
    }

    /// Send one request under a permit and read its body.
    ///
    /// `404` becomes [`Stop::Missing`]; other failures become [`Stop::Failed`].
    pub(crate) async fn fetch(
        &self,
        fanout: &FanOut,
        request: RequestBuilder<Auth>,
        path: &str,
    ) -> Result<Fetched, Stop> {
        let _permit = fanout.permits.acquire().await.ok();

        let response = request
            .send()
            .await
            .map_err(|error| RegistryError::from_client(path, error))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Stop::Missing);
        }
        if !status.is_success() {
            let error = api_client::HttpResponseError::from_response(response).await;
            return Err(RegistryError::from_client(path, error.into()).into());
        }

        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|error| RegistryError::from_client(path, error))?;
        tracing::trace!(path, bytes = body.len(), "fetched");

        Ok(Fetched { headers, body })
    }

    /// Follow the catalog's `Link` pagination and collect every repository name.
    pub(crate) async fn catalog(&self, fanout: &FanOut) -> Result<Vec<String>, Stop> {
        let mut names = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(String::from("/v2/_catalog"));
        let mut first = true;

        while let Some(path) = next.take() {
            if !seen.insert(path.clone()) {
                tracing::warn!(%path, "catalog pagination repeated a page");
                break;
            }

            let mut request = self.client.get(&path);
            if let (true, Some(n)) = (first, self.page_size) {
                request = request.query(&[("n", n)]);
            }
            first = false;

            let fetched = self.fetch(fanout, request, &path).await?;
            let page: Catalog = decode(&path, &fetched.body)?;
            names.extend(page.repositories);
            next = api_client::link::next_link(&fetched.headers);
        }

        Ok(names)
    }

    pub(crate) async fn repositories(&self, fanout: &FanOut) -> Result<Vec<RepositoryInfo>, Stop> {
        tracing::debug!("fetching repositories from registry");
        let names = self.catalog(fanout).await.inspect_err(|stop| {
            stop.error("failed to fetch repository catalog");
        })?;

        let repositories: Vec<RepositoryInfo> = stream::iter(names)
            .map(|name| async move {
                let tag_count = match self.tags(fanout, &name).await {
                    Ok(tags) => tags.len(),
                    Err(_) => 0,
                };
                RepositoryInfo {
                    name,
                    tag_count,
                    last_pushed: Some(Utc::now()),
                }
            })
            .buffered(fanout.width())
            .collect()
            .await;

        tracing::info!(count = repositories.len(), "fetched repositories");
        Ok(repositories)
    }

    pub(crate) async fn repository_detail(
        &self,
        fanout: &FanOut,
        name: &str,
    ) -> Result<RepositoryDetailInfo, Stop> {
        let tags = self.tags(fanout, name).await?;
        let total_size = tags.iter().map(|tag| tag.size).sum();

        Ok(RepositoryDetailInfo {
            info: RepositoryInfo {
                name: name.to_owned(),
                tag_count: tags.len(),
                last_pushed: Some(Utc::now()),
            },
            total_size,
            tags,
        })
    }

    pub(crate) async fn tags(&self, fanout: &FanOut, repository: &str) -> Result<Vec<TagInfo>, Stop> {
        validate_repository(repository)?;
        let path = format!("/v2/{repository}/tags/list");

        let fetched = self
            .fetch(fanout, self.client.get(&path), &path)
            .await
            .inspect_err(|stop| stop.warn("failed to fetch tags"))?;
        let list: TagList = decode(&path, &fetched.body)?;
        let names = list.names();

        let tags: Vec<TagInfo> = stream::iter(names)
            .map(|name| self.resolve_tag(fanout, repository, name))
            .buffered(fanout.width())
            .collect()
            .await;

        tracing::debug!(repository, count = tags.len(), "fetched tags");
        Ok(tags)
    }

    async fn resolve_tag(&self, fanout: &FanOut, repository: &str, name: String) -> TagInfo {
        let manifest = self.manifest(fanout, repository, &name).await.ok();
        let digest = manifest.as_ref().and_then(|manifest| manifest.digest.clone());

        let size = match self.size_strategy {
            SizeStrategy::DigestLength => approximate_size_from_digest(digest.as_deref()),
            SizeStrategy::ManifestLayers => manifest
                .as_ref()
                .and_then(|manifest| manifest_layer_size(&manifest.config))
                .unwrap_or(0),
        };

        TagInfo {
            name,
            size,
            created: Some(Utc::now()),
            digest,
        }
    }

    pub(crate) async fn manifest(
        &self,
        fanout: &FanOut,
        repository: &str,
        reference: &str,
    ) -> Result<ManifestInfo, Stop> {
        validate_repository(repository)?;
        validate_reference(reference)?;
        let path = format!("/v2/{repository}/manifests/{reference}");

        let request = self.client.get(&path).header(header::ACCEPT, MANIFEST_V2);
        let fetched = self
            .fetch(fanout, request, &path)
            .await
            .inspect_err(|stop| stop.warn("failed to fetch manifest"))?;

        Ok(ManifestInfo {
            content_type: header_str(&fetched.headers, header::CONTENT_TYPE.as_str())
                .and_then(media_type)
                .unwrap_or_else(|| MANIFEST_V2.to_owned()),
            digest: header_str(&fetched.headers, DOCKER_CONTENT_DIGEST).map(str::to_owned),
            config: String::from_utf8_lossy(&fetched.body).into_owned(),
        })
    }
}

fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
}

fn decode<T: serde::de::DeserializeOwned>(path: &str, body: &[u8]) -> Result<T, Stop> {
    serde_json::from_slice(body)
        .map_err(|error| RegistryError::from_client(path, error.into()).into())
}
