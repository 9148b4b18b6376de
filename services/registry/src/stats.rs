//! Registry-wide totals for the panel dashboard.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt as _};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::client::{FanOut, RegistryClient};
use crate::models::RepositoryDetailInfo;
use crate::outcome::{Outcome, Stop, guarded};

/// Totals across the whole registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySummary {
    /// Repositories in the catalog.
    pub total_repositories: usize,
    /// Tags across every repository whose tags could be listed.
    pub total_tags: usize,
    /// Sum of tag sizes, as estimated by the configured size strategy.
    pub total_size: u64,
    /// When the summary was computed.
    pub timestamp: DateTime<Utc>,
}

/// Per-repository totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryStats {
    /// Repository name.
    pub name: String,
    /// Number of tags.
    pub tag_count: usize,
    /// Sum of tag sizes.
    pub total_size: u64,
    /// See [`crate::RepositoryInfo::last_pushed`].
    pub last_pushed: Option<DateTime<Utc>>,
}

impl From<RepositoryDetailInfo> for RepositoryStats {
    fn from(detail: RepositoryDetailInfo) -> Self {
        Self {
            name: detail.info.name,
            tag_count: detail.info.tag_count,
            total_size: detail.total_size,
            last_pushed: detail.info.last_pushed,
        }
    }
}

impl RegistryClient {
    /// Count repositories, tags and bytes across the registry.
    ///
    /// Every catalog entry is counted. Repositories whose tags cannot be listed add
    /// no tags or size.
    #[tracing::instrument(skip_all)]
    pub async fn summary(&self, cancel: &CancellationToken) -> Outcome<RegistrySummary> {
        let fanout = self.fan_out();
        guarded(cancel, async {
            let (total_repositories, details) = self.details(&fanout).await?;
            let summary = RegistrySummary {
                total_repositories,
                total_tags: details.iter().map(|detail| detail.info.tag_count).sum(),
                total_size: details.iter().map(|detail| detail.total_size).sum(),
                timestamp: Utc::now(),
            };
            tracing::info!(
                repositories = summary.total_repositories,
                tags = summary.total_tags,
                "computed registry summary"
            );
            Ok::<_, Stop>(summary)
        })
        .await
    }

    /// Totals for each repository, in catalog order.
    ///
    /// A repository whose tag list answers `404` is reported with zero tags; one
    /// whose tag list fails otherwise is left out.
    #[tracing::instrument(skip_all)]
    pub async fn repository_stats(&self, cancel: &CancellationToken) -> Outcome<Vec<RepositoryStats>> {
        let fanout = self.fan_out();
        guarded(cancel, async {
            let (_, details) = self.details(&fanout).await?;
            Ok::<Vec<RepositoryStats>, Stop>(details.into_iter().map(RepositoryStats::from).collect())
        })
        .await
    }

    /// The catalog size, and the detail of every repository whose tags could be listed.
    ///
    /// A repository the registry no longer knows counts as one with no tags.
    async fn details(&self, fanout: &FanOut) -> Result<(usize, Vec<RepositoryDetailInfo>), Stop> {
        let names = self.catalog(fanout).await.inspect_err(|stop| {
            stop.error("failed to fetch repository catalog");
        })?;
        let total = names.len();

        let details: Vec<RepositoryDetailInfo> = stream::iter(names)
            .map(|name| async move {
                match self.repository_detail(fanout, &name).await {
                    Ok(detail) => Some(detail),
                    Err(Stop::Missing) => Some(RepositoryDetailInfo::empty(name)),
                    Err(Stop::Failed(_)) => None,
                }
            })
            .buffered(fanout.width())
            .filter_map(std::future::ready)
            .collect()
            .await;

        Ok((total, details))
    }
}
