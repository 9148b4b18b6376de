//! Deleting tags, and repositories tag by tag.

use futures::stream::{self, StreamExt as _};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::client::{FanOut, RegistryClient};
use crate::error::RegistryError;
use crate::manifest::validate_reference;
use crate::outcome::{Outcome, Stop, guarded};

/// What happened to one tag during a repository deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeletionStatus {
    /// The manifest was deleted.
    Deleted,
    /// No manifest digest could be resolved, so nothing was deleted.
    Unresolved,
    /// The manifest lookup or the deletion failed.
    Failed,
}

/// One tag's entry in a [`DeleteReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagDeletion {
    /// Tag name.
    pub name: String,
    /// Digest of the manifest the tag resolved to, when it could be resolved.
    pub digest: Option<String>,
    /// Result of the deletion.
    pub status: DeletionStatus,
    /// Failure message, for [`DeletionStatus::Failed`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TagDeletion {
    fn new(name: String, digest: Option<String>, result: Result<(), Stop>) -> Self {
        let (status, error) = match result {
            Ok(()) => (DeletionStatus::Deleted, None),
            Err(Stop::Missing) => (DeletionStatus::Unresolved, None),
            Err(Stop::Failed(error)) => (DeletionStatus::Failed, Some(error.to_string())),
        };

        Self {
            name,
            digest,
            status,
            error,
        }
    }
}

/// The per-tag results of deleting a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReport {
    /// Repository name.
    pub repository: String,
    /// One entry per listed tag, in registry order.
    pub tags: Vec<TagDeletion>,
}

impl DeleteReport {
    /// Number of tags whose manifest was deleted.
    pub fn deleted(&self) -> usize {
        self.tags
            .iter()
            .filter(|tag| tag.status == DeletionStatus::Deleted)
            .count()
    }

    /// Whether every tag was deleted.
    pub fn is_complete(&self) -> bool {
        self.deleted() == self.tags.len()
    }
}

impl RegistryClient {
    /// Delete a tag by deleting the manifest it points to.
    ///
    /// Returns the deleted digest. When the tag's digest cannot be resolved nothing
    /// is deleted and the outcome is [`Outcome::Missing`]. Once a digest is resolved,
    /// any unsuccessful `DELETE` (including `404`) is [`Outcome::Failed`].
    ///
    /// Every tag pointing at the same manifest disappears with it.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn delete_tag(
        &self,
        repository: &str,
        tag: &str,
        cancel: &CancellationToken,
    ) -> Outcome<String> {
        let fanout = self.fan_out();
        guarded(cancel, self.remove_tag(&fanout, repository, tag)).await
    }

    /// Delete every tag of a repository.
    ///
    /// Each listed tag is attempted even when others fail; the report holds the
    /// result for each. The outcome is only `Missing` or `Failed` when the tags
    /// cannot be listed.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn delete_repository(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Outcome<DeleteReport> {
        let fanout = self.fan_out();
        guarded(cancel, self.remove_repository(&fanout, name)).await
    }

    async fn remove_tag(&self, fanout: &FanOut, repository: &str, tag: &str) -> Result<String, Stop> {
        let digest = self.resolve_digest(fanout, repository, tag).await?;
        self.delete_manifest(fanout, repository, tag, &digest).await?;
        Ok(digest)
    }

    async fn resolve_digest(&self, fanout: &FanOut, repository: &str, tag: &str) -> Result<String, Stop> {
        tracing::debug!(repository, tag, "deleting tag");
        let manifest = self.manifest(fanout, repository, tag).await?;

        let Some(digest) = manifest.digest else {
            tracing::warn!(repository, tag, "could not resolve manifest digest");
            return Err(Stop::Missing);
        };
        validate_reference(&digest)?;
        Ok(digest)
    }

    /// A manifest that vanishes between resolution and deletion is a failed deletion.
    async fn delete_manifest(
        &self,
        fanout: &FanOut,
        repository: &str,
        tag: &str,
        digest: &str,
    ) -> Result<(), Stop> {
        let path = format!("/v2/{repository}/manifests/{digest}");
        match self.fetch(fanout, self.api_client().delete(&path), &path).await {
            Ok(_) => {
                tracing::info!(repository, tag, digest, "deleted tag");
                Ok(())
            }
            Err(stop) => {
                let stop = match stop {
                    Stop::Missing => Stop::Failed(RegistryError::Status {
                        path,
                        status: StatusCode::NOT_FOUND,
                        message: "manifest unknown".to_owned(),
                    }),
                    stop => stop,
                };
                stop.error("failed to delete manifest");
                Err(stop)
            }
        }
    }

    async fn remove_repository(&self, fanout: &FanOut, name: &str) -> Result<DeleteReport, Stop> {
        let tags = self
            .tags(fanout, name)
            .await
            .inspect_err(|stop| stop.error("failed to list tags for deletion"))?;

        let deletions: Vec<TagDeletion> = stream::iter(tags)
            .map(|tag| async move {
                match self.resolve_digest(fanout, name, &tag.name).await {
                    Ok(digest) => {
                        let result = self.delete_manifest(fanout, name, &tag.name, &digest).await;
                        TagDeletion::new(tag.name, Some(digest), result)
                    }
                    Err(stop) => TagDeletion::new(tag.name, None, Err(stop)),
                }
            })
            .buffered(fanout.width())
            .collect()
            .await;

        let report = DeleteReport {
            repository: name.to_owned(),
            tags: deletions,
        };
        tracing::info!(
            repository = name,
            deleted = report.deleted(),
            total = report.tags.len(),
            "deleted repository"
        );
        Ok(report)
    }
}
