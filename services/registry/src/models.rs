//! Values returned by the registry client, and the upstream documents they come from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A repository and how many tags it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryInfo {
    /// Repository name, e.g. `app/web`.
    pub name: String,
    /// Number of tags resolved when the repository was listed.
    pub tag_count: usize,
    /// The registry API does not report push times, so this is when the value was built.
    pub last_pushed: Option<DateTime<Utc>>,
}

/// A repository with all of its tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryDetailInfo {
    /// Repository name, tag count and last push.
    #[serde(flatten)]
    pub info: RepositoryInfo,
    /// Sum of the tag sizes.
    pub total_size: u64,
    /// Tags in the order the registry listed them.
    pub tags: Vec<TagInfo>,
}

impl RepositoryDetailInfo {
    pub(crate) fn empty(name: String) -> Self {
        Self {
            info: RepositoryInfo {
                name,
                tag_count: 0,
                last_pushed: Some(Utc::now()),
            },
            total_size: 0,
            tags: Vec::new(),
        }
    }
}

/// A tag and the manifest it currently points to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagInfo {
    /// Tag name, e.g. `v1`.
    pub name: String,
    /// Size in bytes, as estimated by the configured [`crate::SizeStrategy`].
    pub size: u64,
    /// When the value was built; the registry API does not report creation times.
    pub created: Option<DateTime<Utc>>,
    /// Manifest digest. `None` when the manifest could not be resolved.
    pub digest: Option<String>,
}

/// A fetched manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestInfo {
    /// Media type of the manifest document, without parameters.
    pub content_type: String,
    /// Content digest from `Docker-Content-Digest`, which is the key for deletion.
    pub digest: Option<String>,
    /// The manifest document as returned by the registry.
    pub config: String,
}

/// `GET /v2/_catalog`
#[derive(Debug, Deserialize)]
pub(crate) struct Catalog {
    #[serde(default)]
    pub(crate) repositories: Vec<String>,
}

/// `GET /v2/<name>/tags/list`
///
/// A repository whose tags were all deleted answers `"tags": null`.
#[derive(Debug, Deserialize)]
pub(crate) struct TagList {
    #[serde(default)]
    tags: Option<Vec<Option<String>>>,
}

impl TagList {
    /// Tag names, skipping `null` entries. A `null` list has no tags.
    pub(crate) fn names(self) -> Vec<String> {
        self.tags.into_iter().flatten().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_tags_are_empty() {
        let list: TagList = serde_json::from_str(r#"{"name": "app/web", "tags": null}"#).unwrap();
        assert!(list.names().is_empty());
    }

    #[test]
    fn null_tag_entries_are_skipped() {
        let list: TagList =
            serde_json::from_str(r#"{"name": "app/web", "tags": ["v1", null, "v2"]}"#).unwrap();
        assert_eq!(list.names(), ["v1", "v2"]);
    }

    #[test]
    fn detail_is_flattened_camel_case() {
        let detail = RepositoryDetailInfo {
            info: RepositoryInfo {
                name: "app/web".into(),
                tag_count: 1,
                last_pushed: None,
            },
            total_size: 11,
            tags: vec![TagInfo {
                name: "v1".into(),
                size: 11,
                created: None,
                digest: Some("sha256:aaa".into()),
            }],
        };

        let value = serde_json::to_value(&detail).unwrap();
        assert_eq!(value["name"], "app/web");
        assert_eq!(value["tagCount"], 1);
        assert_eq!(value["totalSize"], 11);
        assert_eq!(value["tags"][0]["digest"], "sha256:aaa");
        assert!(value.get("info").is_none());
    }
}
