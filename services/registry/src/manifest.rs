//! Manifest media types, sizes, and the names allowed in registry paths.

use serde::Deserialize;

use crate::error::RegistryError;

/// Media type of a Docker image manifest, schema 2.
pub const MANIFEST_V2: &str = "application/vnd.docker.distribution.manifest.v2+json";

/// Response header carrying the manifest's content digest.
pub(crate) const DOCKER_CONTENT_DIGEST: &str = "docker-content-digest";

/// Approximate a tag's size from its manifest digest.
///
/// This is the number of characters in the digest string (0 without a digest).
/// It is not a byte count of the image; use [`crate::SizeStrategy::ManifestLayers`]
/// for that.
pub fn approximate_size_from_digest(digest: Option<&str>) -> u64 {
    digest.map_or(0, |digest| digest.chars().count() as u64)
}

#[derive(Debug, Deserialize)]
struct Descriptor {
    #[serde(default)]
    size: u64,
}

#[derive(Debug, Deserialize)]
struct ManifestDocument {
    config: Option<Descriptor>,
    #[serde(default)]
    layers: Vec<Descriptor>,
}

/// Sum of the config and layer sizes in a schema 2 (or OCI) manifest body.
pub(crate) fn manifest_layer_size(body: &str) -> Option<u64> {
    let document: ManifestDocument = serde_json::from_str(body).ok()?;
    let config = document.config.map_or(0, |config| config.size);
    Some(config + document.layers.iter().map(|layer| layer.size).sum::<u64>())
}

/// The media type of a `Content-Type` value, without parameters.
pub(crate) fn media_type(content_type: &str) -> Option<String> {
    content_type
        .parse::<mime::Mime>()
        .ok()
        .map(|mime| mime.essence_str().to_owned())
}

/// Check a repository name against the registry's path grammar.
///
/// Components are lowercase alphanumerics separated by `.`, `_` or `-`, joined by `/`.
pub(crate) fn validate_repository(name: &str) -> Result<(), RegistryError> {
    let valid = !name.is_empty()
        && name.len() <= 255
        && name.split('/').all(|component| {
            let bytes = component.as_bytes();
            matches!(bytes.first(), Some(b) if b.is_ascii_lowercase() || b.is_ascii_digit())
                && matches!(bytes.last(), Some(b) if b.is_ascii_lowercase() || b.is_ascii_digit())
                && bytes.iter().all(|&b| {
                    b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'.' | b'_' | b'-')
                })
        });

    if valid {
        Ok(())
    } else {
        Err(RegistryError::InvalidName(name.to_owned()))
    }
}

/// Check a tag or digest before it is placed in a manifest path.
pub(crate) fn validate_reference(reference: &str) -> Result<(), RegistryError> {
    let valid = !reference.is_empty()
        && reference.len() <= 256
        && !reference.starts_with(['.', '-'])
        && reference
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-' | b':' | b'+'));

    if valid {
        Ok(())
    } else {
        Err(RegistryError::InvalidName(reference.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn size_is_digest_length() {
        assert_eq!(approximate_size_from_digest(Some("sha256:aaa")), 10);
        assert_eq!(approximate_size_from_digest(Some("sha256:bbbbbb")), 13);
        assert_eq!(approximate_size_from_digest(None), 0);
    }

    #[test]
    fn layer_sizes_are_summed() {
        let body = indoc! {r#"
            {
                "schemaVersion": 2,
                "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
                "config": {"mediaType": "application/vnd.docker.container.image.v1+json", "size": 1000, "digest": "sha256:c"},
                "layers": [
                    {"mediaType": "application/vnd.docker.image.rootfs.diff.tar.gzip", "size": 20000, "digest": "sha256:l1"},
                    {"mediaType": "application/vnd.docker.image.rootfs.diff.tar.gzip", "size": 300, "digest": "sha256:l2"}
                ]
            }
        "#};
        assert_eq!(manifest_layer_size(body), Some(21300));
        assert_eq!(manifest_layer_size("not json"), None);
    }

    #[test]
    fn media_type_drops_parameters() {
        assert_eq!(
            media_type("application/vnd.docker.distribution.manifest.v2+json; charset=utf-8")
                .as_deref(),
            Some(MANIFEST_V2)
        );
        assert_eq!(media_type("???"), None);
    }

    #[test]
    fn repository_names() {
        assert!(validate_repository("app/web").is_ok());
        assert!(validate_repository("library/ubuntu-22.04").is_ok());
        assert!(validate_repository("App").is_err());
        assert!(validate_repository("app//web").is_err());
        assert!(validate_repository("../etc").is_err());
        assert!(validate_repository("app web").is_err());
        assert!(validate_repository("").is_err());
    }

    #[test]
    fn references() {
        assert!(validate_reference("v1.2.3").is_ok());
        assert!(validate_reference("sha256:0123abcd").is_ok());
        assert!(validate_reference("-v1").is_err());
        assert!(validate_reference("v1/../x").is_err());
        assert!(validate_reference("").is_err());
    }
}
