//! Parsing of RFC 8288 `Link` headers, as used for cursor pagination.

use http::header::LINK;
use http::{HeaderMap, Uri};

/// Find the target of the `rel="next"` link in a response's headers.
///
/// Absolute targets are reduced to their path and query, so they can be joined
/// onto the client's base URI.
pub fn next_link(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .find_map(parse_next)
}

fn parse_next(link: &str) -> Option<String> {
    let link = link.trim();
    let rest = link.strip_prefix('<')?;
    let (target, params) = rest.split_once('>')?;

    let is_next = params.split(';').any(|param| {
        let Some((key, value)) = param.split_once('=') else {
            return false;
        };
        key.trim().eq_ignore_ascii_case("rel")
            && value
                .trim()
                .trim_matches('"')
                .split_ascii_whitespace()
                .any(|rel| rel.eq_ignore_ascii_case("next"))
    });

    if !is_next {
        return None;
    }

    let target = target.trim();
    match target.parse::<Uri>() {
        Ok(uri) if uri.scheme().is_some() => uri.path_and_query().map(|pq| pq.to_string()),
        _ if target.is_empty() => None,
        _ => Some(target.to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(values: &[&str]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for value in values {
            headers.append(LINK, value.parse().unwrap());
        }
        headers
    }

    #[test]
    fn registry_catalog_link() {
        let headers = headers(&[r#"</v2/_catalog?last=b&n=2>; rel="next""#]);
        assert_eq!(
            next_link(&headers).as_deref(),
            Some("/v2/_catalog?last=b&n=2")
        );
    }

    #[test]
    fn absolute_link_is_reduced_to_path() {
        let headers = headers(&[r#"<https://registry.test/v2/_catalog?last=c>; rel=next"#]);
        assert_eq!(next_link(&headers).as_deref(), Some("/v2/_catalog?last=c"));
    }

    #[test]
    fn other_relations_are_ignored() {
        let mixed = headers(&[
            r#"</v2/_catalog?last=a>; rel="prev", </v2/_catalog?last=z>; rel="next""#,
        ]);
        assert_eq!(next_link(&mixed).as_deref(), Some("/v2/_catalog?last=z"));

        let prev_only = headers(&[r#"</v2/_catalog?last=a>; rel="prev""#]);
        assert_eq!(next_link(&prev_only), None);
    }

    #[test]
    fn missing_header() {
        assert_eq!(next_link(&HeaderMap::new()), None);
    }
}
