//! Reconciliation of an upstream listing with the local artifact set
//!
//! Local artifacts always win: a filename that is stored locally is linked to
//! the local copy, with the local digest, whatever upstream says about it.
//! Every other upstream link is rewritten to go through the download cache.

use std::collections::HashMap;

use percent_encoding::{utf8_percent_encode, AsciiSet};
use url::Url;

use crate::app::store::path::PATH_SEGMENT;
use crate::app::store::{Artifact, PathGenerator};
use crate::app::version::VersionKey;
use crate::constants::paths;
use crate::errors::{ProxyError, ProxyResult};

use super::parse::parse_anchors;
use super::{IndexEntry, UpstreamListing};

/// Characters escaped in the remainder of a cached origin URL
///
/// `/` stays literal so the remainder maps onto path segments; `%` and `?`
/// are escaped so existing escapes and the query survive the round trip.
const REMAINDER: &AsciiSet = &PATH_SEGMENT.remove(b'/');

/// Merge local artifacts with the upstream listing of a project
///
/// # Arguments
///
/// * `project` - Project name
/// * `local` - Locally stored artifacts of the project
/// * `upstream` - Outcome of the upstream index fetch
///
/// # Errors
///
/// Returns `ProxyError::NotFound` when upstream has no listing and nothing is
/// stored locally
pub fn merge(
    project: &str,
    local: &[Artifact],
    upstream: &UpstreamListing,
) -> ProxyResult<Vec<IndexEntry>> {
    let (html, base) = match upstream {
        UpstreamListing::Entries { html, base } => (html, base),
        _ => {
            if local.is_empty() {
                return Err(ProxyError::NotFound(format!("no listing for project {project}")));
            }
            let mut entries: Vec<IndexEntry> = local.iter().map(local_entry).collect();
            sort_entries(&mut entries);
            return Ok(entries);
        }
    };

    let mut pending: HashMap<&str, &Artifact> =
        local.iter().map(|a| (a.filename.as_str(), a)).collect();
    let mut entries = Vec::new();

    for anchor in parse_anchors(html)? {
        if !anchor.text.is_empty() {
            if let Some(artifact) = pending.remove(anchor.text.as_str()) {
                entries.push(local_entry(artifact));
                continue;
            }
        }

        let resolved = match base.join(&anchor.url) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(
                    project = %project,
                    href = %anchor.url,
                    "Dropping upstream link that does not resolve: {}",
                    e
                );
                continue;
            }
        };
        entries.push(IndexEntry {
            filename: anchor.text,
            href: foreign_href(project, &resolved),
            fragment: anchor.fragment,
        });
    }

    // Artifacts upstream does not know about, in listing order
    entries.extend(
        local
            .iter()
            .filter(|a| pending.contains_key(a.filename.as_str()))
            .map(local_entry),
    );

    sort_entries(&mut entries);
    Ok(entries)
}

/// Link to the local copy of an artifact
fn local_entry(artifact: &Artifact) -> IndexEntry {
    IndexEntry {
        filename: artifact.filename.clone(),
        href: PathGenerator::storage_url(&artifact.project, &artifact.filename),
        fragment: artifact.digest.clone(),
    }
}

/// Stable sort by version; equal keys keep their relative order
fn sort_entries(entries: &mut [IndexEntry]) {
    entries.sort_by_cached_key(|e| VersionKey::from_filename(&e.filename));
}

/// Download-cache link for an absolute origin URL
///
/// The result has the shape `/packs/<project>/<scheme>/<remainder>` where the
/// remainder is everything after `<scheme>://`.
pub fn foreign_href(project: &str, origin: &Url) -> String {
    let full = origin.as_str();
    let remainder = full
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(full);
    let remainder = remainder.split('#').next().unwrap_or(remainder);
    format!(
        "{}/{}/{}/{}",
        paths::PACKS,
        utf8_percent_encode(project, PATH_SEGMENT),
        origin.scheme(),
        utf8_percent_encode(remainder, REMAINDER)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn artifact(filename: &str, digest: Option<&str>) -> Artifact {
        Artifact {
            project: "foo".to_string(),
            filename: filename.to_string(),
            size: 1,
            modified: Utc::now(),
            digest: digest.map(str::to_string),
        }
    }

    fn entries_from(html: &str) -> UpstreamListing {
        UpstreamListing::Entries {
            html: html.to_string(),
            base: Url::parse("https://index.example/simple/foo/").unwrap(),
        }
    }

    fn filenames(entries: &[IndexEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.filename.as_str()).collect()
    }

    #[test]
    fn test_merge_scenario() {
        // Local 1.0 with a digest, upstream 1.0 and 2.0
        let local = vec![artifact("foo-1.0.tar.gz", Some("aaa"))];
        let upstream = entries_from(
            r#"<a href="x/foo-1.0.tar.gz#sha256=bbb">foo-1.0.tar.gz</a>
               <a href="x/foo-2.0.tar.gz#sha256=ccc">foo-2.0.tar.gz</a>"#,
        );

        let entries = merge("foo", &local, &upstream).unwrap();
        assert_eq!(
            entries,
            vec![
                IndexEntry {
                    filename: "foo-1.0.tar.gz".to_string(),
                    href: "/storage/foo/foo-1.0.tar.gz".to_string(),
                    fragment: Some("aaa".to_string()),
                },
                IndexEntry {
                    filename: "foo-2.0.tar.gz".to_string(),
                    href: "/packs/foo/https/index.example/simple/foo/x/foo-2.0.tar.gz"
                        .to_string(),
                    fragment: Some("sha256=ccc".to_string()),
                },
            ]
        );
    }

    #[test]
    fn test_local_entry_drops_upstream_fragment_without_local_digest() {
        let local = vec![artifact("foo-1.0.zip", None)];
        let upstream = entries_from(r#"<a href="foo-1.0.zip#sha256=up">foo-1.0.zip</a>"#);
        let entries = merge("foo", &local, &upstream).unwrap();
        assert_eq!(entries[0].fragment, None);
        assert_eq!(entries[0].href, "/storage/foo/foo-1.0.zip");
    }

    #[test]
    fn test_each_local_artifact_appears_once() {
        let local = vec![artifact("foo-1.0.zip", Some("d")), artifact("foo-0.5.zip", None)];
        let upstream = entries_from(
            r#"<a href="a/foo-1.0.zip">foo-1.0.zip</a><a href="b/foo-1.0.zip">foo-1.0.zip</a>"#,
        );
        let entries = merge("foo", &local, &upstream).unwrap();
        let local_links = entries
            .iter()
            .filter(|e| e.href.starts_with("/storage/"))
            .count();
        assert_eq!(local_links, 2);
        assert_eq!(filenames(&entries), vec!["foo-0.5.zip", "foo-1.0.zip", "foo-1.0.zip"]);
        // The duplicate upstream anchor keeps its own (cache) link
        assert!(entries[2].href.starts_with("/packs/foo/https/"));
    }

    #[test]
    fn test_local_only_when_upstream_missing() {
        let local = vec![artifact("foo-1.10.zip", None), artifact("foo-1.9.zip", Some("x"))];
        for upstream in [
            UpstreamListing::NotFound,
            UpstreamListing::Unavailable,
            UpstreamListing::NotConfigured,
        ] {
            let entries = merge("foo", &local, &upstream).unwrap();
            assert_eq!(filenames(&entries), vec!["foo-1.9.zip", "foo-1.10.zip"]);
            assert!(entries.iter().all(|e| e.href.starts_with("/storage/foo/")));
        }
    }

    #[test]
    fn test_nothing_anywhere_is_not_found() {
        for upstream in [UpstreamListing::NotFound, UpstreamListing::Unavailable] {
            assert!(matches!(
                merge("foo", &[], &upstream),
                Err(ProxyError::NotFound(_))
            ));
        }
    }

    #[test]
    fn test_empty_upstream_page_with_no_local_is_empty_listing() {
        let entries = merge("foo", &[], &entries_from("<html></html>")).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_anchor_without_text_is_foreign() {
        let local = vec![artifact("foo-1.0.zip", None)];
        let upstream = entries_from(r#"<a href="foo-1.0.zip"></a>"#);
        let entries = merge("foo", &local, &upstream).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|e| e.href.starts_with("/packs/")));
    }

    #[test]
    fn test_ordering_follows_versions() {
        let upstream = entries_from(
            r#"<a href="foo-2.0.tar.gz">foo-2.0.tar.gz</a>
               <a href="foo-2.0rc1.tar.gz">foo-2.0rc1.tar.gz</a>
               <a href="foo-1.10.tar.gz">foo-1.10.tar.gz</a>
               <a href="foo-2.0.post1.tar.gz">foo-2.0.post1.tar.gz</a>
               <a href="foo-2.0.dev1.tar.gz">foo-2.0.dev1.tar.gz</a>"#,
        );
        let entries = merge("foo", &[], &upstream).unwrap();
        assert_eq!(
            filenames(&entries),
            vec![
                "foo-1.10.tar.gz",
                "foo-2.0.dev1.tar.gz",
                "foo-2.0rc1.tar.gz",
                "foo-2.0.tar.gz",
                "foo-2.0.post1.tar.gz",
            ]
        );
    }

    #[test]
    fn test_foreign_href_escapes_query_and_percent() {
        let origin = Url::parse("http://files.example:8080/p/foo%2B1.0.zip?token=a b").unwrap();
        let href = foreign_href("foo", &origin);
        assert_eq!(
            href,
            "/packs/foo/http/files.example:8080/p/foo%252B1.0.zip%3Ftoken=a%2520b"
        );
    }

    #[test]
    fn test_absolute_upstream_href_keeps_its_host() {
        let upstream =
            entries_from(r#"<a href="https://cdn.example/f/foo-1.0.whl#md5=1">foo-1.0.whl</a>"#);
        let entries = merge("foo", &[], &upstream).unwrap();
        assert_eq!(entries[0].href, "/packs/foo/https/cdn.example/f/foo-1.0.whl");
        assert_eq!(entries[0].fragment.as_deref(), Some("md5=1"));
    }
}
