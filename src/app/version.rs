//! Version-aware ordering of package filenames
//!
//! Listings are ordered by the version embedded in each filename rather than
//! lexically, so `pkg-1.10.tar.gz` sorts after `pkg-1.9.tar.gz` and the
//! pre-release `pkg-2.0a1.tar.gz` sorts before `pkg-2.0.tar.gz`.
//!
//! Filenames whose version cannot be parsed still get a key: they sort
//! before every parsed version, ordered lexically among themselves.

use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

/// Archive suffixes stripped before looking for the version field
const ARCHIVE_SUFFIXES: &[&str] = &[
    ".tar.gz", ".tar.bz2", ".tar.xz", ".tar.zst", ".tgz", ".tbz", ".tar", ".zip", ".whl",
    ".egg", ".exe", ".msi", ".rpm", ".dmg",
];

const VERSION_PATTERN: &str = r"(?ix)
    ^\s*v?
    (?:(?P<epoch>[0-9]+)!)?
    (?P<release>[0-9]+(?:\.[0-9]+)*)
    (?P<pre>
        [-_.]?
        (?P<pre_l>alpha|a|beta|b|preview|pre|c|rc)
        [-_.]?
        (?P<pre_n>[0-9]+)?
    )?
    (?P<post>
        (?:-(?P<post_n1>[0-9]+))
        |
        (?:
            [-_.]?
            (?P<post_l>post|rev|r)
            [-_.]?
            (?P<post_n2>[0-9]+)?
        )
    )?
    (?P<dev>
        [-_.]?
        dev
        [-_.]?
        (?P<dev_n>[0-9]+)?
    )?
    (?:\+(?P<local>[a-z0-9]+(?:[-_.][a-z0-9]+)*))?
    \s*$";

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(VERSION_PATTERN).expect("version pattern is valid"))
}

/// Pre-release phase, ordered alpha < beta < release candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreRelease {
    Alpha,
    Beta,
    Candidate,
}

impl PreRelease {
    fn from_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "a" | "alpha" => PreRelease::Alpha,
            "b" | "beta" => PreRelease::Beta,
            _ => PreRelease::Candidate,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            PreRelease::Alpha => "a",
            PreRelease::Beta => "b",
            PreRelease::Candidate => "rc",
        }
    }
}

/// One dot-separated segment of a local version label
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LocalSegment {
    /// Alphanumeric segments sort before numeric ones
    Alpha(String),
    Numeric(u64),
}

/// A parsed package version
#[derive(Debug, Clone)]
pub struct Version {
    epoch: u64,
    release: Vec<u64>,
    pre: Option<(PreRelease, u64)>,
    post: Option<u64>,
    dev: Option<u64>,
    local: Option<Vec<LocalSegment>>,
}

// Precedence of the pre-release slot: a dev-only release precedes every
// pre-release, and a final release follows them.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum PreKey {
    DevOnly,
    Pre(PreRelease, u64),
    Final,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum DevKey {
    Dev(u64),
    Final,
}

impl Version {
    /// Parse a version string, returning `None` if it is not a valid version
    pub fn parse(input: &str) -> Option<Self> {
        let caps = version_regex().captures(input)?;

        let number = |name: &str| -> Option<Option<u64>> {
            match caps.name(name) {
                Some(m) => m.as_str().parse::<u64>().ok().map(Some),
                None => Some(None),
            }
        };

        let epoch = number("epoch")?.unwrap_or(0);
        let release = caps
            .name("release")?
            .as_str()
            .split('.')
            .map(|part| part.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()?;

        let pre = match caps.name("pre_l") {
            Some(label) => Some((
                PreRelease::from_label(label.as_str()),
                number("pre_n")?.unwrap_or(0),
            )),
            None => None,
        };

        let post = if caps.name("post").is_some() {
            Some(number("post_n1")?.or(number("post_n2")?).unwrap_or(0))
        } else {
            None
        };

        let dev = if caps.name("dev").is_some() {
            Some(number("dev_n")?.unwrap_or(0))
        } else {
            None
        };

        let local = caps.name("local").map(|m| {
            m.as_str()
                .split(['-', '_', '.'])
                .map(|segment| match segment.parse::<u64>() {
                    Ok(n) => LocalSegment::Numeric(n),
                    Err(_) => LocalSegment::Alpha(segment.to_ascii_lowercase()),
                })
                .collect()
        });

        Some(Self {
            epoch,
            release,
            pre,
            post,
            dev,
            local,
        })
    }

    /// Whether this is a pre-release or development release
    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some() || self.dev.is_some()
    }

    fn trimmed_release(&self) -> &[u64] {
        let len = self
            .release
            .iter()
            .rposition(|&n| n != 0)
            .map_or(0, |pos| pos + 1);
        &self.release[..len]
    }

    fn pre_key(&self) -> PreKey {
        match (self.pre, self.post, self.dev) {
            (None, None, Some(_)) => PreKey::DevOnly,
            (Some((phase, n)), _, _) => PreKey::Pre(phase, n),
            _ => PreKey::Final,
        }
    }

    fn dev_key(&self) -> DevKey {
        match self.dev {
            Some(n) => DevKey::Dev(n),
            None => DevKey::Final,
        }
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| self.trimmed_release().cmp(other.trimmed_release()))
            .then_with(|| self.pre_key().cmp(&other.pre_key()))
            .then_with(|| self.post.cmp(&other.post))
            .then_with(|| self.dev_key().cmp(&other.dev_key()))
            .then_with(|| self.local.cmp(&other.local))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch != 0 {
            write!(f, "{}!", self.epoch)?;
        }
        let release: Vec<String> = self.release.iter().map(u64::to_string).collect();
        write!(f, "{}", release.join("."))?;
        if let Some((phase, n)) = self.pre {
            write!(f, "{}{}", phase.label(), n)?;
        }
        if let Some(n) = self.post {
            write!(f, ".post{n}")?;
        }
        if let Some(n) = self.dev {
            write!(f, ".dev{n}")?;
        }
        if let Some(local) = &self.local {
            let parts: Vec<String> = local
                .iter()
                .map(|segment| match segment {
                    LocalSegment::Alpha(s) => s.clone(),
                    LocalSegment::Numeric(n) => n.to_string(),
                })
                .collect();
            write!(f, "+{}", parts.join("."))?;
        }
        Ok(())
    }
}

/// Comparable sort key derived from a package filename
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum VersionKey {
    /// No version could be parsed; compared lexically, before all versions
    Literal(String),
    /// Parsed version
    Version(Version),
}

impl VersionKey {
    /// Derive the sort key for a filename
    ///
    /// Never fails: a filename without a recognisable version yields a
    /// [`VersionKey::Literal`] key.
    pub fn from_filename(filename: &str) -> Self {
        match extract_version(filename) {
            Some(version) => VersionKey::Version(version),
            None => VersionKey::Literal(filename.to_string()),
        }
    }

    /// The parsed version, if any
    pub fn version(&self) -> Option<&Version> {
        match self {
            VersionKey::Version(version) => Some(version),
            VersionKey::Literal(_) => None,
        }
    }
}

/// Shorthand for [`VersionKey::from_filename`]
pub fn key(filename: &str) -> VersionKey {
    VersionKey::from_filename(filename)
}

fn strip_archive_suffix(filename: &str) -> (&str, Option<&'static str>) {
    let lower = filename.to_ascii_lowercase();
    for suffix in ARCHIVE_SUFFIXES {
        if lower.ends_with(suffix) && filename.len() > suffix.len() {
            return (&filename[..filename.len() - suffix.len()], Some(suffix));
        }
    }
    (filename, None)
}

fn extract_version(filename: &str) -> Option<Version> {
    let (stem, suffix) = strip_archive_suffix(filename);
    let fields: Vec<&str> = stem.split('-').collect();

    // Wheels and eggs carry the version in the second field
    if matches!(suffix, Some(".whl") | Some(".egg")) {
        return fields.get(1).and_then(|field| Version::parse(field));
    }

    let start = fields
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, field)| field.starts_with(|c: char| c.is_ascii_digit()))
        .map(|(index, _)| index)?;

    Version::parse(&fields[start..].join("-")).or_else(|| Version::parse(fields[start]))
}
