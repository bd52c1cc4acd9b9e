//! Maven version ordering, requirements and the artifact-level metadata
//! extractor.

use crate::coordinate::SNAPSHOT_SUFFIX;
use crate::error::{PomError, Result};
use minimaven_core::{ElementReader, XmlEvent};
use std::cmp::Ordering;

/// Rank of an unqualified release (`1.0`, `1.0.Final`, `1.0-ga`).
const RELEASE_RANK: u8 = 5;

/// One piece of a version: `1.0-rc2` is `1`, `0`, `rc`, `2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Number(u64),
    Qualifier(&'a str),
}

fn token(piece: &str, digits: bool) -> Token<'_> {
    match piece.parse::<u64>() {
        Ok(n) if digits => Token::Number(n),
        _ => Token::Qualifier(piece),
    }
}

/// Splits at `.` and `-` and wherever digits and letters meet.
fn tokens(version: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start = None;
    let mut digits = false;
    for (i, c) in version.char_indices() {
        if c == '.' || c == '-' {
            if let Some(s) = start.take() {
                tokens.push(token(&version[s..i], digits));
            }
            continue;
        }
        match start {
            Some(s) if c.is_ascii_digit() != digits => {
                tokens.push(token(&version[s..i], digits));
                start = Some(i);
            }
            Some(_) => {}
            None => start = Some(i),
        }
        digits = c.is_ascii_digit();
    }
    if let Some(s) = start {
        tokens.push(token(&version[s..], digits));
    }
    tokens
}

/// Known qualifiers in ascending order; `None` for anything else, which
/// sorts after all of them.
fn qualifier_rank(qualifier: &str) -> Option<u8> {
    match qualifier.to_ascii_lowercase().as_str() {
        "alpha" | "a" => Some(0),
        "beta" | "b" => Some(1),
        "milestone" | "m" => Some(2),
        "rc" | "cr" => Some(3),
        "snapshot" => Some(4),
        "ga" | "final" | "release" => Some(RELEASE_RANK),
        "sp" => Some(6),
        _ => None,
    }
}

fn compare_qualifiers(a: &str, b: &str) -> Ordering {
    match (qualifier_rank(a), qualifier_rank(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.to_ascii_lowercase().cmp(&b.to_ascii_lowercase()),
    }
}

/// A missing token stands for `0` next to a number and for a plain release
/// next to a qualifier, so `1.0` equals `1` and `1.0-SNAPSHOT` sorts below
/// `1.0`.
fn compare_tokens(a: Option<Token<'_>>, b: Option<Token<'_>>) -> Ordering {
    match (a, b) {
        (Some(Token::Number(x)), Some(Token::Number(y))) => x.cmp(&y),
        (Some(Token::Number(_)), Some(Token::Qualifier(_))) => Ordering::Greater,
        (Some(Token::Qualifier(_)), Some(Token::Number(_))) => Ordering::Less,
        (Some(Token::Qualifier(x)), Some(Token::Qualifier(y))) => compare_qualifiers(x, y),
        (Some(Token::Number(x)), None) => x.cmp(&0),
        (None, Some(Token::Number(y))) => 0_u64.cmp(&y),
        (Some(Token::Qualifier(x)), None) => compare_qualifiers(x, "release"),
        (None, Some(Token::Qualifier(y))) => compare_qualifiers("release", y),
        (None, None) => Ordering::Equal,
    }
}

/// Orders Maven versions the way range and `LATEST` selection need:
/// numerically per segment, with `alpha < beta < milestone < rc < snapshot`
/// below the plain release and `sp` above it.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let (a, b) = (tokens(a), tokens(b));
    (0..a.len().max(b.len()))
        .map(|i| compare_tokens(a.get(i).copied(), b.get(i).copied()))
        .find(|ord| ord.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Whether `version` carries a qualifier ranked below a plain release.
pub fn is_prerelease(version: &str) -> bool {
    tokens(version).iter().any(|token| {
        matches!(token, Token::Qualifier(q)
            if qualifier_rank(q).is_some_and(|rank| rank < RELEASE_RANK))
    })
}

fn is_snapshot(version: &str) -> bool {
    version.to_ascii_uppercase().ends_with(SNAPSHOT_SUFFIX)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
    pub version: String,
    pub inclusive: bool,
}

/// What a `<version>` element asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRequirement {
    /// A plain version; used as is.
    Exact(String),
    /// `LATEST`: the newest version, snapshots included.
    Latest,
    /// `RELEASE`: the newest non-prerelease version.
    Release,
    /// `[a,b)`-style range; either bound may be open. Snapshots only match
    /// when a bound is itself a snapshot.
    Range {
        lower: Option<Bound>,
        upper: Option<Bound>,
    },
}

impl VersionRequirement {
    /// Parses a version element. Anything that is not a keyword or a
    /// well-formed range is an exact version.
    pub fn parse(version: &str) -> Self {
        let version = version.trim();
        match version {
            "LATEST" => return Self::Latest,
            "RELEASE" => return Self::Release,
            _ => {}
        }
        Self::parse_range(version).unwrap_or_else(|| Self::Exact(version.to_string()))
    }

    fn parse_range(version: &str) -> Option<Self> {
        let lower_inclusive = match version.chars().next()? {
            '[' => true,
            '(' => false,
            _ => return None,
        };
        let upper_inclusive = match version.chars().last()? {
            ']' => true,
            ')' => false,
            _ => return None,
        };
        let inner = version.get(1..version.len() - 1)?;

        let Some((low, high)) = inner.split_once(',') else {
            // `[1.0]` pins exactly one version.
            let pinned = inner.trim();
            if pinned.is_empty() || !lower_inclusive || !upper_inclusive {
                return None;
            }
            let bound = Bound {
                version: pinned.to_string(),
                inclusive: true,
            };
            return Some(Self::Range {
                lower: Some(bound.clone()),
                upper: Some(bound),
            });
        };

        let bound = |v: &str, inclusive: bool| {
            let v = v.trim();
            (!v.is_empty()).then(|| Bound {
                version: v.to_string(),
                inclusive,
            })
        };
        Some(Self::Range {
            lower: bound(low, lower_inclusive),
            upper: bound(high, upper_inclusive),
        })
    }

    /// Whether the requirement needs the artifact's version list to resolve.
    pub const fn needs_metadata(&self) -> bool {
        !matches!(self, Self::Exact(_))
    }

    pub fn matches(&self, version: &str) -> bool {
        match self {
            Self::Exact(exact) => exact == version,
            Self::Latest => true,
            Self::Release => !is_prerelease(version),
            Self::Range { lower, upper } => {
                let snapshots = [lower, upper]
                    .into_iter()
                    .flatten()
                    .any(|b| is_snapshot(&b.version));
                if is_snapshot(version) && !snapshots {
                    return false;
                }
                let above = lower.as_ref().is_none_or(|b| {
                    let ord = compare_versions(version, &b.version);
                    ord == Ordering::Greater || (b.inclusive && ord == Ordering::Equal)
                });
                let below = upper.as_ref().is_none_or(|b| {
                    let ord = compare_versions(version, &b.version);
                    ord == Ordering::Less || (b.inclusive && ord == Ordering::Equal)
                });
                above && below
            }
        }
    }

    /// Picks the highest version in `available` satisfying the requirement.
    pub fn select<'a>(&self, available: &'a [String]) -> Option<&'a str> {
        if let Self::Exact(exact) = self {
            return available
                .iter()
                .find(|v| *v == exact)
                .map(String::as_str);
        }
        available
            .iter()
            .filter(|v| self.matches(v))
            .max_by(|a, b| compare_versions(a, b))
            .map(String::as_str)
    }
}

/// Every `<version>` leaf of an artifact-level `maven-metadata.xml`, in
/// document order.
pub fn parse_metadata_versions(content: &[u8], context: &str) -> Result<Vec<String>> {
    let mut reader = ElementReader::from_bytes(content, context)?;
    let mut versions = Vec::new();
    while let Some(event) = reader.next_event()? {
        if let XmlEvent::Close {
            name,
            text: Some(text),
        } = event
            && name == "version"
            && !text.is_empty()
        {
            versions.push(text);
        }
    }
    Ok(versions)
}

/// The last `<version>` in a metadata document.
pub fn parse_latest_version(content: &[u8], context: &str) -> Result<String> {
    parse_metadata_versions(content, context)?
        .pop()
        .ok_or_else(|| PomError::MissingVersion {
            context: context.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prerelease_detection() {
        assert!(is_prerelease("1.0.0-SNAPSHOT"));
        assert!(is_prerelease("1.0.0-alpha"));
        assert!(is_prerelease("1.0.0-beta"));
        assert!(is_prerelease("1.0.0-RC1"));
        assert!(is_prerelease("2.0.0-M10"));
    }

    #[test]
    fn test_stable_versions() {
        assert!(!is_prerelease("1.0.0"));
        assert!(!is_prerelease("1.2.3.Final"));
        assert!(!is_prerelease("2.0.RELEASE"));
    }

    #[test]
    fn test_version_comparison() {
        assert_eq!(compare_versions("1.0.0", "1.0.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.0.1", "1.0.0"), Ordering::Greater);
        assert_eq!(compare_versions("2.0.0", "1.9.9"), Ordering::Greater);
        assert_eq!(compare_versions("10.0.0", "9.0.0"), Ordering::Greater);
        assert_eq!(compare_versions("1.0", "1.0.1"), Ordering::Less);
    }

    #[test]
    fn test_qualifier_ordering() {
        assert_eq!(compare_versions("1.0", "1"), Ordering::Equal);
        assert_eq!(compare_versions("1.2.3.Final", "1.2.3"), Ordering::Equal);
        assert_eq!(compare_versions("1.0-SNAPSHOT", "1.0"), Ordering::Less);
        assert_eq!(compare_versions("1.0-alpha", "1.0-beta"), Ordering::Less);
        assert_eq!(compare_versions("1.0-rc2", "1.0-rc10"), Ordering::Less);
        assert_eq!(compare_versions("1.0-M3", "1.0-RC1"), Ordering::Less);
        assert_eq!(compare_versions("1.0-rc1", "1.0-SNAPSHOT"), Ordering::Less);
        assert_eq!(compare_versions("1.0-sp1", "1.0"), Ordering::Greater);
        assert_eq!(compare_versions("1.0.1", "1.0-beta"), Ordering::Greater);
        assert_eq!(compare_versions("1.54f", "1.54"), Ordering::Greater);
    }

    #[test]
    fn test_range_skips_snapshots_unless_bounded_by_one() {
        assert!(!VersionRequirement::parse("[1.0,2.0)").matches("1.5-SNAPSHOT"));
        assert!(VersionRequirement::parse("[1.0-SNAPSHOT,2.0)").matches("1.5-SNAPSHOT"));
        assert!(VersionRequirement::parse("[1.0,2.0)").matches("1.5-rc1"));
    }

    #[test]
    fn test_requirement_parse() {
        assert_eq!(
            VersionRequirement::parse("1.0"),
            VersionRequirement::Exact("1.0".into())
        );
        assert_eq!(VersionRequirement::parse("LATEST"), VersionRequirement::Latest);
        assert_eq!(
            VersionRequirement::parse("RELEASE"),
            VersionRequirement::Release
        );
        assert!(VersionRequirement::parse("[1.0,2.0)").needs_metadata());
        assert!(!VersionRequirement::parse("[1.0,2.0").needs_metadata());
    }

    #[test]
    fn test_range_matching() {
        let req = VersionRequirement::parse("[1.0,2.0)");
        assert!(req.matches("1.0"));
        assert!(req.matches("1.9.9"));
        assert!(!req.matches("2.0"));
        assert!(!req.matches("0.9"));

        let open_low = VersionRequirement::parse("(,1.5]");
        assert!(open_low.matches("0.1"));
        assert!(open_low.matches("1.5"));
        assert!(!open_low.matches("1.6"));

        let pinned = VersionRequirement::parse("[1.2]");
        assert!(pinned.matches("1.2"));
        assert!(!pinned.matches("1.3"));
    }

    #[test]
    fn test_select() {
        let available: Vec<String> = ["1.0", "1.5", "2.0-SNAPSHOT", "1.10", "3.0"]
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            VersionRequirement::parse("[1.0,2.0)").select(&available),
            Some("1.10")
        );
        assert_eq!(VersionRequirement::Latest.select(&available), Some("3.0"));
        assert_eq!(VersionRequirement::parse("[4.0,)").select(&available), None);
        assert_eq!(
            VersionRequirement::parse("1.5").select(&available),
            Some("1.5")
        );
    }

    #[test]
    fn test_select_release_skips_snapshots() {
        let available: Vec<String> = ["1.0", "2.0-SNAPSHOT"]
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(VersionRequirement::Release.select(&available), Some("1.0"));
        assert_eq!(
            VersionRequirement::Latest.select(&available),
            Some("2.0-SNAPSHOT")
        );
    }

    #[test]
    fn test_parse_metadata_versions() {
        let xml = br"<metadata>
  <groupId>test</groupId>
  <artifactId>blub</artifactId>
  <versioning>
    <latest>1.1</latest>
    <release>1.1</release>
    <versions>
      <version>1.0</version>
      <version>1.1</version>
    </versions>
  </versioning>
</metadata>";
        let versions = parse_metadata_versions(xml, "maven-metadata.xml").unwrap();
        assert_eq!(versions, vec!["1.0".to_string(), "1.1".to_string()]);
        assert_eq!(parse_latest_version(xml, "maven-metadata.xml").unwrap(), "1.1");
    }

    #[test]
    fn test_parse_latest_version_missing() {
        let err = parse_latest_version(b"<metadata/>", "maven-metadata.xml").unwrap_err();
        assert!(matches!(err, PomError::MissingVersion { .. }));
    }
}
