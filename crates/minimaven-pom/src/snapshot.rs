//! Snapshot version resolution.
//!
//! A deployed snapshot has a concrete identity `base-timestamp-buildNumber`,
//! published in the per-version `maven-metadata.xml`. The same three parts can
//! also be recovered from a single composite version string.

use crate::coordinate::SNAPSHOT_SUFFIX;
use crate::error::{PomError, Result};
use minimaven_core::{ElementReader, XmlEvent};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static TIMESTAMPED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*)-(\d+\.\d+)-(\d+)$").expect("timestamped version pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotVersion {
    pub base_version: String,
    pub timestamp: Option<String>,
    pub build_number: Option<String>,
}

impl SnapshotVersion {
    /// Splits `base-timestamp-buildNumber` into its parts.
    pub fn parse(version: &str) -> Result<Self> {
        let caps = TIMESTAMPED
            .captures(version)
            .ok_or_else(|| PomError::UnhandledVersion {
                version: version.to_string(),
            })?;
        Ok(Self {
            base_version: caps[1].to_string(),
            timestamp: Some(caps[2].to_string()),
            build_number: Some(caps[3].to_string()),
        })
    }

    /// A snapshot that only exists locally and carries no deployment stamp.
    pub fn local(base_version: impl Into<String>) -> Self {
        Self {
            base_version: base_version.into(),
            timestamp: None,
            build_number: None,
        }
    }

    pub const fn is_timestamped(&self) -> bool {
        self.timestamp.is_some() && self.build_number.is_some()
    }

    /// `base-timestamp-buildNumber`, or `base-SNAPSHOT` for a local snapshot.
    pub fn resolved_version(&self) -> String {
        match (&self.timestamp, &self.build_number) {
            (Some(timestamp), Some(build_number)) => {
                format!("{}-{timestamp}-{build_number}", self.base_version)
            }
            _ => format!("{}{SNAPSHOT_SUFFIX}", self.base_version),
        }
    }
}

impl fmt::Display for SnapshotVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resolved_version())
    }
}

/// Extracts the snapshot identity from a per-version `maven-metadata.xml`.
///
/// `<version>`, `<timestamp>` and `<buildNumber>` are read wherever they occur
/// as leaves, in any order; the last occurrence of each wins. A version ending
/// in `-SNAPSHOT` denotes a local snapshot that needs neither stamp. Partial
/// metadata (one stamp without the other, or no version) is rejected.
pub fn parse_snapshot_metadata(content: &[u8], context: &str) -> Result<SnapshotVersion> {
    let mut reader = ElementReader::from_bytes(content, context)?;
    let mut base_version: Option<String> = None;
    let mut local = false;
    let mut timestamp: Option<String> = None;
    let mut build_number: Option<String> = None;

    while let Some(event) = reader.next_event()? {
        let XmlEvent::Close {
            name,
            text: Some(text),
        } = event
        else {
            continue;
        };
        match name.as_str() {
            "version" => {
                if let Some(base) = text.strip_suffix(SNAPSHOT_SUFFIX) {
                    base_version = Some(base.to_string());
                    local = true;
                } else {
                    let parsed = SnapshotVersion::parse(&text)?;
                    base_version = Some(parsed.base_version);
                    timestamp = parsed.timestamp;
                    build_number = parsed.build_number;
                    local = false;
                }
            }
            "timestamp" if !text.is_empty() => timestamp = Some(text),
            "buildNumber" if !text.is_empty() => build_number = Some(text),
            _ => {}
        }
    }

    let base_version = base_version.ok_or_else(|| PomError::MissingVersion {
        context: context.to_string(),
    })?;

    match (timestamp, build_number) {
        (Some(timestamp), Some(build_number)) => Ok(SnapshotVersion {
            base_version,
            timestamp: Some(timestamp),
            build_number: Some(build_number),
        }),
        (None, None) if local => Ok(SnapshotVersion::local(base_version)),
        (timestamp, build_number) => Err(PomError::IncompleteSnapshot {
            context: context.to_string(),
            timestamp,
            build_number,
        }),
    }
}
