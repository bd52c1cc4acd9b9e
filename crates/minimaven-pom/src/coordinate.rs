//! Artifact identity and file naming.

use crate::types::Scope;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Suffix of versions that must be resolved against repository metadata.
pub const SNAPSHOT_SUFFIX: &str = "-SNAPSHOT";

/// Maps empty or all-whitespace values to `None`.
pub fn normalize(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == v.len() {
            Some(v)
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Deduplication identity: `group>artifact[>classifier]`. Never contains a
/// version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactKey(String);

impl ArtifactKey {
    pub fn new(group_id: &str, artifact_id: &str, classifier: Option<&str>) -> Self {
        match classifier.filter(|c| !c.is_empty()) {
            Some(classifier) => Self(format!("{group_id}>{artifact_id}>{classifier}")),
            None => Self(format!("{group_id}>{artifact_id}")),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A `groupId:artifactId` pair suppressed below one dependency edge. Either
/// part may be the wildcard `*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Exclusion {
    pub group_id: String,
    pub artifact_id: String,
}

impl Exclusion {
    pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
        }
    }

    pub fn matches(&self, group_id: &str, artifact_id: &str) -> bool {
        (self.group_id == "*" || self.group_id == group_id)
            && (self.artifact_id == "*" || self.artifact_id == artifact_id)
    }
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group_id, self.artifact_id)
    }
}

/// A `(group, artifact, version, classifier)` identity plus the edge
/// attributes a dependency declaration carries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Coordinate {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Option<String>,
    pub classifier: Option<String>,
    pub scope: Option<Scope>,
    pub optional: bool,
    pub system_path: Option<PathBuf>,
    pub exclusions: BTreeSet<Exclusion>,
    snapshot_version: OnceLock<String>,
}

impl Coordinate {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: Option<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: normalize(version),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: Option<String>) -> Self {
        self.classifier = normalize(classifier);
        self
    }

    #[must_use]
    pub const fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    #[must_use]
    pub const fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    #[must_use]
    pub fn with_exclusion(mut self, exclusion: Exclusion) -> Self {
        self.exclusions.insert(exclusion);
        self
    }

    pub fn key(&self) -> ArtifactKey {
        ArtifactKey::new(
            &self.group_id,
            &self.artifact_id,
            self.classifier.as_deref(),
        )
    }

    /// The resolved snapshot version when one was recorded, else the literal
    /// version.
    pub fn effective_version(&self) -> Option<&str> {
        self.snapshot_version
            .get()
            .map(String::as_str)
            .or(self.version.as_deref())
    }

    pub fn snapshot_version(&self) -> Option<&str> {
        self.snapshot_version.get().map(String::as_str)
    }

    /// Records the resolved snapshot version. Only the first call has an
    /// effect; returns whether this call stored the value.
    pub fn set_snapshot_version(&self, resolved: impl Into<String>) -> bool {
        self.snapshot_version.set(resolved.into()).is_ok()
    }

    pub fn is_snapshot(&self) -> bool {
        self.version
            .as_deref()
            .is_some_and(|v| v.ends_with(SNAPSHOT_SUFFIX))
    }

    pub fn scope_or_default(&self) -> Scope {
        self.scope.unwrap_or_default()
    }

    /// `[group/]artifact-version[-classifier][.ext]`, using the effective
    /// version.
    pub fn file_name(
        &self,
        with_group_prefix: bool,
        with_classifier: bool,
        extension: Option<&str>,
    ) -> String {
        let mut name = String::new();
        if with_group_prefix {
            name.push_str(&self.group_id);
            name.push('/');
        }
        name.push_str(&self.artifact_id);
        if let Some(version) = self.effective_version() {
            name.push('-');
            name.push_str(version);
        }
        if with_classifier && let Some(classifier) = &self.classifier {
            name.push('-');
            name.push_str(classifier);
        }
        if let Some(extension) = extension {
            name.push('.');
            name.push_str(extension);
        }
        name
    }

    pub fn jar_name(&self) -> String {
        self.file_name(false, true, Some("jar"))
    }

    pub fn pom_name(&self) -> String {
        self.file_name(false, false, Some("pom"))
    }

    /// `group:artifact:version`, using the effective version.
    pub fn gav(&self) -> String {
        format!(
            "{}:{}:{}",
            self.group_id,
            self.artifact_id,
            self.effective_version().unwrap_or_default()
        )
    }

    /// Whether any exclusion on this edge suppresses `other`.
    pub fn excludes(&self, other: &Self) -> bool {
        self.exclusions
            .iter()
            .any(|e| e.matches(&other.group_id, &other.artifact_id))
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name(true, true, None))?;
        if self.optional || self.scope.is_some() {
            f.write_str(" {")?;
            if self.optional {
                f.write_str("optional")?;
            }
            if let Some(scope) = self.scope {
                if self.optional {
                    f.write_str(" ")?;
                }
                write!(f, "scope={scope}")?;
            }
            f.write_str("}")?;
        }
        Ok(())
    }
}
