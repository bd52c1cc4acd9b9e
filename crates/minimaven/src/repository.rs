//! Maven repository layout, local and remote.
//!
//! Artifacts live at `group/path/artifact/version/artifact-version[-classifier].ext`.
//! The version directory always uses the literal version (`1.0-SNAPSHOT`);
//! file names use the effective one (`1.0-20240101.090000-7`). The deployed
//! build a snapshot resolved to is recorded next to its files, so later
//! sessions can find them without asking a remote.

use minimaven_core::{IoContext, MinimavenError, Result};
use minimaven_pom::{Coordinate, SnapshotVersion, parse_snapshot_metadata};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const METADATA_FILE: &str = "maven-metadata.xml";
pub const LOCAL_METADATA_FILE: &str = "maven-metadata-local.xml";

/// `org.scijava` → `org/scijava`.
pub fn group_path(group_id: &str) -> String {
    group_id.replace('.', "/")
}

fn relative_version_dir(coordinate: &Coordinate) -> String {
    format!(
        "{}/{}/{}",
        group_path(&coordinate.group_id),
        coordinate.artifact_id,
        coordinate.version.as_deref().unwrap_or_default()
    )
}

fn artifact_file_name(coordinate: &Coordinate, extension: &str) -> String {
    // POMs are shared by all classifiers of a version.
    let with_classifier = extension != "pom";
    coordinate.file_name(false, with_classifier, Some(extension))
}

pub fn remote_artifact_url(base: &str, coordinate: &Coordinate, extension: &str) -> String {
    format!(
        "{}/{}/{}",
        base.trim_end_matches('/'),
        relative_version_dir(coordinate),
        artifact_file_name(coordinate, extension)
    )
}

/// Per-version metadata, which names the latest deployed snapshot build.
pub fn snapshot_metadata_url(base: &str, coordinate: &Coordinate) -> String {
    format!(
        "{}/{}/{METADATA_FILE}",
        base.trim_end_matches('/'),
        relative_version_dir(coordinate)
    )
}

/// Artifact-level metadata listing every published version.
pub fn artifact_metadata_url(base: &str, group_id: &str, artifact_id: &str) -> String {
    format!(
        "{}/{}/{artifact_id}/{METADATA_FILE}",
        base.trim_end_matches('/'),
        group_path(group_id)
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRepository {
    root: PathBuf,
}

impl LocalRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn version_dir(&self, coordinate: &Coordinate) -> PathBuf {
        self.root.join(relative_version_dir(coordinate))
    }

    pub fn artifact_path(&self, coordinate: &Coordinate, extension: &str) -> PathBuf {
        self.version_dir(coordinate)
            .join(artifact_file_name(coordinate, extension))
    }

    pub fn pom_path(&self, coordinate: &Coordinate) -> PathBuf {
        self.artifact_path(coordinate, "pom")
    }

    pub fn jar_path(&self, coordinate: &Coordinate) -> PathBuf {
        self.artifact_path(coordinate, "jar")
    }

    pub fn snapshot_record_path(&self, coordinate: &Coordinate) -> PathBuf {
        self.version_dir(coordinate).join(LOCAL_METADATA_FILE)
    }

    /// Remembers the deployed build `coordinate`'s snapshot version resolved to.
    pub fn record_snapshot(&self, coordinate: &Coordinate, snapshot: &SnapshotVersion) -> Result<PathBuf> {
        let (Some(timestamp), Some(build_number)) = (&snapshot.timestamp, &snapshot.build_number) else {
            return Err(MinimavenError::Config(format!(
                "{} is not a deployed snapshot",
                snapshot.resolved_version()
            )));
        };
        let record = format!(
            "<metadata>\n  <groupId>{}</groupId>\n  <artifactId>{}</artifactId>\n  \
             <version>{}</version>\n  <versioning>\n    <snapshot>\n      \
             <timestamp>{timestamp}</timestamp>\n      <buildNumber>{build_number}</buildNumber>\n    \
             </snapshot>\n  </versioning>\n</metadata>\n",
            coordinate.group_id,
            coordinate.artifact_id,
            coordinate.version.as_deref().unwrap_or_default()
        );
        let path = self.snapshot_record_path(coordinate);
        write_atomic(&path, record.as_bytes())?;
        tracing::debug!(path = %path.display(), resolved = %snapshot, "recorded snapshot");
        Ok(path)
    }

    /// The deployed build recorded for `coordinate`, if any.
    pub fn recorded_snapshot(&self, coordinate: &Coordinate) -> Result<Option<String>> {
        let path = self.snapshot_record_path(coordinate);
        let content = match std::fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(MinimavenError::io(&path, e)),
        };
        let snapshot = parse_snapshot_metadata(&content, &path.display().to_string())?;
        Ok(snapshot
            .is_timestamped()
            .then(|| snapshot.resolved_version()))
    }

    /// Stores downloaded bytes at the artifact's path.
    pub fn store(&self, coordinate: &Coordinate, extension: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.artifact_path(coordinate, extension);
        write_atomic(&path, bytes)?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "stored in local repository");
        Ok(path)
    }
}

/// Writes `bytes` to a temporary file next to `path` and renames it into
/// place, so `path` either holds the complete content or is untouched.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| MinimavenError::Config(format!("{} has no parent", path.display())))?;
    std::fs::create_dir_all(parent).at_path(parent)?;

    let mut temp = tempfile::NamedTempFile::new_in(parent).at_path(parent)?;
    temp.write_all(bytes).at_path(temp.path())?;
    temp.as_file().sync_all().at_path(temp.path())?;
    temp.persist(path)
        .map_err(|e| MinimavenError::io(path, e.error))?;
    Ok(())
}
