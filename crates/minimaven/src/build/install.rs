//! Installing artifacts into an application directory.
//!
//! Installing `blub-1.0.0.jar` first removes every other version of `blub`
//! from the destination, so exactly one copy remains. Which file names count
//! as "a version of blub" is decided by [`artifact_pattern`].

use minimaven_core::{IoContext, MinimavenError, Result};
use minimaven_pom::Coordinate;
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const JARS_DIR: &str = "jars";
pub const PLUGINS_DIR: &str = "plugins";

/// ImageJ loads artifacts whose id contains `_` as plugins.
pub fn install_subdirectory(artifact_id: &str) -> &'static str {
    if artifact_id.contains('_') {
        PLUGINS_DIR
    } else {
        JARS_DIR
    }
}

/// Maven's well-known release qualifiers, any of which may follow a `-`
/// inside a version. Anything else after a `-` is taken to be a classifier.
const QUALIFIERS: &str = "alpha|beta|milestone|m|rc|cr|snapshot|ga|final|release|sp|preview|ea";

/// Matches `artifactId-<version>[-<classifier>].<extension>`.
///
/// A version starts with a digit. It may continue with `-` segments that are
/// numeric (`-1`, deployed snapshot stamps) or a known qualifier with an
/// optional number (`-beta`, `-rc1`, `-SNAPSHOT`). The classifier suffix is
/// required exactly when `coordinate` has one, so `blub-1.0.0-swing.jar` is
/// not a version of unclassified `blub`, and `blubber-2.0.jar` never is.
pub fn artifact_pattern(coordinate: &Coordinate, extension: &str) -> Result<Regex> {
    let classifier = coordinate
        .classifier
        .as_deref()
        .map(|c| format!("-{}", regex::escape(c)))
        .unwrap_or_default();
    let pattern = format!(
        r"^{}-(\d[0-9A-Za-z_.]*(?:-\d+(?:\.\d+)*|-(?i:{QUALIFIERS})\d*)*){classifier}\.{}$",
        regex::escape(&coordinate.artifact_id),
        regex::escape(extension)
    );
    Regex::new(&pattern).map_err(|e| MinimavenError::Config(format!("artifact pattern {pattern}: {e}")))
}

/// Removes every file in `directory` matching `coordinate`'s pattern.
/// A missing directory is not an error.
pub fn remove_versions(directory: &Path, coordinate: &Coordinate, extension: &str) -> Result<Vec<PathBuf>> {
    let pattern = artifact_pattern(coordinate, extension)?;
    let entries = match std::fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(MinimavenError::io(directory, e)),
    };

    let mut removed = Vec::new();
    for entry in entries {
        let entry = entry.at_path(directory)?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !pattern.is_match(name) || !entry.file_type().at_path(entry.path())?.is_file() {
            continue;
        }
        let path = entry.path();
        std::fs::remove_file(&path).at_path(&path)?;
        tracing::info!(path = %path.display(), "removed");
        removed.push(path);
    }
    removed.sort();
    Ok(removed)
}

/// Copies `source` to `directory/<coordinate jar name>`, replacing all other
/// versions. The copy is written under a temporary name in `directory` and
/// renamed into place after the old versions are gone.
pub fn install_file(source: &Path, directory: &Path, coordinate: &Coordinate) -> Result<PathBuf> {
    std::fs::create_dir_all(directory).at_path(directory)?;
    let target = directory.join(coordinate.jar_name());

    let bytes = std::fs::read(source).at_path(source)?;
    let mut temp = NamedTempFile::new_in(directory).at_path(directory)?;
    temp.write_all(&bytes).at_path(temp.path())?;
    temp.as_file().sync_all().at_path(temp.path())?;

    remove_versions(directory, coordinate, "jar")?;
    temp.persist(&target)
        .map_err(|e| MinimavenError::io(&target, e.error))?;
    tracing::info!(target = %target.display(), "installed");
    Ok(target)
}

/// Removes `coordinate`'s artifacts from `jars/` and `plugins/` under
/// `app_dir`.
pub fn clean_installed(app_dir: &Path, coordinate: &Coordinate) -> Result<Vec<PathBuf>> {
    let mut removed = remove_versions(&app_dir.join(JARS_DIR), coordinate, "jar")?;
    removed.extend(remove_versions(&app_dir.join(PLUGINS_DIR), coordinate, "jar")?);
    Ok(removed)
}
