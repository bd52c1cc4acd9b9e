//! Staleness checks for incremental compilation.

use minimaven_core::{IoContext, MinimavenError, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Sources under a root, split by whether they need recompiling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSet {
    pub all: Vec<PathBuf>,
    pub stale: Vec<PathBuf>,
}

fn walk_error(root: &Path, error: walkdir::Error) -> MinimavenError {
    let path = error.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf);
    let source = error
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::other("file system loop"));
    MinimavenError::io(path, source)
}

/// Regular files below `root`, sorted; empty when `root` does not exist.
fn files_under(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| walk_error(root, e))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

pub fn java_sources(root: &Path) -> Result<Vec<PathBuf>> {
    Ok(files_under(root)?
        .into_iter()
        .filter(|path| path.extension().is_some_and(|ext| ext == "java"))
        .collect())
}

/// `src/main/java/a/B.java` → `target/classes/a/B.class`.
pub fn class_file(source_root: &Path, output_dir: &Path, source: &Path) -> PathBuf {
    let relative = source.strip_prefix(source_root).unwrap_or(source);
    output_dir.join(relative).with_extension("class")
}

/// A class file that is missing or older than its source is stale.
pub fn is_stale(source: &Path, class: &Path) -> Result<bool> {
    let class_modified = match std::fs::metadata(class) {
        Ok(meta) => meta.modified().at_path(class)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(MinimavenError::io(class, e)),
    };
    let source_modified = std::fs::metadata(source)
        .and_then(|meta| meta.modified())
        .at_path(source)?;
    Ok(class_modified < source_modified)
}

pub fn source_set(source_root: &Path, output_dir: &Path) -> Result<SourceSet> {
    let all = java_sources(source_root)?;
    let mut stale = Vec::new();
    for source in &all {
        if is_stale(source, &class_file(source_root, output_dir, source))? {
            tracing::debug!(source = %source.display(), "stale");
            stale.push(source.clone());
        }
    }
    Ok(SourceSet { all, stale })
}

/// Copies resources into `output_dir` where the copy is missing or older.
/// Returns the number of files copied.
pub fn copy_resources(resource_dirs: &[PathBuf], output_dir: &Path) -> Result<usize> {
    let mut copied = 0;
    for root in resource_dirs {
        for file in files_under(root)? {
            let relative = file.strip_prefix(root).unwrap_or(&file);
            let target = output_dir.join(relative);
            if !is_stale(&file, &target)? {
                continue;
            }
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).at_path(parent)?;
            }
            std::fs::copy(&file, &target).at_path(&target)?;
            copied += 1;
        }
    }
    if copied > 0 {
        tracing::debug!(copied, output = %output_dir.display(), "copied resources");
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn touch(path: &Path, modified: SystemTime) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"x").unwrap();
        std::fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(modified)
            .unwrap();
    }

    #[test]
    fn test_class_file_mapping() {
        assert_eq!(
            class_file(
                Path::new("/p/src/main/java"),
                Path::new("/p/target/classes"),
                Path::new("/p/src/main/java/org/Blub.java")
            ),
            PathBuf::from("/p/target/classes/org/Blub.class")
        );
    }

    #[test]
    fn test_source_set_detects_missing_and_older_classes() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let out = dir.path().join("classes");
        let now = SystemTime::now();
        let earlier = now - Duration::from_secs(60);

        touch(&src.join("a/Fresh.java"), earlier);
        touch(&out.join("a/Fresh.class"), now);
        touch(&src.join("a/Edited.java"), now);
        touch(&out.join("a/Edited.class"), earlier);
        touch(&src.join("New.java"), now);
        touch(&src.join("notes.txt"), now);

        let set = source_set(&src, &out).unwrap();
        assert_eq!(set.all.len(), 3);
        let stale: Vec<_> = set
            .stale
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(stale, vec!["New.java", "Edited.java"]);
    }

    #[test]
    fn test_missing_source_root_is_empty() {
        let dir = TempDir::new().unwrap();
        let set = source_set(&dir.path().join("nope"), dir.path()).unwrap();
        assert_eq!(set, SourceSet::default());
    }

    #[test]
    fn test_copy_resources_only_when_newer() {
        let dir = TempDir::new().unwrap();
        let res = dir.path().join("resources");
        let out = dir.path().join("classes");
        std::fs::create_dir_all(res.join("META-INF")).unwrap();
        std::fs::write(res.join("version.txt"), "1.0.0\n").unwrap();
        std::fs::write(res.join("META-INF/plugins.config"), "x").unwrap();

        assert_eq!(copy_resources(&[res.clone()], &out).unwrap(), 2);
        assert_eq!(std::fs::read_to_string(out.join("version.txt")).unwrap(), "1.0.0\n");
        assert_eq!(copy_resources(&[res], &out).unwrap(), 0);
    }
}
