//! Jar packaging.

use crate::project::Project;
use minimaven_core::{IoContext, MinimavenError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const MANIFEST_ENTRY: &str = "META-INF/MANIFEST.MF";

/// Property naming the class recorded as `Main-Class`.
pub const MAIN_CLASS_PROPERTY: &str = "main-class";

/// Container writer: add entries, then finalize.
pub trait ArchiveWriter {
    fn add_file(&mut self, entry: &str, bytes: &[u8]) -> Result<()>;

    fn finish(self) -> Result<()>
    where
        Self: Sized;
}

/// Zip-backed jar writer. Entries go to a temporary file in the destination
/// directory, which replaces the jar only on [`ArchiveWriter::finish`].
pub struct JarWriter {
    path: PathBuf,
    zip: ZipWriter<NamedTempFile>,
}

impl JarWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| MinimavenError::Config(format!("{} has no parent", path.display())))?;
        std::fs::create_dir_all(parent).at_path(parent)?;
        let temp = NamedTempFile::new_in(parent).at_path(parent)?;
        Ok(Self {
            path: path.to_path_buf(),
            zip: ZipWriter::new(temp),
        })
    }

    fn archive_error(&self, error: impl ToString) -> MinimavenError {
        MinimavenError::Archive {
            path: self.path.clone(),
            message: error.to_string(),
        }
    }
}

impl ArchiveWriter for JarWriter {
    fn add_file(&mut self, entry: &str, bytes: &[u8]) -> Result<()> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.zip
            .start_file(entry, options)
            .map_err(|e| self.archive_error(e))?;
        self.zip.write_all(bytes).at_path(&self.path)?;
        Ok(())
    }

    fn finish(self) -> Result<()> {
        let Self { path, zip } = self;
        let temp = zip.finish().map_err(|e| MinimavenError::Archive {
            path: path.clone(),
            message: e.to_string(),
        })?;
        temp.as_file().sync_all().at_path(temp.path())?;
        temp.persist(&path)
            .map_err(|e| MinimavenError::io(&path, e.error))?;
        Ok(())
    }
}

fn manifest(project: &Project) -> String {
    let mut manifest = String::from("Manifest-Version: 1.0\r\nCreated-By: minimaven\r\n");
    if let Some(main_class) = project.property(MAIN_CLASS_PROPERTY) {
        manifest.push_str("Main-Class: ");
        manifest.push_str(main_class);
        manifest.push_str("\r\n");
    }
    manifest.push_str("\r\n");
    manifest
}

fn pom_properties(project: &Project) -> String {
    format!(
        "version={}\ngroupId={}\nartifactId={}\n",
        project.coordinate.version.as_deref().unwrap_or_default(),
        project.coordinate.group_id,
        project.coordinate.artifact_id
    )
}

fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Writes the manifest, the compiled output directory and the project's POM.
/// Returns the number of entries written.
pub fn write_project<W: ArchiveWriter>(writer: &mut W, project: &Project, output_dir: &Path) -> Result<usize> {
    writer.add_file(MANIFEST_ENTRY, manifest(project).as_bytes())?;
    let mut entries = 1;

    if output_dir.is_dir() {
        for entry in WalkDir::new(output_dir).sort_by_file_name() {
            let entry = entry.map_err(|e| MinimavenError::Archive {
                path: output_dir.to_path_buf(),
                message: e.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(output_dir).unwrap_or(entry.path());
            let name = entry_name(relative);
            if name == MANIFEST_ENTRY {
                tracing::warn!(project = %project.gav(), "ignoring manifest in output directory");
                continue;
            }
            let bytes = std::fs::read(entry.path()).at_path(entry.path())?;
            writer.add_file(&name, &bytes)?;
            entries += 1;
        }
    }

    if let Some(pom) = project.pom_path().filter(|p| p.is_file()) {
        let base = format!(
            "META-INF/maven/{}/{}",
            project.coordinate.group_id, project.coordinate.artifact_id
        );
        let bytes = std::fs::read(&pom).at_path(&pom)?;
        writer.add_file(&format!("{base}/pom.xml"), &bytes)?;
        writer.add_file(&format!("{base}/pom.properties"), pom_properties(project).as_bytes())?;
        entries += 2;
    }
    Ok(entries)
}

/// Packages `project`'s output directory into the jar at `jar`.
pub fn package_jar(project: &Project, output_dir: &Path, jar: &Path) -> Result<usize> {
    let mut writer = JarWriter::create(jar)?;
    let entries = write_project(&mut writer, project, output_dir)?;
    writer.finish()?;
    tracing::info!(project = %project.gav(), jar = %jar.display(), entries, "packaged");
    Ok(entries)
}
