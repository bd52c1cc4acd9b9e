//! The project arena.
//!
//! Projects never point at each other directly. Parents and dependency
//! targets are addressed by [`ProjectId`] and looked up in the session's
//! [`ProjectArena`], so one shared parent can back any number of children.

use dashmap::DashMap;
use minimaven_pom::{ArtifactKey, BuildLayout, Coordinate, Packaging};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Arena identity: artifact key plus the declared version (before snapshot
/// resolution).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectId {
    pub key: ArtifactKey,
    pub version: String,
}

impl ProjectId {
    pub fn of(coordinate: &Coordinate) -> Self {
        Self {
            key: coordinate.key(),
            version: coordinate.version.clone().unwrap_or_default(),
        }
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.key, self.version)
    }
}

/// Where a project's POM and artifact come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectSource {
    /// A source tree that minimaven builds itself.
    Local { directory: PathBuf },
    /// A published artifact in the local repository cache.
    Repository { pom: PathBuf },
    /// `scope=system`: a jar on disk and no POM.
    System { jar: PathBuf },
}

/// Ordered dependency-management table. Local entries come first, so the
/// first match for a key is the nearest declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagementTable {
    entries: Vec<Coordinate>,
}

impl ManagementTable {
    pub fn new(entries: Vec<Coordinate>) -> Self {
        Self { entries }
    }

    pub fn get(&self, key: &ArtifactKey) -> Option<&Coordinate> {
        self.entries.iter().find(|entry| &entry.key() == key)
    }

    /// Appends every parent entry whose key is not declared locally.
    pub fn inherit(&mut self, parent: &Self) {
        for entry in &parent.entries {
            if self.get(&entry.key()).is_none() {
                self.entries.push(entry.clone());
            }
        }
    }

    pub fn entries(&self) -> &[Coordinate] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A POM with inheritance, interpolation and dependency management applied.
#[derive(Debug, Clone)]
pub struct Project {
    pub id: ProjectId,
    /// Identity only: scope, optional flag and exclusions are cleared.
    pub coordinate: Coordinate,
    pub parent: Option<ProjectId>,
    pub packaging: Packaging,
    pub source: ProjectSource,
    /// Effective dependency edges; every edge has a version.
    pub dependencies: Vec<Coordinate>,
    pub dependency_management: ManagementTable,
    pub properties: BTreeMap<String, String>,
    pub build: BuildLayout,
    pub repositories: Vec<String>,
    pub modules: Vec<String>,
}

impl Project {
    pub fn gav(&self) -> String {
        self.coordinate.gav()
    }

    pub fn artifact_id(&self) -> &str {
        &self.coordinate.artifact_id
    }

    pub fn is_local(&self) -> bool {
        matches!(self.source, ProjectSource::Local { .. })
    }

    pub fn directory(&self) -> Option<&Path> {
        match &self.source {
            ProjectSource::Local { directory } => Some(directory),
            _ => None,
        }
    }

    pub fn pom_path(&self) -> Option<PathBuf> {
        match &self.source {
            ProjectSource::Local { directory } => Some(directory.join("pom.xml")),
            ProjectSource::Repository { pom } => Some(pom.clone()),
            ProjectSource::System { .. } => None,
        }
    }

    /// Name of the archive built under `target/`: `finalName.jar` when
    /// configured, else the coordinate's jar name. Installed copies and
    /// repository artifacts always use [`Coordinate::jar_name`].
    pub fn target_jar_name(&self) -> String {
        self.build.final_name.as_ref().map_or_else(
            || self.coordinate.jar_name(),
            |name| format!("{name}.jar"),
        )
    }

    /// `<directory>/target`, for local projects.
    pub fn target_dir(&self) -> Option<PathBuf> {
        self.directory().map(|dir| dir.join("target"))
    }

    pub fn output_dir(&self) -> Option<PathBuf> {
        self.directory().map(|dir| dir.join(self.build.output()))
    }

    pub fn source_dir(&self) -> Option<PathBuf> {
        self.directory().map(|dir| dir.join(self.build.sources()))
    }

    pub fn resource_dirs(&self) -> Vec<PathBuf> {
        self.directory().map_or_else(Vec::new, |dir| {
            self.build
                .resource_directories()
                .into_iter()
                .map(|res| dir.join(res))
                .collect()
        })
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.gav())
    }
}

/// Session-wide project store. Shared read access; an id maps to exactly one
/// `Arc<Project>` for the lifetime of the session.
#[derive(Debug, Default)]
pub struct ProjectArena {
    projects: DashMap<ProjectId, Arc<Project>>,
}

impl ProjectArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &ProjectId) -> Option<Arc<Project>> {
        self.projects.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, id: &ProjectId) -> bool {
        self.projects.contains_key(id)
    }

    /// Inserts `project` unless its id is already present; returns the
    /// instance the arena holds afterwards.
    pub fn insert(&self, project: Project) -> Arc<Project> {
        let entry = self
            .projects
            .entry(project.id.clone())
            .or_insert_with(|| Arc::new(project));
        Arc::clone(entry.value())
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use minimaven_pom::Scope;

    /// Minimal repository-sourced project for graph tests.
    pub(crate) fn project(gav: &str, dependencies: Vec<Coordinate>) -> Project {
        let mut parts = gav.split(':');
        let group = parts.next().unwrap();
        let artifact = parts.next().unwrap();
        let version = parts.next().unwrap();
        let coordinate = Coordinate::new(group, artifact, Some(version.to_string()));
        Project {
            id: ProjectId::of(&coordinate),
            coordinate,
            parent: None,
            packaging: Packaging::Jar,
            source: ProjectSource::Repository {
                pom: PathBuf::from(format!("{artifact}-{version}.pom")),
            },
            dependencies,
            dependency_management: ManagementTable::default(),
            properties: BTreeMap::new(),
            build: BuildLayout::default(),
            repositories: Vec::new(),
            modules: Vec::new(),
        }
    }

    pub(crate) fn dep(gav: &str) -> Coordinate {
        let mut parts = gav.split(':');
        Coordinate::new(
            parts.next().unwrap(),
            parts.next().unwrap(),
            parts.next().map(ToString::to_string),
        )
    }

    #[test]
    fn test_project_id() {
        let a = dep("g:a:1.0");
        let b = dep("g:a:1.0").with_scope(Scope::Test);
        assert_eq!(ProjectId::of(&a), ProjectId::of(&b));
        assert_ne!(ProjectId::of(&a), ProjectId::of(&dep("g:a:2.0")));
        assert_eq!(ProjectId::of(&a).to_string(), "g>a:1.0");
    }

    #[test]
    fn test_management_table_nearest_wins() {
        let mut table = ManagementTable::new(vec![dep("g:a:1.0")]);
        let parent = ManagementTable::new(vec![dep("g:a:2.0"), dep("g:b:3.0")]);
        table.inherit(&parent);

        assert_eq!(table.len(), 2);
        let a = table.get(&dep("g:a:0").key()).unwrap();
        assert_eq!(a.version.as_deref(), Some("1.0"));
        let b = table.get(&dep("g:b:0").key()).unwrap();
        assert_eq!(b.version.as_deref(), Some("3.0"));
    }

    #[test]
    fn test_arena_keeps_first_instance() {
        let arena = ProjectArena::new();
        let first = arena.insert(project("g:a:1.0", vec![]));
        let second = arena.insert(project("g:a:1.0", vec![dep("g:b:1.0")]));
        assert!(Arc::ptr_eq(&first, &second));
        assert!(second.dependencies.is_empty());
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_local_layout() {
        let mut p = project("g:blub:1.0.0", vec![]);
        p.source = ProjectSource::Local {
            directory: PathBuf::from("/src/blub"),
        };
        assert_eq!(p.target_jar_name(), "blub-1.0.0.jar");
        assert_eq!(p.output_dir(), Some(PathBuf::from("/src/blub/target/classes")));
        assert_eq!(
            p.resource_dirs(),
            vec![PathBuf::from("/src/blub/src/main/resources")]
        );

        p.build.final_name = Some("Blub_".into());
        assert_eq!(p.target_jar_name(), "Blub_.jar");
    }
}
