//! Project graph builder.
//!
//! A [`Session`] owns the project arena for one build. Projects are found, in
//! order, among the registered local source trees, in the local repository,
//! and on the remote repositories. Concurrent requests for the same id share
//! one load through a per-id [`OnceCell`]; no arena or cache guard is held
//! while a fetch is in flight.

use crate::inherit::merge;
use crate::project::{ManagementTable, Project, ProjectArena, ProjectId, ProjectSource};
use crate::repository::{
    LocalRepository, artifact_metadata_url, remote_artifact_url, snapshot_metadata_url,
    write_atomic,
};
use crate::resolver::{self, ScopeFilter};
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, join_all};
use minimaven_core::{BuildConfig, FetchOutcome, Fetcher, IoContext, MinimavenError, Result};
use minimaven_pom::{
    ArtifactKey, BuildLayout, Coordinate, Exclusion, Packaging, PomDocument, Scope,
    VersionRequirement, parse_metadata_versions, parse_pom, parse_snapshot_metadata,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;

type ProjectCell = Arc<OnceCell<Arc<Project>>>;

pub struct Session {
    config: BuildConfig,
    fetcher: Arc<dyn Fetcher>,
    repository: LocalRepository,
    arena: ProjectArena,
    pending: DashMap<ProjectId, ProjectCell>,
    local_sources: DashMap<ProjectId, PathBuf>,
    /// Literal snapshot GAV → resolved version, `None` when it stays local.
    snapshots: DashMap<String, Option<String>>,
}

impl Session {
    pub fn new(config: BuildConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        let repository = LocalRepository::new(config.local_repository.clone());
        Self {
            config,
            fetcher,
            repository,
            arena: ProjectArena::new(),
            pending: DashMap::new(),
            local_sources: DashMap::new(),
            snapshots: DashMap::new(),
        }
    }

    pub const fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub const fn arena(&self) -> &ProjectArena {
        &self.arena
    }

    pub const fn repository(&self) -> &LocalRepository {
        &self.repository
    }

    pub fn project(&self, id: &ProjectId) -> Option<Arc<Project>> {
        self.arena.get(id)
    }

    fn network_enabled(&self) -> bool {
        !self.config.offline && self.fetcher.is_online()
    }

    /// Remote repositories for lookups on behalf of `project`: its own
    /// (inherited) declarations, then the configured ones.
    pub fn repositories_for(&self, project: &Project) -> Vec<String> {
        let mut repositories = project.repositories.clone();
        for repository in &self.config.remote_repositories {
            let repository = repository.trim_end_matches('/').to_string();
            if !repositories.contains(&repository) {
                repositories.push(repository);
            }
        }
        repositories
    }

    /// Loads the POM at `pom_path`, its parents and everything its dependency
    /// edges reach.
    pub async fn load(&self, pom_path: &Path) -> Result<Arc<Project>> {
        let project = self.load_local(pom_path.to_path_buf(), Vec::new()).await?;
        self.load_dependencies(&project).await?;
        Ok(project)
    }

    /// Like [`Session::load`] for a POM held in memory. `base_dir` is the
    /// project directory used for sources and `relativePath` lookups.
    pub async fn load_bytes(&self, content: &[u8], base_dir: &Path) -> Result<Arc<Project>> {
        let context = base_dir.join("pom.xml").display().to_string();
        let doc = parse_pom(content, &context)?;
        let project = self
            .load_document(doc, base_dir.to_path_buf(), Vec::new())
            .await?;
        self.load_dependencies(&project).await?;
        Ok(project)
    }

    /// Loads every `<module>` of a local aggregator, recursively.
    ///
    /// All module directories are registered as local sources before any of
    /// them is loaded, so siblings depending on each other resolve from
    /// source instead of the repository.
    pub fn load_modules<'a>(&'a self, aggregator: &'a Project) -> BoxFuture<'a, Result<Vec<Arc<Project>>>> {
        async move {
            let Some(directory) = aggregator.directory() else {
                return Ok(Vec::new());
            };

            let mut pom_paths = Vec::with_capacity(aggregator.modules.len());
            for module in &aggregator.modules {
                let module_dir = directory.join(module);
                let pom_path = module_dir.join("pom.xml");
                let content = tokio::fs::read(&pom_path).await.at_path(&pom_path)?;
                let doc = parse_pom(&content, &pom_path.display().to_string())?;
                if let Some(id) = declared_id(&doc) {
                    self.local_sources.insert(id, module_dir);
                }
                pom_paths.push(pom_path);
            }

            let loads = pom_paths
                .iter()
                .map(|pom_path| self.load_local(pom_path.clone(), vec![aggregator.id.clone()]));
            let mut modules = Vec::with_capacity(pom_paths.len());
            for loaded in join_all(loads).await {
                modules.push(loaded?);
            }

            for module in &modules {
                self.load_dependencies(module).await?;
            }

            let mut nested = Vec::new();
            for module in &modules {
                if !module.modules.is_empty() {
                    nested.extend(self.load_modules(module).await?);
                }
            }
            modules.extend(nested);
            tracing::info!(
                aggregator = %aggregator.gav(),
                modules = modules.len(),
                "loaded modules"
            );
            Ok(modules)
        }
        .boxed()
    }

    /// Resolves the dependency set of `root` against the session arena.
    pub fn resolve(
        &self,
        root: &Project,
        filter: ScopeFilter,
        include_optional: bool,
        exclude_artifact_id: Option<&str>,
    ) -> Result<Vec<Arc<Project>>> {
        resolver::resolve(
            &self.arena,
            root,
            filter,
            include_optional,
            exclude_artifact_id,
        )
    }

    fn load_local(&self, pom_path: PathBuf, path: Vec<ProjectId>) -> BoxFuture<'_, Result<Arc<Project>>> {
        async move {
            let content = tokio::fs::read(&pom_path).await.at_path(&pom_path)?;
            let doc = parse_pom(&content, &pom_path.display().to_string())?;
            let directory = pom_path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
            self.load_document(doc, directory, path).await
        }
        .boxed()
    }

    fn load_document(
        &self,
        doc: PomDocument,
        directory: PathBuf,
        path: Vec<ProjectId>,
    ) -> BoxFuture<'_, Result<Arc<Project>>> {
        async move {
            let Some(id) = declared_id(&doc) else {
                // Without an id `merge` reports the missing field.
                return self.build_local(doc, directory, path).await;
            };
            if let Some(project) = self.arena.get(&id) {
                return Ok(project);
            }
            if path.contains(&id) {
                return Err(cycle_error(&id, &path));
            }
            let cell = self.cell(&id);
            cell.get_or_try_init(|| self.build_local(doc, directory, path))
                .await
                .cloned()
        }
        .boxed()
    }

    fn build_local(
        &self,
        doc: PomDocument,
        directory: PathBuf,
        path: Vec<ProjectId>,
    ) -> BoxFuture<'_, Result<Arc<Project>>> {
        async move {
            tracing::info!(directory = %directory.display(), artifact = %doc.artifact_id, "loading local project");
            let mut child_path = path;
            if let Some(id) = declared_id(&doc) {
                self.local_sources.insert(id.clone(), directory.clone());
                child_path.push(id);
            }

            let parent = match &doc.parent {
                Some(parent_ref) => {
                    let relative = directory.join(parent_ref.relative_path());
                    let candidate = if relative.is_dir() {
                        relative.join("pom.xml")
                    } else {
                        relative
                    };
                    let local_parent = match tokio::fs::read(&candidate).await {
                        Ok(content) => {
                            let parent_doc =
                                parse_pom(&content, &candidate.display().to_string())?;
                            let matches = declared_id(&parent_doc)
                                .is_some_and(|id| id == ProjectId::of(&parent_ref.coordinate));
                            if matches {
                                let parent_dir = candidate
                                    .parent()
                                    .map_or_else(|| directory.clone(), Path::to_path_buf);
                                Some(
                                    self.load_document(parent_doc, parent_dir, child_path.clone())
                                        .await?,
                                )
                            } else {
                                tracing::debug!(
                                    candidate = %candidate.display(),
                                    parent = %parent_ref.coordinate.gav(),
                                    "relativePath does not point at the declared parent"
                                );
                                None
                            }
                        }
                        Err(_) => None,
                    };
                    match local_parent {
                        Some(parent) => Some(parent),
                        None => {
                            let repositories = self.repositories_for_document(&doc);
                            Some(
                                self.load_coordinate(
                                    &parent_ref.coordinate,
                                    &repositories,
                                    &child_path,
                                )
                                .await?,
                            )
                        }
                    }
                }
                None => None,
            };

            let mut project = merge(
                &doc,
                parent.as_deref(),
                ProjectSource::Local {
                    directory: directory.clone(),
                },
            )?;
            self.resolve_requirements(&mut project).await?;
            self.local_sources
                .insert(project.id.clone(), directory);
            Ok(self.arena.insert(project))
        }
        .boxed()
    }

    fn repositories_for_document(&self, doc: &PomDocument) -> Vec<String> {
        let mut repositories = doc.repositories.clone();
        for repository in &self.config.remote_repositories {
            let repository = repository.trim_end_matches('/').to_string();
            if !repositories.contains(&repository) {
                repositories.push(repository);
            }
        }
        repositories
    }

    fn cell(&self, id: &ProjectId) -> ProjectCell {
        Arc::clone(self.pending.entry(id.clone()).or_default().value())
    }

    /// Loads the project behind a dependency or parent coordinate.
    pub fn load_coordinate<'a>(
        &'a self,
        coordinate: &'a Coordinate,
        repositories: &'a [String],
        path: &'a [ProjectId],
    ) -> BoxFuture<'a, Result<Arc<Project>>> {
        async move {
            if coordinate.scope == Some(Scope::System) {
                return self.system_project(coordinate, path);
            }

            let id = ProjectId::of(coordinate);
            if let Some(project) = self.arena.get(&id) {
                tracing::trace!(%id, "project cache hit");
                return Ok(project);
            }
            if path.contains(&id) {
                return Err(cycle_error(&id, path));
            }

            let local_dir = self.local_sources.get(&id).map(|dir| dir.value().clone());
            if let Some(directory) = local_dir {
                return self
                    .load_local(directory.join("pom.xml"), path.to_vec())
                    .await;
            }

            let cell = self.cell(&id);
            cell.get_or_try_init(|| self.fetch_project(coordinate, repositories, path))
                .await
                .cloned()
        }
        .boxed()
    }

    fn fetch_project<'a>(
        &'a self,
        coordinate: &'a Coordinate,
        repositories: &'a [String],
        path: &'a [ProjectId],
    ) -> BoxFuture<'a, Result<Arc<Project>>> {
        async move {
            self.apply_snapshot(coordinate, repositories).await?;

            let Some(pom) = self.locate_pom(coordinate, repositories).await? else {
                return Err(MinimavenError::Resolution {
                    coordinate: coordinate.gav(),
                    path: format_path(path),
                });
            };
            let content = tokio::fs::read(&pom).await.at_path(&pom)?;
            let doc = parse_pom(&content, &pom.display().to_string())?;

            let id = ProjectId::of(coordinate);
            let mut child_path = path.to_vec();
            child_path.push(id.clone());

            let mut lookup = doc.repositories.clone();
            for repository in repositories {
                if !lookup.contains(repository) {
                    lookup.push(repository.clone());
                }
            }

            let parent = match &doc.parent {
                Some(parent_ref) => Some(
                    self.load_coordinate(&parent_ref.coordinate, &lookup, &child_path)
                        .await?,
                ),
                None => None,
            };

            let mut project = merge(&doc, parent.as_deref(), ProjectSource::Repository { pom })?;
            project.coordinate = identity(coordinate);
            project.id = id;
            self.resolve_requirements(&mut project).await?;
            Ok(self.arena.insert(project))
        }
        .boxed()
    }

    fn system_project(&self, coordinate: &Coordinate, path: &[ProjectId]) -> Result<Arc<Project>> {
        let id = ProjectId::of(coordinate);
        if let Some(project) = self.arena.get(&id) {
            return Ok(project);
        }
        let jar = coordinate
            .system_path
            .clone()
            .ok_or_else(|| MinimavenError::MissingField {
                field: "systemPath",
                context: format!("{} (required by {})", coordinate.gav(), format_path(path)),
            })?;
        Ok(self.arena.insert(Project {
            id,
            coordinate: identity(coordinate),
            parent: None,
            packaging: Packaging::Jar,
            source: ProjectSource::System { jar },
            dependencies: Vec::new(),
            dependency_management: ManagementTable::default(),
            properties: BTreeMap::new(),
            build: BuildLayout::default(),
            repositories: Vec::new(),
            modules: Vec::new(),
        }))
    }

    /// Finds the POM in the local repository, downloading it when missing.
    async fn locate_pom(&self, coordinate: &Coordinate, repositories: &[String]) -> Result<Option<PathBuf>> {
        let local = self.repository.pom_path(coordinate);
        if local.is_file() {
            tracing::debug!(pom = %local.display(), "using local repository");
            return Ok(Some(local));
        }
        if !self.network_enabled() {
            return Ok(None);
        }

        for base in repositories {
            let url = remote_artifact_url(base, coordinate, "pom");
            match self.fetcher.fetch(&url).await? {
                FetchOutcome::Found(bytes) => {
                    tracing::info!(%url, "downloaded POM");
                    return self.repository.store(coordinate, "pom", &bytes).map(Some);
                }
                FetchOutcome::NotFound => tracing::debug!(%url, "not found"),
            }
        }
        Ok(None)
    }

    /// Records the deployed snapshot build on `coordinate`, at most once per
    /// literal snapshot version and session.
    pub async fn apply_snapshot(&self, coordinate: &Coordinate, repositories: &[String]) -> Result<()> {
        if !coordinate.is_snapshot() || coordinate.snapshot_version().is_some() {
            return Ok(());
        }
        let source_id = ProjectId {
            key: ArtifactKey::new(&coordinate.group_id, &coordinate.artifact_id, None),
            version: coordinate.version.clone().unwrap_or_default(),
        };
        if self.local_sources.contains_key(&source_id) {
            return Ok(());
        }

        let gav = format!(
            "{}:{}:{}",
            coordinate.group_id,
            coordinate.artifact_id,
            source_id.version
        );
        let known = self.snapshots.get(&gav).map(|entry| entry.value().clone());
        let resolved = match known {
            Some(resolved) => resolved,
            None => {
                let resolved = self.resolve_snapshot(coordinate, repositories).await?;
                self.snapshots
                    .entry(gav)
                    .or_insert(resolved)
                    .value()
                    .clone()
            }
        };
        if let Some(version) = resolved {
            coordinate.set_snapshot_version(version);
        }
        Ok(())
    }

    /// The deployed build behind a `-SNAPSHOT` coordinate, or `None` to keep
    /// the literal version. Offline and cache-preferring sessions reuse the
    /// build an earlier session recorded in the local repository.
    async fn resolve_snapshot(&self, coordinate: &Coordinate, repositories: &[String]) -> Result<Option<String>> {
        let recorded = self.repository.recorded_snapshot(coordinate)?;
        let cached = recorded.is_some() || self.repository.pom_path(coordinate).is_file();
        if !self.network_enabled() || (self.config.prefer_cache && cached) {
            tracing::debug!(coordinate = %coordinate.gav(), ?recorded, "using cached snapshot");
            return Ok(recorded);
        }

        for base in repositories {
            let url = snapshot_metadata_url(base, coordinate);
            match self.fetcher.fetch(&url).await? {
                FetchOutcome::Found(bytes) => {
                    let snapshot = parse_snapshot_metadata(&bytes, &url)?;
                    tracing::info!(
                        coordinate = %coordinate.gav(),
                        resolved = %snapshot,
                        "resolved snapshot"
                    );
                    if !snapshot.is_timestamped() {
                        return Ok(None);
                    }
                    let resolved = snapshot.resolved_version();
                    if recorded.as_deref() != Some(resolved.as_str()) {
                        self.repository.record_snapshot(coordinate, &snapshot)?;
                    }
                    return Ok(Some(resolved));
                }
                FetchOutcome::NotFound => tracing::debug!(%url, "no snapshot metadata"),
            }
        }
        Ok(recorded)
    }

    /// Turns `LATEST`, `RELEASE` and version ranges into concrete versions.
    async fn resolve_requirements(&self, project: &mut Project) -> Result<()> {
        let repositories = self.repositories_for(project);
        let owner = project.gav();
        for dependency in &mut project.dependencies {
            let Some(version) = dependency.version.as_deref() else {
                continue;
            };
            let requirement = VersionRequirement::parse(version);
            if !requirement.needs_metadata() {
                continue;
            }
            let resolved = self
                .resolve_requirement(dependency, &requirement, &repositories, &owner)
                .await?;
            tracing::debug!(
                dependency = %dependency.key(),
                requirement = %version,
                %resolved,
                "resolved version requirement"
            );
            dependency.version = Some(resolved);
        }
        Ok(())
    }

    async fn resolve_requirement(
        &self,
        dependency: &Coordinate,
        requirement: &VersionRequirement,
        repositories: &[String],
        owner: &str,
    ) -> Result<String> {
        let mut available = Vec::new();
        if self.network_enabled() {
            for base in repositories {
                let url =
                    artifact_metadata_url(base, &dependency.group_id, &dependency.artifact_id);
                if let Some(bytes) = self.fetcher.fetch(&url).await?.into_found() {
                    available.extend(parse_metadata_versions(&bytes, &url)?);
                }
            }
        }
        requirement
            .select(&available)
            .map(ToString::to_string)
            .ok_or_else(|| MinimavenError::Resolution {
                coordinate: dependency.gav(),
                path: owner.to_string(),
            })
    }

    /// Loads every project reachable from `root` along edges a resolution can
    /// follow: all of the root's own edges, and compile/runtime/system,
    /// non-optional edges below it. Exclusions are applied per path, so
    /// excluded artifacts are never fetched.
    pub async fn load_dependencies(&self, root: &Arc<Project>) -> Result<()> {
        let mut expanded: HashMap<ProjectId, Vec<BTreeSet<Exclusion>>> = HashMap::new();
        expanded.insert(root.id.clone(), vec![BTreeSet::new()]);
        let mut frontier: Vec<(Arc<Project>, BTreeSet<Exclusion>, Vec<ProjectId>)> =
            vec![(Arc::clone(root), BTreeSet::new(), vec![root.id.clone()])];

        while !frontier.is_empty() {
            let mut to_load: HashMap<ProjectId, (Coordinate, Vec<String>, Vec<ProjectId>)> =
                HashMap::new();
            let mut next = Vec::new();

            for (project, exclusions, path) in &frontier {
                let is_root = path.len() == 1;
                let repositories = self.repositories_for(project);
                for dependency in &project.dependencies {
                    if !is_root
                        && (!dependency.scope_or_default().is_transitive() || dependency.optional)
                    {
                        continue;
                    }
                    if exclusions
                        .iter()
                        .any(|e| e.matches(&dependency.group_id, &dependency.artifact_id))
                    {
                        continue;
                    }
                    self.apply_snapshot(dependency, &repositories).await?;

                    let id = ProjectId::of(dependency);
                    let mut child_exclusions = exclusions.clone();
                    child_exclusions.extend(dependency.exclusions.iter().cloned());

                    let seen = expanded.entry(id.clone()).or_default();
                    if seen.iter().any(|s| s.is_subset(&child_exclusions)) {
                        continue;
                    }
                    seen.push(child_exclusions.clone());

                    if !self.arena.contains(&id) && !to_load.contains_key(&id) {
                        to_load.insert(
                            id.clone(),
                            (dependency.clone(), repositories.clone(), path.clone()),
                        );
                    }
                    let mut child_path = path.clone();
                    child_path.push(id.clone());
                    next.push((id, child_exclusions, child_path));
                }
            }

            let loads = to_load
                .values()
                .map(|(coordinate, repositories, path)| {
                    self.load_coordinate(coordinate, repositories, path)
                });
            for loaded in join_all(loads).await {
                loaded?;
            }

            frontier = next
                .into_iter()
                .map(|(id, exclusions, path)| {
                    let project = self.arena.get(&id).ok_or_else(|| MinimavenError::Resolution {
                        coordinate: id.to_string(),
                        path: format_path(&path),
                    })?;
                    Ok((project, exclusions, path))
                })
                .collect::<Result<Vec<_>>>()?;
        }
        Ok(())
    }

    /// Path of the artifact backing `project`, downloading repository jars
    /// into the local repository when needed. `None` for `pom` packaging.
    pub async fn ensure_artifact(&self, project: &Project) -> Result<Option<PathBuf>> {
        if !project.packaging.has_artifact() {
            return Ok(None);
        }
        match &project.source {
            ProjectSource::Local { .. } => Ok(project
                .target_dir()
                .map(|target| target.join(project.target_jar_name()))),
            ProjectSource::System { jar } => {
                if jar.is_file() {
                    Ok(Some(jar.clone()))
                } else {
                    Err(MinimavenError::io(
                        jar,
                        std::io::Error::new(std::io::ErrorKind::NotFound, "system-scoped jar missing"),
                    ))
                }
            }
            ProjectSource::Repository { .. } => {
                let local = self.repository.jar_path(&project.coordinate);
                if local.is_file() {
                    return Ok(Some(local));
                }
                let repositories = self.repositories_for(project);
                if !self.network_enabled() {
                    return Err(MinimavenError::Offline {
                        url: repositories
                            .first()
                            .map(|base| remote_artifact_url(base, &project.coordinate, "jar"))
                            .unwrap_or_else(|| local.display().to_string()),
                    });
                }
                for base in &repositories {
                    let url = remote_artifact_url(base, &project.coordinate, "jar");
                    if let Some(bytes) = self.fetcher.fetch(&url).await?.into_found() {
                        tracing::info!(%url, bytes = bytes.len(), "downloaded jar");
                        write_atomic(&local, &bytes)?;
                        return Ok(Some(local));
                    }
                }
                Err(MinimavenError::Resolution {
                    coordinate: project.coordinate.jar_name(),
                    path: project.gav(),
                })
            }
        }
    }
}

/// The id a POM declares for itself, taking groupId/version from the parent
/// reference when omitted.
fn declared_id(doc: &PomDocument) -> Option<ProjectId> {
    let parent = doc.parent.as_ref().map(|p| &p.coordinate);
    let group_id = doc
        .group_id
        .as_deref()
        .or_else(|| parent.map(|c| c.group_id.as_str()))?;
    let version = doc
        .version
        .as_deref()
        .or_else(|| parent.and_then(|c| c.version.as_deref()))?;
    Some(ProjectId {
        key: ArtifactKey::new(group_id, &doc.artifact_id, None),
        version: version.to_string(),
    })
}

/// The identity part of an edge coordinate.
fn identity(coordinate: &Coordinate) -> Coordinate {
    let mut identity = coordinate.clone();
    identity.scope = None;
    identity.optional = false;
    identity.system_path = None;
    identity.exclusions.clear();
    identity
}

fn format_path(path: &[ProjectId]) -> String {
    if path.is_empty() {
        return "<root>".to_string();
    }
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn cycle_error(id: &ProjectId, path: &[ProjectId]) -> MinimavenError {
    MinimavenError::Resolution {
        coordinate: id.to_string(),
        path: format!("{} (cycle)", format_path(path)),
    }
}
