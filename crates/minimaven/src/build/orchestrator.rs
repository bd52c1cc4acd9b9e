//! Build orchestration: compile, package, install and clean local projects.
//!
//! Every project is built at most once per [`Builder`]. Dependency projects
//! are built first and concurrently; a project recompiles all of its sources
//! when any of them was rebuilt, and only its stale sources otherwise.

use super::archive::package_jar;
use super::compiler::{CompileRequest, Compiler, JavacCompiler};
use super::incremental::{copy_resources, source_set};
use super::install::{clean_installed, install_file, install_subdirectory};
use crate::project::{Project, ProjectId, ProjectSource};
use crate::resolver::ScopeFilter;
use crate::session::Session;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, join_all};
use minimaven_core::{IoContext, MinimavenError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BuildState {
    #[default]
    Unbuilt,
    Compiling,
    Compiled,
    Packaged,
    Installed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub project: ProjectId,
    /// Whether anything was compiled, copied or packaged in this session.
    pub rebuilt: bool,
    pub compiled: usize,
    /// The project's artifact; `None` for `pom` packaging.
    pub jar: Option<PathBuf>,
}

type BuildCell = Arc<OnceCell<std::result::Result<BuildReport, String>>>;

pub struct Builder {
    session: Arc<Session>,
    compiler: Arc<dyn Compiler>,
    states: DashMap<ProjectId, BuildState>,
    builds: DashMap<ProjectId, BuildCell>,
}

impl Builder {
    pub fn new(session: Arc<Session>, compiler: Arc<dyn Compiler>) -> Self {
        Self {
            session,
            compiler,
            states: DashMap::new(),
            builds: DashMap::new(),
        }
    }

    /// A builder running the configured `javac`.
    pub fn with_javac(session: Arc<Session>) -> Self {
        let compiler = JavacCompiler::new(session.config().javac.clone());
        Self::new(session, Arc::new(compiler))
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn state(&self, id: &ProjectId) -> BuildState {
        self.states.get(id).map(|s| *s.value()).unwrap_or_default()
    }

    fn set_state(&self, id: &ProjectId, state: BuildState) {
        tracing::trace!(%id, ?state, "build state");
        self.states.insert(id.clone(), state);
    }

    fn cell(&self, id: &ProjectId) -> BuildCell {
        Arc::clone(self.builds.entry(id.clone()).or_default().value())
    }

    /// Builds `project` and, first, every local project on its compile
    /// classpath. Repository projects only have their jar fetched.
    ///
    /// The first caller of a failed build receives the original error; later
    /// callers receive [`MinimavenError::BuildFailed`].
    pub async fn build(&self, project: &Arc<Project>) -> Result<BuildReport> {
        self.build_in(project, Vec::new()).await
    }

    fn build_in<'a>(&'a self, project: &'a Arc<Project>, chain: Vec<ProjectId>) -> BoxFuture<'a, Result<BuildReport>> {
        async move {
            if chain.contains(&project.id) {
                return Err(MinimavenError::Resolution {
                    coordinate: project.gav(),
                    path: format!(
                        "{} (cycle)",
                        chain
                            .iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()
                            .join(" -> ")
                    ),
                });
            }

            let cell = self.cell(&project.id);
            let mut first_error: Option<MinimavenError> = None;
            let slot = &mut first_error;
            let outcome = cell
                .get_or_init(move || async move {
                    match self.build_once(project, chain).await {
                        Ok(report) => Ok(report),
                        Err(e) => {
                            self.set_state(&project.id, BuildState::Failed);
                            tracing::warn!(project = %project.gav(), error = %e, "build failed");
                            let message = e.to_string();
                            *slot = Some(e);
                            Err(message)
                        }
                    }
                })
                .await;

            match outcome {
                Ok(report) => Ok(report.clone()),
                Err(message) => Err(first_error.unwrap_or_else(|| MinimavenError::BuildFailed {
                    project: project.gav(),
                    message: message.clone(),
                })),
            }
        }
        .boxed()
    }

    async fn build_once(&self, project: &Arc<Project>, mut chain: Vec<ProjectId>) -> Result<BuildReport> {
        if !project.is_local() {
            return Ok(BuildReport {
                project: project.id.clone(),
                rebuilt: false,
                compiled: 0,
                jar: self.session.ensure_artifact(project).await?,
            });
        }

        self.session.load_dependencies(project).await?;
        let classpath_projects = self.session.resolve(
            project,
            ScopeFilter::compile_classpath(),
            false,
            Some(project.artifact_id()),
        )?;

        chain.push(project.id.clone());
        let local: Vec<_> = classpath_projects.iter().filter(|p| p.is_local()).collect();
        let results = join_all(
            local
                .iter()
                .map(|dependency| self.build_in(dependency, chain.clone())),
        )
        .await;
        let mut dependency_rebuilt = false;
        for (dependency, result) in local.iter().zip(results) {
            match result {
                Ok(report) => dependency_rebuilt |= report.rebuilt,
                Err(e) => {
                    tracing::debug!(dependency = %dependency.gav(), error = %e, "dependency failed");
                    return Err(MinimavenError::DependencyFailed {
                        project: project.gav(),
                        dependency: dependency.gav(),
                    });
                }
            }
        }

        if !project.packaging.has_artifact() {
            return Ok(BuildReport {
                project: project.id.clone(),
                rebuilt: false,
                compiled: 0,
                jar: None,
            });
        }

        let (Some(source_dir), Some(output_dir), Some(target_dir)) =
            (project.source_dir(), project.output_dir(), project.target_dir())
        else {
            return Err(MinimavenError::Config(format!(
                "{} has no source directory",
                project.gav()
            )));
        };

        let sources = source_set(&source_dir, &output_dir)?;
        let to_compile = if dependency_rebuilt {
            sources.all
        } else {
            sources.stale
        };
        let compiled = to_compile.len();
        if !to_compile.is_empty() {
            self.set_state(&project.id, BuildState::Compiling);
            let mut classpath = vec![output_dir.clone()];
            for dependency in &classpath_projects {
                if let Some(jar) = self.session.ensure_artifact(dependency).await? {
                    classpath.push(jar);
                }
            }
            let request = CompileRequest {
                project: project.gav(),
                source_root: source_dir,
                sources: to_compile,
                classpath,
                output_dir: output_dir.clone(),
                encoding: self.session.config().encoding.clone(),
                source_level: project.property("maven.compiler.source").map(String::from),
                target_level: project.property("maven.compiler.target").map(String::from),
            };
            let outcome = self.compiler.compile(&request).await?;
            if !outcome.success {
                return Err(MinimavenError::Compile {
                    project: project.gav(),
                    diagnostics: outcome.diagnostics,
                });
            }
        }
        let copied = copy_resources(&project.resource_dirs(), &output_dir)?;
        self.set_state(&project.id, BuildState::Compiled);

        let jar = target_dir.join(project.target_jar_name());
        let rebuilt = compiled > 0 || copied > 0 || !jar.is_file();
        if rebuilt {
            package_jar(project, &output_dir, &jar)?;
        } else {
            tracing::debug!(project = %project.gav(), "up to date");
        }
        self.set_state(&project.id, BuildState::Packaged);

        Ok(BuildReport {
            project: project.id.clone(),
            rebuilt,
            compiled,
            jar: Some(jar),
        })
    }

    /// Builds each project concurrently. A failure only affects the failing
    /// project and the projects depending on it.
    pub async fn build_all(&self, projects: &[Arc<Project>]) -> Vec<(ProjectId, Result<BuildReport>)> {
        let results = join_all(projects.iter().map(|project| self.build(project))).await;
        projects
            .iter()
            .map(|project| project.id.clone())
            .zip(results)
            .collect()
    }

    /// Builds `project` and copies its jar and its runtime dependency jars
    /// into `app_dir/jars` or `app_dir/plugins`, replacing other versions.
    pub async fn install(&self, project: &Arc<Project>, app_dir: &Path) -> Result<Vec<PathBuf>> {
        let report = self.build(project).await?;
        let mut installed = Vec::new();
        if let Some(jar) = &report.jar {
            installed.push(self.install_jar(project, jar, app_dir)?);
        }

        let dependencies = self.session.resolve(
            project,
            ScopeFilter::runtime(),
            false,
            Some(project.artifact_id()),
        )?;
        for dependency in &dependencies {
            if matches!(dependency.source, ProjectSource::System { .. }) {
                continue;
            }
            let jar = if dependency.is_local() {
                self.build(dependency).await?.jar
            } else {
                self.session.ensure_artifact(dependency).await?
            };
            if let Some(jar) = jar {
                installed.push(self.install_jar(dependency, &jar, app_dir)?);
            }
        }

        self.set_state(&project.id, BuildState::Installed);
        Ok(installed)
    }

    fn install_jar(&self, project: &Project, jar: &Path, app_dir: &Path) -> Result<PathBuf> {
        let directory = app_dir.join(install_subdirectory(project.artifact_id()));
        install_file(jar, &directory, &project.coordinate)
    }

    /// Removes `project`'s installed jars from `app_dir` and its `target`
    /// directory, without building anything.
    pub async fn clean(&self, project: &Project, app_dir: Option<&Path>) -> Result<Vec<PathBuf>> {
        let mut removed = match app_dir {
            Some(app_dir) => clean_installed(app_dir, &project.coordinate)?,
            None => Vec::new(),
        };
        if let Some(target) = project.target_dir().filter(|t| t.is_dir()) {
            tokio::fs::remove_dir_all(&target).await.at_path(&target)?;
            tracing::info!(target = %target.display(), "removed build output");
            removed.push(target);
        }
        self.set_state(&project.id, BuildState::Unbuilt);
        Ok(removed)
    }
}
