//! Dependency resolution over a loaded project graph.
//!
//! Resolution is a breadth-first walk of the arena starting at the root's
//! direct dependencies. The first encounter of an artifact key fixes its
//! version. Exclusions are carried per path: an edge's exclusions cover its
//! whole subtree, so an artifact excluded on one path still arrives through
//! any other path that does not exclude it.

use crate::project::{Project, ProjectArena, ProjectId};
use minimaven_core::{MinimavenError, Result};
use minimaven_pom::{ArtifactKey, Exclusion, Scope};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

/// Set of scopes admitted into a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeFilter(u8);

impl ScopeFilter {
    const fn bit(scope: Scope) -> u8 {
        match scope {
            Scope::Compile => 1,
            Scope::Test => 1 << 1,
            Scope::Runtime => 1 << 2,
            Scope::Provided => 1 << 3,
            Scope::System => 1 << 4,
            Scope::Import => 1 << 5,
        }
    }

    pub const fn none() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn with(self, scope: Scope) -> Self {
        Self(self.0 | Self::bit(scope))
    }

    pub fn of(scopes: &[Scope]) -> Self {
        scopes.iter().fold(Self::none(), |filter, &scope| filter.with(scope))
    }

    /// What ends up in an installed application.
    pub const fn runtime() -> Self {
        Self::none()
            .with(Scope::Compile)
            .with(Scope::Runtime)
            .with(Scope::System)
    }

    /// What `javac` needs to see.
    pub const fn compile_classpath() -> Self {
        Self::none()
            .with(Scope::Compile)
            .with(Scope::Provided)
            .with(Scope::System)
    }

    pub const fn test() -> Self {
        Self::runtime().with(Scope::Provided).with(Scope::Test)
    }

    pub const fn all() -> Self {
        Self::test().with(Scope::Import)
    }

    pub const fn allows(self, scope: Scope) -> bool {
        self.0 & Self::bit(scope) != 0
    }
}

impl Default for ScopeFilter {
    fn default() -> Self {
        Self::runtime()
    }
}

struct Visit {
    project: Arc<Project>,
    exclusions: BTreeSet<Exclusion>,
    path: Vec<ProjectId>,
}

/// Computes the ordered dependency set of `root`.
///
/// Root edges are admitted by `filter`, and optional ones only with
/// `include_optional`. Deeper edges must also be transitive
/// (compile/runtime/system) and non-optional. The root itself leads the
/// result unless it is `pom`-packaged or its artifactId equals
/// `exclude_artifact_id`; `pom` projects are walked but never listed.
///
/// Every target must already be in `arena`; a missing one is reported with
/// the chain of projects requiring it.
pub fn resolve(
    arena: &ProjectArena,
    root: &Project,
    filter: ScopeFilter,
    include_optional: bool,
    exclude_artifact_id: Option<&str>,
) -> Result<Vec<Arc<Project>>> {
    let root = arena
        .get(&root.id)
        .unwrap_or_else(|| Arc::new(root.clone()));

    let mut resolved = Vec::new();
    let mut chosen: HashMap<ArtifactKey, ProjectId> = HashMap::new();
    let mut expanded: HashMap<ProjectId, Vec<BTreeSet<Exclusion>>> = HashMap::new();

    chosen.insert(root.id.key.clone(), root.id.clone());
    expanded.insert(root.id.clone(), vec![BTreeSet::new()]);
    if root.packaging.has_artifact() && exclude_artifact_id != Some(root.artifact_id()) {
        resolved.push(Arc::clone(&root));
    }

    let mut queue = VecDeque::from([Visit {
        path: vec![root.id.clone()],
        project: root,
        exclusions: BTreeSet::new(),
    }]);

    while let Some(visit) = queue.pop_front() {
        let is_root = visit.path.len() == 1;
        for dependency in &visit.project.dependencies {
            let scope = dependency.scope_or_default();
            if !filter.allows(scope) {
                continue;
            }
            if is_root {
                if dependency.optional && !include_optional {
                    continue;
                }
            } else if dependency.optional || !scope.is_transitive() {
                continue;
            }
            if visit
                .exclusions
                .iter()
                .any(|e| e.matches(&dependency.group_id, &dependency.artifact_id))
            {
                tracing::trace!(dependency = %dependency.key(), "excluded along this path");
                continue;
            }

            let id = ProjectId::of(dependency);
            let newly_chosen = match chosen.get(&id.key) {
                Some(existing) if existing != &id => {
                    tracing::debug!(
                        dependency = %dependency.gav(),
                        kept = %existing,
                        "version conflict: nearest declaration wins"
                    );
                    continue;
                }
                Some(_) => false,
                None => {
                    chosen.insert(id.key.clone(), id.clone());
                    true
                }
            };

            let mut path = visit.path.clone();
            let target = arena.get(&id).ok_or_else(|| MinimavenError::Resolution {
                coordinate: dependency.gav(),
                path: path
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" -> "),
            })?;

            if newly_chosen
                && target.packaging.has_artifact()
                && exclude_artifact_id != Some(target.artifact_id())
            {
                resolved.push(Arc::clone(&target));
            }

            let mut exclusions = visit.exclusions.clone();
            exclusions.extend(dependency.exclusions.iter().cloned());
            let seen = expanded.entry(id.clone()).or_default();
            if seen.iter().any(|s| s.is_subset(&exclusions)) {
                continue;
            }
            seen.push(exclusions.clone());

            path.push(id);
            queue.push_back(Visit {
                project: target,
                exclusions,
                path,
            });
        }
    }

    Ok(resolved)
}

/// The runtime dependencies of `root`, without `root` itself.
pub fn dependencies(arena: &ProjectArena, root: &Project) -> Result<Vec<Arc<Project>>> {
    resolve(
        arena,
        root,
        ScopeFilter::runtime(),
        false,
        Some(root.artifact_id()),
    )
}
