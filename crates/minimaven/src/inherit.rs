//! Parent inheritance and property interpolation.
//!
//! [`merge`] turns a parsed [`PomDocument`] and its already-effective parent
//! into an effective [`Project`]. It is pure: the parent is only read, so one
//! parent instance can be shared by every child in the session.

use crate::project::{ManagementTable, Project, ProjectId, ProjectSource};
use minimaven_core::{MinimavenError, Result};
use minimaven_pom::{Coordinate, Packaging, PomDocument, Scope, normalize};
use std::collections::BTreeMap;

const MAX_INTERPOLATION_PASSES: usize = 8;

/// Builds the effective project for `doc`.
///
/// Child values win over parent values. Parent-only management entries,
/// properties, repositories and dependencies are added. Packaging is inherited
/// only from a parent that is not itself an aggregator. Every resulting
/// dependency edge must end up with a version, either declared or taken from
/// the nearest management entry.
pub fn merge(doc: &PomDocument, parent: Option<&Project>, source: ProjectSource) -> Result<Project> {
    let context = source_context(&source, &doc.artifact_id);
    let parent_ref = doc.parent.as_ref().map(|p| &p.coordinate);

    let group_id = doc
        .group_id
        .clone()
        .or_else(|| parent.map(|p| p.coordinate.group_id.clone()))
        .or_else(|| parent_ref.map(|c| c.group_id.clone()))
        .ok_or_else(|| MinimavenError::MissingField {
            field: "groupId",
            context: context.clone(),
        })?;
    let version = doc
        .version
        .clone()
        .or_else(|| parent.and_then(|p| p.coordinate.version.clone()))
        .or_else(|| parent_ref.and_then(|c| c.version.clone()))
        .ok_or_else(|| MinimavenError::MissingField {
            field: "version",
            context: context.clone(),
        })?;

    let packaging = doc.packaging.unwrap_or_else(|| {
        parent
            .map(|p| p.packaging)
            .filter(|p| *p != Packaging::Pom)
            .unwrap_or_default()
    });

    let coordinate = Coordinate::new(group_id, doc.artifact_id.clone(), Some(version));

    let properties = effective_properties(doc, parent, &coordinate, packaging, &source);

    let mut managed: Vec<_> = doc
        .dependency_management
        .iter()
        .map(|c| interpolate_coordinate(c, &properties))
        .collect();
    let mut declared: Vec<_> = doc
        .dependencies
        .iter()
        .map(|c| interpolate_coordinate(c, &properties))
        .collect();
    for deferred in &doc.scope_expressions {
        let target = if deferred.managed {
            managed.get_mut(deferred.index)
        } else {
            declared.get_mut(deferred.index)
        };
        if let Some(dependency) = target {
            dependency.scope = Some(resolve_scope(&deferred.expression, &properties, &context)?);
        }
    }

    let mut dependency_management = ManagementTable::new(managed);
    if let Some(parent) = parent {
        dependency_management.inherit(&parent.dependency_management);
    }

    let mut dependencies = Vec::with_capacity(declared.len());
    for dependency in declared {
        dependencies.push(apply_management(
            dependency,
            &dependency_management,
            &coordinate,
        )?);
    }
    if let Some(parent) = parent {
        for inherited in &parent.dependencies {
            let key = inherited.key();
            if !dependencies.iter().any(|d| d.key() == key) {
                dependencies.push(inherited.clone());
            }
        }
    }

    let mut build = doc.build.clone();
    if let Some(parent) = parent {
        build.inherit(&parent.build);
    }

    let mut repositories = doc.repositories.clone();
    if let Some(parent) = parent {
        for repository in &parent.repositories {
            if !repositories.contains(repository) {
                repositories.push(repository.clone());
            }
        }
    }

    Ok(Project {
        id: ProjectId::of(&coordinate),
        coordinate,
        parent: parent
            .map(|p| p.id.clone())
            .or_else(|| parent_ref.map(ProjectId::of)),
        packaging,
        source,
        dependencies,
        dependency_management,
        properties,
        build,
        repositories,
        modules: doc.modules.clone(),
    })
}

fn source_context(source: &ProjectSource, artifact_id: &str) -> String {
    let location = match source {
        ProjectSource::Local { directory } => directory.join("pom.xml"),
        ProjectSource::Repository { pom } => pom.clone(),
        ProjectSource::System { jar } => jar.clone(),
    };
    format!("{} ({artifact_id})", location.display())
}

fn effective_properties(
    doc: &PomDocument,
    parent: Option<&Project>,
    coordinate: &Coordinate,
    packaging: Packaging,
    source: &ProjectSource,
) -> BTreeMap<String, String> {
    let mut properties = parent.map(|p| p.properties.clone()).unwrap_or_default();
    properties.extend(
        doc.properties
            .iter()
            .map(|(key, value)| (key.clone(), value.clone())),
    );

    let mut builtin = |name: &str, value: &str| {
        for prefix in ["project.", "pom."] {
            properties.insert(format!("{prefix}{name}"), value.to_string());
        }
    };
    builtin("groupId", &coordinate.group_id);
    builtin("artifactId", &coordinate.artifact_id);
    builtin("version", coordinate.version.as_deref().unwrap_or_default());
    builtin("packaging", packaging.as_str());

    if let Some(parent) = parent.map(|p| &p.coordinate).or_else(|| {
        doc.parent.as_ref().map(|p| &p.coordinate)
    }) {
        let version = parent.version.clone().unwrap_or_default();
        builtin("parent.groupId", &parent.group_id);
        builtin("parent.artifactId", &parent.artifact_id);
        builtin("parent.version", &version);
        properties.insert("parent.version".into(), version);
    }

    if let ProjectSource::Local { directory } = source {
        let basedir = directory.display().to_string();
        properties.insert("project.basedir".into(), basedir.clone());
        properties.insert("basedir".into(), basedir);
    }

    // Values may reference other properties.
    let snapshot = properties.clone();
    for value in properties.values_mut() {
        if value.contains("${") {
            *value = interpolate(value, &snapshot);
        }
    }
    properties
}

fn resolve_scope(expression: &str, properties: &BTreeMap<String, String>, context: &str) -> Result<Scope> {
    let value = interpolate(expression, properties);
    value.parse::<Scope>().map_err(|e| MinimavenError::Parse {
        context: context.to_string(),
        message: format!("{e} (from {expression})"),
    })
}

/// Fills a missing version, scope or exclusion set from the management table.
fn apply_management(
    mut dependency: Coordinate,
    management: &ManagementTable,
    owner: &Coordinate,
) -> Result<Coordinate> {
    if let Some(managed) = management.get(&dependency.key()) {
        if dependency.version.is_none() {
            dependency.version.clone_from(&managed.version);
        }
        if dependency.scope.is_none() {
            dependency.scope = managed.scope;
        }
        if dependency.exclusions.is_empty() {
            dependency.exclusions.clone_from(&managed.exclusions);
        }
        if dependency.system_path.is_none() {
            dependency.system_path.clone_from(&managed.system_path);
        }
    }
    if dependency.version.is_none() {
        return Err(MinimavenError::VersionMissing {
            dependency: format!("{}:{}", dependency.group_id, dependency.artifact_id),
            project: owner.gav(),
        });
    }
    Ok(dependency)
}

/// Replaces `${name}` references with property values. Unknown references are
/// kept verbatim; nested references are expanded up to a fixed depth.
pub fn interpolate(value: &str, properties: &BTreeMap<String, String>) -> String {
    let mut current = value.to_string();
    for _ in 0..MAX_INTERPOLATION_PASSES {
        let next = interpolate_once(&current, properties);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn interpolate_once(value: &str, properties: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..end];
        match properties.get(name) {
            Some(resolved) => out.push_str(resolved),
            None => {
                out.push_str("${");
                out.push_str(name);
                out.push('}');
            }
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

fn interpolate_coordinate(coordinate: &Coordinate, properties: &BTreeMap<String, String>) -> Coordinate {
    let mut result = coordinate.clone();
    result.group_id = interpolate(&coordinate.group_id, properties);
    result.artifact_id = interpolate(&coordinate.artifact_id, properties);
    result.version = normalize(coordinate.version.as_deref().map(|v| interpolate(v, properties)));
    result.classifier = normalize(
        coordinate
            .classifier
            .as_deref()
            .map(|c| interpolate(c, properties)),
    );
    result.system_path = coordinate
        .system_path
        .as_ref()
        .map(|p| interpolate(&p.to_string_lossy(), properties).into());
    result
}
