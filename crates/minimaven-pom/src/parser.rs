//! pom.xml extractor.
//!
//! Consumes the element stream from [`ElementReader`] with a context stack:
//! recognized containers push a dedicated context, every other element pushes
//! [`ParseContext::Element`] and hands its text to the enclosing container when
//! it closes. Unknown subtrees (plugins, reporting, profiles) therefore never
//! leak values into the model.

use crate::coordinate::{Coordinate, Exclusion, normalize};
use crate::error::{PomError, Result};
use crate::types::{BuildLayout, Packaging, Scope};
use minimaven_core::{ElementReader, XmlEvent};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Parent reference as declared in `<parent>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
    pub coordinate: Coordinate,
    /// `<relativePath>`; `None` means the default `../pom.xml`.
    pub relative_path: Option<String>,
}

impl ParentRef {
    pub const DEFAULT_RELATIVE_PATH: &'static str = "../pom.xml";

    pub fn relative_path(&self) -> &str {
        self.relative_path
            .as_deref()
            .unwrap_or(Self::DEFAULT_RELATIVE_PATH)
    }
}

/// A POM as written, before inheritance and interpolation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PomDocument {
    pub group_id: Option<String>,
    pub artifact_id: String,
    pub version: Option<String>,
    pub packaging: Option<Packaging>,
    pub parent: Option<ParentRef>,
    pub dependencies: Vec<Coordinate>,
    pub dependency_management: Vec<Coordinate>,
    pub properties: BTreeMap<String, String>,
    pub modules: Vec<String>,
    pub repositories: Vec<String>,
    pub build: BuildLayout,
    /// `<scope>` values that reference properties, resolved once the
    /// effective properties are known.
    pub scope_expressions: Vec<ScopeExpression>,
}

/// A property-valued `<scope>` of the dependency at `index` in
/// `dependency_management` (when `managed`) or `dependencies`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeExpression {
    pub managed: bool,
    pub index: usize,
    pub expression: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseContext {
    Document,
    Project,
    Parent,
    DependencyManagement,
    Dependencies { managed: bool },
    Dependency { managed: bool },
    Exclusions,
    Exclusion,
    Properties,
    Modules,
    Repositories,
    Repository,
    Build,
    Resources,
    Resource,
    Element,
}

#[derive(Default)]
struct DepAccum {
    group_id: Option<String>,
    artifact_id: Option<String>,
    version: Option<String>,
    classifier: Option<String>,
    scope: Option<String>,
    optional: Option<String>,
    system_path: Option<String>,
    exclusions: Vec<Exclusion>,
}

#[derive(Default)]
struct ExclusionAccum {
    group_id: Option<String>,
    artifact_id: Option<String>,
}

#[derive(Default)]
struct ParentAccum {
    group_id: Option<String>,
    artifact_id: Option<String>,
    version: Option<String>,
    relative_path: Option<String>,
}

struct PomExtractor {
    context: String,
    stack: Vec<ParseContext>,
    doc: PomDocument,
    artifact_id: Option<String>,
    parent: Option<ParentAccum>,
    dependency: Option<DepAccum>,
    exclusion: Option<ExclusionAccum>,
}

/// Parses a POM. `context` names the document in errors (usually its path or
/// URL).
pub fn parse_pom(content: &[u8], context: &str) -> Result<PomDocument> {
    let mut reader = ElementReader::from_bytes(content, context)?;
    let mut extractor = PomExtractor {
        context: context.to_string(),
        stack: vec![ParseContext::Document],
        doc: PomDocument::default(),
        artifact_id: None,
        parent: None,
        dependency: None,
        exclusion: None,
    };

    while let Some(event) = reader.next_event()? {
        match event {
            XmlEvent::Open(name) => extractor.open(&name),
            XmlEvent::Close { name, text } => extractor.close(&name, text)?,
        }
    }

    extractor.finish()
}

impl PomExtractor {
    fn top(&self) -> ParseContext {
        self.stack.last().copied().unwrap_or(ParseContext::Document)
    }

    fn open(&mut self, name: &str) {
        let next = match (self.top(), name) {
            (ParseContext::Document, "project") => ParseContext::Project,
            (ParseContext::Project, "parent") => {
                self.parent = Some(ParentAccum::default());
                ParseContext::Parent
            }
            (ParseContext::Project, "dependencyManagement") => ParseContext::DependencyManagement,
            (ParseContext::Project, "dependencies") => {
                ParseContext::Dependencies { managed: false }
            }
            (ParseContext::DependencyManagement, "dependencies") => {
                ParseContext::Dependencies { managed: true }
            }
            (ParseContext::Dependencies { managed }, "dependency") => {
                self.dependency = Some(DepAccum::default());
                ParseContext::Dependency { managed }
            }
            (ParseContext::Dependency { .. }, "exclusions") => ParseContext::Exclusions,
            (ParseContext::Exclusions, "exclusion") => {
                self.exclusion = Some(ExclusionAccum::default());
                ParseContext::Exclusion
            }
            (ParseContext::Project, "properties") => ParseContext::Properties,
            (ParseContext::Project, "modules") => ParseContext::Modules,
            (ParseContext::Project, "repositories") => ParseContext::Repositories,
            (ParseContext::Repositories, "repository") => ParseContext::Repository,
            (ParseContext::Project, "build") => ParseContext::Build,
            (ParseContext::Build, "resources") => ParseContext::Resources,
            (ParseContext::Resources, "resource") => ParseContext::Resource,
            _ => ParseContext::Element,
        };
        self.stack.push(next);
    }

    fn close(&mut self, name: &str, text: Option<String>) -> Result<()> {
        let closed = self.stack.pop().unwrap_or(ParseContext::Document);
        match closed {
            ParseContext::Element => {
                if let Some(text) = text {
                    self.leaf(name, text);
                }
            }
            ParseContext::Parent => self.finish_parent()?,
            ParseContext::Dependency { managed } => self.finish_dependency(managed)?,
            ParseContext::Exclusion => {
                if let (Some(exclusion), Some(dep)) = (self.exclusion.take(), &mut self.dependency)
                {
                    let group_id = normalize(exclusion.group_id).unwrap_or_else(|| "*".into());
                    let artifact_id =
                        normalize(exclusion.artifact_id).unwrap_or_else(|| "*".into());
                    dep.exclusions.push(Exclusion::new(group_id, artifact_id));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn leaf(&mut self, name: &str, text: String) {
        match (self.top(), name) {
            (ParseContext::Project, "groupId") => self.doc.group_id = Some(text),
            (ParseContext::Project, "artifactId") => self.artifact_id = Some(text),
            (ParseContext::Project, "version") => self.doc.version = Some(text),
            (ParseContext::Project, "packaging") => {
                self.doc.packaging = text.parse().ok();
            }
            (ParseContext::Parent, field) => {
                if let Some(parent) = &mut self.parent {
                    match field {
                        "groupId" => parent.group_id = Some(text),
                        "artifactId" => parent.artifact_id = Some(text),
                        "version" => parent.version = Some(text),
                        "relativePath" => parent.relative_path = Some(text),
                        _ => {}
                    }
                }
            }
            (ParseContext::Dependency { .. }, field) => {
                if let Some(dep) = &mut self.dependency {
                    match field {
                        "groupId" => dep.group_id = Some(text),
                        "artifactId" => dep.artifact_id = Some(text),
                        "version" => dep.version = Some(text),
                        "classifier" => dep.classifier = Some(text),
                        "scope" => dep.scope = Some(text),
                        "optional" => dep.optional = Some(text),
                        "systemPath" => dep.system_path = Some(text),
                        _ => {}
                    }
                }
            }
            (ParseContext::Exclusion, field) => {
                if let Some(exclusion) = &mut self.exclusion {
                    match field {
                        "groupId" => exclusion.group_id = Some(text),
                        "artifactId" => exclusion.artifact_id = Some(text),
                        _ => {}
                    }
                }
            }
            (ParseContext::Properties, key) => {
                self.doc.properties.insert(key.to_string(), text);
            }
            (ParseContext::Modules, "module") => {
                if let Some(module) = normalize(Some(text)) {
                    self.doc.modules.push(module);
                }
            }
            (ParseContext::Repository, "url") => {
                if let Some(url) = normalize(Some(text)) {
                    self.doc
                        .repositories
                        .push(url.trim_end_matches('/').to_string());
                }
            }
            (ParseContext::Build, field) => {
                let value = normalize(Some(text));
                match field {
                    "sourceDirectory" => self.doc.build.source_directory = value.map(PathBuf::from),
                    "testSourceDirectory" => {
                        self.doc.build.test_source_directory = value.map(PathBuf::from);
                    }
                    "outputDirectory" => self.doc.build.output_directory = value.map(PathBuf::from),
                    "finalName" => self.doc.build.final_name = value,
                    _ => {}
                }
            }
            (ParseContext::Resource, "directory") => {
                if let Some(directory) = normalize(Some(text)) {
                    self.doc.build.resources.push(PathBuf::from(directory));
                }
            }
            _ => {}
        }
    }

    fn finish_parent(&mut self) -> Result<()> {
        let Some(parent) = self.parent.take() else {
            return Ok(());
        };
        let group_id = normalize(parent.group_id).ok_or_else(|| PomError::MissingField {
            field: "parent/groupId",
            context: self.context.clone(),
        })?;
        let artifact_id = normalize(parent.artifact_id).ok_or_else(|| PomError::MissingField {
            field: "parent/artifactId",
            context: self.context.clone(),
        })?;
        let version = normalize(parent.version).ok_or_else(|| PomError::MissingField {
            field: "parent/version",
            context: self.context.clone(),
        })?;
        self.doc.parent = Some(ParentRef {
            coordinate: Coordinate::new(group_id, artifact_id, Some(version)),
            relative_path: normalize(parent.relative_path),
        });
        Ok(())
    }

    fn finish_dependency(&mut self, managed: bool) -> Result<()> {
        let Some(dep) = self.dependency.take() else {
            return Ok(());
        };
        let group_id = normalize(dep.group_id).ok_or_else(|| PomError::MissingField {
            field: "dependency/groupId",
            context: self.context.clone(),
        })?;
        let artifact_id = normalize(dep.artifact_id).ok_or_else(|| PomError::MissingField {
            field: "dependency/artifactId",
            context: self.context.clone(),
        })?;

        let mut coordinate =
            Coordinate::new(group_id, artifact_id, dep.version).with_classifier(dep.classifier);
        match normalize(dep.scope) {
            Some(scope) if scope.contains("${") => {
                let index = if managed {
                    self.doc.dependency_management.len()
                } else {
                    self.doc.dependencies.len()
                };
                self.doc.scope_expressions.push(ScopeExpression {
                    managed,
                    index,
                    expression: scope,
                });
            }
            Some(scope) => {
                let parsed = scope.parse::<Scope>().map_err(|e| PomError::Parse {
                    context: self.context.clone(),
                    message: format!("{e} for {}", coordinate.key()),
                })?;
                coordinate.scope = Some(parsed);
            }
            None => {}
        }
        coordinate.optional = dep
            .optional
            .is_some_and(|o| o.trim().eq_ignore_ascii_case("true"));
        coordinate.system_path = normalize(dep.system_path).map(PathBuf::from);
        coordinate.exclusions.extend(dep.exclusions);

        if managed {
            self.doc.dependency_management.push(coordinate);
        } else {
            self.doc.dependencies.push(coordinate);
        }
        Ok(())
    }

    fn finish(mut self) -> Result<PomDocument> {
        self.doc.artifact_id =
            normalize(self.artifact_id).ok_or_else(|| PomError::MissingField {
                field: "artifactId",
                context: self.context.clone(),
            })?;
        self.doc.group_id = normalize(self.doc.group_id);
        self.doc.version = normalize(self.doc.version);
        tracing::trace!(
            context = %self.context,
            artifact = %self.doc.artifact_id,
            dependencies = self.doc.dependencies.len(),
            "parsed POM"
        );
        Ok(self.doc)
    }
}
