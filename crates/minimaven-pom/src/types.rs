//! Small value types shared by the POM model.

use crate::error::PomError;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    #[default]
    Compile,
    Test,
    Runtime,
    Provided,
    System,
    Import,
}

impl Scope {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Compile => "compile",
            Self::Test => "test",
            Self::Runtime => "runtime",
            Self::Provided => "provided",
            Self::System => "system",
            Self::Import => "import",
        }
    }

    /// Whether a dependency declared with this scope is passed on to the
    /// projects that depend on its declarer.
    pub const fn is_transitive(self) -> bool {
        matches!(self, Self::Compile | Self::Runtime | Self::System)
    }
}

impl std::str::FromStr for Scope {
    type Err = PomError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compile" => Ok(Self::Compile),
            "test" => Ok(Self::Test),
            "runtime" => Ok(Self::Runtime),
            "provided" => Ok(Self::Provided),
            "system" => Ok(Self::System),
            "import" => Ok(Self::Import),
            _ => Err(PomError::UnknownScope {
                scope: s.trim().to_string(),
            }),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Packaging kind. Anything other than `pom` produces a jar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Packaging {
    #[default]
    Jar,
    Pom,
}

impl Packaging {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Jar => "jar",
            Self::Pom => "pom",
        }
    }

    /// Whether projects of this packaging produce an artifact of their own.
    pub const fn has_artifact(self) -> bool {
        matches!(self, Self::Jar)
    }
}

impl std::str::FromStr for Packaging {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(if s.trim().eq_ignore_ascii_case("pom") {
            Self::Pom
        } else {
            Self::Jar
        })
    }
}

impl fmt::Display for Packaging {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `<build>` overrides, relative to the project directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildLayout {
    pub source_directory: Option<PathBuf>,
    pub test_source_directory: Option<PathBuf>,
    pub output_directory: Option<PathBuf>,
    pub resources: Vec<PathBuf>,
    pub final_name: Option<String>,
}

impl BuildLayout {
    pub const DEFAULT_SOURCES: &'static str = "src/main/java";
    pub const DEFAULT_TEST_SOURCES: &'static str = "src/test/java";
    pub const DEFAULT_RESOURCES: &'static str = "src/main/resources";
    pub const DEFAULT_OUTPUT: &'static str = "target/classes";

    pub fn sources(&self) -> PathBuf {
        self.source_directory
            .clone()
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_SOURCES))
    }

    pub fn test_sources(&self) -> PathBuf {
        self.test_source_directory
            .clone()
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_TEST_SOURCES))
    }

    pub fn output(&self) -> PathBuf {
        self.output_directory
            .clone()
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_OUTPUT))
    }

    pub fn resource_directories(&self) -> Vec<PathBuf> {
        if self.resources.is_empty() {
            vec![PathBuf::from(Self::DEFAULT_RESOURCES)]
        } else {
            self.resources.clone()
        }
    }

    /// Fills every unset field from `parent`.
    pub fn inherit(&mut self, parent: &Self) {
        if self.source_directory.is_none() {
            self.source_directory.clone_from(&parent.source_directory);
        }
        if self.test_source_directory.is_none() {
            self.test_source_directory
                .clone_from(&parent.test_source_directory);
        }
        if self.output_directory.is_none() {
            self.output_directory.clone_from(&parent.output_directory);
        }
        if self.resources.is_empty() {
            self.resources.clone_from(&parent.resources);
        }
    }
}
