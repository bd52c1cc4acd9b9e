//! Error taxonomy shared by every minimaven crate.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MinimavenError {
    /// Malformed XML or an unrecognized version string.
    #[error("Failed to parse {context}: {message}")]
    Parse { context: String, message: String },

    #[error("Missing required field '{field}' in {context}")]
    MissingField { field: &'static str, context: String },

    /// A coordinate could not be turned into a project by any source.
    ///
    /// `path` lists the chain of projects that required it, root first.
    #[error("Could not resolve {coordinate} (required by {path})")]
    Resolution { coordinate: String, path: String },

    #[error("Dependency version missing for {dependency} in {project}")]
    VersionMissing { dependency: String, project: String },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Request for {url} failed: {message}")]
    Network { url: String, message: String },

    #[error("Network access is disabled; cannot fetch {url}")]
    Offline { url: String },

    #[error("Compilation of {project} failed:\n{diagnostics}")]
    Compile { project: String, diagnostics: String },

    #[error("Archive error for {}: {message}", path.display())]
    Archive { path: PathBuf, message: String },

    #[error("Build of {project} aborted: dependency {dependency} failed")]
    DependencyFailed { project: String, dependency: String },

    /// A project whose build already failed earlier in this session.
    #[error("Build of {project} failed earlier in this session: {message}")]
    BuildFailed { project: String, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, MinimavenError>;

impl MinimavenError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn parse(context: impl Into<String>, message: impl ToString) -> Self {
        Self::Parse {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Whether the error came from the network rather than the local machine.
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Offline { .. })
    }
}

/// Attaches a path to `std::io::Error` results.
pub trait IoContext<T> {
    fn at_path(self, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> IoContext<T> for std::result::Result<T, std::io::Error> {
    fn at_path(self, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|e| MinimavenError::io(path, e))
    }
}
