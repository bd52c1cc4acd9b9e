//! Build session configuration.
//!
//! Configuration is layered: built-in defaults, then an optional
//! `minimaven.toml`, then `MINIMAVEN_*` environment variables. The CLI applies
//! its own flags last.

use crate::error::{IoContext, MinimavenError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "minimaven.toml";
pub const MAVEN_CENTRAL: &str = "https://repo1.maven.org/maven2";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BuildConfig {
    /// Root of the Maven-layout local repository used as the artifact cache.
    pub local_repository: PathBuf,
    /// Remote repositories, queried in order.
    pub remote_repositories: Vec<String>,
    /// Never touch the network.
    pub offline: bool,
    /// Use artifacts already in the local repository (including unresolved
    /// snapshots) before asking the network.
    pub prefer_cache: bool,
    pub javac: PathBuf,
    pub encoding: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            local_repository: default_local_repository(),
            remote_repositories: vec![MAVEN_CENTRAL.to_string()],
            offline: false,
            prefer_cache: false,
            javac: PathBuf::from("javac"),
            encoding: "UTF-8".to_string(),
            user_agent: format!("minimaven/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 30,
        }
    }
}

fn default_local_repository() -> PathBuf {
    dirs::home_dir().map_or_else(
        || PathBuf::from(".m2").join("repository"),
        |home| home.join(".m2").join("repository"),
    )
}

impl BuildConfig {
    /// Reads a TOML configuration file; missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).at_path(path)?;
        Self::from_toml(&content)
            .map_err(|e| MinimavenError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Loads `minimaven.toml` from `dir` when present, then applies the
    /// environment.
    pub fn discover(dir: &Path) -> Result<Self> {
        let candidate = dir.join(CONFIG_FILE_NAME);
        let config = if candidate.is_file() {
            tracing::debug!(path = %candidate.display(), "loading configuration");
            Self::load(&candidate)?
        } else {
            Self::default()
        };
        Ok(config.with_env())
    }

    pub fn with_env(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies `MINIMAVEN_*` overrides looked up through `var`.
    pub fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = var("MINIMAVEN_OFFLINE") {
            self.offline = is_truthy(&value);
        }
        if let Some(value) = var("MINIMAVEN_PREFER_CACHE") {
            self.prefer_cache = is_truthy(&value);
        }
        if let Some(value) = var("MINIMAVEN_REPOSITORY").filter(|v| !v.is_empty()) {
            self.local_repository = PathBuf::from(value);
        }
        if let Some(value) = var("MINIMAVEN_JAVAC").filter(|v| !v.is_empty()) {
            self.javac = PathBuf::from(value);
        }
        self
    }

    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Whether lookups may go to the remote repositories at all.
    pub fn network_enabled(&self) -> bool {
        !self.offline && !self.remote_repositories.is_empty()
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
