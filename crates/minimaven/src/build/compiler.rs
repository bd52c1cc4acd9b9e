//! The Java compiler seam.

use async_trait::async_trait;
use minimaven_core::{IoContext, MinimavenError, Result};
use std::path::PathBuf;

/// One `javac` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileRequest {
    /// `groupId:artifactId:version` of the project being compiled.
    pub project: String,
    pub source_root: PathBuf,
    pub sources: Vec<PathBuf>,
    pub classpath: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub encoding: String,
    pub source_level: Option<String>,
    pub target_level: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOutcome {
    pub success: bool,
    pub diagnostics: String,
}

/// Compiles sources against a classpath.
///
/// `Err` means the compiler could not be run at all; rejected sources are an
/// `Ok` outcome with `success == false`.
#[async_trait]
pub trait Compiler: Send + Sync {
    async fn compile(&self, request: &CompileRequest) -> Result<CompileOutcome>;
}

/// Runs an external `javac`.
#[derive(Debug, Clone)]
pub struct JavacCompiler {
    javac: PathBuf,
}

impl JavacCompiler {
    pub fn new(javac: impl Into<PathBuf>) -> Self {
        Self {
            javac: javac.into(),
        }
    }
}

#[async_trait]
impl Compiler for JavacCompiler {
    async fn compile(&self, request: &CompileRequest) -> Result<CompileOutcome> {
        tokio::fs::create_dir_all(&request.output_dir)
            .await
            .at_path(&request.output_dir)?;

        let mut command = tokio::process::Command::new(&self.javac);
        command
            .arg("-d")
            .arg(&request.output_dir)
            .arg("-encoding")
            .arg(&request.encoding);
        if !request.classpath.is_empty() {
            let classpath = std::env::join_paths(&request.classpath).map_err(|e| {
                MinimavenError::Config(format!("invalid classpath entry for {}: {e}", request.project))
            })?;
            command.arg("-cp").arg(classpath);
        }
        if let Some(level) = &request.source_level {
            command.arg("-source").arg(level);
        }
        if let Some(level) = &request.target_level {
            command.arg("-target").arg(level);
        }
        command.args(&request.sources);

        tracing::info!(
            project = %request.project,
            sources = request.sources.len(),
            classpath = request.classpath.len(),
            "running javac"
        );
        let output = command.output().await.at_path(&self.javac)?;

        let mut diagnostics = String::from_utf8_lossy(&output.stderr).into_owned();
        diagnostics.push_str(&String::from_utf8_lossy(&output.stdout));
        Ok(CompileOutcome {
            success: output.status.success(),
            diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(output_dir: PathBuf) -> CompileRequest {
        CompileRequest {
            project: "test:blub:1.0.0".into(),
            source_root: PathBuf::from("src/main/java"),
            sources: vec![PathBuf::from("src/main/java/Blub.java")],
            classpath: vec![PathBuf::from("a.jar"), PathBuf::from("b.jar")],
            output_dir,
            encoding: "UTF-8".into(),
            source_level: Some("1.8".into()),
            target_level: Some("1.8".into()),
        }
    }

    #[tokio::test]
    async fn test_missing_javac_is_io_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let compiler = JavacCompiler::new(dir.path().join("no-such-javac"));
        let err = compiler
            .compile(&request(dir.path().join("classes")))
            .await
            .unwrap_err();
        assert!(matches!(err, MinimavenError::Io { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_status_maps_to_success() {
        let dir = tempfile::TempDir::new().unwrap();

        let outcome = JavacCompiler::new("true")
            .compile(&request(dir.path().join("classes")))
            .await
            .unwrap();
        assert!(outcome.success);
        assert!(dir.path().join("classes").is_dir());

        let outcome = JavacCompiler::new("false")
            .compile(&request(dir.path().join("classes")))
            .await
            .unwrap();
        assert!(!outcome.success);
    }
}
