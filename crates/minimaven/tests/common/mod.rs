//! Shared helpers for the engine integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use minimaven::build::incremental::class_file;
use minimaven::build::{CompileOutcome, CompileRequest, Compiler};
use minimaven_core::{BuildConfig, Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use walkdir::WalkDir;

pub const REMOTE: &str = "mem://repo";

pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Copies a fixture tree into `dest`, since builds write into it.
pub fn copy_fixture(name: &str, dest: &Path) -> PathBuf {
    let source = fixture(name);
    let root = dest.join(name);
    for entry in WalkDir::new(&source) {
        let entry = entry.unwrap();
        let target = root.join(entry.path().strip_prefix(&source).unwrap());
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).unwrap();
        } else {
            std::fs::copy(entry.path(), &target).unwrap();
        }
    }
    root
}

pub fn config(local_repository: &Path) -> BuildConfig {
    BuildConfig {
        local_repository: local_repository.to_path_buf(),
        remote_repositories: vec![REMOTE.to_string()],
        ..BuildConfig::default()
    }
}

/// Compiler that writes one placeholder class file per source and records
/// every request.
#[derive(Default)]
pub struct FakeCompiler {
    requests: Mutex<Vec<CompileRequest>>,
    failing: Option<String>,
}

impl FakeCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects every request for the project with this GAV.
    pub fn failing(gav: &str) -> Self {
        Self {
            failing: Some(gav.to_string()),
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<CompileRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn compiled_projects(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.project).collect()
    }
}

#[async_trait]
impl Compiler for FakeCompiler {
    async fn compile(&self, request: &CompileRequest) -> Result<CompileOutcome> {
        self.requests.lock().unwrap().push(request.clone());
        if self.failing.as_deref() == Some(request.project.as_str()) {
            return Ok(CompileOutcome {
                success: false,
                diagnostics: "error: cannot find symbol".to_string(),
            });
        }
        for source in &request.sources {
            let class = class_file(&request.source_root, &request.output_dir, source);
            std::fs::create_dir_all(class.parent().unwrap()).unwrap();
            std::fs::write(&class, b"\xca\xfe\xba\xbe").unwrap();
        }
        Ok(CompileOutcome {
            success: true,
            diagnostics: String::new(),
        })
    }
}

pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
