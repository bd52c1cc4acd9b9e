//! Compiling, packaging and installing local projects.

pub mod archive;
pub mod compiler;
pub mod incremental;
pub mod install;
pub mod orchestrator;

pub use archive::{ArchiveWriter, JarWriter, package_jar};
pub use compiler::{CompileOutcome, CompileRequest, Compiler, JavacCompiler};
pub use install::{artifact_pattern, install_subdirectory};
pub use orchestrator::{BuildReport, BuildState, Builder};
