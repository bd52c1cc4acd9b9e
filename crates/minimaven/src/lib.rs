//! POM graph loading, dependency resolution and build orchestration.
//!
//! A [`Session`] loads a root POM, its parents and the POMs of everything it
//! depends on into a shared [`ProjectArena`]. [`resolver::resolve`] walks that
//! arena to produce the dependency set for a scope, and a [`Builder`] compiles,
//! packages and installs local projects on top of it.
//!
//! # Examples
//!
//! ```no_run
//! use minimaven::{Builder, ScopeFilter, Session};
//! use minimaven_core::{BuildConfig, CachingFetcher, HttpFetcher};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn run() -> minimaven_core::Result<()> {
//! let config = BuildConfig::default();
//! let fetcher = Arc::new(CachingFetcher::new(HttpFetcher::new(&config)?));
//! let session = Arc::new(Session::new(config, fetcher));
//!
//! let project = session.load(Path::new("pom.xml")).await?;
//! for dependency in session.resolve(&project, ScopeFilter::runtime(), false, None)? {
//!     println!("{}", dependency.gav());
//! }
//!
//! Builder::with_javac(Arc::clone(&session)).build(&project).await?;
//! # Ok(())
//! # }
//! ```

pub mod build;
pub mod inherit;
pub mod project;
pub mod repository;
pub mod resolver;
pub mod session;

pub use build::{BuildReport, BuildState, Builder, Compiler, JavacCompiler};
pub use project::{ManagementTable, Project, ProjectArena, ProjectId, ProjectSource};
pub use repository::LocalRepository;
pub use resolver::{ScopeFilter, dependencies, resolve};
pub use session::Session;
