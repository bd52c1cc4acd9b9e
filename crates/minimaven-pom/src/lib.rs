//! pom.xml model for minimaven.
//!
//! Artifact coordinates and their file naming, the POM extractor, and the two
//! repository metadata extractors (per-version snapshot metadata and
//! artifact-level version lists). Everything here is pure: bytes in, values
//! out. Fetching and inheritance live in the `minimaven` engine.

pub mod coordinate;
pub mod error;
pub mod parser;
pub mod snapshot;
pub mod types;
pub mod version;

pub use coordinate::{ArtifactKey, Coordinate, Exclusion, SNAPSHOT_SUFFIX, normalize};
pub use error::{PomError, Result};
pub use parser::{ParentRef, PomDocument, ScopeExpression, parse_pom};
pub use snapshot::{SnapshotVersion, parse_snapshot_metadata};
pub use types::{BuildLayout, Packaging, Scope};
pub use version::{
    VersionRequirement, compare_versions, is_prerelease, parse_latest_version,
    parse_metadata_versions,
};
