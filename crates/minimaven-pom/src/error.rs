//! Errors specific to POM and repository metadata documents.

use minimaven_core::MinimavenError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PomError {
    #[error("Failed to parse {context}: {message}")]
    Parse { context: String, message: String },

    #[error("Missing required field '{field}' in {context}")]
    MissingField { field: &'static str, context: String },

    #[error("Unhandled version: {version}")]
    UnhandledVersion { version: String },

    #[error("Unknown scope '{scope}'")]
    UnknownScope { scope: String },

    #[error("Missing version in {context}")]
    MissingVersion { context: String },

    #[error(
        "Missing timestamp/build number in {context}: {}, {}",
        timestamp.as_deref().unwrap_or("null"),
        build_number.as_deref().unwrap_or("null")
    )]
    IncompleteSnapshot {
        context: String,
        timestamp: Option<String>,
        build_number: Option<String>,
    },

    #[error(transparent)]
    Core(#[from] MinimavenError),
}

pub type Result<T> = std::result::Result<T, PomError>;

impl From<PomError> for MinimavenError {
    fn from(err: PomError) -> Self {
        match err {
            PomError::Parse { context, message } => Self::Parse { context, message },
            PomError::MissingField { field, context } => Self::MissingField { field, context },
            PomError::UnhandledVersion { version } => Self::Parse {
                context: "version string".into(),
                message: format!("Unhandled version: {version}"),
            },
            err @ PomError::UnknownScope { .. } => Self::Parse {
                context: "dependency scope".into(),
                message: err.to_string(),
            },
            // Metadata that parsed but is unusable is an I/O failure of the
            // document behind `context`, not a syntax problem.
            err @ (PomError::MissingVersion { .. } | PomError::IncompleteSnapshot { .. }) => {
                let context = match &err {
                    PomError::MissingVersion { context }
                    | PomError::IncompleteSnapshot { context, .. } => context.clone(),
                    _ => String::new(),
                };
                Self::Io {
                    path: context.into(),
                    source: std::io::Error::new(std::io::ErrorKind::InvalidData, err.to_string()),
                }
            }
            PomError::Core(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PomError::UnhandledVersion {
            version: "1.0-beta".into(),
        };
        assert_eq!(err.to_string(), "Unhandled version: 1.0-beta");

        let err = PomError::IncompleteSnapshot {
            context: "maven-metadata.xml".into(),
            timestamp: Some("20240101.120000".into()),
            build_number: None,
        };
        assert!(err.to_string().contains("20240101.120000, null"));
    }

    #[test]
    fn test_unhandled_version_becomes_parse_error() {
        let err: MinimavenError = PomError::UnhandledVersion {
            version: "x".into(),
        }
        .into();
        assert!(matches!(err, MinimavenError::Parse { .. }));
    }

    #[test]
    fn test_incomplete_snapshot_becomes_io_error() {
        let err: MinimavenError = PomError::IncompleteSnapshot {
            context: "https://repo/g/a/1.0-SNAPSHOT/maven-metadata.xml".into(),
            timestamp: None,
            build_number: Some("3".into()),
        }
        .into();
        match err {
            MinimavenError::Io { path, source } => {
                assert!(path.to_string_lossy().ends_with("maven-metadata.xml"));
                assert_eq!(source.kind(), std::io::ErrorKind::InvalidData);
            }
            other => panic!("expected Io error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_field_round_trips() {
        let err: MinimavenError = PomError::MissingField {
            field: "artifactId",
            context: "pom.xml".into(),
        }
        .into();
        assert!(matches!(
            err,
            MinimavenError::MissingField {
                field: "artifactId",
                ..
            }
        ));
    }

    #[test]
    fn test_core_error_passes_through() {
        let err: MinimavenError =
            PomError::Core(MinimavenError::parse("pom.xml", "unexpected end")).into();
        assert!(matches!(err, MinimavenError::Parse { .. }));
    }
}
