//! Command-line arguments.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use minimaven::ScopeFilter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "minimaven", version, about = "Resolve, build and install Maven projects without Maven")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Command,

    /// POM of the project to operate on
    #[arg(long, global = true, default_value = "pom.xml", value_name = "PATH")]
    pub(crate) pom: PathBuf,

    /// Never touch the network; use the local repository only
    #[arg(long, global = true)]
    pub(crate) offline: bool,

    /// Configuration file (default: minimaven.toml next to the POM)
    #[arg(long, global = true, value_name = "PATH")]
    pub(crate) config: Option<PathBuf>,

    /// Local repository root (default: ~/.m2/repository)
    #[arg(long, global = true, value_name = "PATH")]
    pub(crate) repository: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub(crate) verbose: u8,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub(crate) enum Command {
    /// Print the resolved dependency set of the project
    Resolve {
        #[arg(long, value_enum, default_value_t = ScopeArg::Runtime)]
        scope: ScopeArg,
        /// Include optional direct dependencies
        #[arg(long)]
        optional: bool,
    },
    /// Compile and package the project and its modules
    Build,
    /// Build, then copy jars and runtime dependencies into an application
    Install {
        /// Application directory containing jars/ and plugins/
        app_dir: PathBuf,
    },
    /// Remove build output and, with an application directory, installed jars
    Clean { app_dir: Option<PathBuf> },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScopeArg {
    Compile,
    Runtime,
    Test,
    All,
}

impl ScopeArg {
    pub(crate) const fn filter(self) -> ScopeFilter {
        match self {
            Self::Compile => ScopeFilter::compile_classpath(),
            Self::Runtime => ScopeFilter::runtime(),
            Self::Test => ScopeFilter::test(),
            Self::All => ScopeFilter::all(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolve_defaults() {
        let cli = Cli::try_parse_from(["minimaven", "resolve"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Resolve {
                scope: ScopeArg::Runtime,
                optional: false
            }
        );
        assert_eq!(cli.pom, PathBuf::from("pom.xml"));
        assert!(!cli.offline);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "minimaven",
            "install",
            "/opt/Fiji.app",
            "--pom",
            "blub/pom.xml",
            "--offline",
            "-vv",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Command::Install {
                app_dir: PathBuf::from("/opt/Fiji.app")
            }
        );
        assert_eq!(cli.pom, PathBuf::from("blub/pom.xml"));
        assert!(cli.offline);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_parse_scope() {
        let cli = Cli::try_parse_from(["minimaven", "resolve", "--scope", "test", "--optional"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Resolve {
                scope: ScopeArg::Test,
                optional: true
            }
        );
        assert_eq!(ScopeArg::Test.filter(), ScopeFilter::test());
    }

    #[test]
    fn test_install_requires_app_dir() {
        assert!(Cli::try_parse_from(["minimaven", "install"]).is_err());
        assert!(Cli::try_parse_from(["minimaven", "clean"]).is_ok());
    }
}
