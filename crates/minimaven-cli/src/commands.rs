//! Subcommand implementations.

use crate::cli::{Cli, Command};
use anyhow::{Context, Result};
use minimaven::{Builder, Project, Session};
use minimaven_core::{BuildConfig, CachingFetcher, Fetcher, HttpFetcher, OfflineFetcher};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

/// Configuration file (or discovery next to the POM), then the environment,
/// then command-line flags.
pub(crate) fn load_config(cli: &Cli) -> Result<BuildConfig> {
    let mut config = match &cli.config {
        Some(path) => BuildConfig::load(path)
            .with_context(|| format!("reading configuration {}", path.display()))?
            .with_env(),
        None => {
            let dir = cli
                .pom
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            BuildConfig::discover(dir)?
        }
    };
    if cli.offline {
        config.offline = true;
    }
    if let Some(repository) = &cli.repository {
        config.local_repository.clone_from(repository);
    }
    Ok(config)
}

fn fetcher(config: &BuildConfig) -> Result<Arc<dyn Fetcher>> {
    if config.offline {
        return Ok(Arc::new(OfflineFetcher));
    }
    let http = HttpFetcher::new(config).context("creating HTTP client")?;
    Ok(Arc::new(CachingFetcher::new(http)))
}

/// The project itself unless it is an aggregator, followed by its modules.
fn targets(project: &Arc<Project>, modules: &[Arc<Project>]) -> Vec<Arc<Project>> {
    let mut targets = Vec::with_capacity(modules.len() + 1);
    if project.packaging.has_artifact() {
        targets.push(Arc::clone(project));
    }
    targets.extend(
        modules
            .iter()
            .filter(|m| m.packaging.has_artifact())
            .cloned(),
    );
    targets
}

pub(crate) async fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(&cli)?;
    tracing::debug!(?config, "configuration");
    let session = Arc::new(Session::new(config.clone(), fetcher(&config)?));

    let project = session
        .load(&cli.pom)
        .await
        .with_context(|| format!("loading {}", cli.pom.display()))?;
    let modules = session
        .load_modules(&project)
        .await
        .with_context(|| format!("loading modules of {}", project.gav()))?;

    match cli.command {
        Command::Resolve { scope, optional } => {
            for target in std::iter::once(&project).chain(modules.iter()) {
                if !modules.is_empty() {
                    println!("{}:", target.gav());
                }
                for dependency in session.resolve(target, scope.filter(), optional, None)? {
                    println!("{}", dependency.coordinate);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Build => {
            let builder = Builder::with_javac(Arc::clone(&session));
            let mut failed = 0;
            for (id, result) in builder.build_all(&targets(&project, &modules)).await {
                match result {
                    Ok(report) if report.rebuilt => tracing::info!(project = %id, "built"),
                    Ok(_) => tracing::info!(project = %id, "up to date"),
                    Err(e) => {
                        failed += 1;
                        eprintln!("error: {e}");
                    }
                }
            }
            Ok(if failed == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Install { app_dir } => {
            let builder = Builder::with_javac(Arc::clone(&session));
            for target in targets(&project, &modules) {
                let installed = builder
                    .install(&target, &app_dir)
                    .await
                    .with_context(|| format!("installing {}", target.gav()))?;
                for path in installed {
                    println!("{}", path.display());
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Clean { app_dir } => {
            let builder = Builder::with_javac(Arc::clone(&session));
            for target in targets(&project, &modules) {
                for path in builder.clean(&target, app_dir.as_deref()).await? {
                    println!("removed {}", path.display());
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn test_flags_override_configuration_file() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("custom.toml");
        std::fs::write(
            &config_path,
            "remote-repositories = [\"https://maven.scijava.org/content/groups/public\"]\n",
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "minimaven",
            "build",
            "--config",
            config_path.to_str().unwrap(),
            "--offline",
            "--repository",
            "/tmp/m2",
        ])
        .unwrap();
        let config = load_config(&cli).unwrap();

        assert!(config.offline);
        assert_eq!(config.local_repository, Path::new("/tmp/m2"));
        assert_eq!(
            config.remote_repositories,
            vec!["https://maven.scijava.org/content/groups/public"]
        );
    }

    #[test]
    fn test_missing_configuration_file_is_an_error() {
        let cli = Cli::try_parse_from(["minimaven", "build", "--config", "/nonexistent/minimaven.toml"])
            .unwrap();
        assert!(load_config(&cli).is_err());
    }

    #[tokio::test]
    async fn test_resolve_offline_project() {
        let dir = TempDir::new().unwrap();
        let pom = dir.path().join("pom.xml");
        std::fs::write(
            &pom,
            "<project><groupId>test</groupId><artifactId>blub</artifactId><version>1.0.0</version></project>",
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "minimaven",
            "resolve",
            "--offline",
            "--pom",
            pom.to_str().unwrap(),
            "--repository",
            dir.path().join("m2").to_str().unwrap(),
        ])
        .unwrap();
        run(cli).await.unwrap();
    }
}
