//! Graph loading and dependency resolution against fixture repositories.

mod common;

use common::{REMOTE, config, fixture};
use minimaven::repository::{remote_artifact_url, snapshot_metadata_url};
use minimaven::{ProjectId, ScopeFilter, Session, dependencies};
use minimaven_core::{BuildConfig, MemoryFetcher, MinimavenError, OfflineFetcher};
use minimaven_pom::Coordinate;
use std::sync::Arc;
use tempfile::TempDir;

fn offline_session() -> Session {
    let config = BuildConfig {
        local_repository: fixture("repository"),
        offline: true,
        ..BuildConfig::default()
    };
    Session::new(config, Arc::new(OfflineFetcher))
}

fn gavs(projects: &[Arc<minimaven::Project>]) -> Vec<String> {
    projects.iter().map(|p| p.gav()).collect()
}

#[tokio::test]
async fn test_exclusion_scenario() {
    let session = offline_session();
    let top = session.load(&fixture("top/pom.xml")).await.unwrap();

    let resolved = dependencies(session.arena(), &top).unwrap();
    assert_eq!(gavs(&resolved), vec!["test:dependency:1.0.0"]);

    // excluded artifacts are never loaded on behalf of top
    let excluded = ProjectId::of(&Coordinate::new("test2", "excluded", Some("0.0.1".into())));
    assert!(!session.arena().contains(&excluded));

    let dependency = Arc::clone(&resolved[0]);
    session.load_dependencies(&dependency).await.unwrap();
    let resolved = dependencies(session.arena(), &dependency).unwrap();
    assert_eq!(
        gavs(&resolved),
        vec!["test2:excluded:0.0.1", "test3:excludedToo:0.0.1"]
    );
}

#[tokio::test]
async fn test_root_listed_first_unless_excluded() {
    let session = offline_session();
    let top = session.load(&fixture("top/pom.xml")).await.unwrap();

    let resolved = session
        .resolve(&top, ScopeFilter::runtime(), false, None)
        .unwrap();
    assert_eq!(
        gavs(&resolved),
        vec!["test:top:1.0.0", "test:dependency:1.0.0"]
    );
}

#[tokio::test]
async fn test_module_siblings_resolve_from_source() {
    let session = offline_session();
    let root = session.load(&fixture("multi/pom.xml")).await.unwrap();
    let modules = session.load_modules(&root).await.unwrap();
    assert_eq!(modules.len(), 3);

    let app = modules
        .iter()
        .find(|m| m.artifact_id() == "Blub_App")
        .unwrap();
    // version comes from the parent's dependency management
    assert_eq!(app.dependencies[0].gav(), "test:lib:1.0.0");
    assert_eq!(app.property("main-class"), Some("org.app.App"));
    assert_eq!(app.property("maven.compiler.source"), Some("1.8"));

    let resolved = dependencies(session.arena(), app).unwrap();
    assert_eq!(resolved.len(), 1);
    assert!(resolved[0].is_local());
    assert_eq!(
        resolved[0].directory(),
        Some(fixture("multi/lib").as_path())
    );
}

#[tokio::test]
async fn test_snapshot_resolved_once_per_session() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(MemoryFetcher::new());
    let snapshot = Coordinate::new("test", "snap", Some("1.0-SNAPSHOT".into()));
    fetcher.insert(
        snapshot_metadata_url(REMOTE, &snapshot),
        "<metadata><version>1.0-20240101.090000-7</version></metadata>",
    );
    snapshot.set_snapshot_version("1.0-20240101.090000-7");
    fetcher.insert(
        remote_artifact_url(REMOTE, &snapshot, "pom"),
        "<project><groupId>test</groupId><artifactId>snap</artifactId><version>1.0-SNAPSHOT</version></project>",
    );

    let pom = |artifact: &str| {
        format!(
            "<project><groupId>test</groupId><artifactId>{artifact}</artifactId><version>1.0</version>\
             <dependencies><dependency><groupId>test</groupId><artifactId>snap</artifactId>\
             <version>1.0-SNAPSHOT</version></dependency></dependencies></project>"
        )
    };

    let session = Session::new(config(&dir.path().join("m2")), fetcher.clone());
    let a = session
        .load_bytes(pom("a").as_bytes(), &dir.path().join("a"))
        .await
        .unwrap();
    let requests = fetcher.request_count();
    let b = session
        .load_bytes(pom("b").as_bytes(), &dir.path().join("b"))
        .await
        .unwrap();

    assert_eq!(fetcher.request_count(), requests);
    for root in [a, b] {
        let resolved = dependencies(session.arena(), &root).unwrap();
        assert_eq!(resolved[0].coordinate.jar_name(), "snap-1.0-20240101.090000-7.jar");
    }
}

fn publish_snapshot(fetcher: &MemoryFetcher) {
    let snapshot = Coordinate::new("test", "snap", Some("1.0-SNAPSHOT".into()));
    fetcher.insert(
        snapshot_metadata_url(REMOTE, &snapshot),
        "<metadata><version>1.0-SNAPSHOT</version><versioning><snapshot>\
         <timestamp>20240101.090000</timestamp><buildNumber>7</buildNumber>\
         </snapshot></versioning></metadata>",
    );
    snapshot.set_snapshot_version("1.0-20240101.090000-7");
    fetcher.insert(
        remote_artifact_url(REMOTE, &snapshot, "pom"),
        "<project><groupId>test</groupId><artifactId>snap</artifactId><version>1.0-SNAPSHOT</version></project>",
    );
    fetcher.insert(remote_artifact_url(REMOTE, &snapshot, "jar"), "snapshot jar");
}

const SNAPSHOT_ROOT: &str = "<project><groupId>test</groupId><artifactId>root</artifactId><version>1.0</version>\
     <dependencies><dependency><groupId>test</groupId><artifactId>snap</artifactId>\
     <version>1.0-SNAPSHOT</version></dependency></dependencies></project>";

#[tokio::test]
async fn test_downloaded_snapshot_reused_by_later_sessions() {
    let dir = TempDir::new().unwrap();
    let m2 = dir.path().join("m2");

    let fetcher = Arc::new(MemoryFetcher::new());
    publish_snapshot(&fetcher);
    let first = Session::new(config(&m2), fetcher);
    let root = first.load_bytes(SNAPSHOT_ROOT.as_bytes(), dir.path()).await.unwrap();
    let snap = dependencies(first.arena(), &root).unwrap().remove(0);
    first.ensure_artifact(&snap).await.unwrap();

    // offline: everything comes from the local repository
    let mut offline = config(&m2);
    offline.offline = true;
    let second = Session::new(offline, Arc::new(OfflineFetcher));
    let root = second.load_bytes(SNAPSHOT_ROOT.as_bytes(), dir.path()).await.unwrap();
    let resolved = dependencies(second.arena(), &root).unwrap();
    assert_eq!(resolved[0].coordinate.jar_name(), "snap-1.0-20240101.090000-7.jar");
    let jar = second.ensure_artifact(&resolved[0]).await.unwrap().unwrap();
    assert_eq!(std::fs::read(jar).unwrap(), b"snapshot jar");

    // prefer-cache: the network is not consulted at all
    let mut cached = config(&m2);
    cached.prefer_cache = true;
    let fetcher = Arc::new(MemoryFetcher::new());
    publish_snapshot(&fetcher);
    let third = Session::new(cached, fetcher.clone());
    let root = third.load_bytes(SNAPSHOT_ROOT.as_bytes(), dir.path()).await.unwrap();
    let resolved = dependencies(third.arena(), &root).unwrap();
    assert_eq!(resolved[0].coordinate.jar_name(), "snap-1.0-20240101.090000-7.jar");
    assert_eq!(fetcher.request_count(), 0);
}

#[tokio::test]
async fn test_unknown_dependency_is_resolution_error() {
    let dir = TempDir::new().unwrap();
    let session = Session::new(config(&dir.path().join("m2")), Arc::new(MemoryFetcher::new()));
    let pom = "<project><groupId>test</groupId><artifactId>top</artifactId><version>1</version>\
               <dependencies><dependency><groupId>test</groupId><artifactId>nowhere</artifactId>\
               <version>1</version></dependency></dependencies></project>";

    let err = session.load_bytes(pom.as_bytes(), dir.path()).await.unwrap_err();
    assert!(
        matches!(err, MinimavenError::Resolution { ref coordinate, .. } if coordinate == "test:nowhere:1"),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn test_missing_managed_version_is_fatal() {
    let dir = TempDir::new().unwrap();
    let session = Session::new(config(&dir.path().join("m2")), Arc::new(MemoryFetcher::new()));
    let pom = "<project><groupId>test</groupId><artifactId>top</artifactId><version>1</version>\
               <dependencies><dependency><groupId>test</groupId><artifactId>unversioned</artifactId>\
               </dependency></dependencies></project>";

    let err = session.load_bytes(pom.as_bytes(), dir.path()).await.unwrap_err();
    assert!(matches!(err, MinimavenError::VersionMissing { .. }));
}
