//! Byte fetching by URL.
//!
//! The build engine only ever asks one question of the network: "give me the
//! bytes behind this URL, or tell me it does not exist". [`Fetcher`] is that
//! contract. A fetch that fails for any other reason is an error and is never
//! retried here; retry policy belongs to the embedder.

use crate::config::BuildConfig;
use crate::error::{MinimavenError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use reqwest::StatusCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Found(Bytes),
    NotFound,
}

impl FetchOutcome {
    pub fn into_found(self) -> Option<Bytes> {
        match self {
            Self::Found(bytes) => Some(bytes),
            Self::NotFound => None,
        }
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchOutcome>;

    /// Whether this fetcher can reach the network at all.
    ///
    /// Callers use this to skip remote lookups up front instead of collecting
    /// one `Offline` error per coordinate.
    fn is_online(&self) -> bool {
        true
    }
}

#[async_trait]
impl<T: Fetcher + ?Sized> Fetcher for Arc<T> {
    async fn fetch(&self, url: &str) -> Result<FetchOutcome> {
        (**self).fetch(url).await
    }

    fn is_online(&self) -> bool {
        (**self).is_online()
    }
}

/// Fetches `http(s)://` URLs with reqwest and `file://` URLs from disk.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &BuildConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| MinimavenError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn fetch_file(path: &str) -> Result<FetchOutcome> {
        match tokio::fs::read(path).await {
            Ok(data) => Ok(FetchOutcome::Found(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FetchOutcome::NotFound),
            Err(e) => Err(MinimavenError::io(path, e)),
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchOutcome> {
        if let Some(path) = url.strip_prefix("file://") {
            return Self::fetch_file(path).await;
        }

        tracing::debug!(url, "fetching");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MinimavenError::Network {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            tracing::debug!(url, %status, "not found");
            return Ok(FetchOutcome::NotFound);
        }
        if !status.is_success() {
            return Err(MinimavenError::Network {
                url: url.to_string(),
                message: format!("server returned {status}"),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| MinimavenError::Network {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        tracing::debug!(url, bytes = body.len(), "fetched");
        Ok(FetchOutcome::Found(body))
    }
}

/// Decorator that remembers successful answers (including "not found") for
/// the lifetime of the session. Errors are never cached.
pub struct CachingFetcher<F> {
    inner: F,
    cache: DashMap<String, FetchOutcome>,
}

impl<F: Fetcher> CachingFetcher<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
        }
    }

    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }
}

#[async_trait]
impl<F: Fetcher> Fetcher for CachingFetcher<F> {
    async fn fetch(&self, url: &str) -> Result<FetchOutcome> {
        if let Some(cached) = self.cache.get(url) {
            tracing::trace!(url, "fetch cache hit");
            return Ok(cached.clone());
        }

        let outcome = self.inner.fetch(url).await?;
        self.cache.insert(url.to_string(), outcome.clone());
        Ok(outcome)
    }

    fn is_online(&self) -> bool {
        self.inner.is_online()
    }
}

/// In-memory fetcher serving a fixed set of URLs.
#[derive(Default)]
pub struct MemoryFetcher {
    entries: DashMap<String, Bytes>,
    requests: AtomicUsize,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: impl Into<String>, body: impl Into<Bytes>) {
        self.entries.insert(url.into(), body.into());
    }

    /// Number of `fetch` calls served so far, hits and misses alike.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for MemoryFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchOutcome> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .entries
            .get(url)
            .map_or(FetchOutcome::NotFound, |body| {
                FetchOutcome::Found(body.clone())
            }))
    }
}

/// Fetcher for sessions that must never touch the network.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineFetcher;

#[async_trait]
impl Fetcher for OfflineFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchOutcome> {
        Err(MinimavenError::Offline {
            url: url.to_string(),
        })
    }

    fn is_online(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_fetcher() {
        let fetcher = MemoryFetcher::new();
        fetcher.insert("https://repo/a.pom", "<project/>");

        let found = fetcher.fetch("https://repo/a.pom").await.unwrap();
        assert_eq!(found, FetchOutcome::Found(Bytes::from("<project/>")));

        let missing = fetcher.fetch("https://repo/b.pom").await.unwrap();
        assert_eq!(missing, FetchOutcome::NotFound);
        assert_eq!(fetcher.request_count(), 2);
    }

    #[tokio::test]
    async fn test_caching_fetcher_returns_cached_value() {
        let inner = Arc::new(MemoryFetcher::new());
        inner.insert("https://repo/a.pom", "a");
        let caching = CachingFetcher::new(Arc::clone(&inner));

        caching.fetch("https://repo/a.pom").await.unwrap();
        caching.fetch("https://repo/a.pom").await.unwrap();
        caching.fetch("https://repo/missing.pom").await.unwrap();
        caching.fetch("https://repo/missing.pom").await.unwrap();

        assert_eq!(inner.request_count(), 2);
        assert_eq!(caching.cache_size(), 2);
    }

    #[tokio::test]
    async fn test_offline_fetcher() {
        let fetcher = OfflineFetcher;
        assert!(!fetcher.is_online());
        let err = fetcher.fetch("https://repo/a.pom").await.unwrap_err();
        assert!(matches!(err, MinimavenError::Offline { .. }));
    }

    #[tokio::test]
    async fn test_http_fetcher_found_and_not_found() {
        let mut server = mockito::Server::new_async().await;
        let found = server
            .mock("GET", "/g/a/1.0/a-1.0.pom")
            .with_status(200)
            .with_body("<project/>")
            .create_async()
            .await;
        let missing = server
            .mock("GET", "/g/a/2.0/a-2.0.pom")
            .with_status(404)
            .create_async()
            .await;

        let fetcher = HttpFetcher::new(&BuildConfig::default()).unwrap();
        let outcome = fetcher
            .fetch(&format!("{}/g/a/1.0/a-1.0.pom", server.url()))
            .await
            .unwrap();
        assert_eq!(outcome, FetchOutcome::Found(Bytes::from("<project/>")));

        let outcome = fetcher
            .fetch(&format!("{}/g/a/2.0/a-2.0.pom", server.url()))
            .await
            .unwrap();
        assert_eq!(outcome, FetchOutcome::NotFound);

        found.assert_async().await;
        missing.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_fetcher_server_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/broken.pom")
            .with_status(500)
            .create_async()
            .await;

        let fetcher = HttpFetcher::new(&BuildConfig::default()).unwrap();
        let err = fetcher
            .fetch(&format!("{}/broken.pom", server.url()))
            .await
            .unwrap_err();
        assert!(matches!(err, MinimavenError::Network { .. }));
    }

    #[tokio::test]
    async fn test_http_fetcher_file_urls() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("a.pom");
        std::fs::write(&path, "local").unwrap();

        let fetcher = HttpFetcher::new(&BuildConfig::default()).unwrap();
        let outcome = fetcher
            .fetch(&format!("file://{}", path.display()))
            .await
            .unwrap();
        assert_eq!(outcome, FetchOutcome::Found(Bytes::from("local")));

        let outcome = fetcher
            .fetch(&format!("file://{}", dir.path().join("b.pom").display()))
            .await
            .unwrap();
        assert_eq!(outcome, FetchOutcome::NotFound);
    }
}
