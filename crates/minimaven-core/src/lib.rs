//! Core abstractions for minimaven.
//!
//! Shared by the POM model and the build engine: the error taxonomy, the
//! pull-style XML element stream every document extractor consumes, the byte
//! fetching contract with its HTTP/caching/in-memory implementations, and the
//! session configuration.

pub mod config;
pub mod error;
pub mod fetch;
pub mod xml;

pub use config::{BuildConfig, CONFIG_FILE_NAME, MAVEN_CENTRAL};
pub use error::{IoContext, MinimavenError, Result};
pub use fetch::{CachingFetcher, FetchOutcome, Fetcher, HttpFetcher, MemoryFetcher, OfflineFetcher};
pub use xml::{ElementReader, XmlEvent};
