// src/kitchen/fetch.rs

//! Fetching sources and patches, and the verified source cache
//!
//! Downloads are never retried: a transport failure is reported as
//! [`Error::Download`] and the cook stops. Only bytes that already matched
//! their declared checksum are written to the cache, and a cached file is
//! hashed again on every use.

use crate::error::{Error, Result};
use crate::hash::Hash;
use reqwest::blocking::Client;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for HTTP requests
const HTTP_TIMEOUT: Duration = Duration::from_secs(300);

/// Something that turns a URL into bytes
pub trait Fetcher: Send + Sync {
    /// Retrieve the full contents of `url`
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Fetcher for `http(s)://`, `file://` and plain filesystem paths
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    timeout: Duration,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self {
            timeout: HTTP_TIMEOUT,
        }
    }
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_local(path: &str) -> Result<Vec<u8>> {
        fs::read(path).map_err(|e| Error::Download(format!("Failed to read {}: {}", path, e)))
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if let Some(path) = url.strip_prefix("file://") {
            return Self::read_local(path);
        }
        if !url.contains("://") {
            return Self::read_local(url);
        }

        debug!("GET {}", url);
        let client = Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("pantry/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Download(format!("Failed to create HTTP client: {e}")))?;

        let response = client
            .get(url)
            .send()
            .map_err(|e| Error::Download(format!("Failed to fetch {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::Download(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let bytes = response
            .bytes()
            .map_err(|e| Error::Download(format!("Failed to read response: {}", e)))?;

        Ok(bytes.to_vec())
    }
}

/// Verified downloads keyed by checksum
#[derive(Debug, Clone)]
pub struct SourceCache {
    root: PathBuf,
}

impl SourceCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where content with `checksum` is stored
    pub fn path_for(&self, checksum: &Hash, filename: &str) -> PathBuf {
        self.root.join(format!("{}-{}", checksum.cache_key(), filename))
    }

    /// Cached bytes, if present and still matching
    ///
    /// A file whose contents no longer hash to `checksum` is removed.
    pub fn get(&self, checksum: &Hash, filename: &str) -> Option<Vec<u8>> {
        let path = self.path_for(checksum, filename);
        let data = fs::read(&path).ok()?;

        if checksum.matches(&data) {
            debug!("Cache hit: {}", path.display());
            Some(data)
        } else {
            warn!("Discarding stale cache entry {}", path.display());
            if let Err(e) = fs::remove_file(&path) {
                warn!("Failed to remove {}: {}", path.display(), e);
            }
            None
        }
    }

    /// Whether a valid entry exists
    pub fn contains(&self, checksum: &Hash, filename: &str) -> bool {
        self.get(checksum, filename).is_some()
    }

    /// Store bytes that have already been verified against `checksum`
    ///
    /// Written to a temporary file first and renamed into place, so readers
    /// never see a partial entry.
    pub fn put(&self, checksum: &Hash, filename: &str, data: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.root)?;
        let path = self.path_for(checksum, filename);

        let mut temp = tempfile::NamedTempFile::new_in(&self.root)?;
        temp.write_all(data)?;
        temp.persist(&path).map_err(|e| e.error)?;

        info!("Cached {} ({} bytes)", path.display(), data.len());
        Ok(path)
    }
}
