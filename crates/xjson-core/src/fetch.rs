//! Injected collaborators for reading include targets: a filesystem reader
//! and a URL fetcher. Both are traits so callers can substitute fakes in
//! tests or route fetches through their own caching layer, the way
//! `lintel-schema-cache` wraps `reqwest` behind a narrow fetch interface.

use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    NotFound,
    Io(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    NotFound,
    Network(String),
}

pub trait FileReader {
    fn read_file(&self, path: &Path) -> Result<Vec<u8>, ReadError>;
}

pub trait UrlFetcher {
    fn fetch_url(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Reads include targets straight off disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultFileReader;

impl FileReader for DefaultFileReader {
    fn read_file(&self, path: &Path) -> Result<Vec<u8>, ReadError> {
        fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ReadError::NotFound,
            _ => ReadError::Io(e.to_string()),
        })
    }
}

/// Fetches include targets over HTTP(S) using a blocking client, since the
/// core's resolution pipeline is synchronous by design.
#[derive(Debug, Clone)]
pub struct ReqwestUrlFetcher {
    client: reqwest::blocking::Client,
}

impl ReqwestUrlFetcher {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .expect("building the HTTP client failed");
        Self { client }
    }
}

impl Default for ReqwestUrlFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlFetcher for ReqwestUrlFetcher {
    fn fetch_url(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound);
        }
        let response = response
            .error_for_status()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| FetchError::Network(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_reader_reads_existing_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello").unwrap();
        let bytes = DefaultFileReader.read_file(file.path()).unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn default_reader_reports_not_found() {
        let err = DefaultFileReader
            .read_file(Path::new("/nonexistent/does-not-exist.json"))
            .unwrap_err();
        assert_eq!(err, ReadError::NotFound);
    }
}
