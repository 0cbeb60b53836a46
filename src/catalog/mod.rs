// src/catalog/mod.rs

//! Layout catalog loading
//!
//! The catalog is a static JSON array generated at build time, listing every
//! layout the host application knows about:
//!
//! ```json
//! [
//!   { "id": "fr", "name": "Français", "preloaded": true },
//!   { "id": "de", "name": "Deutsch", "preloaded": false }
//! ]
//! ```
//!
//! It can be read from a local file or fetched over HTTP. Either way the
//! whole payload is loaded at once; a transport error or a malformed payload
//! fails the fetch.

use crate::error::{Error, Result};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum attempts for a remote catalog fetch
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds, multiplied by the attempt number
const RETRY_DELAY_MS: u64 = 1000;

/// One layout as listed in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub preloaded: bool,
}

impl CatalogItem {
    pub fn new(id: impl Into<String>, preloaded: bool) -> Self {
        Self {
            id: id.into(),
            name: None,
            preloaded,
        }
    }
}

/// Source of the static catalog.
pub trait CatalogSource: Send + Sync {
    /// Load the complete catalog, in catalog order.
    fn fetch(&self) -> impl Future<Output = Result<Vec<CatalogItem>>> + Send;
}

/// Parse a catalog payload, rejecting duplicate ids
pub fn parse_catalog(bytes: &[u8]) -> Result<Vec<CatalogItem>> {
    let items: Vec<CatalogItem> = serde_json::from_slice(bytes)
        .map_err(|e| Error::Fetch(format!("Malformed catalog payload: {}", e)))?;

    let mut seen = HashSet::new();
    for item in &items {
        if !seen.insert(item.id.as_str()) {
            return Err(Error::Fetch(format!("Duplicate layout id in catalog: {}", item.id)));
        }
    }

    Ok(items)
}

/// Catalog stored in a local JSON file
#[derive(Debug, Clone)]
pub struct FileCatalog {
    path: PathBuf,
}

impl FileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CatalogSource for FileCatalog {
    async fn fetch(&self) -> Result<Vec<CatalogItem>> {
        debug!("Reading catalog from {}", self.path.display());

        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            Error::Fetch(format!("Failed to read {}: {}", self.path.display(), e))
        })?;

        let items = parse_catalog(&bytes)?;
        info!("Loaded {} catalog entries from {}", items.len(), self.path.display());
        Ok(items)
    }
}

/// Catalog fetched over HTTP with retry support
pub struct RemoteCatalog {
    client: Client,
    url: String,
    max_retries: u32,
}

impl RemoteCatalog {
    /// Create a new remote catalog client for `url`
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::InitError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
            max_retries: MAX_RETRIES,
        })
    }
}

impl CatalogSource for RemoteCatalog {
    async fn fetch(&self) -> Result<Vec<CatalogItem>> {
        info!("Fetching catalog from {}", self.url);

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.get(&self.url).send().await {
                Ok(response) => {
                    if !response.status().is_success() {
                        return Err(Error::Fetch(format!(
                            "HTTP {} from {}",
                            response.status(),
                            self.url
                        )));
                    }

                    let bytes = response
                        .bytes()
                        .await
                        .map_err(|e| Error::Fetch(format!("Failed to read catalog body: {}", e)))?;

                    let items = parse_catalog(&bytes)?;
                    info!("Fetched {} catalog entries", items.len());
                    return Ok(items);
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::Fetch(format!(
                            "Failed to fetch catalog after {} attempts: {}",
                            attempt, e
                        )));
                    }
                    warn!("Catalog fetch attempt {} failed: {}, retrying...", attempt, e);
                    tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64)).await;
                }
            }
        }
    }
}

/// Where the catalog lives, chosen from a single CLI/config string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogLocation {
    File(PathBuf),
    Remote(String),
}

impl CatalogLocation {
    /// `http://` and `https://` select the remote loader, anything else is a path
    pub fn parse(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            CatalogLocation::Remote(location.to_string())
        } else {
            CatalogLocation::File(PathBuf::from(location))
        }
    }
}

impl std::fmt::Display for CatalogLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogLocation::File(path) => write!(f, "{}", path.display()),
            CatalogLocation::Remote(url) => write!(f, "{}", url),
        }
    }
}

impl CatalogSource for CatalogLocation {
    async fn fetch(&self) -> Result<Vec<CatalogItem>> {
        match self {
            CatalogLocation::File(path) => FileCatalog::new(path.clone()).fetch().await,
            CatalogLocation::Remote(url) => RemoteCatalog::new(url.clone())?.fetch().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::NamedTempFile;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    const CATALOG_BODY: &str = r#"[
        {"id": "en", "name": "English", "preloaded": true},
        {"id": "de", "preloaded": false}
    ]"#;

    async fn read_request(socket: &mut TcpStream) {
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => request.extend_from_slice(&buf[..n]),
            }
        }
    }

    /// Serve a single canned HTTP response on a local port, returning its URL
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });

        format!("http://{}/layouts.json", addr)
    }

    #[test]
    fn test_parse_catalog() {
        let items = parse_catalog(
            br#"[
                {"id": "fr", "name": "French", "preloaded": true},
                {"id": "de", "preloaded": false, "dictFilePath": "de.dict"}
            ]"#,
        )
        .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "fr");
        assert_eq!(items[0].name.as_deref(), Some("French"));
        assert!(items[0].preloaded);
        assert_eq!(items[1], CatalogItem::new("de", false));
    }

    #[test]
    fn test_parse_catalog_rejects_malformed_payload() {
        assert!(matches!(parse_catalog(b"{}"), Err(Error::Fetch(_))));
        assert!(matches!(parse_catalog(b"null"), Err(Error::Fetch(_))));
        assert!(matches!(
            parse_catalog(br#"[{"id": "fr"}]"#),
            Err(Error::Fetch(_))
        ));
    }

    #[test]
    fn test_parse_catalog_rejects_duplicate_ids() {
        let result = parse_catalog(
            br#"[{"id": "fr", "preloaded": true}, {"id": "fr", "preloaded": false}]"#,
        );
        assert!(matches!(result, Err(Error::Fetch(_))));
    }

    #[test]
    fn test_catalog_location_parse() {
        assert_eq!(
            CatalogLocation::parse("https://example.com/layouts.json"),
            CatalogLocation::Remote("https://example.com/layouts.json".to_string())
        );
        assert_eq!(
            CatalogLocation::parse("./js/settings/layouts.json"),
            CatalogLocation::File(PathBuf::from("./js/settings/layouts.json"))
        );
    }

    #[tokio::test]
    async fn test_file_catalog_fetch() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"[{"id": "en", "preloaded": true}]"#).unwrap();

        let catalog = FileCatalog::new(file.path());
        let items = catalog.fetch().await.unwrap();
        assert_eq!(items, vec![CatalogItem::new("en", true)]);
    }

    #[tokio::test]
    async fn test_file_catalog_missing_file() {
        let catalog = CatalogLocation::parse("/nonexistent/layouts.json");
        let result = catalog.fetch().await;
        assert!(matches!(result, Err(Error::Fetch(_))));
    }

    #[tokio::test]
    async fn test_remote_catalog_fetch() {
        let url = serve_once("200 OK", CATALOG_BODY).await;

        let items = RemoteCatalog::new(url).unwrap().fetch().await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name.as_deref(), Some("English"));
        assert_eq!(items[1], CatalogItem::new("de", false));
    }

    #[tokio::test]
    async fn test_remote_catalog_error_status() {
        let url = serve_once("500 Internal Server Error", "oops").await;

        let result = RemoteCatalog::new(url).unwrap().fetch().await;
        assert!(matches!(result, Err(Error::Fetch(ref msg)) if msg.contains("500")));
    }

    #[tokio::test]
    async fn test_remote_catalog_malformed_body() {
        let url = serve_once("200 OK", "{}").await;

        let result = RemoteCatalog::new(url).unwrap().fetch().await;
        assert!(matches!(result, Err(Error::Fetch(_))));
    }

    #[tokio::test]
    async fn test_remote_catalog_retries_transport_errors() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/layouts.json", listener.local_addr().unwrap());
        let attempts = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&attempts);
        tokio::spawn(async move {
            // Hang up on every request before answering
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                read_request(&mut socket).await;
                drop(socket);
            }
        });

        let mut catalog = RemoteCatalog::new(url).unwrap();
        catalog.max_retries = 2;

        let result = catalog.fetch().await;
        assert!(matches!(result, Err(Error::Fetch(ref msg)) if msg.contains("after 2 attempts")));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_catalog_location_fetches_remote() {
        let url = serve_once("200 OK", CATALOG_BODY).await;

        let location = CatalogLocation::parse(&url);
        assert!(matches!(location, CatalogLocation::Remote(_)));

        let items = location.fetch().await.unwrap();
        let ids: Vec<&str> = items.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, ["en", "de"]);
    }
}
