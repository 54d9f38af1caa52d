//! Google Books volume lookup.

use std::future::Future;
use std::time::Duration;

use isbnscan_core::{truncate_description, BookMetadata, Identifier, UNKNOWN};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Public volumes endpoint.
pub const GOOGLE_BOOKS_ENDPOINT: &str = "https://www.googleapis.com/books/v1/volumes";

/// Outcome of a single catalog lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(BookMetadata),
    NotFound,
}

/// A source of bibliographic metadata keyed by identifier.
///
/// Implementations absorb their own failures: anything that goes wrong is
/// logged and reported as [`Lookup::NotFound`].
pub trait MetadataSource: Send + Sync {
    fn fetch(&self, identifier: &Identifier) -> impl Future<Output = Lookup> + Send;
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Unexpected HTTP status {0}")]
    Status(u16),
    #[error("Malformed catalog response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct GoogleBooksConfig {
    pub endpoint: String,
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for GoogleBooksConfig {
    fn default() -> Self {
        Self {
            endpoint: GOOGLE_BOOKS_ENDPOINT.to_string(),
            user_agent: concat!("isbnscan/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

// ── Response shape ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumesResponse {
    #[serde(default)]
    total_items: u64,
    #[serde(default)]
    items: Vec<Volume>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Volume {
    #[serde(default)]
    volume_info: VolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeInfo {
    title: Option<String>,
    authors: Option<Vec<String>>,
    publisher: Option<String>,
    published_date: Option<String>,
    description: Option<String>,
    page_count: Option<u32>,
    language: Option<String>,
}

impl From<VolumeInfo> for BookMetadata {
    fn from(info: VolumeInfo) -> Self {
        let or_unknown = |v: Option<String>| v.unwrap_or_else(|| UNKNOWN.to_string());
        BookMetadata {
            title: or_unknown(info.title),
            authors: info
                .authors
                .filter(|a| !a.is_empty())
                .unwrap_or_else(|| vec![UNKNOWN.to_string()]),
            publisher: or_unknown(info.publisher),
            published_date: or_unknown(info.published_date),
            description: info.description.as_deref().map(truncate_description).unwrap_or_default(),
            page_count: info.page_count,
            language: or_unknown(info.language),
        }
    }
}

/// Parse a volumes search response. `Ok(None)` when the catalog has no match.
pub fn parse_volumes(body: &str) -> Result<Option<BookMetadata>, FetchError> {
    let response: VolumesResponse = serde_json::from_str(body)?;
    if response.total_items == 0 {
        return Ok(None);
    }
    Ok(response.items.into_iter().next().map(|v| v.volume_info.into()))
}

// ── Client ────────────────────────────────────────────────────────────────────

/// Holds one pooled HTTP client for the life of a run.
pub struct GoogleBooksClient {
    client: reqwest::Client,
    endpoint: String,
}

impl GoogleBooksClient {
    pub fn new(config: GoogleBooksConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent)
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, endpoint: config.endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// One GET against the volumes endpoint, errors surfaced.
    pub async fn lookup(&self, identifier: &Identifier) -> Result<Option<BookMetadata>, FetchError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", format!("isbn:{identifier}"))])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        parse_volumes(&body)
    }
}

impl MetadataSource for GoogleBooksClient {
    async fn fetch(&self, identifier: &Identifier) -> Lookup {
        match self.lookup(identifier).await {
            Ok(Some(metadata)) => {
                info!(isbn = %identifier, title = %metadata.title, "Retrieved book information");
                Lookup::Found(metadata)
            }
            Ok(None) => {
                warn!(isbn = %identifier, "No catalog entry found");
                Lookup::NotFound
            }
            Err(e) => {
                warn!(isbn = %identifier, "Catalog lookup failed: {e}");
                debug!(isbn = %identifier, endpoint = %self.endpoint, "Lookup failure detail: {e:?}");
                Lookup::NotFound
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const FULL: &str = r#"{
        "kind": "books#volumes",
        "totalItems": 1,
        "items": [{
            "volumeInfo": {
                "title": "JavaScript: The Good Parts",
                "authors": ["Douglas Crockford"],
                "publisher": "O'Reilly Media",
                "publishedDate": "2008-05-08",
                "description": "A short book.",
                "pageCount": 172,
                "language": "en"
            }
        }]
    }"#;

    fn id(s: &str) -> Identifier {
        Identifier::parse(s).unwrap()
    }

    /// Serve one canned HTTP response and hand back the raw request.
    async fn serve_once(status: &str, body: &str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).into_owned()
        });
        (format!("http://{addr}/books/v1/volumes"), handle)
    }

    fn client(endpoint: String) -> GoogleBooksClient {
        GoogleBooksClient::new(GoogleBooksConfig {
            endpoint,
            user_agent: "isbnscan-tests/1.0".into(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn parses_first_volume() {
        let m = parse_volumes(FULL).unwrap().unwrap();
        assert_eq!(m.title, "JavaScript: The Good Parts");
        assert_eq!(m.authors, vec!["Douglas Crockford"]);
        assert_eq!(m.published_date, "2008-05-08");
        assert_eq!(m.page_count, Some(172));
        assert_eq!(m.language, "en");
    }

    #[test]
    fn missing_fields_default_to_unknown() {
        let m = parse_volumes(r#"{"totalItems": 1, "items": [{"volumeInfo": {"title": "Bare"}}]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(m.title, "Bare");
        assert_eq!(m.authors, vec![UNKNOWN]);
        assert_eq!(m.publisher, UNKNOWN);
        assert_eq!(m.description, "");
        assert_eq!(m.page_count, None);
    }

    #[test]
    fn zero_total_items_is_no_match() {
        assert_eq!(parse_volumes(r#"{"kind": "books#volumes", "totalItems": 0}"#).unwrap(), None);
    }

    #[test]
    fn long_description_is_truncated() {
        let body = serde_json::json!({
            "totalItems": 1,
            "items": [{"volumeInfo": {"description": "d".repeat(800)}}]
        })
        .to_string();
        let m = parse_volumes(&body).unwrap().unwrap();
        assert_eq!(m.description.chars().count(), 503);
        assert!(m.description.ends_with("..."));
    }

    #[test]
    fn malformed_json_is_decode_error() {
        assert!(matches!(parse_volumes("<html>").unwrap_err(), FetchError::Decode(_)));
    }

    #[tokio::test]
    async fn fetch_sends_query_and_user_agent() {
        let (endpoint, server) = serve_once("200 OK", FULL).await;
        let lookup = client(endpoint).fetch(&id("9780596520687")).await;
        let request = server.await.unwrap();

        assert!(request.starts_with("GET /books/v1/volumes?q=isbn"));
        assert!(request.contains("9780596520687"));
        assert!(request.to_ascii_lowercase().contains("user-agent: isbnscan-tests/1.0"));
        match lookup {
            Lookup::Found(m) => assert_eq!(m.publisher, "O'Reilly Media"),
            Lookup::NotFound => panic!("expected a match"),
        }
    }

    #[tokio::test]
    async fn http_error_status_is_not_found() {
        let (endpoint, server) = serve_once("503 Service Unavailable", "{}").await;
        let c = client(endpoint);
        let err = c.lookup(&id("0596007973")).await.unwrap_err();
        assert!(matches!(err, FetchError::Status(503)));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_not_found() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let lookup = client(format!("http://{addr}/volumes")).fetch(&id("0596007973")).await;
        assert_eq!(lookup, Lookup::NotFound);
    }

    #[test]
    fn default_config_points_at_google() {
        let c = GoogleBooksConfig::default();
        assert_eq!(c.endpoint, GOOGLE_BOOKS_ENDPOINT);
        assert!(c.user_agent.starts_with("isbnscan/"));
        assert_eq!(c.timeout, Duration::from_secs(30));
    }
}
