//! Aircraft metadata lookup.
//!
//! New aircraft are enriched with a tail number from a translation service
//! answering `GET /icaoTranslate?icao={icao}` with
//! `{"prefix": "N", "number": "12345"}`.
//!
//! A failed lookup never blocks ingestion: the writer logs it and creates
//! the record without a tail number.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::future::Future;
use std::time::Duration;

use http_body_util::{BodyExt, Empty};
use hyper::Request;
use hyper::body::Bytes;
use hyper::client::conn::http1;
use hyper::header::{ACCEPT, HOST};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use tokio::net::TcpStream;

/// Registration data returned by the translation service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AircraftMetadata {
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub number: String,
}

impl AircraftMetadata {
    /// `prefix` followed by `number`, or `None` when no number is known.
    #[must_use]
    pub fn tail_number(&self) -> Option<String> {
        if self.number.is_empty() {
            return None;
        }
        Some(format!("{}{}", self.prefix, self.number))
    }
}

/// Source of aircraft metadata, keyed by ICAO hex address.
pub trait MetadataLookup: Send + Sync + 'static {
    fn lookup(
        &self,
        icao: &str,
    ) -> impl Future<Output = Result<AircraftMetadata, LookupError>> + Send;
}

/// Errors from a metadata lookup.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("lookup request failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),
    #[error("lookup returned status {0}")]
    Status(u16),
    #[error("lookup HTTP exchange failed: {0}")]
    Http(#[from] hyper::Error),
    #[error("invalid lookup request: {0}")]
    Request(#[from] hyper::http::Error),
    #[error("failed to decode lookup response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("no metadata for {0}")]
    Unknown(String),
}

/// Lookup over HTTP/1.1.
#[derive(Debug, Clone)]
pub struct HttpMetadataLookup {
    /// `host:port` of the translation service.
    addr: String,
    timeout: Duration,
}

impl HttpMetadataLookup {
    #[must_use]
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }

    async fn fetch(&self, icao: &str) -> Result<AircraftMetadata, LookupError> {
        let path = format!("/icaoTranslate?icao={}", encode_query_value(icao));
        let response = http_get(&self.addr, &path).await?;
        if response.status != 200 {
            return Err(LookupError::Status(response.status));
        }
        Ok(serde_json::from_slice(&response.body)?)
    }
}

impl MetadataLookup for HttpMetadataLookup {
    async fn lookup(&self, icao: &str) -> Result<AircraftMetadata, LookupError> {
        tokio::time::timeout(self.timeout, self.fetch(icao))
            .await
            .map_err(|_| LookupError::Timeout(self.timeout))?
    }
}

/// Lookup backed by a fixed table.
#[derive(Debug, Clone, Default)]
pub struct StaticLookup {
    entries: HashMap<String, AircraftMetadata>,
}

impl StaticLookup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register metadata for `icao`; matching is case-insensitive.
    #[must_use]
    pub fn with(mut self, icao: &str, prefix: &str, number: &str) -> Self {
        self.entries.insert(
            icao.to_ascii_uppercase(),
            AircraftMetadata {
                prefix: prefix.to_owned(),
                number: number.to_owned(),
            },
        );
        self
    }
}

impl MetadataLookup for StaticLookup {
    async fn lookup(&self, icao: &str) -> Result<AircraftMetadata, LookupError> {
        self.entries
            .get(&icao.to_ascii_uppercase())
            .cloned()
            .ok_or_else(|| LookupError::Unknown(icao.to_owned()))
    }
}

/// Status and body of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Issue `GET path` to `addr` over a fresh HTTP/1 connection and collect
/// the whole response body.
pub(crate) async fn http_get(addr: &str, path: &str) -> Result<HttpResponse, LookupError> {
    let stream = TcpStream::connect(addr).await?;
    let (mut sender, connection) = http1::handshake(TokioIo::new(stream)).await?;

    let request = Request::get(path)
        .header(HOST, addr)
        .header(ACCEPT, "application/json")
        .body(Empty::<Bytes>::new())?;

    // The connection only makes progress while it is polled, and it shuts
    // down once `sender` is dropped at the end of the exchange.
    let exchange = async move {
        let response = sender.send_request(request).await?;
        let status = response.status().as_u16();
        let body = response.into_body().collect().await?.to_bytes();
        Ok::<_, LookupError>(HttpResponse {
            status,
            body: body.to_vec(),
        })
    };
    let (response, connection) = tokio::join!(exchange, connection);
    if let Err(e) = connection {
        tracing::debug!(addr, "lookup connection ended with error: {e}");
    }
    response
}

/// Percent-encode everything outside the unreserved set.
fn encode_query_value(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            encoded.push(char::from(byte));
        } else {
            let _ = write!(encoded, "%{byte:02X}");
        }
    }
    encoded
}
