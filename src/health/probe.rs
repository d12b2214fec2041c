// ABOUTME: Application readiness probe: an HTTP GET returning a JSON list.
// ABOUTME: The list's length tells how much of the fleet's capability set has registered.

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::Uri;
use hyper_util::rt::TokioIo;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("invalid probe url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("connection to {address} failed: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("http error: {0}")]
    Http(#[from] hyper::Error),

    #[error("request could not be built: {0}")]
    Request(String),

    #[error("probe returned status {0}")]
    Status(u16),

    #[error("probe response is not a JSON list: {0}")]
    Body(#[from] serde_json::Error),

    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    /// Number of entries the probe currently reports.
    async fn count(&self, url: &str) -> Result<usize, ProbeError>;
}

/// Probe over plain HTTP/1.1.
#[derive(Debug, Clone)]
pub struct HttpReadinessProbe {
    request_timeout: Duration,
}

impl Default for HttpReadinessProbe {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl HttpReadinessProbe {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }

    async fn fetch(&self, uri: &Uri, address: &str) -> Result<Bytes, ProbeError> {
        let stream = tokio::net::TcpStream::connect(address)
            .await
            .map_err(|source| ProbeError::Connect {
                address: address.to_string(),
                source,
            })?;
        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(error = %e, "readiness probe connection closed with error");
            }
        });

        let path = uri.path_and_query().map_or("/", |p| p.as_str());
        let request = hyper::Request::builder()
            .method("GET")
            .uri(path)
            .header(hyper::header::HOST, address)
            .header(hyper::header::ACCEPT, "application/json")
            .header(hyper::header::USER_AGENT, "fleetswap")
            .body(Empty::<Bytes>::new())
            .map_err(|e| ProbeError::Request(e.to_string()))?;

        let response = sender.send_request(request).await?;
        if !response.status().is_success() {
            return Err(ProbeError::Status(response.status().as_u16()));
        }
        Ok(response.into_body().collect().await?.to_bytes())
    }
}

#[async_trait]
impl ReadinessProbe for HttpReadinessProbe {
    async fn count(&self, url: &str) -> Result<usize, ProbeError> {
        let (uri, address) = parse_url(url)?;
        let body = tokio::time::timeout(self.request_timeout, self.fetch(&uri, &address))
            .await
            .map_err(|_| ProbeError::Timeout(self.request_timeout))??;
        let entries: Vec<serde_json::Value> = serde_json::from_slice(&body)?;
        tracing::debug!(url, count = entries.len(), "readiness probe answered");
        Ok(entries.len())
    }
}

/// Split a probe url into the request uri and a `host:port` to dial.
fn parse_url(url: &str) -> Result<(Uri, String), ProbeError> {
    let invalid = |reason: &str| ProbeError::InvalidUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    };
    let uri: Uri = url.parse().map_err(|_| invalid("not a valid URI"))?;
    match uri.scheme_str() {
        Some("http") => {}
        Some(_) => return Err(invalid("only http is supported")),
        None => return Err(invalid("missing scheme")),
    }
    let host = uri.host().ok_or_else(|| invalid("missing host"))?;
    let port = uri.port_u16().unwrap_or(80);
    let address = format!("{host}:{port}");
    Ok((uri, address))
}
