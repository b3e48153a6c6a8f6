// HTTP transport seam. The fetcher and logo extractor only see `HttpTransport`,
// so tests run against in-memory routes and production runs on reqwest.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::config::ResolverConfig;

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// True when the server says this is an image, or says nothing useful.
    pub fn looks_like_image(&self) -> bool {
        match self.content_type.as_deref().map(str::to_lowercase) {
            Some(ct) => ct.starts_with("image/") || ct.starts_with("application/octet-stream"),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("response body too large ({0} bytes)")]
    TooLarge(usize),
}

impl TransportError {
    /// Timeouts and dropped connections are worth one more attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Timeout | TransportError::Connect(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let msg = err.to_string();
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() || msg.to_lowercase().contains("connection reset") {
            TransportError::Connect(msg)
        } else {
            TransportError::Request(msg)
        }
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError>;
}

/// reqwest-backed transport with a per-request timeout and a body size cap.
pub struct ReqwestTransport {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl ReqwestTransport {
    pub fn new(config: &ResolverConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self {
            client,
            max_body_bytes: config.max_content_bytes,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError> {
        let resp = self.client.get(url).send().await?;

        if let Some(len) = resp.content_length() {
            if len as usize > self.max_body_bytes {
                return Err(TransportError::TooLarge(len as usize));
            }
        }

        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.bytes().await?;
        if body.len() > self.max_body_bytes {
            return Err(TransportError::TooLarge(body.len()));
        }

        debug!(url, status, bytes = body.len(), "GET complete");
        Ok(TransportResponse {
            status,
            content_type,
            body: body.to_vec(),
        })
    }
}
