//! Byte-level transport for the query stream.
//!
//! [`EventTransport`] is the seam between the stream client and the
//! network: it opens one connection and yields raw body chunks. The client
//! owns SSE decoding and folding, so test transports only need to hand back
//! canned bytes.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use reqwest::header::{ACCEPT, AUTHORIZATION, CACHE_CONTROL};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::ApiConfig;
use crate::http::error_detail;

/// Raw response body chunks, in arrival order.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, TransportError>>;

#[derive(Debug, Error)]
pub enum TransportError {
    /// The server answered the stream request with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

/// Where and how to open one stream.
#[derive(Debug, Clone)]
pub struct StreamTarget {
    pub url: Url,
    /// Sent as `Authorization: Bearer <token>` when set.
    pub bearer: Option<String>,
}

/// Opens a single long-lived connection per call.
#[async_trait]
pub trait EventTransport: Send + Sync {
    async fn open(&self, target: StreamTarget) -> Result<ByteStream, TransportError>;
}

/// [`EventTransport`] over HTTP with `reqwest`.
///
/// Only a connect timeout is set: an open stream may stay idle for as long
/// as the server keeps it alive.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &ApiConfig) -> reqwest::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventTransport for HttpTransport {
    async fn open(&self, target: StreamTarget) -> Result<ByteStream, TransportError> {
        let mut request = self
            .client
            .get(target.url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");
        if let Some(token) = &target.bearer {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: error_detail(&body),
            });
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(TransportError::from))
            .boxed())
    }
}
