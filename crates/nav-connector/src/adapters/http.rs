//! HTTP Transport Adapter
//!
//! Implements the `Transport` port with reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use tracing::debug;

use crate::config::ConnectorConfig;
use crate::domain::TransportError;
use crate::ports::outbound::{Transport, TransportResponse};

/// Media type of every request and response.
pub const XML_MEDIA_TYPE: &str = "application/xml";

/// Headers sent with every request.
pub fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(XML_MEDIA_TYPE));
    headers.insert(ACCEPT, HeaderValue::from_static(XML_MEDIA_TYPE));
    headers.insert(HeaderName::from_static("encoding"), HeaderValue::from_static("UTF-8"));
    headers
}

/// HTTPS transport against the configured base URL.
pub struct HttpTransport {
    client: Client,
    config: ConnectorConfig,
}

impl HttpTransport {
    /// Create a transport with the configured timeout and XML headers.
    pub fn new(config: &ConnectorConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.timeout().min(Duration::from_secs(10)))
            .default_headers(default_headers())
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Base URL requests go to.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.config.timeout()
    }
}

fn map_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connection(err.to_string())
    } else {
        TransportError::Request(err.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, endpoint: &str, body: Vec<u8>) -> Result<TransportResponse, TransportError> {
        let url = self.config.endpoint_url(endpoint);
        debug!("[nav] POST {} ({} bytes)", url, body.len());

        let response = self
            .client
            .post(&url)
            .body(body)
            .send()
            .await
            .map_err(map_error)?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(map_error)?;
        debug!("[nav] {} answered {} ({} bytes)", url, status, body.len());

        Ok(TransportResponse {
            status,
            body: body.to_vec(),
        })
    }
}
