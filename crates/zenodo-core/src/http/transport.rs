//! Network seam
//!
//! The request core never talks to reqwest directly; it hands an
//! [`OutgoingRequest`] to a [`Transport`] and gets an [`HttpResponse`] back.
//! Production code uses [`ReqwestTransport`], tests plug in their own.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client as ReqwestClient, StatusCode};
use serde::de::DeserializeOwned;

use crate::http::builder::{OutgoingRequest, RequestBody};
use crate::{Error, Result};

/// Something that can put one request on the wire
///
/// Only [`Error::Network`] is retried by the core. Any other error, including
/// [`Error::Rejected`] for a request that could not be built (a bad multipart
/// MIME type, say), is returned to the caller untouched on the first attempt.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: OutgoingRequest) -> Result<HttpResponse>;
}

enum ResponseBody {
    Streaming(reqwest::Response),
    Buffered(Vec<u8>),
}

/// Response returned by a transport
pub struct HttpResponse {
    status: StatusCode,
    headers: HeaderMap,
    url: String,
    body: ResponseBody,
}

impl HttpResponse {
    /// Wrap a live reqwest response; the body is read lazily
    pub fn from_reqwest(response: reqwest::Response) -> Self {
        Self {
            status: response.status(),
            headers: response.headers().clone(),
            url: response.url().to_string(),
            body: ResponseBody::Streaming(response),
        }
    }

    /// Response with an in-memory body
    pub fn buffered(status: StatusCode, headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers,
            url: String::new(),
            body: ResponseBody::Buffered(body.into()),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Read the whole body
    pub async fn bytes(self) -> Result<Vec<u8>> {
        let status_code = Some(self.status.as_u16());
        match self.body {
            ResponseBody::Buffered(bytes) => Ok(bytes),
            ResponseBody::Streaming(response) => response
                .bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|e| Error::ResponseBody {
                    message: e.to_string(),
                    status_code,
                    source: Some(anyhow::anyhow!(e)),
                }),
        }
    }

    /// Read the body as UTF-8 text (lossy)
    pub async fn text(self) -> Result<String> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read and deserialize the body
    ///
    /// A body that does not match `T` is a schema validation error.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T> {
        let bytes = self.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| Error::SchemaValidation {
            message: format!(
                "unexpected response shape for {}: {}",
                std::any::type_name::<T>(),
                e
            ),
            source: Some(anyhow::anyhow!(e)),
        })
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Transport backed by a shared reqwest client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: ReqwestClient,
}

impl ReqwestTransport {
    /// Create a transport with the given overall request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(anyhow::anyhow!(e)),
            })?;
        Ok(Self { client })
    }

    pub fn from_client(client: ReqwestClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: OutgoingRequest) -> Result<HttpResponse> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);

        builder = match request.body {
            Some(RequestBody::Text(text)) => builder.body(text),
            Some(RequestBody::Bytes(bytes)) => builder.body(bytes),
            Some(RequestBody::Multipart(form)) => builder.multipart(form.to_reqwest()?),
            None => builder,
        };

        let response = builder.send().await.map_err(classify_reqwest_error)?;
        Ok(HttpResponse::from_reqwest(response))
    }
}

fn classify_reqwest_error(error: reqwest::Error) -> Error {
    if error.is_builder() {
        Error::Rejected(Box::new(error))
    } else {
        Error::Network(Box::new(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Payload {
        success: bool,
    }

    #[tokio::test]
    async fn test_buffered_json() {
        let response = HttpResponse::buffered(StatusCode::OK, HeaderMap::new(), r#"{"success": true}"#);
        let payload: Payload = response.json().await.unwrap();
        assert!(payload.success);
    }

    #[tokio::test]
    async fn test_shape_mismatch_is_schema_error() {
        let response = HttpResponse::buffered(StatusCode::OK, HeaderMap::new(), r#"{"other": 1}"#);
        let result = response.json::<Payload>().await;
        assert!(matches!(result, Err(Error::SchemaValidation { .. })));
    }

    #[tokio::test]
    async fn test_text_is_lossy() {
        let response = HttpResponse::buffered(StatusCode::OK, HeaderMap::new(), vec![b'h', b'i', 0xff]);
        assert_eq!(response.text().await.unwrap(), "hi\u{fffd}");
    }

    #[test]
    fn test_transport_construction() {
        assert!(ReqwestTransport::new(Duration::from_secs(5)).is_ok());
    }
}
