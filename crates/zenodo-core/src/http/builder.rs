//! HTTP request description and construction
//!
//! A [`RequestSpec`] describes one logical call (route, method, body,
//! expected status). The request core turns it into an [`OutgoingRequest`]
//! for every attempt.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, Url};

use crate::http::auth::AccessToken;
use crate::{Error, Result};

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const OCTET_STREAM_CONTENT_TYPE: &str = "application/octet-stream";

/// Route used when a spec does not name one
pub const DEFAULT_ROUTE: &str = "deposit/depositions";

/// One named binary part of a multipart form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Multipart form, shared between attempts without copying
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    parts: Vec<FilePart>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a file part
    pub fn file(
        mut self,
        field: impl Into<String>,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        self.parts.push(FilePart {
            field: field.into(),
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            data,
        });
        self
    }

    pub fn parts(&self) -> &[FilePart] {
        &self.parts
    }

    /// Build a fresh reqwest form; called once per attempt
    pub fn to_reqwest(&self) -> Result<reqwest::multipart::Form> {
        let mut form = reqwest::multipart::Form::new();
        for part in &self.parts {
            let reqwest_part = reqwest::multipart::Part::bytes(part.data.clone())
                .file_name(part.file_name.clone())
                .mime_str(&part.mime_type)
                .map_err(|e| Error::Rejected(Box::new(e)))?;
            form = form.part(part.field.clone(), reqwest_part);
        }
        Ok(form)
    }
}

/// Request payload
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// Textual payload, JSON unless told otherwise
    Text(String),
    /// Raw binary payload
    Bytes(Vec<u8>),
    /// Multipart form; the HTTP layer sets its own boundary header
    Multipart(Arc<MultipartForm>),
}

impl RequestBody {
    /// Serialize a value as a JSON text body
    pub fn json<T: serde::Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(RequestBody::Text(serde_json::to_string(value)?))
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self, RequestBody::Multipart(_))
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        RequestBody::Text(text)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(data: Vec<u8>) -> Self {
        RequestBody::Bytes(data)
    }
}

impl From<MultipartForm> for RequestBody {
    fn from(form: MultipartForm) -> Self {
        RequestBody::Multipart(Arc::new(form))
    }
}

impl From<Arc<MultipartForm>> for RequestBody {
    fn from(form: Arc<MultipartForm>) -> Self {
        RequestBody::Multipart(form)
    }
}

/// Description of one logical API call
#[derive(Debug, Clone)]
pub struct RequestSpec {
    /// Path relative to the API base URL, or an absolute URL
    pub route: String,
    pub method: Method,
    pub body: Option<RequestBody>,
    /// Explicit content type; inferred from the body when absent
    pub content_type: Option<String>,
    /// Query parameters, sent in insertion order
    pub search_params: Vec<(String, String)>,
    pub expected_status: u16,
}

impl Default for RequestSpec {
    fn default() -> Self {
        Self {
            route: DEFAULT_ROUTE.to_string(),
            method: Method::GET,
            body: None,
            content_type: None,
            search_params: Vec::new(),
            expected_status: 200,
        }
    }
}

impl RequestSpec {
    pub fn new(method: Method, route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            method,
            ..Default::default()
        }
    }

    pub fn get(route: impl Into<String>) -> Self {
        Self::new(Method::GET, route)
    }

    pub fn post(route: impl Into<String>) -> Self {
        Self::new(Method::POST, route)
    }

    pub fn put(route: impl Into<String>) -> Self {
        Self::new(Method::PUT, route)
    }

    pub fn delete(route: impl Into<String>) -> Self {
        Self::new(Method::DELETE, route)
    }

    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the JSON body
    pub fn json_body<T: serde::Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        self.body = Some(RequestBody::json(value)?);
        Ok(self)
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.search_params.push((key.into(), value.into()));
        self
    }

    pub fn expect_status(mut self, status: u16) -> Self {
        self.expected_status = status;
        self
    }

    /// Content type header value for this request, if any
    ///
    /// Multipart bodies never get one so the HTTP layer can add its boundary.
    pub fn effective_content_type(&self) -> Option<String> {
        if let Some(explicit) = &self.content_type {
            return Some(explicit.clone());
        }
        match &self.body {
            Some(RequestBody::Multipart(_)) => None,
            Some(RequestBody::Bytes(_)) => Some(OCTET_STREAM_CONTENT_TYPE.to_string()),
            Some(RequestBody::Text(_)) | None => Some(JSON_CONTENT_TYPE.to_string()),
        }
    }

    /// Full URL: base + route + encoded query string
    pub fn build_url(&self, base_url: &str) -> Result<Url> {
        let mut url = if is_absolute(&self.route) {
            parse_url(&self.route)?
        } else {
            let base = if base_url.ends_with('/') {
                base_url.to_string()
            } else {
                format!("{}/", base_url)
            };
            parse_url(&format!("{}{}", base, self.route.trim_start_matches('/')))?
        };

        if !self.search_params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.search_params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Headers for one attempt
    pub fn build_headers(&self, token: Option<&AccessToken>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            token.apply(&mut headers)?;
        }
        if let Some(content_type) = self.effective_content_type() {
            let value = HeaderValue::from_str(&content_type).map_err(|e| Error::Configuration {
                message: format!("Invalid content type: {}", content_type),
                source: Some(anyhow::anyhow!(e)),
            })?;
            headers.insert(CONTENT_TYPE, value);
        }
        Ok(headers)
    }

    /// Assemble the request handed to the transport
    pub fn build_request(&self, base_url: &str, token: Option<&AccessToken>) -> Result<OutgoingRequest> {
        Ok(OutgoingRequest {
            method: self.method.clone(),
            url: self.build_url(base_url)?,
            headers: self.build_headers(token)?,
            body: self.body.clone(),
        })
    }
}

/// A single attempt, ready for the transport
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
}

fn is_absolute(route: &str) -> bool {
    route.starts_with("http://") || route.starts_with("https://")
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| Error::Configuration {
        message: format!("Invalid request URL: {}", raw),
        source: Some(anyhow::anyhow!(e)),
    })
}
