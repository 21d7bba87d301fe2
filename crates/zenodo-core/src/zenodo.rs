//! Zenodo client
//!
//! [`Zenodo`] owns the connection settings, the credential, the
//! authentication state and the logger. It is cheap to clone; clones share
//! all of it, including the authentication state. Two clients built
//! separately never share state.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ClientConfig;
use crate::http::auth::{AccessToken, AuthStateCell, AuthenticationState};
use crate::http::builder::RequestSpec;
use crate::http::client::{execute, Session};
use crate::http::retry::RetryPolicy;
use crate::http::transport::{HttpResponse, ReqwestTransport, Transport};
use crate::logging::{Logger, TracingLogger};
use crate::types::ZenodoFile;
use crate::{Error, Result};

struct ZenodoInner {
    host: String,
    base_url: String,
    access_token: AccessToken,
    retry_policy: RetryPolicy,
    auth_state: AuthStateCell,
    logger: Option<Arc<dyn Logger>>,
    transport: Arc<dyn Transport>,
}

/// Client for the Zenodo deposit and records API
#[derive(Clone)]
pub struct Zenodo {
    inner: Arc<ZenodoInner>,
}

impl Zenodo {
    /// Build a client from a validated configuration
    pub fn new(config: ClientConfig) -> Result<Self> {
        ZenodoBuilder::new(config).build()
    }

    /// Build a client from `ZENODO_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn builder(config: ClientConfig) -> ZenodoBuilder {
        ZenodoBuilder::new(config)
    }

    pub fn host(&self) -> &str {
        &self.inner.host
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.inner.retry_policy
    }

    /// Run one call through the request core with the client's retry policy
    pub async fn request(&self, spec: RequestSpec) -> Result<HttpResponse> {
        execute(self, &spec, &self.inner.retry_policy).await
    }

    /// Same as [`request`](Self::request) with an explicit policy
    pub async fn request_with_policy(
        &self,
        spec: RequestSpec,
        policy: &RetryPolicy,
    ) -> Result<HttpResponse> {
        execute(self, &spec, policy).await
    }

    pub(crate) fn log_info(&self, message: &str) {
        if let Some(logger) = &self.inner.logger {
            logger.info(message);
        }
    }

    pub(crate) fn log_warn(&self, message: &str) {
        if let Some(logger) = &self.inner.logger {
            logger.warn(message);
        }
    }

    /// Download the content of a file
    pub async fn download_file(&self, file: &ZenodoFile) -> Result<Vec<u8>> {
        let link = file.download_link().ok_or_else(|| Error::SchemaValidation {
            message: format!(
                "file {} has neither a download nor a content link",
                file.name().unwrap_or("<unnamed>")
            ),
            source: None,
        })?;
        let response = self.request(RequestSpec::get(link)).await?;
        let data = response.bytes().await?;
        self.log_info(&format!(
            "Downloaded {} ({} bytes)",
            file.name().unwrap_or(link),
            data.len()
        ));
        Ok(data)
    }
}

impl std::fmt::Debug for Zenodo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Zenodo")
            .field("host", &self.inner.host)
            .field("base_url", &self.inner.base_url)
            .field("authentication_state", &self.inner.auth_state.get())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Session for Zenodo {
    fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    fn access_token(&self) -> Option<&AccessToken> {
        Some(&self.inner.access_token)
    }

    fn authentication_state(&self) -> AuthenticationState {
        self.inner.auth_state.get()
    }

    /// GET the API root directly through the transport
    ///
    /// Never fails: a transport fault counts as a failed verification.
    async fn verify_authentication(&self) -> Result<bool> {
        let spec = RequestSpec::get("");
        let request = spec.build_request(&self.inner.base_url, Some(&self.inner.access_token))?;

        let verified = match self.inner.transport.send(request).await {
            Ok(response) => response.status().as_u16() == 200,
            Err(e) => {
                tracing::debug!(target: crate::logging::LOG_TARGET, error = %e, "authentication check failed");
                false
            }
        };

        self.inner.auth_state.record_verification(verified);
        if verified {
            self.log_info("Authentication verified");
        } else {
            self.log_warn("Authentication failed");
        }
        Ok(verified)
    }

    fn logger(&self) -> Option<&dyn Logger> {
        self.inner.logger.as_deref()
    }

    fn transport(&self) -> &dyn Transport {
        self.inner.transport.as_ref()
    }
}

/// Builder for [`Zenodo`]
pub struct ZenodoBuilder {
    config: ClientConfig,
    logger: Option<Arc<dyn Logger>>,
    transport: Option<Arc<dyn Transport>>,
}

impl ZenodoBuilder {
    /// Start from a configuration; the logger defaults to [`TracingLogger`]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            logger: Some(Arc::new(TracingLogger)),
            transport: None,
        }
    }

    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Report nothing
    pub fn without_logger(mut self) -> Self {
        self.logger = None;
        self
    }

    /// Replace the reqwest transport
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.config.retry_policy = retry_policy;
        self
    }

    pub fn build(self) -> Result<Zenodo> {
        self.config.validate()?;
        let access_token = AccessToken::new(self.config.access_token.clone())?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(self.config.timeout())?),
        };

        Ok(Zenodo {
            inner: Arc::new(ZenodoInner {
                host: self.config.host.clone(),
                base_url: self.config.resolved_base_url(),
                access_token,
                retry_policy: self.config.retry_policy,
                auth_state: AuthStateCell::new(),
                logger: self.logger,
                transport,
            }),
        })
    }
}
