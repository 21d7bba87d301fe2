//! Client configuration
//!
//! Configuration comes from, in increasing precedence:
//! - Default values
//! - A `.env` file and environment variables ([`ClientConfig::from_env`])
//! - Builder-style setters

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::http::retry::RetryPolicy;
use crate::{Error, Result};

/// Host used when none is configured
pub const DEFAULT_HOST: &str = "sandbox.zenodo.org";

/// Overall per-request timeout used when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const ENV_ACCESS_TOKEN: &str = "ZENODO_ACCESS_TOKEN";
pub const ENV_HOST: &str = "ZENODO_HOST";
pub const ENV_BASE_URL: &str = "ZENODO_BASE_URL";
pub const ENV_TIMEOUT_SECS: &str = "ZENODO_TIMEOUT_SECS";
pub const ENV_MAX_RETRIES: &str = "ZENODO_MAX_RETRIES";
pub const ENV_BASE_DELAY_MS: &str = "ZENODO_BASE_DELAY_MS";

/// Main client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Personal access token sent as a Bearer credential
    pub access_token: String,

    /// API host, `sandbox.zenodo.org` or `zenodo.org`
    pub host: String,

    /// Full API root override; wins over `host`
    pub base_url: Option<String>,

    /// Timeout in milliseconds
    pub timeout_ms: u64,

    /// Retry policy applied to every call
    pub retry_policy: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            host: DEFAULT_HOST.to_string(),
            base_url: None,
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            ..Default::default()
        }
    }

    /// Load from the process environment, reading `.env` first if present
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(token) = lookup(ENV_ACCESS_TOKEN) {
            config.access_token = token;
        }
        if let Some(host) = lookup(ENV_HOST) {
            config.host = host;
        }
        if let Some(base_url) = lookup(ENV_BASE_URL) {
            config.base_url = Some(base_url);
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = parse_number(ENV_TIMEOUT_SECS, &raw)?;
            config.timeout_ms = secs.saturating_mul(1000);
        }
        if let Some(raw) = lookup(ENV_MAX_RETRIES) {
            config.retry_policy.max_retries = parse_number(ENV_MAX_RETRIES, &raw)?;
        }
        if let Some(raw) = lookup(ENV_BASE_DELAY_MS) {
            let millis: u64 = parse_number(ENV_BASE_DELAY_MS, &raw)?;
            config.retry_policy.base_delay = Duration::from_millis(millis);
        }

        Ok(config)
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Point the client at an explicit API root (mirrors, local test servers)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// API root, always ending with `/`
    pub fn resolved_base_url(&self) -> String {
        let raw = match &self.base_url {
            Some(base_url) => base_url.clone(),
            None => format!("https://{}/api/", self.host),
        };
        if raw.ends_with('/') {
            raw
        } else {
            format!("{}/", raw)
        }
    }

    /// Check the configuration before a client is built from it
    pub fn validate(&self) -> Result<()> {
        if self.access_token.trim().is_empty() {
            return Err(Error::configuration("access token is required"));
        }
        if self.timeout_ms == 0 {
            return Err(Error::configuration("timeout must be greater than zero"));
        }
        let base_url = self.resolved_base_url();
        let parsed = Url::parse(&base_url).map_err(|e| Error::Configuration {
            message: format!("Invalid base URL: {}", base_url),
            source: Some(anyhow::anyhow!(e)),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(Error::configuration(format!(
                "Base URL cannot be used as an API root: {}",
                base_url
            )));
        }
        Ok(())
    }
}

fn parse_number<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim().parse::<T>().map_err(|e| Error::Configuration {
        message: format!("{} must be a non-negative integer, got {:?}", name, raw),
        source: Some(anyhow::anyhow!(e)),
    })
}
