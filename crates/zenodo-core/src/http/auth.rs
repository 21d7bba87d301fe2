//! Authentication handling for the Zenodo API
//!
//! Zenodo authenticates with a personal access token sent as a Bearer
//! header. The API is known to answer 401/403 spuriously now and then, so the
//! client remembers whether the token has been verified:
//!
//! - `NotTried`: no verification yet, a 401/403 earns one verification
//! - `Succeeded`: token was good last time we checked, verify again and retry
//! - `Failed`: token is known bad, auth errors are returned immediately

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// What the session currently knows about its credential
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AuthenticationState {
    #[default]
    NotTried = 0,
    Failed = 1,
    Succeeded = 2,
}

impl AuthenticationState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => AuthenticationState::Failed,
            2 => AuthenticationState::Succeeded,
            _ => AuthenticationState::NotTried,
        }
    }

    /// State reached after a verification with the given outcome
    pub fn after_verification(verified: bool) -> Self {
        if verified {
            AuthenticationState::Succeeded
        } else {
            AuthenticationState::Failed
        }
    }
}

impl fmt::Display for AuthenticationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthenticationState::NotTried => write!(f, "not tried"),
            AuthenticationState::Failed => write!(f, "failed"),
            AuthenticationState::Succeeded => write!(f, "succeeded"),
        }
    }
}

/// Shared, per-client authentication state
///
/// Clones share the same cell. Readers tolerate staleness: a concurrent
/// verification may flip the value between a read and the decision based on
/// it, which at worst costs one extra verification.
#[derive(Debug, Clone, Default)]
pub struct AuthStateCell {
    state: Arc<AtomicU8>,
}

impl AuthStateCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> AuthenticationState {
        AuthenticationState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set(&self, state: AuthenticationState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Record the outcome of a verification and return it
    pub fn record_verification(&self, verified: bool) -> bool {
        self.set(AuthenticationState::after_verification(verified));
        verified
    }
}

/// Bearer credential for the Zenodo API
#[derive(Clone)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a token, rejecting empty ones
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(Error::configuration("access token is required"));
        }
        Ok(Self(token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Insert the `Authorization: Bearer` header
    pub fn apply(&self, headers: &mut HeaderMap) -> Result<()> {
        let value = HeaderValue::from_str(&format!("Bearer {}", self.0)).map_err(|e| {
            Error::Configuration {
                message: "access token contains characters not allowed in a header".to_string(),
                source: Some(anyhow::anyhow!(e)),
            }
        })?;
        headers.insert(AUTHORIZATION, value);
        Ok(())
    }
}

// Keep the secret out of debug output.
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}
