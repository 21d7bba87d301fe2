//! Resilient request execution
//!
//! [`execute`] is the single entry point every endpoint caller goes through.
//! It runs a bounded attempt loop: send, compare the status with the expected
//! one, classify failures, wait (rate-limit aware backoff) and try again until
//! the call succeeds, hits a non-retryable failure or runs out of retries.
//!
//! The attempt counter is local to each call, so concurrent calls never share
//! it. The only shared mutable state is the session's authentication state.

use async_trait::async_trait;

use crate::http::auth::{AccessToken, AuthenticationState};
use crate::http::builder::RequestSpec;
use crate::http::error::{FailedRequest, RequestFailure};
use crate::http::rate_limit::RateLimitSnapshot;
use crate::http::retry::{compute_delay, DelayReason, RetryDecision, RetryPolicy};
use crate::http::transport::{HttpResponse, Transport};
use crate::logging::Logger;
use crate::{Error, Result};

/// Everything the request core needs from a client
#[async_trait]
pub trait Session: Send + Sync {
    /// API root, e.g. `https://sandbox.zenodo.org/api/`
    fn base_url(&self) -> &str;

    fn access_token(&self) -> Option<&AccessToken>;

    fn authentication_state(&self) -> AuthenticationState;

    /// Check the credential against the API and record the outcome
    ///
    /// Must not go through [`execute`].
    async fn verify_authentication(&self) -> Result<bool>;

    fn logger(&self) -> Option<&dyn Logger>;

    fn transport(&self) -> &dyn Transport;
}

/// Optional logger; every call is a no-op without one
#[derive(Clone, Copy)]
struct SessionLog<'a>(Option<&'a dyn Logger>);

impl SessionLog<'_> {
    fn debug(&self, message: impl AsRef<str>) {
        if let Some(logger) = self.0 {
            logger.debug(message.as_ref());
        }
    }

    fn info(&self, message: impl AsRef<str>) {
        if let Some(logger) = self.0 {
            logger.info(message.as_ref());
        }
    }

    fn warn(&self, message: impl AsRef<str>) {
        if let Some(logger) = self.0 {
            logger.warn(message.as_ref());
        }
    }

    fn error(&self, message: impl AsRef<str>) {
        if let Some(logger) = self.0 {
            logger.error(message.as_ref());
        }
    }
}

/// Execute one logical call
///
/// Returns the response whose status equals `spec.expected_status`, or a
/// single error:
/// - [`Error::Request`] for a status that was not retried or ran out of retries
/// - [`Error::Network`] carrying the last transport fault once retries are exhausted
/// - any other transport error, unchanged and without retrying
pub async fn execute<S>(session: &S, spec: &RequestSpec, policy: &RetryPolicy) -> Result<HttpResponse>
where
    S: Session + ?Sized,
{
    let log = SessionLog(session.logger());
    let mut attempt: u32 = 0;

    loop {
        let request = spec.build_request(session.base_url(), session.access_token())?;
        let url = request.url.to_string();

        let response = match session.transport().send(request).await {
            Ok(response) => response,
            Err(error @ Error::Network(_)) => {
                if attempt >= policy.max_retries {
                    log.error(format!("Network error after {} retries: {}", attempt, error));
                    return Err(error);
                }
                let (delay, _) = compute_delay(attempt, None, None, policy);
                log.warn(format!(
                    "Network error: {}. Retrying in {}ms ({}/{})",
                    error,
                    delay.as_millis(),
                    attempt + 1,
                    policy.max_retries
                ));
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }
            // Failures raised by an inner layer and refused requests pass through as-is.
            Err(error) => return Err(error),
        };

        let status = response.status().as_u16();
        let rate_limit = RateLimitSnapshot::from_headers(response.headers());
        if let Some(snapshot) = &rate_limit {
            log.debug(format!("Rate limit status: {}", snapshot));
        }

        if status == spec.expected_status {
            if attempt > 0 {
                log.info(format!("Request succeeded after {} retries", attempt));
            }
            return Ok(response);
        }

        let retryable = should_retry(session, status).await;
        if !retryable || attempt >= policy.max_retries {
            let failure = build_failure(spec, url, response, &log).await;
            return Err(failure.into());
        }

        let (delay, reason) = compute_delay(attempt, Some(status), rate_limit.as_ref(), policy);
        match reason {
            DelayReason::RateLimit => log.warn(format!(
                "Rate limit exceeded. Waiting {}ms before retry {}/{}",
                delay.as_millis(),
                attempt + 1,
                policy.max_retries
            )),
            DelayReason::Backoff => log.warn(format!(
                "Retryable error ({}). Retrying in {}ms ({}/{})",
                status,
                delay.as_millis(),
                attempt + 1,
                policy.max_retries
            )),
        }
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Classify a failed status, verifying the credential first when warranted
///
/// A verification that completes counts as retryable whatever its result;
/// only a verification that errors stops the retries.
async fn should_retry<S>(session: &S, status: u16) -> bool
where
    S: Session + ?Sized,
{
    match RetryDecision::classify(status, session.authentication_state()) {
        RetryDecision::Retry => true,
        RetryDecision::NoRetry => false,
        RetryDecision::VerifyThenRetry => session.verify_authentication().await.is_ok(),
    }
}

async fn build_failure(
    spec: &RequestSpec,
    url: String,
    response: HttpResponse,
    log: &SessionLog<'_>,
) -> RequestFailure {
    let status = response.status().as_u16();
    let headers = response.headers().clone();

    let response_body = match response.text().await {
        Ok(text) => Some(text),
        Err(Error::ResponseBody { message, .. }) => {
            log.warn(format!("Failed to read error response body: {}", message));
            None
        }
        Err(e) => {
            log.warn(format!("Failed to read error response body: {}", e));
            None
        }
    };

    let content_type = spec.effective_content_type();
    let failure = RequestFailure::new(
        FailedRequest {
            url,
            method: spec.method.clone(),
            content_type: content_type.clone(),
            body: spec.body.clone(),
        },
        status,
        &headers,
        response_body,
    );

    log.error(format!(
        "Error fetching {} with {} and {}: {}",
        failure.url,
        failure.method,
        content_type.as_deref().unwrap_or("no content type"),
        failure.message
    ));
    failure
}
