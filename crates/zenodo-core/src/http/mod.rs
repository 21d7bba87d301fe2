//! Resilient HTTP request core
//!
//! This module provides:
//! - Request description and URL/header construction
//! - Bearer authentication and the authentication state machine
//! - Rate-limit header interpretation
//! - Retry classification with exponential or linear backoff
//! - Structured upstream failure records
//! - The transport seam and the attempt loop tying it all together

pub mod auth;
pub mod builder;
pub mod client;
pub mod error;
pub mod rate_limit;
pub mod retry;
pub mod transport;

pub use auth::{AccessToken, AuthStateCell, AuthenticationState};
pub use builder::{FilePart, MultipartForm, OutgoingRequest, RequestBody, RequestSpec};
pub use client::{execute, Session};
pub use error::{status_description, FailedRequest, RequestFailure};
pub use rate_limit::RateLimitSnapshot;
pub use retry::{compute_delay, DelayReason, RetryDecision, RetryPolicy};
pub use transport::{HttpResponse, ReqwestTransport, Transport};

// Re-export commonly used types
pub use reqwest::{Method, StatusCode};
