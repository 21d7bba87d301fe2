//! Zenodo Core - Resilient client for the Zenodo deposit and records API
//!
//! This crate talks to Zenodo (or its sandbox) over HTTP, retrying the calls
//! that are worth retrying and reporting the ones that are not with a
//! structured failure record.
//!
//! # Main Components
//!
//! - **Request Core**: Attempt loop with retry classification, rate-limit aware
//!   backoff and authentication re-verification ([`http`])
//! - **Client**: [`Zenodo`], the session shared by every endpoint caller
//! - **Depositions**: Legacy deposit API ([`Deposition`])
//! - **Records**: Records API with drafts, reviews and communities ([`Record`])
//! - **Error Handling**: Error types using `thiserror` and `anyhow`
//! - **Logging**: [`Logger`] collaborator backed by `tracing`
//!
//! # Example
//!
//! ```no_run
//! use zenodo_core::{ClientConfig, Metadata, Result, UploadType, Zenodo};
//!
//! async fn example() -> Result<()> {
//!     let zenodo = Zenodo::new(ClientConfig::new("my-token"))?;
//!     let metadata = Metadata::new(UploadType::Dataset, "Measurements");
//!     let deposition = zenodo.create_deposition(&metadata).await?;
//!     deposition.publish().await?;
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod config;
pub mod depositions;
pub mod error;
pub mod files;
pub mod http;
pub mod logging;
pub mod records;
pub mod types;
pub mod zenodo;

// Re-export main types for convenience
pub use config::ClientConfig;
pub use depositions::{CreateFilesOptions, Deposition};
pub use error::{Error, Result};
pub use files::FileBlob;
pub use http::{
    AuthenticationState, HttpResponse, RequestFailure, RequestSpec, RetryPolicy, Session,
    Transport,
};
pub use logging::{init_logging, LogLevel, Logger, LoggingConfig, MemoryLogger, TracingLogger};
pub use records::Record;
pub use types::{
    AccessRight, Creator, DepositionValue, Identifier, ListDepositionsOptions, ListOptions,
    ListRecordsOptions, Metadata, RecordValue, Review, UploadStatus, UploadType, ZenodoFile,
};
pub use zenodo::{Zenodo, ZenodoBuilder};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
