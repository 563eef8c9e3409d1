//! # launchable-client
//!
//! HTTP side of the Launchable CLI: session registration, streaming
//! gzip-compressed event upload, and recorded-result retrieval.
//!
//! ## Key Types
//!
//! - [`LaunchableClient`] - workspace-scoped blocking HTTP client
//! - [`EventStream`] - lazy `{"events": [...]}` payload reader
//! - [`TestResults`] - recorded results with shared aggregation

pub mod client;
pub mod results;
pub mod stream;

pub use client::{ClientError, LaunchableClient, BASE_URL_ENV, DEFAULT_BASE_URL, TOKEN_ENV};
pub use results::{ResultSummary, StatusSummary, TestResult, TestResults};
pub use stream::{gzip_events, EventStream};
