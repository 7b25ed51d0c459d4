//! `crm-client` — HTTP client for the CRM tag directory.
//!
//! Implements `tagsync_core::directory::TagDirectory` over the CRM's
//! contact-tag REST API, with the retry and throttling policy the
//! reconciliation core deliberately knows nothing about:
//!
//! - transient failures (timeouts, 429, 5xx) are retried with exponential
//!   backoff up to a bounded attempt budget;
//! - permanent failures (other 4xx) are surfaced immediately, per tag;
//! - by the time the core sees a `DirectoryError`, the retry budget is spent.
//!
//! ```text
//! Reconciler ──TagDirectory──▶ CrmClient ──reqwest──▶ CRM REST API
//!                                  │
//!                                  └─ RetryPolicy (backoff, attempt budget)
//! ```

pub mod client;
pub mod error;

pub use client::{CrmClient, RetryPolicy};
pub use error::CrmClientError;
