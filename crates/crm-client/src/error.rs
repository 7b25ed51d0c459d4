use thiserror::Error;

/// Construction-time errors. Runtime tag-operation errors are reported as
/// `tagsync_core::directory::DirectoryError` through the trait.
#[derive(Debug, Error)]
pub enum CrmClientError {
    #[error("invalid CRM base url '{0}'")]
    InvalidBaseUrl(String),

    #[error("CRM API key not set: export {env}")]
    MissingApiKey { env: String },

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}
