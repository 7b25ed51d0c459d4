use crate::directory::DirectoryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TagSyncError {
    #[error("not configured: no tagsync.yaml found (run 'tagsync init')")]
    NotConfigured,

    #[error("enrollment not found: learner '{learner_id}', offering '{offering_id}'")]
    EnrollmentNotFound {
        learner_id: String,
        offering_id: String,
    },

    #[error("invalid enrollment for learner '{learner_id}': {reason}")]
    InvalidEnrollment { learner_id: String, reason: String },

    #[error("invalid rule catalog: {0}")]
    InvalidCatalog(String),

    #[error("invalid category: {0}")]
    InvalidCategory(String),

    #[error("invalid enrollment status: {0}")]
    InvalidStatus(String),

    #[error("tag directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TagSyncError>;
