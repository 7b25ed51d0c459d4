use crate::enrollment::Enrollment;
use crate::error::{Result, TagSyncError};
use crate::types::EnrollmentStatus;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// BatchFilter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchFilter {
    pub status: Option<EnrollmentStatus>,
    pub offering_id: Option<String>,
}

impl BatchFilter {
    fn matches(&self, e: &Enrollment) -> bool {
        if let Some(status) = self.status {
            if e.status != status {
                return false;
            }
        }
        if let Some(ref offering) = self.offering_id {
            if &e.offering_id != offering {
                return false;
            }
        }
        true
    }
}

// ---------------------------------------------------------------------------
// EnrollmentStore
// ---------------------------------------------------------------------------

/// Read-only view of canonical enrollments. Written exclusively by the
/// ingestion subsystem; the core never mutates it.
pub trait EnrollmentStore {
    fn get(&self, learner_id: &str, offering_id: &str) -> Result<Enrollment>;
    fn list(&self, filter: &BatchFilter) -> Result<Vec<Enrollment>>;
}

// ---------------------------------------------------------------------------
// JsonFileStore
// ---------------------------------------------------------------------------

/// Snapshot-file store over the ingestion subsystem's JSON export.
///
/// Records failing canonical validation are quarantined at load time rather
/// than surfacing mid-batch.
pub struct JsonFileStore {
    enrollments: Vec<Enrollment>,
    quarantined: Vec<(String, String)>,
}

impl JsonFileStore {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let records: Vec<Enrollment> = serde_json::from_str(&data)?;
        Ok(Self::from_records(records))
    }

    pub fn from_records(records: Vec<Enrollment>) -> Self {
        let mut enrollments = Vec::with_capacity(records.len());
        let mut quarantined = Vec::new();
        for e in records {
            match e.validate() {
                Ok(()) => enrollments.push(e),
                Err(err) => {
                    tracing::warn!(
                        learner = %e.learner_id,
                        offering = %e.offering_id,
                        error = %err,
                        "quarantining non-canonical enrollment"
                    );
                    quarantined.push((e.learner_id.clone(), err.to_string()));
                }
            }
        }
        Self {
            enrollments,
            quarantined,
        }
    }

    /// (learner_id, reason) for each record rejected at load.
    pub fn quarantined(&self) -> &[(String, String)] {
        &self.quarantined
    }
}

impl EnrollmentStore for JsonFileStore {
    fn get(&self, learner_id: &str, offering_id: &str) -> Result<Enrollment> {
        self.enrollments
            .iter()
            .find(|e| e.learner_id == learner_id && e.offering_id == offering_id)
            .cloned()
            .ok_or_else(|| TagSyncError::EnrollmentNotFound {
                learner_id: learner_id.to_string(),
                offering_id: offering_id.to_string(),
            })
    }

    fn list(&self, filter: &BatchFilter) -> Result<Vec<Enrollment>> {
        Ok(self
            .enrollments
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(learner: &str, offering: &str, status: EnrollmentStatus) -> Enrollment {
        Enrollment {
            learner_id: learner.into(),
            offering_id: offering.into(),
            email: format!("{learner}@example.com"),
            status,
            progress_percentage: 10.0,
            completed_units: 0,
            total_units: 3,
            unit_completions: vec![],
            last_activity_at: None,
            last_login_at: None,
            logins_last_30_days: 0,
            reactivated_at: None,
            refunded: false,
            refunded_at: None,
            manually_inactivated: false,
            inactivation_reason: None,
        }
    }

    #[test]
    fn get_finds_by_pair() {
        let store = JsonFileStore::from_records(vec![
            record("lrn-1", "course-a", EnrollmentStatus::Active),
            record("lrn-1", "course-b", EnrollmentStatus::Active),
        ]);
        let e = store.get("lrn-1", "course-b").unwrap();
        assert_eq!(e.offering_id, "course-b");
    }

    #[test]
    fn get_missing_is_not_found() {
        let store = JsonFileStore::from_records(vec![]);
        let err = store.get("lrn-9", "course-z").unwrap_err();
        assert!(matches!(err, TagSyncError::EnrollmentNotFound { .. }));
    }

    #[test]
    fn list_filters_by_status() {
        let store = JsonFileStore::from_records(vec![
            record("lrn-1", "course-a", EnrollmentStatus::Active),
            record("lrn-2", "course-a", EnrollmentStatus::Cancelled),
        ]);
        let filter = BatchFilter {
            status: Some(EnrollmentStatus::Active),
            offering_id: None,
        };
        let out = store.list(&filter).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].learner_id, "lrn-1");
    }

    #[test]
    fn list_filters_by_offering() {
        let store = JsonFileStore::from_records(vec![
            record("lrn-1", "course-a", EnrollmentStatus::Active),
            record("lrn-2", "course-b", EnrollmentStatus::Active),
        ]);
        let filter = BatchFilter {
            status: None,
            offering_id: Some("course-b".into()),
        };
        let out = store.list(&filter).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].learner_id, "lrn-2");
    }

    #[test]
    fn invalid_records_quarantined_at_load() {
        let mut bad = record("lrn-3", "course-a", EnrollmentStatus::Active);
        bad.email = "nope".into();
        let store = JsonFileStore::from_records(vec![
            record("lrn-1", "course-a", EnrollmentStatus::Active),
            bad,
        ]);
        assert_eq!(store.quarantined().len(), 1);
        assert_eq!(store.quarantined()[0].0, "lrn-3");
        assert!(store.get("lrn-3", "course-a").is_err());
    }

    #[test]
    fn load_reads_ingestion_export() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("enrollments.json");
        let records = vec![record("lrn-1", "course-a", EnrollmentStatus::Active)];
        std::fs::write(&path, serde_json::to_vec(&records).unwrap()).unwrap();
        let store = JsonFileStore::load(&path).unwrap();
        assert!(store.get("lrn-1", "course-a").is_ok());
    }
}
