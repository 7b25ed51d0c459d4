use crate::error::{Result, TagSyncError};
use crate::types::EnrollmentStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// UnitCompletion
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitCompletion {
    pub unit_id: String,
    pub completed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Enrollment
// ---------------------------------------------------------------------------

/// Canonical record of one learner's relationship to one offering.
///
/// Produced by the ingestion subsystem; the core treats it as read-only
/// input. Records that fail [`Enrollment::validate`] are quarantined at the
/// boundary rather than defensively handled inside the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub learner_id: String,
    pub offering_id: String,
    /// CRM contact identity — the key the tag directory is addressed by.
    pub email: String,
    pub status: EnrollmentStatus,
    pub progress_percentage: f64,
    pub completed_units: u32,
    pub total_units: u32,
    #[serde(default)]
    pub unit_completions: Vec<UnitCompletion>,
    #[serde(default)]
    pub last_activity_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_login_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub logins_last_30_days: u32,
    #[serde(default)]
    pub reactivated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub refunded: bool,
    #[serde(default)]
    pub refunded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub manually_inactivated: bool,
    #[serde(default)]
    pub inactivation_reason: Option<String>,
}

impl Enrollment {
    /// Reject records that don't conform to the canonical shape.
    ///
    /// Progress out of `[0, 100]` is an ingestion bug, not a condition the
    /// decision engine should paper over.
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: &str| {
            Err(TagSyncError::InvalidEnrollment {
                learner_id: self.learner_id.clone(),
                reason: reason.to_string(),
            })
        };
        if self.learner_id.trim().is_empty() {
            return fail("empty learner_id");
        }
        if self.offering_id.trim().is_empty() {
            return fail("empty offering_id");
        }
        if self.email.trim().is_empty() || !self.email.contains('@') {
            return fail("missing or malformed contact email");
        }
        if !self.progress_percentage.is_finite()
            || self.progress_percentage < 0.0
            || self.progress_percentage > 100.0
        {
            return fail("progress_percentage outside [0, 100]");
        }
        if self.total_units > 0 && self.completed_units > self.total_units {
            return fail("completed_units exceeds total_units");
        }
        Ok(())
    }

    /// Most recent unit completion, by timestamp.
    pub fn latest_completion(&self) -> Option<&UnitCompletion> {
        self.unit_completions.iter().max_by_key(|u| u.completed_at)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
