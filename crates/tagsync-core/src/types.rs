use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// RuleCategory
// ---------------------------------------------------------------------------

/// Mutually-exclusive rule buckets. Within one category at most one managed
/// tag may be desired for an enrollment at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    AccountStatus,
    Inactivity,
    Engagement,
    Progress,
    Completion,
}

impl RuleCategory {
    pub fn all() -> &'static [RuleCategory] {
        &[
            RuleCategory::AccountStatus,
            RuleCategory::Inactivity,
            RuleCategory::Engagement,
            RuleCategory::Progress,
            RuleCategory::Completion,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RuleCategory::AccountStatus => "account_status",
            RuleCategory::Inactivity => "inactivity",
            RuleCategory::Engagement => "engagement",
            RuleCategory::Progress => "progress",
            RuleCategory::Completion => "completion",
        }
    }

    /// The managed-tag naming prefix for this category. A desired tag for
    /// this category is always `"<prefix> - <description>"`.
    pub fn prefix(self) -> &'static str {
        match self {
            RuleCategory::AccountStatus => "ACCOUNT",
            RuleCategory::Inactivity => "INACTIVITY",
            RuleCategory::Engagement => "ENGAGEMENT",
            RuleCategory::Progress => "PROGRESS",
            RuleCategory::Completion => "COMPLETION",
        }
    }
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RuleCategory {
    type Err = crate::error::TagSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "account_status" | "account-status" => Ok(RuleCategory::AccountStatus),
            "inactivity" => Ok(RuleCategory::Inactivity),
            "engagement" => Ok(RuleCategory::Engagement),
            "progress" => Ok(RuleCategory::Progress),
            "completion" => Ok(RuleCategory::Completion),
            _ => Err(crate::error::TagSyncError::InvalidCategory(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// EnrollmentStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Active,
    Cancelled,
    Suspended,
    Expired,
    Refunded,
}

impl EnrollmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Cancelled => "cancelled",
            EnrollmentStatus::Suspended => "suspended",
            EnrollmentStatus::Expired => "expired",
            EnrollmentStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EnrollmentStatus {
    type Err = crate::error::TagSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(EnrollmentStatus::Active),
            "cancelled" => Ok(EnrollmentStatus::Cancelled),
            "suspended" => Ok(EnrollmentStatus::Suspended),
            "expired" => Ok(EnrollmentStatus::Expired),
            "refunded" => Ok(EnrollmentStatus::Refunded),
            _ => Err(crate::error::TagSyncError::InvalidStatus(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// EngagementLevel
// ---------------------------------------------------------------------------

/// Monotonic bucketing of the engagement score. Boundaries live in
/// `engagement::level_for_score` so facts and any reporting surface agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementLevel {
    None,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl EngagementLevel {
    /// Numeric rank used when rule conditions compare levels.
    pub fn rank(self) -> u32 {
        self as u32
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EngagementLevel::None => "none",
            EngagementLevel::Low => "low",
            EngagementLevel::Medium => "medium",
            EngagementLevel::High => "high",
            EngagementLevel::VeryHigh => "very_high",
        }
    }
}

impl fmt::Display for EngagementLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TagOp
// ---------------------------------------------------------------------------

/// The two mutations the reconciler may send to the external directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagOp {
    Add,
    Remove,
}

impl fmt::Display for TagOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TagOp::Add => "add",
            TagOp::Remove => "remove",
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
