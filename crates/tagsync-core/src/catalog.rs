use crate::error::{Result, TagSyncError};
use crate::types::RuleCategory;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// FactField / Comparison
// ---------------------------------------------------------------------------

/// Numeric engagement fact a rule condition can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactField {
    /// Matches nothing when days-inactive is unknown.
    DaysInactive,
    EngagementScore,
    /// Compared by level rank (none=0 … very_high=4).
    EngagementLevel,
    ProgressPercentage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Gte,
    Gt,
    Lte,
    Lt,
    Eq,
}

impl Comparison {
    pub fn compare(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparison::Gte => lhs >= rhs,
            Comparison::Gt => lhs > rhs,
            Comparison::Lte => lhs <= rhs,
            Comparison::Lt => lhs < rhs,
            Comparison::Eq => lhs == rhs,
        }
    }
}

// ---------------------------------------------------------------------------
// AccountState
// ---------------------------------------------------------------------------

/// Account-level states that supersede engagement-derived signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountState {
    ManuallyInactivated,
    Refunded,
    Suspended,
    Cancelled,
    Expired,
    RecentlyReactivated,
}

/// A reactivation older than this no longer counts as "recent".
pub const REACTIVATION_WINDOW_DAYS: i64 = 7;

// ---------------------------------------------------------------------------
// RuleCondition
// ---------------------------------------------------------------------------

/// Declarative rule condition, stored as data and evaluated by a small
/// interpreter in the decision engine. Thresholds live here, not in code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleCondition {
    Fact {
        field: FactField,
        op: Comparison,
        value: f64,
    },
    AccountState {
        state: AccountState,
    },
    /// Matches when the learner has stalled after completing a unit
    /// (`EngagementFacts::completion_milestone` is set).
    MilestoneStalled,
    AllOf {
        conditions: Vec<RuleCondition>,
    },
    AnyOf {
        conditions: Vec<RuleCondition>,
    },
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

/// One declarative rule: condition → tag, within a category.
///
/// `tag` is a template; the only supported placeholder is `{unit}`, replaced
/// with the stalled completion-milestone unit id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub category: RuleCategory,
    /// Lower evaluates first within a category; first match wins.
    pub priority: i32,
    pub condition: RuleCondition,
    pub tag: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

// ---------------------------------------------------------------------------
// RuleCatalog
// ---------------------------------------------------------------------------

/// The single source of truth for tagging thresholds. Loadable from YAML so
/// operators adjust rules without redeploying.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleCatalog {
    #[serde(default = "default_version")]
    pub version: u32,
    pub rules: Vec<Rule>,
}

fn default_version() -> u32 {
    1
}

impl RuleCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let catalog: RuleCatalog = serde_yaml::from_str(&data)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    /// Active rules ordered by (category, priority, id) — the evaluation
    /// order the decision engine relies on for determinism.
    pub fn active_rules(&self) -> Vec<&Rule> {
        let mut rules: Vec<&Rule> = self.rules.iter().filter(|r| r.active).collect();
        rules.sort_by(|a, b| {
            (a.category, a.priority, a.id.as_str()).cmp(&(b.category, b.priority, b.id.as_str()))
        });
        rules
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for rule in &self.rules {
            if rule.id.trim().is_empty() {
                return Err(TagSyncError::InvalidCatalog("rule with empty id".into()));
            }
            if !seen.insert(rule.id.as_str()) {
                return Err(TagSyncError::InvalidCatalog(format!(
                    "duplicate rule id '{}'",
                    rule.id
                )));
            }
            let expected = format!("{} - ", rule.category.prefix());
            if !rule.tag.starts_with(&expected) {
                return Err(TagSyncError::InvalidCatalog(format!(
                    "rule '{}': tag '{}' must start with '{}'",
                    rule.id, rule.tag, expected
                )));
            }
            validate_condition(&rule.id, &rule.condition)?;
        }
        Ok(())
    }
}

fn validate_condition(rule_id: &str, condition: &RuleCondition) -> Result<()> {
    match condition {
        RuleCondition::Fact { value, .. } => {
            if !value.is_finite() {
                return Err(TagSyncError::InvalidCatalog(format!(
                    "rule '{rule_id}': non-finite threshold"
                )));
            }
            Ok(())
        }
        RuleCondition::AccountState { .. } | RuleCondition::MilestoneStalled => Ok(()),
        RuleCondition::AllOf { conditions } | RuleCondition::AnyOf { conditions } => {
            if conditions.is_empty() {
                return Err(TagSyncError::InvalidCatalog(format!(
                    "rule '{rule_id}': empty condition list"
                )));
            }
            for c in conditions {
                validate_condition(rule_id, c)?;
            }
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Default catalog (priority-ordered within each category)
// ---------------------------------------------------------------------------

/// Built-in production rule set, used when no catalog file is configured.
pub fn default_catalog() -> RuleCatalog {
    use crate::types::EngagementLevel;

    fn fact(field: FactField, op: Comparison, value: f64) -> RuleCondition {
        RuleCondition::Fact { field, op, value }
    }
    fn level(l: EngagementLevel) -> RuleCondition {
        fact(FactField::EngagementLevel, Comparison::Eq, f64::from(l.rank()))
    }
    fn account(state: AccountState) -> RuleCondition {
        RuleCondition::AccountState { state }
    }
    fn rule(
        id: &str,
        category: RuleCategory,
        priority: i32,
        condition: RuleCondition,
        tag: &str,
    ) -> Rule {
        Rule {
            id: id.into(),
            category,
            priority,
            condition,
            tag: tag.into(),
            active: true,
        }
    }

    use Comparison::*;
    use FactField::*;
    use RuleCategory::*;

    RuleCatalog {
        version: 1,
        rules: vec![
            // Account status — supersedes everything else.
            rule(
                "account_manual",
                AccountStatus,
                10,
                account(AccountState::ManuallyInactivated),
                "ACCOUNT - Manually Inactivated",
            ),
            rule(
                "account_refunded",
                AccountStatus,
                20,
                account(AccountState::Refunded),
                "ACCOUNT - Refunded",
            ),
            rule(
                "account_suspended",
                AccountStatus,
                30,
                account(AccountState::Suspended),
                "ACCOUNT - Suspended",
            ),
            rule(
                "account_cancelled",
                AccountStatus,
                40,
                account(AccountState::Cancelled),
                "ACCOUNT - Cancelled",
            ),
            rule(
                "account_expired",
                AccountStatus,
                50,
                account(AccountState::Expired),
                "ACCOUNT - Expired",
            ),
            rule(
                "account_reactivated",
                AccountStatus,
                60,
                account(AccountState::RecentlyReactivated),
                "ACCOUNT - Recently Reactivated",
            ),
            // Inactivity — longest window first so the most severe tag wins.
            rule(
                "inactive_60",
                Inactivity,
                10,
                fact(DaysInactive, Gte, 60.0),
                "INACTIVITY - 60 days",
            ),
            rule(
                "inactive_30",
                Inactivity,
                20,
                fact(DaysInactive, Gte, 30.0),
                "INACTIVITY - 30 days",
            ),
            rule(
                "inactive_14",
                Inactivity,
                30,
                fact(DaysInactive, Gte, 14.0),
                "INACTIVITY - 14 days",
            ),
            rule(
                "inactive_7",
                Inactivity,
                40,
                fact(DaysInactive, Gte, 7.0),
                "INACTIVITY - 7 days",
            ),
            // Engagement level.
            rule(
                "engagement_very_high",
                Engagement,
                10,
                level(EngagementLevel::VeryHigh),
                "ENGAGEMENT - Very High",
            ),
            rule(
                "engagement_high",
                Engagement,
                20,
                level(EngagementLevel::High),
                "ENGAGEMENT - High",
            ),
            rule(
                "engagement_medium",
                Engagement,
                30,
                level(EngagementLevel::Medium),
                "ENGAGEMENT - Medium",
            ),
            rule(
                "engagement_low",
                Engagement,
                40,
                level(EngagementLevel::Low),
                "ENGAGEMENT - Low",
            ),
            // Progress bands — highest first.
            rule(
                "progress_75",
                Progress,
                10,
                fact(ProgressPercentage, Gte, 75.0),
                "PROGRESS - 75% Reached",
            ),
            rule(
                "progress_50",
                Progress,
                20,
                fact(ProgressPercentage, Gte, 50.0),
                "PROGRESS - 50% Reached",
            ),
            rule(
                "progress_25",
                Progress,
                30,
                fact(ProgressPercentage, Gte, 25.0),
                "PROGRESS - 25% Reached",
            ),
            // Completion.
            rule(
                "completion_done",
                Completion,
                10,
                fact(ProgressPercentage, Gte, 100.0),
                "COMPLETION - Course Complete",
            ),
            rule(
                "completion_stalled",
                Completion,
                20,
                RuleCondition::MilestoneStalled,
                "COMPLETION - Stalled after {unit}",
            ),
        ],
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
