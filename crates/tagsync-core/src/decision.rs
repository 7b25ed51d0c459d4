use crate::catalog::{
    AccountState, FactField, Rule, RuleCatalog, RuleCondition, REACTIVATION_WINDOW_DAYS,
};
use crate::engagement::{DaysInactive, EngagementFacts};
use crate::enrollment::Enrollment;
use crate::types::{EnrollmentStatus, RuleCategory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// EvalContext
// ---------------------------------------------------------------------------

pub struct EvalContext<'a> {
    pub facts: &'a EngagementFacts,
    pub enrollment: &'a Enrollment,
    pub now: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Decision (output)
// ---------------------------------------------------------------------------

/// Platform-agnostic tagging intent for one enrollment: at most one tag per
/// category, plus the categories whose managed tags should no longer exist.
/// Cross-referencing against the directory's actual tags is the
/// reconciler's job, not the engine's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub tags_to_apply: Vec<String>,
    pub clear_categories: Vec<RuleCategory>,
    pub matched_rules: Vec<String>,
}

// ---------------------------------------------------------------------------
// DecisionEngine
// ---------------------------------------------------------------------------

pub struct DecisionEngine {
    catalog: RuleCatalog,
}

impl DecisionEngine {
    pub fn new(catalog: RuleCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    /// Evaluate the catalog against one enrollment's facts.
    ///
    /// Within each category rules run in ascending priority and the first
    /// match wins. Account-status matches short-circuit every other
    /// category: a refunded or manually inactivated learner carries exactly
    /// one account-status tag and nothing engagement-derived.
    ///
    /// Deterministic: identical facts and catalog produce identical output.
    pub fn evaluate(&self, ctx: &EvalContext) -> Decision {
        let rules = self.catalog.active_rules();

        if let Some(rule) = first_match(&rules, RuleCategory::AccountStatus, ctx) {
            return Decision {
                tags_to_apply: vec![render_tag(&rule.tag, ctx.facts)],
                clear_categories: RuleCategory::all()
                    .iter()
                    .copied()
                    .filter(|c| *c != RuleCategory::AccountStatus)
                    .collect(),
                matched_rules: vec![rule.id.clone()],
            };
        }

        let mut decision = Decision {
            tags_to_apply: Vec::new(),
            clear_categories: vec![RuleCategory::AccountStatus],
            matched_rules: Vec::new(),
        };

        for &category in RuleCategory::all() {
            if category == RuleCategory::AccountStatus {
                continue;
            }
            match first_match(&rules, category, ctx) {
                Some(rule) => {
                    decision.tags_to_apply.push(render_tag(&rule.tag, ctx.facts));
                    decision.matched_rules.push(rule.id.clone());
                }
                // No rule matched — not an error, the category just
                // contributes no tag.
                None => decision.clear_categories.push(category),
            }
        }

        decision
    }
}

fn first_match<'a>(
    rules: &[&'a Rule],
    category: RuleCategory,
    ctx: &EvalContext,
) -> Option<&'a Rule> {
    rules
        .iter()
        .filter(|r| r.category == category)
        .find(|r| condition_matches(&r.condition, ctx))
        .copied()
}

// ---------------------------------------------------------------------------
// Condition interpreter
// ---------------------------------------------------------------------------

fn condition_matches(condition: &RuleCondition, ctx: &EvalContext) -> bool {
    match condition {
        RuleCondition::Fact { field, op, value } => match fact_value(*field, ctx.facts) {
            Some(lhs) => op.compare(lhs, *value),
            // Unknown facts never match, in either direction.
            None => false,
        },
        RuleCondition::AccountState { state } => account_state_matches(*state, ctx),
        RuleCondition::MilestoneStalled => ctx.facts.completion_milestone.is_some(),
        RuleCondition::AllOf { conditions } => {
            conditions.iter().all(|c| condition_matches(c, ctx))
        }
        RuleCondition::AnyOf { conditions } => {
            conditions.iter().any(|c| condition_matches(c, ctx))
        }
    }
}

fn fact_value(field: FactField, facts: &EngagementFacts) -> Option<f64> {
    match field {
        FactField::DaysInactive => match facts.days_inactive {
            DaysInactive::Known(d) => Some(f64::from(d)),
            DaysInactive::Unknown => None,
        },
        FactField::EngagementScore => Some(f64::from(facts.engagement_score)),
        FactField::EngagementLevel => Some(f64::from(facts.engagement_level.rank())),
        FactField::ProgressPercentage => Some(facts.progress_percentage),
    }
}

fn account_state_matches(state: AccountState, ctx: &EvalContext) -> bool {
    let e = ctx.enrollment;
    match state {
        AccountState::ManuallyInactivated => e.manually_inactivated,
        AccountState::Refunded => e.refunded || e.status == EnrollmentStatus::Refunded,
        AccountState::Suspended => e.status == EnrollmentStatus::Suspended,
        AccountState::Cancelled => e.status == EnrollmentStatus::Cancelled,
        AccountState::Expired => e.status == EnrollmentStatus::Expired,
        AccountState::RecentlyReactivated => e
            .reactivated_at
            .is_some_and(|ts| (ctx.now - ts).num_days() < REACTIVATION_WINDOW_DAYS),
    }
}

/// Substitute the `{unit}` placeholder with the stalled milestone unit id.
fn render_tag(template: &str, facts: &EngagementFacts) -> String {
    match facts.completion_milestone.as_deref() {
        Some(unit) if template.contains("{unit}") => template.replace("{unit}", unit),
        _ => template.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
