use crate::enrollment::Enrollment;
use crate::types::EngagementLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Level boundaries
// ---------------------------------------------------------------------------

/// Score thresholds for [`EngagementLevel`]. Shared constants so any
/// reporting surface buckets scores identically to the decision pipeline.
pub const VERY_HIGH_MIN_SCORE: u32 = 70;
pub const HIGH_MIN_SCORE: u32 = 50;
pub const MEDIUM_MIN_SCORE: u32 = 25;
pub const LOW_MIN_SCORE: u32 = 1;

pub fn level_for_score(score: u32) -> EngagementLevel {
    match score {
        s if s >= VERY_HIGH_MIN_SCORE => EngagementLevel::VeryHigh,
        s if s >= HIGH_MIN_SCORE => EngagementLevel::High,
        s if s >= MEDIUM_MIN_SCORE => EngagementLevel::Medium,
        s if s >= LOW_MIN_SCORE => EngagementLevel::Low,
        _ => EngagementLevel::None,
    }
}

// ---------------------------------------------------------------------------
// DaysInactive
// ---------------------------------------------------------------------------

/// Days since last activity. `Unknown` when the enrollment carries no
/// activity timestamp at all — rules must treat it as not-matched rather
/// than `0`, so a learner with no data is never classified as highly active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DaysInactive {
    Known(u32),
    Unknown,
}

impl DaysInactive {
    pub fn known(self) -> Option<u32> {
        match self {
            DaysInactive::Known(d) => Some(d),
            DaysInactive::Unknown => None,
        }
    }
}

// ---------------------------------------------------------------------------
// EngagementFacts
// ---------------------------------------------------------------------------

/// Derived engagement facts for one enrollment. Ephemeral: recomputed fresh
/// from the current enrollment snapshot on every pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementFacts {
    pub days_inactive: DaysInactive,
    /// 0–100 weighted combination of recency, login frequency, and progress.
    pub engagement_score: u32,
    pub engagement_level: EngagementLevel,
    pub progress_percentage: f64,
    /// Unit id of the most recent completion when the learner has stalled:
    /// at least one unit done, more remaining, and no completion for
    /// `stall_days`.
    pub completion_milestone: Option<String>,
}

// ---------------------------------------------------------------------------
// Calculator
// ---------------------------------------------------------------------------

/// Compute engagement facts from an enrollment snapshot.
///
/// Pure: no I/O, no side effects, never fails. Malformed fields degrade to
/// conservative defaults (inactive, low engagement) so a single bad
/// enrollment can't take down a batch.
pub fn compute_facts(enrollment: &Enrollment, now: DateTime<Utc>, stall_days: u32) -> EngagementFacts {
    let days_inactive = match enrollment.last_activity_at {
        Some(ts) => {
            let days = (now - ts).num_days();
            DaysInactive::Known(days.max(0) as u32)
        }
        None => DaysInactive::Unknown,
    };

    let progress = if enrollment.progress_percentage.is_finite() {
        enrollment.progress_percentage.clamp(0.0, 100.0)
    } else {
        0.0
    };

    let score =
        recency_points(days_inactive) + login_points(enrollment.logins_last_30_days) + progress_points(progress);
    let level = level_for_score(score);

    EngagementFacts {
        days_inactive,
        engagement_score: score,
        engagement_level: level,
        progress_percentage: progress,
        completion_milestone: completion_milestone(enrollment, now, stall_days),
    }
}

/// Recency component, 0–50. Non-increasing in days inactive; `Unknown`
/// contributes nothing.
fn recency_points(days: DaysInactive) -> u32 {
    match days {
        DaysInactive::Unknown => 0,
        DaysInactive::Known(d) => match d {
            0..=1 => 50,
            2..=3 => 45,
            4..=7 => 38,
            8..=14 => 28,
            15..=30 => 15,
            31..=60 => 5,
            _ => 0,
        },
    }
}

/// Login-frequency component, 0–25. Non-decreasing in logins.
fn login_points(logins_last_30_days: u32) -> u32 {
    match logins_last_30_days {
        0 => 0,
        1..=3 => 5,
        4..=7 => 10,
        8..=11 => 15,
        12..=19 => 20,
        _ => 25,
    }
}

/// Progress component, 0–25. Non-decreasing in progress.
fn progress_points(progress: f64) -> u32 {
    ((progress / 4.0).floor() as u32).min(25)
}

fn completion_milestone(
    enrollment: &Enrollment,
    now: DateTime<Utc>,
    stall_days: u32,
) -> Option<String> {
    if enrollment.completed_units == 0 || enrollment.completed_units >= enrollment.total_units {
        return None;
    }
    let latest = enrollment.latest_completion()?;
    let stalled_for = (now - latest.completed_at).num_days();
    if stalled_for >= i64::from(stall_days) {
        Some(latest.unit_id.clone())
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrollment::UnitCompletion;
    use crate::types::EnrollmentStatus;
    use chrono::{Duration, TimeZone};

    const STALL_DAYS: u32 = 14;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn enrollment() -> Enrollment {
        Enrollment {
            learner_id: "lrn-1".into(),
            offering_id: "course-42".into(),
            email: "ada@example.com".into(),
            status: EnrollmentStatus::Active,
            progress_percentage: 0.0,
            completed_units: 0,
            total_units: 5,
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
    fn missing_activity_yields_unknown_not_zero() {
        let facts = compute_facts(&enrollment(), now(), STALL_DAYS);
        assert_eq!(facts.days_inactive, DaysInactive::Unknown);
        // No recency credit for unknown activity.
        assert!(facts.engagement_score <= 50);
    }

    #[test]
    fn days_inactive_floors_and_clamps() {
        let mut e = enrollment();
        e.last_activity_at = Some(now() - Duration::hours(36));
        let facts = compute_facts(&e, now(), STALL_DAYS);
        assert_eq!(facts.days_inactive, DaysInactive::Known(1));

        // Activity timestamp in the future (clock skew between platforms)
        // clamps to zero instead of going negative.
        e.last_activity_at = Some(now() + Duration::days(2));
        let facts = compute_facts(&e, now(), STALL_DAYS);
        assert_eq!(facts.days_inactive, DaysInactive::Known(0));
    }

    #[test]
    fn score_monotonic_in_days_inactive() {
        let mut prev = u32::MAX;
        for days in [0u32, 1, 3, 7, 14, 30, 60, 90, 365] {
            let mut e = enrollment();
            e.last_activity_at = Some(now() - Duration::days(i64::from(days)));
            let score = compute_facts(&e, now(), STALL_DAYS).engagement_score;
            assert!(
                score <= prev,
                "score increased from {prev} to {score} at {days} days inactive"
            );
            prev = score;
        }
    }

    #[test]
    fn score_monotonic_in_progress() {
        let mut prev = 0;
        for pct in [0.0, 10.0, 25.0, 50.0, 75.0, 100.0] {
            let mut e = enrollment();
            e.progress_percentage = pct;
            let score = compute_facts(&e, now(), STALL_DAYS).engagement_score;
            assert!(score >= prev, "score decreased at {pct}% progress");
            prev = score;
        }
    }

    #[test]
    fn score_monotonic_in_logins() {
        let mut prev = 0;
        for logins in [0u32, 1, 4, 8, 12, 20, 40] {
            let mut e = enrollment();
            e.logins_last_30_days = logins;
            let score = compute_facts(&e, now(), STALL_DAYS).engagement_score;
            assert!(score >= prev, "score decreased at {logins} logins");
            prev = score;
        }
    }

    #[test]
    fn fully_engaged_learner_is_very_high() {
        let mut e = enrollment();
        e.last_activity_at = Some(now());
        e.logins_last_30_days = 25;
        e.progress_percentage = 100.0;
        let facts = compute_facts(&e, now(), STALL_DAYS);
        assert_eq!(facts.engagement_score, 100);
        assert_eq!(facts.engagement_level, EngagementLevel::VeryHigh);
    }

    #[test]
    fn zero_signal_learner_is_level_none() {
        let facts = compute_facts(&enrollment(), now(), STALL_DAYS);
        assert_eq!(facts.engagement_score, 0);
        assert_eq!(facts.engagement_level, EngagementLevel::None);
    }

    #[test]
    fn level_boundaries() {
        assert_eq!(level_for_score(100), EngagementLevel::VeryHigh);
        assert_eq!(level_for_score(70), EngagementLevel::VeryHigh);
        assert_eq!(level_for_score(69), EngagementLevel::High);
        assert_eq!(level_for_score(50), EngagementLevel::High);
        assert_eq!(level_for_score(49), EngagementLevel::Medium);
        assert_eq!(level_for_score(25), EngagementLevel::Medium);
        assert_eq!(level_for_score(24), EngagementLevel::Low);
        assert_eq!(level_for_score(1), EngagementLevel::Low);
        assert_eq!(level_for_score(0), EngagementLevel::None);
    }

    #[test]
    fn nan_progress_degrades_to_zero() {
        let mut e = enrollment();
        e.progress_percentage = f64::NAN;
        let facts = compute_facts(&e, now(), STALL_DAYS);
        assert_eq!(facts.progress_percentage, 0.0);
        assert_eq!(facts.engagement_score, 0);
    }

    #[test]
    fn milestone_set_when_stalled_after_a_unit() {
        let mut e = enrollment();
        e.completed_units = 1;
        e.unit_completions = vec![UnitCompletion {
            unit_id: "unit-1".into(),
            completed_at: now() - Duration::days(20),
        }];
        let facts = compute_facts(&e, now(), STALL_DAYS);
        assert_eq!(facts.completion_milestone.as_deref(), Some("unit-1"));
    }

    #[test]
    fn milestone_absent_when_recently_progressing() {
        let mut e = enrollment();
        e.completed_units = 1;
        e.unit_completions = vec![UnitCompletion {
            unit_id: "unit-1".into(),
            completed_at: now() - Duration::days(3),
        }];
        let facts = compute_facts(&e, now(), STALL_DAYS);
        assert!(facts.completion_milestone.is_none());
    }

    #[test]
    fn milestone_absent_when_course_finished() {
        let mut e = enrollment();
        e.completed_units = 5;
        e.unit_completions = vec![UnitCompletion {
            unit_id: "unit-5".into(),
            completed_at: now() - Duration::days(60),
        }];
        let facts = compute_facts(&e, now(), STALL_DAYS);
        assert!(facts.completion_milestone.is_none());
    }

    #[test]
    fn identical_inputs_identical_facts() {
        let mut e = enrollment();
        e.last_activity_at = Some(now() - Duration::days(5));
        e.progress_percentage = 33.0;
        let a = compute_facts(&e, now(), STALL_DAYS);
        let b = compute_facts(&e, now(), STALL_DAYS);
        assert_eq!(a, b);
    }
}
