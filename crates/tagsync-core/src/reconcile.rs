use crate::decision::{DecisionEngine, EvalContext};
use crate::directory::TagDirectory;
use crate::engagement::compute_facts;
use crate::enrollment::Enrollment;
use crate::error::Result;
use crate::guard::TagGuard;
use crate::store::EnrollmentStore;
use crate::types::TagOp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// TagDiff
// ---------------------------------------------------------------------------

/// Minimal add/remove set between desired and actual managed tags.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TagDiff {
    pub to_add: Vec<String>,
    pub to_remove: Vec<String>,
}

impl TagDiff {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Diff desired managed tags against the directory's actual tags.
///
/// Actual tags are deduplicated by name (the CRM may list duplicates) and
/// partitioned by the guard; native tags are excluded before any set
/// arithmetic, which is what makes removing one structurally impossible.
pub fn diff(desired: &[String], actual: &[String], guard: &TagGuard) -> TagDiff {
    let mut managed_actual: Vec<&String> = Vec::new();
    for tag in actual {
        if guard.is_managed(tag) && !managed_actual.iter().any(|t| *t == tag) {
            managed_actual.push(tag);
        }
    }

    let to_add = desired
        .iter()
        .filter(|d| !managed_actual.iter().any(|a| a == d))
        .cloned()
        .collect();
    let to_remove = managed_actual
        .iter()
        .filter(|a| !desired.iter().any(|d| d == **a))
        .map(|t| t.to_string())
        .collect();

    TagDiff { to_add, to_remove }
}

// ---------------------------------------------------------------------------
// ReconciliationResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagOpFailure {
    pub op: TagOp,
    pub tag: String,
    pub error: String,
}

/// Outcome of one enrollment's reconciliation. Always produced, even on
/// total failure, with enough detail to drive a retry or manual inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub learner_id: String,
    pub offering_id: String,
    pub contact: String,
    /// Tags successfully added (or planned, when `dry_run`).
    pub tags_applied: Vec<String>,
    /// Tags successfully removed (or planned, when `dry_run`).
    pub tags_removed: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<TagOpFailure>,
    /// Set when the run failed before any tag operation (e.g. the initial
    /// tag fetch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub success: bool,
    #[serde(default)]
    pub dry_run: bool,
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Drives one enrollment through facts → decision → diff → apply.
pub struct Reconciler<D: TagDirectory> {
    directory: D,
    engine: DecisionEngine,
    extra_prefixes: Vec<String>,
    stall_days: u32,
    dry_run: bool,
}

impl<D: TagDirectory> Reconciler<D> {
    pub fn new(directory: D, engine: DecisionEngine) -> Self {
        Self {
            directory,
            engine,
            extra_prefixes: Vec::new(),
            stall_days: 14,
            dry_run: false,
        }
    }

    pub fn with_extra_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.extra_prefixes = prefixes;
        self
    }

    pub fn with_stall_days(mut self, days: u32) -> Self {
        self.stall_days = days;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Reconcile one enrollment against the external directory.
    ///
    /// Idempotent: an empty diff performs zero external calls. Additions go
    /// out before removals so a mid-run failure leaves the learner
    /// over-tagged rather than under-tagged. Each tag operation is
    /// independent; one failure doesn't abort the rest, and nothing already
    /// sent is rolled back.
    pub async fn reconcile(
        &self,
        enrollment: &Enrollment,
        now: DateTime<Utc>,
    ) -> ReconciliationResult {
        let facts = compute_facts(enrollment, now, self.stall_days);
        let decision = self.engine.evaluate(&EvalContext {
            facts: &facts,
            enrollment,
            now,
        });

        let mut result = ReconciliationResult {
            learner_id: enrollment.learner_id.clone(),
            offering_id: enrollment.offering_id.clone(),
            contact: enrollment.email.clone(),
            tags_applied: Vec::new(),
            tags_removed: Vec::new(),
            failures: Vec::new(),
            error: None,
            success: true,
            dry_run: self.dry_run,
        };

        let actual = match self.directory.get_tags(&enrollment.email).await {
            Ok(tags) => tags,
            Err(err) => {
                tracing::warn!(
                    contact = %enrollment.email,
                    error = %err,
                    "failed to fetch current tags"
                );
                result.error = Some(err.to_string());
                result.success = false;
                return result;
            }
        };

        // The guard is rebuilt from the current prefix set on every run;
        // prefix extensions must not require a process restart.
        let guard = TagGuard::new(&self.extra_prefixes);
        let delta = diff(&decision.tags_to_apply, &actual, &guard);

        if delta.is_empty() {
            tracing::debug!(contact = %enrollment.email, "tags already in sync");
            return result;
        }

        if self.dry_run {
            result.tags_applied = delta.to_add;
            result.tags_removed = delta.to_remove;
            return result;
        }

        for tag in &delta.to_add {
            match self.directory.add_tag(&enrollment.email, tag).await {
                Ok(()) => {
                    tracing::debug!(contact = %enrollment.email, %tag, "tag added");
                    result.tags_applied.push(tag.clone());
                }
                Err(err) => {
                    tracing::warn!(contact = %enrollment.email, %tag, error = %err, "add failed");
                    result.failures.push(TagOpFailure {
                        op: TagOp::Add,
                        tag: tag.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        for tag in &delta.to_remove {
            match self.directory.remove_tag(&enrollment.email, tag).await {
                Ok(()) => {
                    tracing::debug!(contact = %enrollment.email, %tag, "tag removed");
                    result.tags_removed.push(tag.clone());
                }
                Err(err) => {
                    tracing::warn!(contact = %enrollment.email, %tag, error = %err, "remove failed");
                    result.failures.push(TagOpFailure {
                        op: TagOp::Remove,
                        tag: tag.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        result.success = result.failures.is_empty();
        tracing::info!(
            contact = %enrollment.email,
            applied = result.tags_applied.len(),
            removed = result.tags_removed.len(),
            failed = result.failures.len(),
            "reconciliation complete"
        );
        result
    }
}

// ---------------------------------------------------------------------------
// SyncService
// ---------------------------------------------------------------------------

/// The core's single entry point for callers: look up an enrollment and
/// reconcile it. Looped by the batch driver, or called directly for
/// targeted re-evaluation.
pub struct SyncService<S: EnrollmentStore, D: TagDirectory> {
    store: S,
    reconciler: Reconciler<D>,
}

impl<S: EnrollmentStore, D: TagDirectory> SyncService<S, D> {
    pub fn new(store: S, reconciler: Reconciler<D>) -> Self {
        Self { store, reconciler }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn reconciler(&self) -> &Reconciler<D> {
        &self.reconciler
    }

    pub async fn reconcile_enrollment(
        &self,
        learner_id: &str,
        offering_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ReconciliationResult> {
        let enrollment = self.store.get(learner_id, offering_id)?;
        enrollment.validate()?;
        Ok(self.reconciler.reconcile(&enrollment, now).await)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::default_catalog;
    use crate::directory::InMemoryDirectory;
    use crate::error::TagSyncError;
    use crate::store::JsonFileStore;
    use crate::types::EnrollmentStatus;
    use chrono::{Duration, TimeZone};

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

    fn reconciler(dir: InMemoryDirectory) -> Reconciler<InMemoryDirectory> {
        Reconciler::new(dir, DecisionEngine::new(default_catalog()))
    }

    // -- diff ---------------------------------------------------------------

    #[test]
    fn diff_replaces_stale_managed_and_spares_native() {
        // Scenario: actual = [14-day tag, Birthday Club]; desired = [30-day
        // tag]. Birthday Club is native and untouched.
        let guard = TagGuard::new(&[]);
        let desired = vec!["INACTIVITY - 30 days".to_string()];
        let actual = vec![
            "INACTIVITY - 14 days".to_string(),
            "Birthday Club".to_string(),
        ];
        let d = diff(&desired, &actual, &guard);
        assert_eq!(d.to_add, vec!["INACTIVITY - 30 days"]);
        assert_eq!(d.to_remove, vec!["INACTIVITY - 14 days"]);
    }

    #[test]
    fn diff_never_removes_native_tags() {
        let guard = TagGuard::new(&[]);
        let actual = vec![
            "Birthday Club".to_string(),
            "VIP".to_string(),
            "Summer 2025 - Promo".to_string(),
        ];
        let d = diff(&[], &actual, &guard);
        assert!(d.to_remove.is_empty(), "native tags in remove set: {d:?}");
    }

    #[test]
    fn diff_dedups_duplicate_directory_listings() {
        let guard = TagGuard::new(&[]);
        let actual = vec![
            "INACTIVITY - 14 days".to_string(),
            "INACTIVITY - 14 days".to_string(),
        ];
        let d = diff(&[], &actual, &guard);
        assert_eq!(d.to_remove, vec!["INACTIVITY - 14 days"]);
    }

    #[test]
    fn diff_empty_when_in_sync() {
        let guard = TagGuard::new(&[]);
        let desired = vec!["ENGAGEMENT - High".to_string()];
        let actual = vec!["ENGAGEMENT - High".to_string(), "VIP".to_string()];
        assert!(diff(&desired, &actual, &guard).is_empty());
    }

    // -- reconcile ----------------------------------------------------------

    #[tokio::test]
    async fn reconcile_applies_decision_tags() {
        let mut e = enrollment();
        e.last_activity_at = Some(now() - Duration::days(30));
        let r = reconciler(InMemoryDirectory::new());
        let result = r.reconcile(&e, now()).await;
        assert!(result.success);
        assert!(result
            .tags_applied
            .contains(&"INACTIVITY - 30 days".to_string()));
        assert!(result.tags_removed.is_empty());
    }

    #[tokio::test]
    async fn reconcile_is_idempotent() {
        let mut e = enrollment();
        e.last_activity_at = Some(now() - Duration::days(30));
        let r = reconciler(InMemoryDirectory::new());

        let first = r.reconcile(&e, now()).await;
        assert!(first.success);
        let mutations_after_first = r.directory().mutation_count();
        assert!(mutations_after_first > 0);

        let second = r.reconcile(&e, now()).await;
        assert!(second.success);
        assert!(second.tags_applied.is_empty());
        assert!(second.tags_removed.is_empty());
        assert_eq!(
            r.directory().mutation_count(),
            mutations_after_first,
            "second run must perform zero external mutations"
        );
    }

    #[tokio::test]
    async fn reconcile_adds_before_removes() {
        let mut e = enrollment();
        e.last_activity_at = Some(now() - Duration::days(30));
        let dir =
            InMemoryDirectory::with_tags("ada@example.com", &["INACTIVITY - 14 days", "VIP"]);
        let r = reconciler(dir);
        let result = r.reconcile(&e, now()).await;
        assert!(result.success);

        let log = r.directory().mutation_log();
        let first_add = log.iter().position(|(op, _, _)| op == "add").unwrap();
        let first_remove = log.iter().position(|(op, _, _)| op == "remove").unwrap();
        assert!(first_add < first_remove, "additions must precede removals");
        assert!(r.directory().tags_for("ada@example.com").contains(&"VIP".to_string()));
    }

    #[tokio::test]
    async fn partial_failure_reports_per_tag_detail() {
        // Scenario: the add fails while the remove succeeds; the result is
        // success=false, the removal is reported, and the failure names
        // only the failed add.
        let mut e = enrollment();
        e.last_activity_at = Some(now() - Duration::days(30));
        let dir = InMemoryDirectory::with_tags("ada@example.com", &["INACTIVITY - 14 days"]);
        dir.fail_add("INACTIVITY - 30 days");
        let r = reconciler(dir);
        let result = r.reconcile(&e, now()).await;

        assert!(!result.success);
        assert_eq!(result.tags_removed, vec!["INACTIVITY - 14 days"]);
        assert!(!result
            .tags_applied
            .contains(&"INACTIVITY - 30 days".to_string()));
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].op, TagOp::Add);
        assert_eq!(result.failures[0].tag, "INACTIVITY - 30 days");
    }

    #[tokio::test]
    async fn one_failed_op_does_not_abort_the_rest() {
        let mut e = enrollment();
        e.last_activity_at = Some(now() - Duration::days(30));
        e.progress_percentage = 60.0;
        let dir = InMemoryDirectory::new();
        dir.fail_add("INACTIVITY - 30 days");
        let r = reconciler(dir);
        let result = r.reconcile(&e, now()).await;

        assert!(!result.success);
        // The progress tag still went through.
        assert!(result
            .tags_applied
            .contains(&"PROGRESS - 50% Reached".to_string()));
    }

    #[tokio::test]
    async fn native_tags_survive_reconciliation() {
        let mut e = enrollment();
        e.manually_inactivated = true;
        let dir = InMemoryDirectory::with_tags(
            "ada@example.com",
            &["Birthday Club", "ENGAGEMENT - High"],
        );
        let r = reconciler(dir);
        let result = r.reconcile(&e, now()).await;
        assert!(result.success);

        let remaining = r.directory().tags_for("ada@example.com");
        assert!(remaining.contains(&"Birthday Club".to_string()));
        assert!(!remaining.contains(&"ENGAGEMENT - High".to_string()));
        assert!(remaining.contains(&"ACCOUNT - Manually Inactivated".to_string()));
    }

    #[tokio::test]
    async fn dry_run_reports_diff_without_mutations() {
        let mut e = enrollment();
        e.last_activity_at = Some(now() - Duration::days(30));
        let dir = InMemoryDirectory::with_tags("ada@example.com", &["INACTIVITY - 14 days"]);
        let r = reconciler(dir).with_dry_run(true);
        let result = r.reconcile(&e, now()).await;

        assert!(result.success);
        assert!(result.dry_run);
        assert_eq!(result.tags_applied, vec!["INACTIVITY - 30 days"]);
        assert_eq!(result.tags_removed, vec!["INACTIVITY - 14 days"]);
        assert_eq!(r.directory().mutation_count(), 0);
    }

    #[tokio::test]
    async fn in_sync_enrollment_performs_no_calls() {
        let mut e = enrollment();
        e.manually_inactivated = true;
        let dir = InMemoryDirectory::with_tags(
            "ada@example.com",
            &["ACCOUNT - Manually Inactivated", "VIP"],
        );
        let r = reconciler(dir);
        let result = r.reconcile(&e, now()).await;
        assert!(result.success);
        assert_eq!(r.directory().mutation_count(), 0);
    }

    // -- SyncService --------------------------------------------------------

    #[tokio::test]
    async fn service_reconciles_by_enrollment_key() {
        let mut e = enrollment();
        e.last_activity_at = Some(now() - Duration::days(7));
        let store = JsonFileStore::from_records(vec![e]);
        let service = SyncService::new(store, reconciler(InMemoryDirectory::new()));

        let result = service
            .reconcile_enrollment("lrn-1", "course-42", now())
            .await
            .unwrap();
        assert!(result.success);
        assert!(result
            .tags_applied
            .contains(&"INACTIVITY - 7 days".to_string()));
    }

    #[tokio::test]
    async fn service_surfaces_not_found() {
        let store = JsonFileStore::from_records(vec![]);
        let service = SyncService::new(store, reconciler(InMemoryDirectory::new()));
        let err = service
            .reconcile_enrollment("ghost", "course-0", now())
            .await
            .unwrap_err();
        assert!(matches!(err, TagSyncError::EnrollmentNotFound { .. }));
    }
}
