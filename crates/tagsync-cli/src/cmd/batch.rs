use crate::context::AppContext;
use crate::output::{print_json, print_table};
use anyhow::Context as _;
use chrono::Utc;
use futures::StreamExt;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tagsync_core::directory::TagDirectory;
use tagsync_core::enrollment::Enrollment;
use tagsync_core::reconcile::{ReconciliationResult, Reconciler};
use tagsync_core::store::{BatchFilter, EnrollmentStore};
use tagsync_core::types::EnrollmentStatus;

pub struct BatchArgs {
    pub status: Option<String>,
    pub offering: Option<String>,
    pub parallel: Option<usize>,
    pub timeout_seconds: Option<u64>,
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Queued enrollments abandoned when the global deadline expired.
    pub skipped: usize,
    pub quarantined: usize,
    pub tags_applied: usize,
    pub tags_removed: usize,
    pub dry_run: bool,
    pub results: Vec<ReconciliationResult>,
}

pub fn run(config_path: &Path, args: BatchArgs, json: bool) -> anyhow::Result<()> {
    let ctx = AppContext::load(config_path)?;

    let status = args
        .status
        .as_deref()
        .map(EnrollmentStatus::from_str)
        .transpose()
        .context("unrecognized --status value")?;
    let filter = BatchFilter {
        status,
        offering_id: args.offering,
    };

    let store = ctx.store()?;
    let enrollments = store.list(&filter)?;
    for (learner, reason) in store.quarantined() {
        tracing::warn!(%learner, %reason, "enrollment quarantined, not reconciled");
    }

    if enrollments.is_empty() && store.quarantined().is_empty() {
        println!("No enrollments match the filter.");
        return Ok(());
    }

    let reconciler = ctx.reconciler(args.dry_run)?;
    let parallelism = args
        .parallel
        .unwrap_or(ctx.config.batch.parallelism)
        .max(1);
    let deadline = args
        .timeout_seconds
        .or(ctx.config.batch.timeout_seconds)
        .map(|secs| Instant::now() + Duration::from_secs(secs));

    let rt = tokio::runtime::Runtime::new()?;
    let mut summary = rt.block_on(run_batch(&reconciler, enrollments, parallelism, deadline));
    summary.quarantined = store.quarantined().len();
    summary.dry_run = args.dry_run;

    if json {
        print_json(&summary)?;
    } else {
        print_summary(&summary);
    }

    if summary.failed > 0 {
        anyhow::bail!("{} enrollment(s) failed to reconcile", summary.failed);
    }
    Ok(())
}

enum Outcome {
    Done(ReconciliationResult),
    Skipped,
}

/// Worker-pool driver. Enrollments are grouped by contact and each group is
/// reconciled sequentially inside one worker, so the same contact is never
/// reconciled concurrently; distinct contacts share nothing but the CRM's
/// rate limit. Once the deadline passes, queued enrollments are skipped —
/// in-flight ones run to completion, and nothing already sent is retracted.
async fn run_batch<D: TagDirectory>(
    reconciler: &Reconciler<D>,
    enrollments: Vec<Enrollment>,
    parallelism: usize,
    deadline: Option<Instant>,
) -> BatchSummary {
    let mut groups: BTreeMap<String, Vec<Enrollment>> = BTreeMap::new();
    for e in enrollments {
        groups.entry(e.email.clone()).or_default().push(e);
    }
    let total: usize = groups.values().map(Vec::len).sum();

    let outcomes: Vec<Vec<Outcome>> = futures::stream::iter(groups.into_values())
        .map(|group| async move {
            let mut outcomes = Vec::with_capacity(group.len());
            for enrollment in group {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    tracing::warn!(
                        learner = %enrollment.learner_id,
                        offering = %enrollment.offering_id,
                        "batch deadline expired, skipping"
                    );
                    outcomes.push(Outcome::Skipped);
                    continue;
                }
                outcomes.push(Outcome::Done(
                    reconciler.reconcile(&enrollment, Utc::now()).await,
                ));
            }
            outcomes
        })
        .buffer_unordered(parallelism)
        .collect()
        .await;

    let mut summary = BatchSummary {
        total,
        succeeded: 0,
        failed: 0,
        skipped: 0,
        quarantined: 0,
        tags_applied: 0,
        tags_removed: 0,
        dry_run: false,
        results: Vec::with_capacity(total),
    };
    for outcome in outcomes.into_iter().flatten() {
        match outcome {
            Outcome::Skipped => summary.skipped += 1,
            Outcome::Done(result) => {
                if result.success {
                    summary.succeeded += 1;
                } else {
                    summary.failed += 1;
                }
                summary.tags_applied += result.tags_applied.len();
                summary.tags_removed += result.tags_removed.len();
                summary.results.push(result);
            }
        }
    }
    // Deterministic ordering for output; workers finish in any order.
    summary
        .results
        .sort_by(|a, b| (&a.learner_id, &a.offering_id).cmp(&(&b.learner_id, &b.offering_id)));
    summary
}

fn print_summary(summary: &BatchSummary) {
    let rows: Vec<Vec<String>> = summary
        .results
        .iter()
        .map(|r| {
            vec![
                r.learner_id.clone(),
                r.offering_id.clone(),
                r.contact.clone(),
                r.tags_applied.len().to_string(),
                r.tags_removed.len().to_string(),
                if r.success {
                    "ok".to_string()
                } else {
                    "FAILED".to_string()
                },
            ]
        })
        .collect();
    print_table(
        &["LEARNER", "OFFERING", "CONTACT", "ADDED", "REMOVED", "STATUS"],
        rows,
    );

    println!();
    if summary.dry_run {
        println!("Dry run — no CRM mutations sent.");
    }
    println!(
        "{} total: {} ok, {} failed, {} skipped, {} quarantined ({} tags added, {} removed)",
        summary.total,
        summary.succeeded,
        summary.failed,
        summary.skipped,
        summary.quarantined,
        summary.tags_applied,
        summary.tags_removed
    );

    for result in summary.results.iter().filter(|r| !r.success) {
        if let Some(ref error) = result.error {
            println!("  {} / {}: {error}", result.learner_id, result.offering_id);
        }
        for failure in &result.failures {
            println!(
                "  {} / {}: {} '{}': {}",
                result.learner_id, result.offering_id, failure.op, failure.tag, failure.error
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
