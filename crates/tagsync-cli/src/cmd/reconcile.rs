use crate::context::AppContext;
use crate::output::print_json;
use chrono::Utc;
use std::path::Path;
use tagsync_core::reconcile::{ReconciliationResult, SyncService};

pub fn run(
    config_path: &Path,
    learner: &str,
    offering: &str,
    dry_run: bool,
    json: bool,
) -> anyhow::Result<()> {
    let ctx = AppContext::load(config_path)?;
    let service = SyncService::new(ctx.store()?, ctx.reconciler(dry_run)?);

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(service.reconcile_enrollment(learner, offering, Utc::now()))?;

    if json {
        print_json(&result)?;
    } else {
        print_result(&result);
    }

    if !result.success {
        anyhow::bail!("reconciliation completed with failures");
    }
    Ok(())
}

fn print_result(result: &ReconciliationResult) {
    println!(
        "Contact:  {} ({} / {})",
        result.contact, result.learner_id, result.offering_id
    );
    let list = |tags: &[String]| {
        if tags.is_empty() {
            "(none)".to_string()
        } else {
            tags.join(", ")
        }
    };
    println!("Applied:  {}", list(&result.tags_applied));
    println!("Removed:  {}", list(&result.tags_removed));
    for failure in &result.failures {
        println!("Failed:   {} '{}': {}", failure.op, failure.tag, failure.error);
    }
    if let Some(ref error) = result.error {
        println!("Error:    {error}");
    }
    let status = if !result.success {
        "FAILED"
    } else if result.dry_run {
        "dry-run (no CRM mutations sent)"
    } else {
        "ok"
    };
    println!("Status:   {status}");
}
