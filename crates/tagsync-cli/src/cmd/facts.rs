use crate::context::AppContext;
use crate::output::print_json;
use anyhow::Context as _;
use chrono::Utc;
use std::path::Path;
use tagsync_core::engagement::{compute_facts, DaysInactive};
use tagsync_core::store::EnrollmentStore;

pub fn run(config_path: &Path, learner: &str, offering: &str, json: bool) -> anyhow::Result<()> {
    let ctx = AppContext::load(config_path)?;
    let store = ctx.store()?;
    let enrollment = store
        .get(learner, offering)
        .with_context(|| format!("enrollment '{learner}' / '{offering}'"))?;

    let facts = compute_facts(&enrollment, Utc::now(), ctx.config.completion_stall_days);

    if json {
        print_json(&facts)?;
        return Ok(());
    }

    println!(
        "Enrollment:  {} / {} ({})",
        enrollment.learner_id, enrollment.offering_id, enrollment.email
    );
    println!("Status:      {}", enrollment.status);
    let days = match facts.days_inactive {
        DaysInactive::Known(d) => d.to_string(),
        DaysInactive::Unknown => "unknown (no activity recorded)".to_string(),
    };
    println!("Inactive:    {days} days");
    println!(
        "Score:       {} ({})",
        facts.engagement_score, facts.engagement_level
    );
    println!("Progress:    {:.1}%", facts.progress_percentage);
    match facts.completion_milestone {
        Some(ref unit) => println!("Stalled:     after unit '{unit}'"),
        None => println!("Stalled:     no"),
    }
    Ok(())
}
