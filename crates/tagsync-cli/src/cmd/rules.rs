use crate::output::{print_json, print_table};
use std::path::Path;
use std::str::FromStr;
use tagsync_core::catalog::{default_catalog, RuleCatalog};
use tagsync_core::config::Config;
use tagsync_core::error::TagSyncError;
use tagsync_core::types::RuleCategory;

/// Works without a config file: falls back to the built-in catalog so rules
/// can be inspected before `tagsync init`.
pub fn run(config_path: &Path, category: Option<&str>, json: bool) -> anyhow::Result<()> {
    let catalog = load_catalog(config_path)?;
    let category = category.map(RuleCategory::from_str).transpose()?;

    let rules: Vec<_> = catalog
        .active_rules()
        .into_iter()
        .filter(|r| category.is_none_or(|c| r.category == c))
        .collect();

    if json {
        print_json(&rules)?;
        return Ok(());
    }

    if rules.is_empty() {
        println!("No active rules match.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = rules
        .iter()
        .map(|r| {
            vec![
                r.id.clone(),
                r.category.to_string(),
                r.priority.to_string(),
                r.tag.clone(),
            ]
        })
        .collect();
    print_table(&["ID", "CATEGORY", "PRIORITY", "TAG"], rows);
    Ok(())
}

fn load_catalog(config_path: &Path) -> anyhow::Result<RuleCatalog> {
    match Config::load(config_path) {
        Ok(config) => {
            let base = config_path.parent().unwrap_or(Path::new("."));
            Ok(config.load_catalog(base)?)
        }
        Err(TagSyncError::NotConfigured) => Ok(default_catalog()),
        Err(e) => Err(e.into()),
    }
}
