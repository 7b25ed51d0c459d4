use crate::output::{print_json, print_table};
use std::path::Path;
use tagsync_core::config::Config;
use tagsync_core::error::TagSyncError;
use tagsync_core::guard::{TagClass, TagGuard};

/// Debug aid: show how the guard would classify tag strings under the
/// current prefix set. Works without a config file (built-in prefixes only).
pub fn run(config_path: &Path, tags: &[String], json: bool) -> anyhow::Result<()> {
    let extra_prefixes = match Config::load(config_path) {
        Ok(config) => config.managed_prefixes,
        Err(TagSyncError::NotConfigured) => Vec::new(),
        Err(e) => return Err(e.into()),
    };
    let guard = TagGuard::new(&extra_prefixes);

    if json {
        let value: Vec<serde_json::Value> = tags
            .iter()
            .map(|tag| {
                serde_json::json!({
                    "tag": tag,
                    "classification": guard.classify(tag),
                })
            })
            .collect();
        print_json(&value)?;
        return Ok(());
    }

    let rows: Vec<Vec<String>> = tags
        .iter()
        .map(|tag| {
            let class = match guard.classify(tag) {
                TagClass::Managed { prefix } => format!("managed ({prefix})"),
                TagClass::Native => "native (protected)".to_string(),
            };
            vec![tag.clone(), class]
        })
        .collect();
    print_table(&["TAG", "CLASSIFICATION"], rows);
    Ok(())
}
