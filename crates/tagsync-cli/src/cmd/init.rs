use anyhow::Context;
use std::path::{Path, PathBuf};
use tagsync_core::catalog::default_catalog;
use tagsync_core::config::Config;
use tagsync_core::io::write_if_missing;

/// Scaffold `tagsync.yaml` and `rules.yaml` next to it. Existing files are
/// left untouched so re-running is safe.
pub fn run(config_path: &Path, crm_url: &str) -> anyhow::Result<()> {
    let base = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let mut config = Config::new(crm_url);
    config.catalog_path = Some(PathBuf::from("rules.yaml"));

    let config_yaml = serde_yaml::to_string(&config)?;
    let wrote_config = write_if_missing(config_path, config_yaml.as_bytes())
        .with_context(|| format!("failed to write '{}'", config_path.display()))?;

    let catalog_path = base.join("rules.yaml");
    let catalog_yaml = serde_yaml::to_string(&default_catalog())?;
    let wrote_catalog = write_if_missing(&catalog_path, catalog_yaml.as_bytes())
        .with_context(|| format!("failed to write '{}'", catalog_path.display()))?;

    let describe = |wrote: bool, path: &Path| {
        if wrote {
            println!("Created {}", path.display());
        } else {
            println!("Kept existing {}", path.display());
        }
    };
    describe(wrote_config, config_path);
    describe(wrote_catalog, &catalog_path);

    println!();
    println!(
        "Export {} before running reconcile or batch.",
        config.crm.api_key_env
    );
    Ok(())
}
