use crate::context::AppContext;
use crate::output::print_json;
use clap::Subcommand;
use std::path::Path;
use tagsync_core::config::WarnLevel;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show the resolved config
    Show,

    /// Validate the config for common mistakes
    Validate,
}

pub fn run(config_path: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(config_path, json),
        ConfigSubcommand::Validate => validate(config_path, json),
    }
}

fn show(config_path: &Path, json: bool) -> anyhow::Result<()> {
    let ctx = AppContext::load(config_path)?;
    if json {
        print_json(&ctx.config)?;
    } else {
        print!("{}", serde_yaml::to_string(&ctx.config)?);
    }
    Ok(())
}

fn validate(config_path: &Path, json: bool) -> anyhow::Result<()> {
    let ctx = AppContext::load(config_path)?;
    let warnings = ctx.config.validate();

    if json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    // The catalog is part of the operational config; a broken rules file
    // should fail validation too.
    ctx.catalog()?;

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}
