use anyhow::Context as _;
use crm_client::CrmClient;
use std::path::{Path, PathBuf};
use tagsync_core::catalog::RuleCatalog;
use tagsync_core::config::Config;
use tagsync_core::decision::DecisionEngine;
use tagsync_core::reconcile::Reconciler;
use tagsync_core::store::JsonFileStore;

/// Config plus the directory it was loaded from, so relative paths in it
/// (catalog, enrollment snapshot) resolve against the config file rather
/// than the process working directory.
pub struct AppContext {
    pub config: Config,
    base_dir: PathBuf,
}

impl AppContext {
    pub fn load(config_path: &Path) -> anyhow::Result<Self> {
        let config = Config::load(config_path)
            .with_context(|| format!("failed to load config '{}'", config_path.display()))?;
        let base_dir = config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .to_path_buf();
        Ok(Self { config, base_dir })
    }

    pub fn catalog(&self) -> anyhow::Result<RuleCatalog> {
        self.config
            .load_catalog(&self.base_dir)
            .context("failed to load rule catalog")
    }

    pub fn store(&self) -> anyhow::Result<JsonFileStore> {
        let path = self.resolve(&self.config.enrollment_snapshot);
        JsonFileStore::load(&path).with_context(|| {
            format!("failed to load enrollment snapshot '{}'", path.display())
        })
    }

    pub fn reconciler(&self, dry_run: bool) -> anyhow::Result<Reconciler<CrmClient>> {
        let client = CrmClient::from_config(&self.config.crm)
            .context("failed to build CRM client")?;
        let engine = DecisionEngine::new(self.catalog()?);
        Ok(Reconciler::new(client, engine)
            .with_extra_prefixes(self.config.managed_prefixes.clone())
            .with_stall_days(self.config.completion_stall_days)
            .with_dry_run(dry_run))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}
