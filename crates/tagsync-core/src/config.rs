use crate::catalog::{default_catalog, RuleCatalog};
use crate::error::{Result, TagSyncError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// CrmConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmConfig {
    pub base_url: String,
    /// Name of the environment variable holding the API key. The key itself
    /// never lives in the config file.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Retry budget for transient errors, on top of the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

fn default_api_key_env() -> String {
    "TAGSYNC_CRM_API_KEY".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    500
}

// ---------------------------------------------------------------------------
// BatchConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Global deadline for a batch run; enrollments still queued when it
    /// expires are skipped, in-flight ones finish.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

fn default_parallelism() -> usize {
    4
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            timeout_seconds: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub crm: CrmConfig,
    /// Extra managed-tag prefixes beyond the built-in category prefixes
    /// (new product categories).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub managed_prefixes: Vec<String>,
    #[serde(default)]
    pub batch: BatchConfig,
    /// Rule catalog file; the built-in default catalog is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_path: Option<PathBuf>,
    #[serde(default = "default_stall_days")]
    pub completion_stall_days: u32,
    #[serde(default = "default_snapshot")]
    pub enrollment_snapshot: PathBuf,
}

fn default_version() -> u32 {
    1
}

fn default_stall_days() -> u32 {
    14
}

fn default_snapshot() -> PathBuf {
    PathBuf::from("enrollments.json")
}

impl Config {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            version: 1,
            crm: CrmConfig {
                base_url: base_url.into(),
                api_key_env: default_api_key_env(),
                timeout_seconds: default_timeout(),
                max_retries: default_max_retries(),
                backoff_base_ms: default_backoff_base_ms(),
            },
            managed_prefixes: Vec::new(),
            batch: BatchConfig::default(),
            catalog_path: None,
            completion_stall_days: default_stall_days(),
            enrollment_snapshot: default_snapshot(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TagSyncError::NotConfigured);
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    /// Load the configured catalog, falling back to the built-in rules.
    /// `base` resolves a relative `catalog_path` against the config file's
    /// directory.
    pub fn load_catalog(&self, base: &Path) -> Result<RuleCatalog> {
        match &self.catalog_path {
            Some(path) => {
                let resolved = if path.is_absolute() {
                    path.clone()
                } else {
                    base.join(path)
                };
                RuleCatalog::load(&resolved)
            }
            None => Ok(default_catalog()),
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.crm.base_url.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "crm.base_url is empty".to_string(),
            });
        } else if !self.crm.base_url.starts_with("http://")
            && !self.crm.base_url.starts_with("https://")
        {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!("crm.base_url '{}' is not an http(s) URL", self.crm.base_url),
            });
        }

        if self.batch.parallelism == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "batch.parallelism must be at least 1".to_string(),
            });
        } else if self.batch.parallelism > 32 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "batch.parallelism={} (>32 is unusual and likely to hit CRM rate limits)",
                    self.batch.parallelism
                ),
            });
        }

        if self.crm.max_retries > 10 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!("crm.max_retries={} (>10 is unusual)", self.crm.max_retries),
            });
        }

        for prefix in &self.managed_prefixes {
            if prefix.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: "managed_prefixes contains a blank entry".to_string(),
                });
            } else if prefix.chars().any(|c| c.is_lowercase()) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "managed prefix '{prefix}' is not uppercase — human-authored tags \
                         are more likely to collide with it"
                    ),
                });
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
