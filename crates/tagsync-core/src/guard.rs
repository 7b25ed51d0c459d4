use crate::types::RuleCategory;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// TagClass
// ---------------------------------------------------------------------------

/// Classification of a tag string as owned by this system or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum TagClass {
    /// Produced by this system: `"<PREFIX> - <description>"` with a known
    /// prefix.
    Managed { prefix: String },
    /// Anything else. Native tags are invariant under reconciliation and
    /// must never be submitted for removal.
    Native,
}

impl TagClass {
    pub fn is_managed(&self) -> bool {
        matches!(self, TagClass::Managed { .. })
    }
}

// ---------------------------------------------------------------------------
// TagGuard
// ---------------------------------------------------------------------------

/// Classifies tags by the managed naming convention.
///
/// Built fresh for every reconciliation run from the current prefix set
/// (category prefixes plus config-extendable product prefixes) — prefix
/// additions must take effect without restarting a long-lived process, so
/// classification is never cached across runs.
pub struct TagGuard {
    prefixes: Vec<String>,
}

/// Separator between prefix and description in a managed tag.
const SEPARATOR: &str = " - ";

impl TagGuard {
    /// `extra_prefixes` extends the built-in category prefixes with product
    /// prefixes from config.
    pub fn new(extra_prefixes: &[String]) -> Self {
        let mut prefixes: Vec<String> = RuleCategory::all()
            .iter()
            .map(|c| c.prefix().to_string())
            .collect();
        for p in extra_prefixes {
            let trimmed = p.trim();
            if !trimmed.is_empty() && !prefixes.iter().any(|x| x == trimmed) {
                prefixes.push(trimmed.to_string());
            }
        }
        Self { prefixes }
    }

    pub fn classify(&self, tag: &str) -> TagClass {
        match tag.split_once(SEPARATOR) {
            Some((prefix, description))
                if !description.trim().is_empty()
                    && self.prefixes.iter().any(|p| p == prefix) =>
            {
                TagClass::Managed {
                    prefix: prefix.to_string(),
                }
            }
            _ => TagClass::Native,
        }
    }

    pub fn is_managed(&self, tag: &str) -> bool {
        self.classify(tag).is_managed()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
