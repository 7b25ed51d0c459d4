use std::future::Future;
use thiserror::Error;

// ---------------------------------------------------------------------------
// DirectoryError
// ---------------------------------------------------------------------------

/// Error surfaced by a tag directory implementation.
///
/// Transient errors have already exhausted the client's retry budget by the
/// time the reconciler sees them; the reconciler never retries on its own.
#[derive(Debug, Clone, Error)]
pub enum DirectoryError {
    #[error("transient directory error after {attempts} attempt(s): {message}")]
    Transient { message: String, attempts: u32 },

    #[error("permanent directory error (status {status}): {message}")]
    Permanent { status: u16, message: String },

    #[error("directory transport error: {0}")]
    Transport(String),
}

impl DirectoryError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DirectoryError::Transient { .. } | DirectoryError::Transport(_)
        )
    }
}

// ---------------------------------------------------------------------------
// TagDirectory
// ---------------------------------------------------------------------------

/// The external CRM's tag store, keyed by contact identity (email).
///
/// The directory has no notion of managed vs native tags — that distinction
/// is entirely internal (see `guard`). `get_tags` may return the same name
/// more than once when the CRM holds duplicate records; callers dedup.
pub trait TagDirectory {
    fn get_tags(
        &self,
        contact: &str,
    ) -> impl Future<Output = Result<Vec<String>, DirectoryError>> + Send;

    fn add_tag(
        &self,
        contact: &str,
        tag: &str,
    ) -> impl Future<Output = Result<(), DirectoryError>> + Send;

    fn remove_tag(
        &self,
        contact: &str,
        tag: &str,
    ) -> impl Future<Output = Result<(), DirectoryError>> + Send;
}

// ---------------------------------------------------------------------------
// InMemoryDirectory
// ---------------------------------------------------------------------------

/// In-process directory for tests and dry-run rehearsals: a mutation log,
/// per-tag failure injection, duplicate-listing simulation.
#[derive(Default)]
pub struct InMemoryDirectory {
    inner: std::sync::Mutex<InMemoryState>,
}

#[derive(Default)]
struct InMemoryState {
    tags: std::collections::HashMap<String, Vec<String>>,
    fail_adds: std::collections::HashSet<String>,
    fail_removes: std::collections::HashSet<String>,
    mutations: Vec<(String, String, String)>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tags(contact: &str, tags: &[&str]) -> Self {
        let dir = Self::new();
        dir.inner.lock().unwrap().tags.insert(
            contact.to_string(),
            tags.iter().map(|t| t.to_string()).collect(),
        );
        dir
    }

    /// Make every future `add_tag` for `tag` fail with a permanent error.
    pub fn fail_add(&self, tag: &str) {
        self.inner.lock().unwrap().fail_adds.insert(tag.to_string());
    }

    /// Make every future `remove_tag` for `tag` fail with a permanent error.
    pub fn fail_remove(&self, tag: &str) {
        self.inner
            .lock()
            .unwrap()
            .fail_removes
            .insert(tag.to_string());
    }

    pub fn tags_for(&self, contact: &str) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .tags
            .get(contact)
            .cloned()
            .unwrap_or_default()
    }

    /// (op, contact, tag) log of successful mutations, in order.
    pub fn mutation_log(&self) -> Vec<(String, String, String)> {
        self.inner.lock().unwrap().mutations.clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.inner.lock().unwrap().mutations.len()
    }
}

impl TagDirectory for InMemoryDirectory {
    async fn get_tags(&self, contact: &str) -> Result<Vec<String>, DirectoryError> {
        Ok(self.tags_for(contact))
    }

    async fn add_tag(&self, contact: &str, tag: &str) -> Result<(), DirectoryError> {
        let mut state = self.inner.lock().unwrap();
        if state.fail_adds.contains(tag) {
            return Err(DirectoryError::Permanent {
                status: 400,
                message: format!("add rejected for '{tag}'"),
            });
        }
        let entry = state.tags.entry(contact.to_string()).or_default();
        if !entry.iter().any(|t| t == tag) {
            entry.push(tag.to_string());
        }
        state
            .mutations
            .push(("add".into(), contact.into(), tag.into()));
        Ok(())
    }

    async fn remove_tag(&self, contact: &str, tag: &str) -> Result<(), DirectoryError> {
        let mut state = self.inner.lock().unwrap();
        if state.fail_removes.contains(tag) {
            return Err(DirectoryError::Permanent {
                status: 400,
                message: format!("remove rejected for '{tag}'"),
            });
        }
        if let Some(entry) = state.tags.get_mut(contact) {
            entry.retain(|t| t != tag);
        }
        state
            .mutations
            .push(("remove".into(), contact.into(), tag.into()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_then_remove_roundtrip() {
        let dir = InMemoryDirectory::new();
        dir.add_tag("ada@example.com", "VIP").await.unwrap();
        assert_eq!(dir.get_tags("ada@example.com").await.unwrap(), vec!["VIP"]);
        dir.remove_tag("ada@example.com", "VIP").await.unwrap();
        assert!(dir.get_tags("ada@example.com").await.unwrap().is_empty());
        assert_eq!(dir.mutation_count(), 2);
    }

    #[tokio::test]
    async fn injected_failures_surface_as_permanent() {
        let dir = InMemoryDirectory::new();
        dir.fail_add("INACTIVITY - 30 days");
        let err = dir
            .add_tag("ada@example.com", "INACTIVITY - 30 days")
            .await
            .unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn transient_classification() {
        assert!(DirectoryError::Transient {
            message: "503".into(),
            attempts: 3
        }
        .is_transient());
        assert!(DirectoryError::Transport("connection reset".into()).is_transient());
        assert!(!DirectoryError::Permanent {
            status: 422,
            message: "bad tag".into()
        }
        .is_transient());
    }
}
