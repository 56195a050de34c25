//! Session log store — append-only persistence for session summaries.
//!
//! The core only ever appends; reading, rotation and retention are someone
//! else's problem behind the trait.  The JSON-file implementation keeps one
//! document per log file, summaries grouped by namespace, in the same
//! dirs-resolved config directory as the settings file.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::session::SessionSummary;

// ---------------------------------------------------------------------------
// SessionLogStore
// ---------------------------------------------------------------------------

/// Append-only sink for finished-session summaries.
#[async_trait]
pub trait SessionLogStore: Send + Sync {
    /// Append one summary under `namespace`.
    async fn append(&self, namespace: &str, summary: &SessionSummary) -> Result<()>;
}

// ---------------------------------------------------------------------------
// JsonFileLogStore
// ---------------------------------------------------------------------------

/// File-backed store: `{ namespace: [summary, …] }` as pretty JSON.
pub struct JsonFileLogStore {
    path: PathBuf,
}

impl JsonFileLogStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_all(&self) -> Result<HashMap<String, Vec<SessionSummary>>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read session log {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse session log {}", self.path.display()))
    }
}

#[async_trait]
impl SessionLogStore for JsonFileLogStore {
    async fn append(&self, namespace: &str, summary: &SessionSummary) -> Result<()> {
        let mut all = self.read_all()?;
        all.entry(namespace.to_owned())
            .or_default()
            .push(summary.clone());

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create log directory {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(&all)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("failed to write session log {}", self.path.display()))?;

        log::info!("session summary appended to {} ({namespace})", self.path.display());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryLogStore (tests)
// ---------------------------------------------------------------------------

/// In-memory store for tests.
#[cfg(test)]
pub struct MemoryLogStore {
    pub appended: std::sync::Mutex<Vec<(String, SessionSummary)>>,
}

#[cfg(test)]
impl MemoryLogStore {
    pub fn new() -> Self {
        Self {
            appended: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl SessionLogStore for MemoryLogStore {
    async fn append(&self, namespace: &str, summary: &SessionSummary) -> Result<()> {
        self.appended
            .lock()
            .unwrap()
            .push((namespace.to_owned(), summary.clone()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(total_words: u64) -> SessionSummary {
        SessionSummary {
            duration_ms: 60_000,
            total_words,
            distinct_vocabulary: 4,
            mean_confidence: 0.9,
            mission_total: 3,
            mission_completed: 2,
        }
    }

    #[tokio::test]
    async fn appends_accumulate_per_namespace() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileLogStore::new(dir.path().join("session-log.json"));

        store.append("daily", &summary(10)).await.expect("first");
        store.append("daily", &summary(20)).await.expect("second");
        store.append("exam", &summary(5)).await.expect("third");

        let all = store.read_all().expect("read back");
        assert_eq!(all["daily"].len(), 2);
        assert_eq!(all["daily"][1].total_words, 20);
        assert_eq!(all["exam"].len(), 1);
    }

    #[tokio::test]
    async fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileLogStore::new(dir.path().join("nested/deeper/log.json"));

        store.append("daily", &summary(1)).await.expect("append");
        assert_eq!(store.read_all().expect("read")["daily"].len(), 1);
    }

    #[tokio::test]
    async fn memory_store_records_appends() {
        let store = MemoryLogStore::new();
        store.append("daily", &summary(7)).await.expect("append");

        let appended = store.appended.lock().unwrap();
        assert_eq!(appended.len(), 1);
        assert_eq!(appended[0].0, "daily");
        assert_eq!(appended[0].1.total_words, 7);
    }
}
