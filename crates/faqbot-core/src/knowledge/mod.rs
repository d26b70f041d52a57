//! Knowledge base snapshot
//!
//! The core never owns FAQ storage. It reads an immutable snapshot of
//! knowledge entries that the caller refreshes by building a new snapshot
//! and swapping it into the [`SnapshotStore`].

mod search;

pub use search::keyword_search;

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Publication status of a knowledge entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Draft => "draft",
            EntryStatus::Published => "published",
            EntryStatus::Archived => "archived",
        }
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stored question/answer pair eligible for retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub id: u64,
    #[serde(default)]
    pub category_id: Option<u64>,
    pub question: String,
    pub answer: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub status: EntryStatus,
    /// Absent vectors exclude the entry from semantic ranking only
    #[serde(default)]
    pub question_vector: Option<Vec<f32>>,
    #[serde(default)]
    pub answer_vector: Option<Vec<f32>>,
    /// Embedding provider that produced the stored vectors, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_provider: Option<String>,
}

fn default_language() -> String {
    "en".to_string()
}

impl KnowledgeEntry {
    /// Create a draft entry without vectors
    pub fn new(id: u64, question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            id,
            category_id: None,
            question: question.into(),
            answer: answer.into(),
            language: default_language(),
            status: EntryStatus::Draft,
            question_vector: None,
            answer_vector: None,
            vector_provider: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_status(mut self, status: EntryStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_category(mut self, category_id: u64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_vectors(mut self, question: Option<Vec<f32>>, answer: Option<Vec<f32>>) -> Self {
        self.question_vector = question;
        self.answer_vector = answer;
        self
    }

    /// Whether the stored vectors live in the same space as a query embedded by `provider`
    ///
    /// Entries with no recorded provider are always comparable.
    pub fn comparable_with(&self, provider: &str) -> bool {
        self.vector_provider.as_deref().is_none_or(|p| p == provider)
    }

    pub fn is_published(&self) -> bool {
        self.status == EntryStatus::Published
    }

    /// Published, in the requested language, and inside the category filter if one is given
    pub fn is_eligible(&self, language: &str, category_id: Option<u64>) -> bool {
        self.is_published()
            && self.language == language
            && category_id.is_none_or(|c| self.category_id == Some(c))
    }
}

/// Immutable set of knowledge entries shared by concurrent requests
#[derive(Debug, Clone, Default)]
pub struct KnowledgeSnapshot {
    entries: Vec<KnowledgeEntry>,
    version: u64,
    loaded_at: Option<DateTime<Utc>>,
}

impl KnowledgeSnapshot {
    pub fn new(entries: Vec<KnowledgeEntry>) -> Self {
        Self {
            entries,
            version: 0,
            loaded_at: Some(Utc::now()),
        }
    }

    pub fn entries(&self) -> &[KnowledgeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Store-assigned version, incremented on every swap
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    pub fn get(&self, id: u64) -> Option<&KnowledgeEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Entries eligible for retrieval in the given language and optional category
    pub fn eligible<'a, 'l>(
        &'a self,
        language: &'l str,
        category_id: Option<u64>,
    ) -> impl Iterator<Item = &'a KnowledgeEntry> {
        self.entries
            .iter()
            .filter(move |e| e.is_eligible(language, category_id))
    }
}

impl From<Vec<KnowledgeEntry>> for KnowledgeSnapshot {
    fn from(entries: Vec<KnowledgeEntry>) -> Self {
        Self::new(entries)
    }
}

/// Holder of the current snapshot; single writer, copy-then-swap
///
/// Readers clone the inner `Arc` and keep using their snapshot even if a
/// refresh lands mid-request. The lock is only held for the pointer swap.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: RwLock<Arc<KnowledgeSnapshot>>,
}

impl SnapshotStore {
    pub fn new(snapshot: KnowledgeSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// The snapshot currently published to readers
    pub fn current(&self) -> Arc<KnowledgeSnapshot> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Publish a fully built snapshot, returning the version it was assigned
    pub fn replace(&self, mut snapshot: KnowledgeSnapshot) -> u64 {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        snapshot.version = guard.version + 1;
        let version = snapshot.version;
        let entries = snapshot.len();
        *guard = Arc::new(snapshot);
        drop(guard);

        info!(version, entries, "Knowledge snapshot replaced");
        version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: u64, language: &str, status: EntryStatus) -> KnowledgeEntry {
        KnowledgeEntry::new(id, format!("q{}", id), format!("a{}", id))
            .with_language(language)
            .with_status(status)
    }

    #[test]
    fn test_entry_deserialization_defaults() {
        let json = r#"{"id": 7, "question": "How?", "answer": "Like this."}"#;
        let entry: KnowledgeEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.language, "en");
        assert_eq!(entry.status, EntryStatus::Draft);
        assert!(entry.question_vector.is_none());
        assert!(entry.category_id.is_none());
        assert!(entry.vector_provider.is_none());
    }

    #[test]
    fn test_comparable_with_recorded_provider() {
        let unknown = entry(1, "en", EntryStatus::Published);
        assert!(unknown.comparable_with("structural"));

        let mut local = entry(2, "en", EntryStatus::Published);
        local.vector_provider = Some("local".to_string());
        assert!(local.comparable_with("local"));
        assert!(!local.comparable_with("structural"));

        let json = serde_json::to_value(&unknown).unwrap();
        assert!(json.get("vector_provider").is_none());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&EntryStatus::Published).unwrap();
        assert_eq!(json, "\"published\"");
        assert_eq!(EntryStatus::Archived.to_string(), "archived");
    }

    #[test]
    fn test_eligibility_filters_status_language_and_category() {
        let snapshot = KnowledgeSnapshot::new(vec![
            entry(1, "en", EntryStatus::Published).with_category(10),
            entry(2, "en", EntryStatus::Draft),
            entry(3, "es", EntryStatus::Published),
            entry(4, "en", EntryStatus::Archived),
            entry(5, "en", EntryStatus::Published).with_category(20),
        ]);

        let ids: Vec<u64> = snapshot.eligible("en", None).map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 5]);

        let ids: Vec<u64> = snapshot.eligible("en", Some(20)).map(|e| e.id).collect();
        assert_eq!(ids, vec![5]);

        let ids: Vec<u64> = snapshot.eligible("es", None).map(|e| e.id).collect();
        assert_eq!(ids, vec![3]);
    }

    #[test]
    fn test_store_swap_keeps_old_readers_consistent() {
        let store = SnapshotStore::new(KnowledgeSnapshot::new(vec![entry(
            1,
            "en",
            EntryStatus::Published,
        )]));

        let before = store.current();
        let version = store.replace(KnowledgeSnapshot::new(vec![
            entry(2, "en", EntryStatus::Published),
            entry(3, "en", EntryStatus::Published),
        ]));

        assert_eq!(version, 1);
        assert_eq!(before.len(), 1);
        assert!(before.get(1).is_some());

        let after = store.current();
        assert_eq!(after.len(), 2);
        assert_eq!(after.version(), 1);
        assert!(after.get(1).is_none());
    }

    #[test]
    fn test_store_versions_increase() {
        let store = SnapshotStore::default();
        assert!(store.current().is_empty());
        assert_eq!(store.replace(KnowledgeSnapshot::default()), 1);
        assert_eq!(store.replace(KnowledgeSnapshot::default()), 2);
    }

    #[test]
    fn test_store_is_shareable_across_threads() {
        let store = Arc::new(SnapshotStore::default());
        let handles: Vec<_> = (0..4u64)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store.replace(KnowledgeSnapshot::new(vec![entry(
                        i,
                        "en",
                        EntryStatus::Published,
                    )]));
                    store.current().len()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 1);
        }
        assert_eq!(store.current().version(), 4);
    }
}
