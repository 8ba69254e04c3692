//! Per-command-id output store: maps a command id to its ordered chunk
//! list, with indexed read and finalize (spec §4.3).

use std::collections::HashMap;

use tokio::sync::Mutex;

/// A stored, chunked command reply awaiting paged retrieval.
struct Entry {
    chunks: Vec<String>,
}

/// Mutex-guarded `id -> chunks` table.
///
/// All operations are O(1) critical sections, so the mutex is held only for
/// the duration of a map lookup/insert/removal — it never blocks on I/O.
#[derive(Default)]
pub struct OutputStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl OutputStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any prior entry for `id` with `chunks`.
    pub async fn store(&self, id: &str, chunks: Vec<String>) {
        self.entries
            .lock()
            .await
            .insert(id.to_string(), Entry { chunks });
    }

    /// Returns `(chunk_at_index, total_count)`.
    ///
    /// `total_count` is 0 if `id` is unknown. If `index` is out of range
    /// for a known `id`, the chunk is `None` but `total_count` still
    /// reflects the stored count.
    pub async fn get(&self, id: &str, index: usize) -> (Option<String>, usize) {
        let entries = self.entries.lock().await;
        match entries.get(id) {
            Some(entry) => (entry.chunks.get(index).cloned(), entry.chunks.len()),
            None => (None, 0),
        }
    }

    /// Removes the entry for `id`. Idempotent — removing a missing id is a
    /// no-op.
    pub async fn finalize(&self, id: &str) {
        self.entries.lock().await.remove(id);
    }
}
