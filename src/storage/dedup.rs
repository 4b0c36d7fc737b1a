//! Append-only store of previously emitted configs.
//!
//! One config per line, in first-seen order across all runs. A run reads the
//! whole file, computes additions in memory and performs a single append, so
//! two processes sharing a file need an external lock.

use std::collections::HashSet;

use super::LocalStorage;
use crate::error::Result;

/// Durable set of unique configs.
#[derive(Debug, Clone)]
pub struct DedupStore {
    storage: LocalStorage,
    key: String,
}

impl DedupStore {
    pub fn new(storage: LocalStorage, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    /// Stored entries in file order. A missing file is an empty store.
    pub async fn load(&self) -> Result<Vec<String>> {
        let text = self.storage.read_text(&self.key).await?.unwrap_or_default();
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }

    /// Number of unique entries on disk.
    pub async fn len(&self) -> Result<usize> {
        let entries = self.load().await?;
        Ok(entries.iter().collect::<HashSet<_>>().len())
    }

    /// Append candidates not yet stored; returns how many were added.
    pub async fn append_unique(&self, candidates: &[String]) -> Result<usize> {
        let mut existing: HashSet<String> = self.load().await?.into_iter().collect();

        let mut buffer = String::new();
        let mut added = 0;
        for candidate in candidates {
            let candidate = candidate.trim();
            if candidate.is_empty() || existing.contains(candidate) {
                continue;
            }
            existing.insert(candidate.to_string());
            buffer.push_str(candidate);
            buffer.push('\n');
            added += 1;
        }

        if added > 0 {
            let needs_newline = self
                .storage
                .read_bytes(&self.key)
                .await?
                .is_some_and(|bytes| !bytes.is_empty() && !bytes.ends_with(b"\n"));
            if needs_newline {
                buffer.insert(0, '\n');
            }
            self.storage.append_bytes(&self.key, buffer.as_bytes()).await?;
        }

        log::info!(
            "Dedup store: {} new configs added | {} total unique",
            added,
            existing.len()
        );
        Ok(added)
    }
}
