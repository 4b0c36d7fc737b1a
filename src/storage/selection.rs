//! Persistent cache of chosen channels, keyed by account identity.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::LocalStorage;
use crate::error::Result;

/// One account's last selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionEntry {
    pub selected_at: DateTime<Utc>,
    pub channel_ids: Vec<i64>,
}

impl SelectionEntry {
    /// Non-empty and younger than `ttl_hours` (0 never expires).
    pub fn is_valid(&self, now: DateTime<Utc>, ttl_hours: i64) -> bool {
        if self.channel_ids.is_empty() {
            return false;
        }
        ttl_hours <= 0 || now - self.selected_at < Duration::hours(ttl_hours)
    }
}

/// On-disk format of the selection cache file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionCache {
    #[serde(default)]
    pub accounts: BTreeMap<String, SelectionEntry>,
}

/// Reads and writes the selection cache file.
#[derive(Debug, Clone)]
pub struct SelectionStore {
    storage: LocalStorage,
    key: String,
}

impl SelectionStore {
    pub fn new(storage: LocalStorage, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    /// Load the cache; missing or unreadable files count as empty.
    pub async fn load(&self) -> SelectionCache {
        match self.storage.read_json::<SelectionCache>(&self.key).await {
            Ok(Some(cache)) => cache,
            Ok(None) => SelectionCache::default(),
            Err(e) => {
                log::warn!("Failed to load selection cache {}: {}", self.key, e);
                SelectionCache::default()
            }
        }
    }

    pub async fn entry(&self, account: &str) -> Option<SelectionEntry> {
        self.load().await.accounts.remove(account)
    }

    /// Replace the entry for `account`, keeping other accounts intact.
    pub async fn save(&self, account: &str, entry: SelectionEntry) -> Result<()> {
        let mut cache = self.load().await;
        cache.accounts.insert(account.to_string(), entry);
        self.storage.write_json(&self.key, &cache).await?;
        log::info!("Saved selected chats to {}", self.storage.path(&self.key).display());
        Ok(())
    }
}
