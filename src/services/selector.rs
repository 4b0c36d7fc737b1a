// src/services/selector.rs

//! Channel selection service.
//!
//! Picks which channels to poll, either from the per-account cache or by
//! keyword relevance over the live channel listing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::PatternLibrary;
use crate::models::{Channel, ChannelKind, SelectionConfig};
use crate::storage::{SelectionEntry, SelectionStore};

/// Per-run selection knobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectOptions {
    /// 0 means no cap
    pub max_chats: usize,
    pub use_cache: bool,
    /// Skip persisting the selection
    pub dry_run: bool,
}

/// A channel with its relevance score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ranked<'a> {
    pub channel: &'a Channel,
    pub score: usize,
}

/// Service deciding which channels a run polls.
pub struct ChatSelector {
    patterns: Arc<PatternLibrary>,
    config: SelectionConfig,
}

impl ChatSelector {
    pub fn new(patterns: Arc<PatternLibrary>, config: SelectionConfig) -> Self {
        Self { patterns, config }
    }

    fn is_eligible(&self, channel: &Channel) -> bool {
        self.config.include_users || channel.kind != ChannelKind::User
    }

    /// Relevant channels, most keyword matches first, ties in listing order.
    pub fn rank<'a>(&self, available: &'a [Channel]) -> Vec<Ranked<'a>> {
        let mut ranked: Vec<Ranked<'a>> = available
            .iter()
            .filter(|c| self.is_eligible(c))
            .filter_map(|channel| {
                if self.config.no_keywords {
                    return Some(Ranked { channel, score: 0 });
                }
                let score = self.patterns.keyword_score(&channel.searchable_text());
                (score > 0).then_some(Ranked { channel, score })
            })
            .collect();

        // `sort_by` is stable, so equal scores keep listing order.
        ranked.sort_by(|a, b| b.score.cmp(&a.score));
        ranked
    }

    /// Fresh selection: ranked relevant channels, padded up to `max_chats`.
    pub fn choose(&self, available: &[Channel], max_chats: usize) -> Vec<Channel> {
        let ranked = self.rank(available);
        let relevant = ranked.len();

        let mut chosen: Vec<Channel> = ranked
            .into_iter()
            .map(|r| r.channel.clone())
            .take(if max_chats == 0 { usize::MAX } else { max_chats })
            .collect();

        if max_chats > 0 && chosen.len() < max_chats {
            let taken: HashSet<i64> = chosen.iter().map(|c| c.id).collect();
            let padding: Vec<Channel> = available
                .iter()
                .filter(|c| self.is_eligible(c) && !taken.contains(&c.id))
                .take(max_chats - chosen.len())
                .cloned()
                .collect();
            if !padding.is_empty() {
                log::info!(
                    "Only {} relevant chats; padding with {} from listing order",
                    relevant,
                    padding.len()
                );
            }
            chosen.extend(padding);
        }

        log::info!(
            "Dialogs scanned={} | matched={} | selected={}",
            available.len(),
            relevant,
            chosen.len()
        );
        chosen
    }

    /// Cached ids still present in `available`, in cached order.
    pub fn from_cache(
        &self,
        entry: &SelectionEntry,
        available: &[Channel],
        max_chats: usize,
    ) -> Vec<Channel> {
        let by_id: HashMap<i64, &Channel> = available.iter().map(|c| (c.id, c)).collect();
        let mut seen = HashSet::new();

        let accessible: Vec<Channel> = entry
            .channel_ids
            .iter()
            .filter(|id| seen.insert(**id))
            .filter_map(|id| by_id.get(id).map(|c| (*c).clone()))
            .collect();

        let dropped = seen.len() - accessible.len();
        if dropped > 0 {
            log::info!("Dropped {} cached chats no longer accessible", dropped);
        }

        let cap = if max_chats == 0 { usize::MAX } else { max_chats };
        accessible.into_iter().take(cap).collect()
    }

    /// Select channels for this run and persist a fresh choice.
    pub async fn select(
        &self,
        available: &[Channel],
        store: &SelectionStore,
        account: &str,
        options: SelectOptions,
        now: DateTime<Utc>,
    ) -> Vec<Channel> {
        if available.is_empty() {
            log::warn!("No dialogs available; nothing to collect");
            return Vec::new();
        }

        if options.use_cache {
            if let Some(entry) = store.entry(account).await {
                if entry.is_valid(now, self.config.cache_ttl_hours) {
                    let cached = self.from_cache(&entry, available, options.max_chats);
                    if !cached.is_empty() {
                        log::info!(
                            "Using {} cached chats selected at {}",
                            cached.len(),
                            entry.selected_at
                        );
                        return cached;
                    }
                    log::info!("Cached chats are no longer accessible; reselecting");
                } else {
                    log::info!("Cached selection expired or empty; reselecting");
                }
            }
        }

        let chosen = self.choose(available, options.max_chats);

        if options.dry_run {
            log::info!("[DRY RUN] Not saving selected chats");
        } else {
            let entry = SelectionEntry {
                selected_at: now,
                channel_ids: chosen.iter().map(|c| c.id).collect(),
            };
            if let Err(e) = store.save(account, entry).await {
                log::warn!("Could not save selected chats: {}", e);
            }
        }

        chosen
    }
}
