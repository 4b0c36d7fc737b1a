// src/pipeline/collect.rs

//! End-to-end collection run: select, collect, report, extract, dedup.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use super::report;
use crate::error::Result;
use crate::models::{
    Channel, ChannelCollection, CollectionWindow, Config, RunState, RunSummary,
};
use crate::services::{
    ChatSelector, CollectorSettings, ConfigExtractor, PatternLibrary, SelectOptions,
    WindowedCollector,
};
use crate::storage::{DedupStore, LocalStorage, SelectionStore};
use crate::transport::MessageSource;
use crate::utils::{Clock, RateLimitRetry};

/// Per-invocation switches that are not part of the config file.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Poll exactly this channel, bypassing selection
    pub chat: Option<i64>,
    pub use_cache: bool,
    /// Stop after selection; write nothing
    pub dry_run: bool,
    pub debug_sample: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            chat: None,
            use_cache: true,
            dry_run: false,
            debug_sample: false,
        }
    }
}

/// Orchestrates one collection run against a `MessageSource`.
pub struct CollectionPipeline {
    config: Arc<Config>,
    source: Arc<dyn MessageSource>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
    storage: LocalStorage,
    patterns: Arc<PatternLibrary>,
}

impl CollectionPipeline {
    pub fn new(
        config: Arc<Config>,
        source: Arc<dyn MessageSource>,
        clock: Arc<dyn Clock>,
        cancel: CancellationToken,
        storage: LocalStorage,
    ) -> Result<Self> {
        let patterns = Arc::new(PatternLibrary::from_config(
            &config.extraction,
            &config.selection,
        )?);
        Ok(Self {
            config,
            source,
            clock,
            cancel,
            storage,
            patterns,
        })
    }

    /// Connect and return the raw channel listing.
    pub async fn list_dialogs(&self) -> Result<Vec<Channel>> {
        self.open_session().await
    }

    /// Connect, then list channels, waiting out rate limits on both.
    async fn open_session(&self) -> Result<Vec<Channel>> {
        let retry = RateLimitRetry::new(
            self.config.collector.long_wait_warning(),
            self.cancel.clone(),
        );
        let mut waits = 0;
        retry
            .run("connect", &mut waits, || self.source.connect())
            .await?;
        retry
            .run("dialog listing", &mut waits, || self.source.list_channels())
            .await
    }

    /// Run the full pipeline.
    ///
    /// Fails only when the session or listing is unusable, when the run is
    /// cancelled before selection, or when the unique-configs file cannot be
    /// written. Per-channel problems are recorded in the summary instead.
    pub async fn run(&self, options: &RunOptions) -> Result<RunSummary> {
        let mut summary = RunSummary::new(self.clock.now());

        let available = self.open_session().await?;
        summary.state = RunState::SelectingChats;
        log::info!("Found {} dialogs", available.len());

        summary.selected = match options.chat {
            Some(id) => vec![resolve_chat(&available, id)],
            None => self.select(&available, options, &summary).await,
        };

        log::info!("Chats to check: {}", summary.selected.len());
        for channel in &summary.selected {
            log::info!(
                "  - {} | chat_id={} | {}",
                channel.title,
                channel.id,
                channel.kind.label()
            );
        }

        if options.dry_run {
            log::info!("[DRY RUN] Selection done; skipping collection and file writes");
            summary.state = RunState::AbortedDryRun;
            return Ok(summary);
        }

        summary.state = RunState::Collecting;
        let window = CollectionWindow::ending_at(
            summary.started_at,
            self.config.collector.window_hours,
        );
        log::info!(
            "Collecting messages in window (UTC): start={} end={}",
            window.start.to_rfc3339(),
            window.end.to_rfc3339()
        );
        summary.collections = self.collect_all(&summary.selected, &window, options).await;
        log::info!(
            "Collected total {} messages in range ({} chats partial)",
            summary.message_count(),
            summary.failed_channels()
        );

        let corpus = report::raw_corpus(&summary.collections);
        self.write_artifacts(&corpus, &summary.collections, &window)
            .await;

        summary.state = RunState::Extracting;
        let extractor = ConfigExtractor::new(Arc::clone(&self.patterns));
        let extracted = extractor.extract(&corpus);
        summary.extracted = extracted.len();

        let store = DedupStore::new(self.storage.clone(), &self.config.paths.configs);
        summary.added = store.append_unique(&extracted).await?;
        summary.total_unique = store.len().await?;
        log::info!(
            "Extracted {} configs; new added={} | total unique={}",
            summary.extracted,
            summary.added,
            summary.total_unique
        );

        summary.state = RunState::Done;
        Ok(summary)
    }

    async fn select(
        &self,
        available: &[Channel],
        options: &RunOptions,
        summary: &RunSummary,
    ) -> Vec<Channel> {
        let selector = ChatSelector::new(Arc::clone(&self.patterns), self.config.selection.clone());
        let store = SelectionStore::new(
            self.storage.clone(),
            &self.config.paths.selection_cache,
        );
        let select_options = SelectOptions {
            max_chats: self.config.collector.max_chats,
            use_cache: options.use_cache,
            dry_run: options.dry_run,
        };
        selector
            .select(
                available,
                &store,
                self.source.account_key(),
                select_options,
                summary.started_at,
            )
            .await
    }

    /// Collect every selected channel, preserving selection order.
    async fn collect_all(
        &self,
        selected: &[Channel],
        window: &CollectionWindow,
        options: &RunOptions,
    ) -> Vec<ChannelCollection> {
        let settings = CollectorSettings::from_config(&self.config.collector, options.debug_sample);
        let collector = WindowedCollector::new(
            Arc::clone(&self.source),
            settings,
            self.cancel.clone(),
        );
        let collector = &collector;
        let cancel = &self.cancel;
        let total = selected.len();

        stream::iter(selected.iter().enumerate())
            .map(|(index, channel)| async move {
                if cancel.is_cancelled() {
                    return ChannelCollection::cancelled(channel.clone());
                }
                log::info!(
                    "[{}/{}] Scanning chat: {} (id={})",
                    index + 1,
                    total,
                    channel.title,
                    channel.id
                );
                let collection = collector.collect(channel, window).await;
                log::info!("Chat {}: {}", channel.title, collection.describe());
                collection
            })
            .buffered(self.config.collector.max_concurrent.max(1))
            .collect()
            .await
    }

    /// Overwrite the raw corpus and report; failures are logged, not fatal.
    async fn write_artifacts(
        &self,
        corpus: &str,
        collections: &[ChannelCollection],
        window: &CollectionWindow,
    ) {
        let paths = &self.config.paths;
        if let Err(e) = self
            .storage
            .write_bytes(&paths.raw_text, corpus.as_bytes())
            .await
        {
            log::error!("Failed to write {}: {}", paths.raw_text, e);
        }

        let rendered = report::render_report(collections, window, self.clock.now());
        match self.storage.write_bytes(&paths.report, rendered.as_bytes()).await {
            Ok(()) => log::info!("Report saved to {}", self.storage.path(&paths.report).display()),
            Err(e) => log::error!("Failed to write {}: {}", paths.report, e),
        }
    }
}

/// Resolve an explicit `--chat` id against the listing.
fn resolve_chat(available: &[Channel], id: i64) -> Channel {
    match available.iter().find(|c| c.id == id) {
        Some(channel) => {
            log::info!("Overriding chats: single chat_id={}", id);
            channel.clone()
        }
        None => {
            log::warn!("Chat id {} not found in dialog listing; trying it anyway", id);
            Channel::new(id, id.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{ChannelKind, Message, ScanStatus};
    use crate::storage::SelectionEntry;
    use crate::transport::fake::{Fault, FakeSource};
    use crate::utils::FixedClock;
    use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::time::Instant;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
    }

    fn msg(channel_id: i64, id: i64, hours_ago: i64, text: &str) -> Message {
        Message {
            channel_id,
            id,
            date: now() - ChronoDuration::hours(hours_ago),
            text: text.to_string(),
            entities: Vec::new(),
        }
    }

    fn channels() -> Vec<Channel> {
        vec![
            Channel::new(1, "Free V2Ray Configs"),
            Channel::new(2, "Daily Proxy"),
            Channel::new(3, "Cooking"),
        ]
    }

    fn source() -> FakeSource {
        FakeSource::new(channels())
            .with_history(
                1,
                vec![
                    msg(1, 12, 1, "fresh vless://abc123 and trojan://xyz"),
                    msg(1, 11, 30, "old vless://stale"),
                ],
            )
            .with_history(2, vec![msg(2, 5, 2, "ss://Y2hhY2hhMjA=@h:8388 #tag")])
    }

    fn pipeline(tmp: &TempDir, source: FakeSource) -> CollectionPipeline {
        pipeline_with(tmp, Arc::new(source), Config::default(), CancellationToken::new())
    }

    fn pipeline_with(
        tmp: &TempDir,
        source: Arc<FakeSource>,
        config: Config,
        cancel: CancellationToken,
    ) -> CollectionPipeline {
        CollectionPipeline::new(
            Arc::new(config),
            source,
            Arc::new(FixedClock(now())),
            cancel,
            LocalStorage::new(tmp.path()),
        )
        .unwrap()
    }

    async fn read(tmp: &TempDir, name: &str) -> Option<String> {
        tokio::fs::read_to_string(tmp.path().join(name)).await.ok()
    }

    #[tokio::test]
    async fn test_full_run_extracts_and_dedups() {
        let tmp = TempDir::new().unwrap();

        let summary = pipeline(&tmp, source())
            .run(&RunOptions::default())
            .await
            .unwrap();

        assert_eq!(summary.state, RunState::Done);
        assert_eq!(
            summary.selected.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(summary.message_count(), 2);
        assert_eq!(summary.extracted, 3);
        assert_eq!(summary.added, 3);
        assert_eq!(summary.total_unique, 3);
        assert_eq!(
            read(&tmp, "configs.txt").await.unwrap(),
            "vless://abc123\ntrojan://xyz\nss://Y2hhY2hhMjA=@h:8388\n"
        );
        assert!(read(&tmp, "raw_text.txt").await.unwrap().contains("fresh vless://abc123"));
        assert!(!read(&tmp, "raw_text.txt").await.unwrap().contains("stale"));
        assert!(read(&tmp, "report.txt").await.unwrap().contains("Messages: 2"));

        // Second run over the same history adds nothing.
        let again = pipeline(&tmp, source())
            .run(&RunOptions::default())
            .await
            .unwrap();
        assert_eq!(again.added, 0);
        assert_eq!(again.total_unique, 3);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("configs.txt"), "vless://kept\n")
            .await
            .unwrap();

        let options = RunOptions {
            dry_run: true,
            ..RunOptions::default()
        };
        let summary = pipeline(&tmp, source()).run(&options).await.unwrap();

        assert_eq!(summary.state, RunState::AbortedDryRun);
        assert_eq!(summary.selected.len(), 2);
        assert!(summary.collections.is_empty());
        assert_eq!(read(&tmp, "configs.txt").await.unwrap(), "vless://kept\n");
        assert!(read(&tmp, "selected_chats.json").await.is_none());
        assert!(read(&tmp, "raw_text.txt").await.is_none());
        assert!(read(&tmp, "report.txt").await.is_none());
    }

    #[tokio::test]
    async fn test_auth_failure_aborts_before_selection() {
        let tmp = TempDir::new().unwrap();

        let result = pipeline(&tmp, source().unauthorized())
            .run(&RunOptions::default())
            .await;

        assert!(matches!(result, Err(AppError::AuthenticationRequired(_))));
        assert!(read(&tmp, "selected_chats.json").await.is_none());
        assert!(read(&tmp, "configs.txt").await.is_none());
    }

    #[tokio::test]
    async fn test_channel_failure_does_not_abort_run() {
        let tmp = TempDir::new().unwrap();
        let source =
            source().with_faults(1, vec![Fault::Transport("channel private".into())]);

        let summary = pipeline(&tmp, source)
            .run(&RunOptions::default())
            .await
            .unwrap();

        assert_eq!(summary.state, RunState::Done);
        assert!(matches!(summary.collections[0].status, ScanStatus::Failed(_)));
        assert_eq!(summary.collections[1].status, ScanStatus::Complete);
        assert_eq!(summary.added, 1);
        assert!(
            read(&tmp, "report.txt")
                .await
                .unwrap()
                .contains("- Free V2Ray Configs | chat_id=1 | partially scanned due to error")
        );
    }

    #[tokio::test]
    async fn test_explicit_chat_bypasses_selection() {
        let tmp = TempDir::new().unwrap();
        let options = RunOptions {
            chat: Some(3),
            ..RunOptions::default()
        };

        let summary = pipeline(&tmp, source()).run(&options).await.unwrap();

        assert_eq!(summary.selected, vec![Channel::new(3, "Cooking")]);
        assert_eq!(summary.collections[0].describe(), "zero messages in window");
        assert!(read(&tmp, "selected_chats.json").await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_explicit_chat_is_attempted() {
        let tmp = TempDir::new().unwrap();
        let options = RunOptions {
            chat: Some(404),
            ..RunOptions::default()
        };

        let summary = pipeline(&tmp, source()).run(&options).await.unwrap();

        assert_eq!(summary.selected[0].title, "404");
        assert_eq!(summary.selected[0].kind, ChannelKind::Channel);
        assert_eq!(summary.state, RunState::Done);
    }

    #[tokio::test]
    async fn test_cached_selection_is_reused() {
        let tmp = TempDir::new().unwrap();
        let store = SelectionStore::new(LocalStorage::new(tmp.path()), "selected_chats.json");
        store
            .save(
                "test-account",
                SelectionEntry {
                    selected_at: now() - ChronoDuration::hours(1),
                    channel_ids: vec![2],
                },
            )
            .await
            .unwrap();

        let summary = pipeline(&tmp, source())
            .run(&RunOptions::default())
            .await
            .unwrap();
        assert_eq!(
            summary.selected.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![2]
        );

        let fresh = RunOptions {
            use_cache: false,
            ..RunOptions::default()
        };
        let summary = pipeline(&tmp, source()).run(&fresh).await.unwrap();
        assert_eq!(summary.selected.len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_run_still_writes_artifacts() {
        let tmp = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = pipeline_with(&tmp, Arc::new(source()), Config::default(), cancel)
            .run(&RunOptions::default())
            .await
            .unwrap();

        assert!(
            summary
                .collections
                .iter()
                .all(|c| c.status == ScanStatus::Cancelled)
        );
        assert_eq!(summary.added, 0);
        assert!(read(&tmp, "report.txt").await.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_fan_out_keeps_selection_order() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.collector.max_concurrent = 4;
        config.selection.no_keywords = true;

        let summary = pipeline_with(&tmp, Arc::new(source()), config, CancellationToken::new())
            .run(&RunOptions::default())
            .await
            .unwrap();

        let order: Vec<i64> = summary.collections.iter().map(|c| c.channel.id).collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert!(
            read(&tmp, "raw_text.txt")
                .await
                .unwrap()
                .starts_with("fresh vless://abc123")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_listing_is_waited_out() {
        let tmp = TempDir::new().unwrap();
        let source = source().with_listing_faults(vec![Fault::RateLimited(Duration::from_secs(2))]);

        let started = Instant::now();
        let summary = pipeline(&tmp, source)
            .run(&RunOptions::default())
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_secs(2));
        assert_eq!(summary.state, RunState::Done);
        assert_eq!(summary.added, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_listing_wait_aborts_before_selection() {
        let tmp = TempDir::new().unwrap();
        let source =
            source().with_listing_faults(vec![Fault::RateLimited(Duration::from_secs(3600))]);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let result = pipeline_with(&tmp, Arc::new(source), Config::default(), cancel)
            .run(&RunOptions::default())
            .await;

        assert!(matches!(result, Err(AppError::Cancelled)));
        assert!(read(&tmp, "selected_chats.json").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_finishes_current_channel_and_skips_the_rest() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.collector.page_size = 1;
        config.collector.request_delay_ms = 1000;
        let source = Arc::new(source());
        let cancel = CancellationToken::new();

        // Cancel once the first page of chat 1 has been requested.
        let watched = Arc::clone(&source);
        let trigger = cancel.clone();
        tokio::spawn(async move {
            while watched.calls_for(1) == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            trigger.cancel();
        });

        let summary = pipeline_with(&tmp, Arc::clone(&source), config, cancel)
            .run(&RunOptions::default())
            .await
            .unwrap();

        assert_eq!(summary.collections[0].status, ScanStatus::Complete);
        assert_eq!(summary.collections[0].messages.len(), 1);
        assert_eq!(source.calls_for(1), 2);
        assert_eq!(summary.collections[1].status, ScanStatus::Cancelled);
        assert_eq!(source.calls_for(2), 0);
        assert_eq!(summary.added, 2);
    }

    #[tokio::test]
    async fn test_list_dialogs() {
        let tmp = TempDir::new().unwrap();
        let dialogs = pipeline(&tmp, source()).list_dialogs().await.unwrap();
        assert_eq!(dialogs.len(), 3);
    }
}
