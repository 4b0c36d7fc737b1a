// src/services/collector.rs

//! Time-windowed message collection for a single channel.
//!
//! Pages backward from the newest message and stops at the first message
//! older than the window start. That early stop is only sound because
//! `MessageSource` pages are newest first; when a channel breaks that order
//! the collector warns and keeps applying the rule, accepting possible
//! under-collection over unbounded scanning.
//!
//! A started channel always runs to its end; cancellation only cuts short a
//! rate-limit wait. Skipping the remaining channels is the pipeline's job.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::{
    Channel, ChannelCollection, CollectionWindow, CollectorConfig, Message, ScanStatus,
    WindowPosition,
};
use crate::transport::MessageSource;
use crate::utils::RateLimitRetry;

/// Pagination and pacing knobs for one run.
#[derive(Debug, Clone)]
pub struct CollectorSettings {
    /// Hard cap on messages examined per channel; 0 means unlimited
    pub per_chat_limit: usize,
    pub page_size: usize,
    /// Pause between successful page fetches
    pub request_delay: Duration,
    /// Rate-limit waits at least this long are logged as warnings
    pub long_wait_warning: Duration,
    /// Trace every examined message at debug level
    pub debug_sample: bool,
}

impl CollectorSettings {
    pub fn from_config(config: &CollectorConfig, debug_sample: bool) -> Self {
        Self {
            per_chat_limit: config.per_chat_limit,
            page_size: config.page_size.max(1),
            request_delay: config.request_delay(),
            long_wait_warning: config.long_wait_warning(),
            debug_sample,
        }
    }
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self::from_config(&CollectorConfig::default(), false)
    }
}

/// What scanning one page decided.
enum PageOutcome {
    /// Keep paging from this cursor
    Continue(i64),
    /// Walked past the window start
    WindowExhausted,
    /// Page added nothing new to walk from
    Stalled,
}

/// Per-channel scan state carried across pages.
struct ScanState {
    last_id: Option<i64>,
    last_date: Option<DateTime<Utc>>,
    order_warned: bool,
}

/// Collects one channel's in-window messages.
pub struct WindowedCollector {
    source: Arc<dyn MessageSource>,
    settings: CollectorSettings,
    retry: RateLimitRetry,
}

impl WindowedCollector {
    pub fn new(
        source: Arc<dyn MessageSource>,
        settings: CollectorSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            retry: RateLimitRetry::new(settings.long_wait_warning, cancel),
            source,
            settings,
        }
    }

    /// Walk `channel` back to `window.start`.
    ///
    /// Never fails: transport errors end the scan and are recorded in the
    /// returned status alongside whatever was collected before them.
    pub async fn collect(&self, channel: &Channel, window: &CollectionWindow) -> ChannelCollection {
        let mut out = ChannelCollection::new(channel.clone());
        let cap = match self.settings.per_chat_limit {
            0 => usize::MAX,
            n => n,
        };
        let mut cursor: Option<i64> = None;
        let mut state = ScanState {
            last_id: None,
            last_date: None,
            order_warned: false,
        };

        loop {
            let remaining = cap.saturating_sub(out.examined);
            if remaining == 0 {
                out.status = ScanStatus::LimitReached;
                log::info!(
                    "Chat {}: per-chat limit of {} messages reached",
                    channel.title,
                    cap
                );
                break;
            }
            let limit = self.settings.page_size.min(remaining);

            let page = match self.fetch_page(channel, cursor, limit, &mut out).await {
                Ok(page) => page,
                Err(AppError::Cancelled) => {
                    out.status = ScanStatus::Cancelled;
                    break;
                }
                Err(e) => {
                    log::error!("Error collecting from chat {} ({}): {}", channel.title, channel.id, e);
                    out.status = ScanStatus::Failed(e.to_string());
                    break;
                }
            };
            out.pages += 1;

            if page.is_empty() {
                break;
            }

            match self.scan_page(channel, window, page, &mut state, &mut out) {
                PageOutcome::Continue(next) => cursor = Some(next),
                PageOutcome::WindowExhausted => break,
                PageOutcome::Stalled => {
                    log::warn!(
                        "Chat {}: pagination cursor did not advance; stopping",
                        channel.title
                    );
                    out.status =
                        ScanStatus::Failed("message ids did not decrease across pages".into());
                    break;
                }
            }

            if !self.settings.request_delay.is_zero() {
                tokio::time::sleep(self.settings.request_delay).await;
            }
        }

        log::debug!(
            "Chat {}: {} pages, {} examined, {} in window, {} throttle waits",
            channel.title,
            out.pages,
            out.examined,
            out.messages.len(),
            out.throttle_waits
        );
        out
    }

    /// Fetch one page, waiting out rate limits and retrying the same cursor.
    async fn fetch_page(
        &self,
        channel: &Channel,
        before: Option<i64>,
        limit: usize,
        out: &mut ChannelCollection,
    ) -> Result<Vec<Message>> {
        let context = format!("chat={}", channel.title);
        self.retry
            .run(&context, &mut out.throttle_waits, || {
                self.source.fetch_messages_page(channel, before, limit)
            })
            .await
    }

    fn scan_page(
        &self,
        channel: &Channel,
        window: &CollectionWindow,
        page: Vec<Message>,
        state: &mut ScanState,
        out: &mut ChannelCollection,
    ) -> PageOutcome {
        let start_id = state.last_id;

        for message in page {
            out.examined += 1;

            if self.settings.debug_sample {
                log::debug!(
                    "DBG chat={} msg_id={} msg_time={}",
                    channel.title,
                    message.id,
                    message.date.to_rfc3339()
                );
            }

            if state.last_id.is_some_and(|last| message.id >= last) {
                self.warn_order(channel, state, "message ids not decreasing");
                continue;
            }
            if state.last_date.is_some_and(|last| message.date > last) {
                self.warn_order(channel, state, "timestamps not non-increasing");
            }
            state.last_id = Some(message.id);
            state.last_date = Some(message.date);

            match window.position(message.date) {
                WindowPosition::Newer => continue,
                WindowPosition::Older => return PageOutcome::WindowExhausted,
                WindowPosition::Inside => {
                    if !message.text_with_links().is_empty() {
                        out.messages.push(message);
                    }
                }
            }
        }

        match state.last_id {
            Some(id) if state.last_id != start_id => PageOutcome::Continue(id),
            _ => PageOutcome::Stalled,
        }
    }

    fn warn_order(&self, channel: &Channel, state: &mut ScanState, what: &str) {
        if !state.order_warned {
            state.order_warned = true;
            log::warn!(
                "OrderingAssumptionViolated in chat {} ({}): {}; results may be incomplete",
                channel.title,
                channel.id,
                what
            );
        }
    }
}
