//! Scripted in-memory source for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::MessageSource;
use crate::error::{AppError, Result};
use crate::models::{Channel, Message};

/// Failure injected before a page fetch.
#[derive(Debug, Clone)]
pub enum Fault {
    /// Serve this fetch normally
    Pass,
    RateLimited(Duration),
    Transport(String),
}

impl Fault {
    fn into_error(self, channel: &Channel) -> Option<AppError> {
        match self {
            Fault::Pass => None,
            Fault::RateLimited(wait) => Some(AppError::rate_limited(wait)),
            Fault::Transport(message) => {
                Some(AppError::transport(channel.title.clone(), message))
            }
        }
    }
}

/// One recorded `fetch_messages_page` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCall {
    pub channel_id: i64,
    pub before: Option<i64>,
    pub limit: usize,
}

#[derive(Default)]
pub struct FakeSource {
    account: String,
    channels: Vec<Channel>,
    /// Per-channel history in delivery order (newest first)
    histories: HashMap<i64, Vec<Message>>,
    faults: Mutex<HashMap<i64, VecDeque<Fault>>>,
    listing_faults: Mutex<VecDeque<Fault>>,
    calls: Mutex<Vec<PageCall>>,
    unauthorized: bool,
}

impl FakeSource {
    pub fn new(channels: Vec<Channel>) -> Self {
        Self {
            account: "test-account".into(),
            channels,
            ..Self::default()
        }
    }

    pub fn unauthorized(mut self) -> Self {
        self.unauthorized = true;
        self
    }

    pub fn with_history(mut self, channel_id: i64, messages: Vec<Message>) -> Self {
        self.histories.insert(channel_id, messages);
        self
    }

    /// Queue faults returned by the next fetches of `channel_id`, in order.
    pub fn with_faults(self, channel_id: i64, faults: Vec<Fault>) -> Self {
        if let Ok(mut map) = self.faults.lock() {
            map.entry(channel_id).or_default().extend(faults);
        }
        self
    }

    /// Queue faults returned by the next `list_channels` calls, in order.
    pub fn with_listing_faults(self, faults: Vec<Fault>) -> Self {
        if let Ok(mut queue) = self.listing_faults.lock() {
            queue.extend(faults);
        }
        self
    }

    pub fn calls(&self) -> Vec<PageCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn calls_for(&self, channel_id: i64) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.channel_id == channel_id)
            .count()
    }
}

#[async_trait]
impl MessageSource for FakeSource {
    fn account_key(&self) -> &str {
        &self.account
    }

    async fn connect(&self) -> Result<()> {
        if self.unauthorized {
            return Err(AppError::auth("fake session is not logged in"));
        }
        Ok(())
    }

    async fn list_channels(&self) -> Result<Vec<Channel>> {
        let fault = self
            .listing_faults
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front());
        let listing = Channel::new(0, "dialogs");
        if let Some(err) = fault.and_then(|f| f.into_error(&listing)) {
            return Err(err);
        }
        Ok(self.channels.clone())
    }

    async fn fetch_messages_page(
        &self,
        channel: &Channel,
        before: Option<i64>,
        limit: usize,
    ) -> Result<Vec<Message>> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(PageCall {
                channel_id: channel.id,
                before,
                limit,
            });
        }

        let fault = self
            .faults
            .lock()
            .ok()
            .and_then(|mut map| map.get_mut(&channel.id).and_then(VecDeque::pop_front));
        if let Some(err) = fault.and_then(|f| f.into_error(channel)) {
            return Err(err);
        }

        let history = self.histories.get(&channel.id).cloned().unwrap_or_default();
        Ok(history
            .into_iter()
            .filter(|m| before.is_none_or(|b| m.id < b))
            .take(limit)
            .collect())
    }
}
