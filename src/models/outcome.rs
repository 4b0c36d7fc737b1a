//! Per-channel and per-run outcome structures.

use chrono::{DateTime, Utc};

use super::{Channel, Message};

/// How far a channel's history was walked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanStatus {
    /// Walked back to the window boundary or the start of history
    Complete,
    /// Stopped by the per-chat message cap
    LimitReached,
    /// Stopped by a transport error; messages before it are kept
    Failed(String),
    /// Run was cancelled before or during this channel
    Cancelled,
}

impl ScanStatus {
    pub fn is_partial(&self) -> bool {
        matches!(self, ScanStatus::Failed(_) | ScanStatus::Cancelled)
    }
}

/// Result of collecting one channel.
#[derive(Debug, Clone)]
pub struct ChannelCollection {
    pub channel: Channel,
    /// In-window messages, newest first
    pub messages: Vec<Message>,
    pub status: ScanStatus,
    pub pages: usize,
    pub examined: usize,
    pub throttle_waits: usize,
}

impl ChannelCollection {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            messages: Vec::new(),
            status: ScanStatus::Complete,
            pages: 0,
            examined: 0,
            throttle_waits: 0,
        }
    }

    pub fn cancelled(channel: Channel) -> Self {
        Self {
            status: ScanStatus::Cancelled,
            ..Self::new(channel)
        }
    }

    /// One-line status for the human-readable report.
    pub fn describe(&self) -> String {
        match &self.status {
            ScanStatus::Failed(reason) => format!(
                "partially scanned due to error ({} messages kept): {}",
                self.messages.len(),
                reason
            ),
            ScanStatus::Cancelled => format!(
                "partially scanned, run cancelled ({} messages kept)",
                self.messages.len()
            ),
            _ if self.messages.is_empty() => "zero messages in window".to_string(),
            ScanStatus::LimitReached => format!(
                "fully scanned up to per-chat limit ({} messages)",
                self.messages.len()
            ),
            ScanStatus::Complete => {
                format!("fully scanned ({} messages)", self.messages.len())
            }
        }
    }
}

/// Pipeline state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    SelectingChats,
    Collecting,
    Extracting,
    Done,
    AbortedDryRun,
}

/// Summary returned by a pipeline run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub selected: Vec<Channel>,
    pub collections: Vec<ChannelCollection>,
    pub extracted: usize,
    pub added: usize,
    pub total_unique: usize,
}

impl RunSummary {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            state: RunState::Idle,
            started_at,
            selected: Vec::new(),
            collections: Vec::new(),
            extracted: 0,
            added: 0,
            total_unique: 0,
        }
    }

    pub fn message_count(&self) -> usize {
        self.collections.iter().map(|c| c.messages.len()).sum()
    }

    pub fn failed_channels(&self) -> usize {
        self.collections
            .iter()
            .filter(|c| c.status.is_partial())
            .count()
    }
}
