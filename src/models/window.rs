//! Collection window shared by every channel of a run.

use chrono::{DateTime, Duration, Utc};

/// Closed-open UTC interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Where a timestamp falls relative to a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPosition {
    /// At or after `end`
    Newer,
    Inside,
    /// Strictly before `start`
    Older,
}

impl CollectionWindow {
    /// Window of the given length ending at `now`.
    pub fn ending_at(now: DateTime<Utc>, hours: i64) -> Self {
        Self {
            start: now - Duration::hours(hours),
            end: now,
        }
    }

    pub fn position(&self, at: DateTime<Utc>) -> WindowPosition {
        if at >= self.end {
            WindowPosition::Newer
        } else if at >= self.start {
            WindowPosition::Inside
        } else {
            WindowPosition::Older
        }
    }
}
