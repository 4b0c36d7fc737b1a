//! Utility functions and helpers.

pub mod clock;
pub mod http;
pub mod retry;

pub use clock::{Clock, FixedClock, SystemClock, sleep_or_cancel};
pub use retry::RateLimitRetry;
