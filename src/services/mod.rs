//! Service layer for the collector application.
//!
//! This module contains the business logic for:
//! - Scheme and keyword tables (`PatternLibrary`)
//! - Channel selection (`ChatSelector`)
//! - Windowed history collection (`WindowedCollector`)
//! - Connection-string extraction (`ConfigExtractor`)

mod collector;
mod extractor;
mod patterns;
mod selector;

pub use collector::{CollectorSettings, WindowedCollector};
pub use extractor::ConfigExtractor;
pub use patterns::PatternLibrary;
pub use selector::{ChatSelector, Ranked, SelectOptions};
