// src/models/mod.rs

//! Domain models for the collector application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod channel;
mod config;
mod outcome;
mod window;

// Re-export all public types
pub use channel::{Channel, ChannelKind, LinkEntity, Message};
pub use config::{
    CollectorConfig, Config, ExtractionConfig, PathsConfig, SelectionConfig, TransportConfig,
    TransportKind,
};
pub use outcome::{ChannelCollection, RunState, RunSummary, ScanStatus};
pub use window::{CollectionWindow, WindowPosition};
