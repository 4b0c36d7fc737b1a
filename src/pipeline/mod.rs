//! Pipeline entry points for collector runs.
//!
//! - `CollectionPipeline::run`: select, collect, report, extract, dedup
//! - `CollectionPipeline::list_dialogs`: raw channel listing

pub mod collect;
pub mod report;

pub use collect::{CollectionPipeline, RunOptions};
