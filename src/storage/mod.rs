//! Storage for state that survives across runs.
//!
//! - `SelectionStore`: which channels were chosen, per account
//! - `DedupStore`: every config ever emitted, append-only
//!
//! Both sit on `LocalStorage`, which also backs the write-only run artifacts.

pub mod dedup;
pub mod local;
pub mod selection;

// Re-export for convenience
pub use dedup::DedupStore;
pub use local::LocalStorage;
pub use selection::{SelectionCache, SelectionEntry, SelectionStore};
