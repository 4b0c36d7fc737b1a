// src/services/extractor.rs

//! Connection-string extraction from raw message text.

use std::collections::HashSet;
use std::sync::Arc;

use super::PatternLibrary;

/// Scans a corpus for recognized connection strings.
pub struct ConfigExtractor {
    patterns: Arc<PatternLibrary>,
}

impl ConfigExtractor {
    pub fn new(patterns: Arc<PatternLibrary>) -> Self {
        Self { patterns }
    }

    /// Canonical matches in first-seen order, duplicates collapsed.
    pub fn extract(&self, corpus: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();

        for raw in self.patterns.find_links(corpus) {
            let Some(config) = self.patterns.canonicalize(raw) else {
                continue;
            };
            if seen.insert(config.clone()) {
                found.push(config);
            }
        }

        log::debug!("Extracted {} unique configs from corpus", found.len());
        found
    }
}
