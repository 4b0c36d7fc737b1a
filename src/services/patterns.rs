//! Recognized connection-string schemes and channel relevance keywords.

use regex::Regex;

use crate::error::{AppError, Result};
use crate::models::{ExtractionConfig, SelectionConfig};

/// Characters trimmed from both ends of a raw match.
const TRIM_CHARS: &[char] = &[
    '.', ',', ';', ':', '!', '?', '(', ')', '[', ']', '{', '}', '*', '\'', '"', '«', '»',
];

/// Scheme and keyword tables plus the matching functions over them.
#[derive(Debug, Clone)]
pub struct PatternLibrary {
    schemes: Vec<String>,
    keywords: Vec<String>,
    link_regex: Regex,
}

impl PatternLibrary {
    /// Build a library from scheme and keyword lists.
    pub fn new(schemes: &[String], keywords: &[String]) -> Result<Self> {
        let schemes: Vec<String> = schemes
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        if schemes.is_empty() {
            return Err(AppError::validation("at least one scheme is required"));
        }

        let keywords = keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        Ok(Self {
            link_regex: Self::build_link_regex(&schemes)?,
            schemes,
            keywords,
        })
    }

    pub fn from_config(extraction: &ExtractionConfig, selection: &SelectionConfig) -> Result<Self> {
        Self::new(&extraction.schemes, &selection.keywords)
    }

    /// Longer schemes go first so `ssr` is never read as `ss` + garbage.
    ///
    /// The scheme may follow anything but an ASCII letter, so `xss://` and the
    /// `ss` inside `vless` never start a match while configs glued to digits,
    /// `_` or non-Latin text still do. The link itself is capture group 1.
    fn build_link_regex(schemes: &[String]) -> Result<Regex> {
        let mut ordered: Vec<&String> = schemes.iter().collect();
        ordered.sort_by(|a, b| b.len().cmp(&a.len()));
        let alternation = ordered
            .iter()
            .map(|s| regex::escape(s))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = format!(r#"(?:^|[^A-Za-z])((?:{alternation})://[^\s#<>"'`]+)"#);
        Ok(Regex::new(&pattern)?)
    }

    pub fn schemes(&self) -> &[String] {
        &self.schemes
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Raw, uncanonicalized link matches in corpus order.
    pub fn find_links<'a>(&'a self, text: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.link_regex
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
    }

    /// Trim surrounding punctuation and reject matches with an empty payload.
    pub fn canonicalize(&self, raw: &str) -> Option<String> {
        let trimmed = raw
            .trim()
            .trim_matches(|c: char| c.is_whitespace() || TRIM_CHARS.contains(&c));
        let (scheme, payload) = trimmed.split_once("://")?;
        if payload.is_empty() || !self.schemes.iter().any(|s| s == scheme) {
            return None;
        }
        Some(trimmed.to_string())
    }

    /// Number of distinct keywords found in `haystack` (already lowercased).
    pub fn keyword_score(&self, haystack: &str) -> usize {
        self.keywords
            .iter()
            .filter(|k| haystack.contains(k.as_str()))
            .count()
    }
}

#[cfg(test)]
impl PatternLibrary {
    /// Library built from the default config tables.
    pub(crate) fn builtin() -> Self {
        let config = crate::models::Config::default();
        Self::from_config(&config.extraction, &config.selection).unwrap()
    }
}
