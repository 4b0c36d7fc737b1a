//! Channel and message data structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of dialog a channel handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// Broadcast channel
    #[default]
    Channel,
    /// Group or supergroup
    Group,
    /// Private dialog with a user
    User,
}

impl ChannelKind {
    pub fn label(&self) -> &'static str {
        match self {
            ChannelKind::Channel => "Channel",
            ChannelKind::Group => "Group",
            ChannelKind::User => "User",
        }
    }
}

/// A message-bearing destination, as listed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Stable dialog identifier
    pub id: i64,

    /// Display title
    pub title: String,

    /// Optional "about" text
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub kind: ChannelKind,
}

impl Channel {
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            description: None,
            kind: ChannelKind::Channel,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_kind(mut self, kind: ChannelKind) -> Self {
        self.kind = kind;
        self
    }

    /// Title and description, lowercased, for keyword matching.
    pub fn searchable_text(&self) -> String {
        match &self.description {
            Some(desc) => format!("{}\n{}", self.title, desc).to_lowercase(),
            None => self.title.to_lowercase(),
        }
    }
}

/// A link embedded in a message body.
///
/// Offsets and lengths are UTF-16 code units, matching the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LinkEntity {
    /// A bare URL written in the text itself
    Url { offset: usize, length: usize },
    /// Text that hyperlinks to a hidden target
    TextUrl {
        offset: usize,
        length: usize,
        url: String,
    },
}

/// A single message fetched from a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub channel_id: i64,
    pub id: i64,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub entities: Vec<LinkEntity>,
}

impl Message {
    /// Message body followed by every link target on its own line.
    pub fn text_with_links(&self) -> String {
        let mut out = self.text.clone();
        if !self.text.is_empty() {
            for entity in &self.entities {
                let target = match entity {
                    LinkEntity::TextUrl { url, .. } => Some(url.clone()),
                    LinkEntity::Url { offset, length } => {
                        utf16_slice(&self.text, *offset, *length)
                    }
                };
                if let Some(target) = target {
                    out.push('\n');
                    out.push_str(&target);
                }
            }
        }
        out.trim().to_string()
    }
}

/// Slice `text` by a UTF-16 offset/length pair.
fn utf16_slice(text: &str, offset: usize, length: usize) -> Option<String> {
    let units: Vec<u16> = text.encode_utf16().collect();
    let end = offset.checked_add(length)?;
    let slice = units.get(offset..end)?;
    String::from_utf16(slice).ok()
}
