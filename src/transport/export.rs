//! Telegram Desktop export transport.
//!
//! Serves channels and history pages from a `result.json` produced by
//! "Export Telegram data" (JSON format). Both the full-account layout
//! (`chats.list[]`) and the single-chat layout are accepted.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::MessageSource;
use crate::error::{AppError, Result};
use crate::models::{Channel, ChannelKind, LinkEntity, Message, TransportConfig};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExportFile {
    Account { chats: ExportChatList },
    Single(ExportChat),
}

#[derive(Debug, Deserialize)]
struct ExportChatList {
    #[serde(default)]
    list: Vec<ExportChat>,
}

#[derive(Debug, Deserialize)]
struct ExportChat {
    id: i64,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type", default)]
    chat_type: String,
    #[serde(default)]
    messages: Vec<ExportMessage>,
}

#[derive(Debug, Deserialize)]
struct ExportMessage {
    id: i64,
    #[serde(rename = "type", default)]
    message_type: String,
    #[serde(default)]
    date_unixtime: Option<String>,
    #[serde(default)]
    text: serde_json::Value,
    #[serde(default)]
    text_entities: Vec<ExportEntity>,
}

#[derive(Debug, Deserialize)]
struct ExportEntity {
    #[serde(rename = "type", default)]
    entity_type: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    href: Option<String>,
}

fn chat_kind(chat_type: &str) -> ChannelKind {
    match chat_type {
        "personal_chat" | "bot_chat" | "saved_messages" => ChannelKind::User,
        "private_group" | "private_supergroup" | "public_supergroup" => ChannelKind::Group,
        _ => ChannelKind::Channel,
    }
}

impl ExportMessage {
    fn date(&self) -> Option<DateTime<Utc>> {
        let secs: i64 = self.date_unixtime.as_deref()?.trim().parse().ok()?;
        DateTime::from_timestamp(secs, 0)
    }

    /// Rebuild body text and link entities with UTF-16 offsets.
    fn text_and_entities(&self) -> (String, Vec<LinkEntity>) {
        if self.text_entities.is_empty() {
            return (Self::flatten_text(&self.text), Vec::new());
        }

        let mut text = String::new();
        let mut entities = Vec::new();
        let mut offset = 0;
        for part in &self.text_entities {
            let length = part.text.encode_utf16().count();
            match (part.entity_type.as_str(), &part.href) {
                ("link", _) => entities.push(LinkEntity::Url { offset, length }),
                ("text_link", Some(url)) => entities.push(LinkEntity::TextUrl {
                    offset,
                    length,
                    url: url.clone(),
                }),
                _ => {}
            }
            text.push_str(&part.text);
            offset += length;
        }
        (text, entities)
    }

    /// `text` is either a string or a list of strings and `{type, text}` parts.
    fn flatten_text(value: &serde_json::Value) -> String {
        match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Array(parts) => parts
                .iter()
                .map(|part| match part {
                    serde_json::Value::String(s) => s.as_str(),
                    other => other.get("text").and_then(|t| t.as_str()).unwrap_or(""),
                })
                .collect(),
            _ => String::new(),
        }
    }
}

/// Parsed export, histories sorted newest first.
#[derive(Debug, Default)]
struct ExportIndex {
    channels: Vec<Channel>,
    histories: HashMap<i64, Vec<Message>>,
}

impl ExportIndex {
    fn parse(bytes: &[u8]) -> Result<Self> {
        let file: ExportFile = serde_json::from_slice(bytes)
            .map_err(|e| AppError::config(format!("unrecognized export format: {e}")))?;
        let chats = match file {
            ExportFile::Account { chats } => chats.list,
            ExportFile::Single(chat) => vec![chat],
        };

        let mut index = ExportIndex::default();
        for chat in chats {
            let title = chat.name.clone().unwrap_or_else(|| chat.id.to_string());
            index
                .channels
                .push(Channel::new(chat.id, title).with_kind(chat_kind(&chat.chat_type)));

            let mut history: Vec<Message> = chat
                .messages
                .iter()
                .filter(|m| m.message_type == "message")
                .filter_map(|m| {
                    let date = m.date()?;
                    let (text, entities) = m.text_and_entities();
                    Some(Message {
                        channel_id: chat.id,
                        id: m.id,
                        date,
                        text,
                        entities,
                    })
                })
                .collect();
            history.sort_by(|a, b| b.id.cmp(&a.id));
            index.histories.insert(chat.id, history);
        }
        Ok(index)
    }
}

/// `MessageSource` reading a Telegram Desktop export.
pub struct ExportSource {
    path: PathBuf,
    account: String,
    index: OnceLock<ExportIndex>,
}

impl ExportSource {
    pub fn new(config: &TransportConfig) -> Self {
        Self {
            path: PathBuf::from(&config.export_path),
            account: config.session_name.clone(),
            index: OnceLock::new(),
        }
    }

    async fn index(&self) -> Result<&ExportIndex> {
        if let Some(index) = self.index.get() {
            return Ok(index);
        }

        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::auth(format!(
                    "export not found at {}",
                    self.path.display()
                )));
            }
            Err(e) => return Err(AppError::Io(e)),
        };
        let parsed = ExportIndex::parse(&bytes)?;
        Ok(self.index.get_or_init(|| parsed))
    }
}

#[async_trait]
impl MessageSource for ExportSource {
    fn account_key(&self) -> &str {
        &self.account
    }

    async fn connect(&self) -> Result<()> {
        let index = self.index().await?;
        log::info!(
            "Loaded export {} with {} chats",
            self.path.display(),
            index.channels.len()
        );
        Ok(())
    }

    async fn list_channels(&self) -> Result<Vec<Channel>> {
        Ok(self.index().await?.channels.clone())
    }

    async fn fetch_messages_page(
        &self,
        channel: &Channel,
        before: Option<i64>,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let index = self.index().await?;
        let history = index.histories.get(&channel.id).ok_or_else(|| {
            AppError::transport(format!("dialog {}", channel.id), "chat not in export")
        })?;

        Ok(history
            .iter()
            .filter(|m| before.is_none_or(|b| m.id < b))
            .take(limit)
            .cloned()
            .collect())
    }
}
