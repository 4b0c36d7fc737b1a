// src/transport/http.rs

//! JSON gateway transport.
//!
//! Talks to an HTTP bridge that fronts a logged-in messaging account:
//!
//! - `GET /me` - session check
//! - `GET /dialogs` - channel listing
//! - `GET /dialogs/{id}/messages?limit=N&before_id=M` - history page, newest first
//!
//! `429` responses are turned into `RateLimited` using `Retry-After` or a JSON
//! `retry_after` field.

use std::future::Future;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use url::Url;

use super::MessageSource;
use crate::error::{AppError, Result};
use crate::models::{Channel, ChannelKind, LinkEntity, Message, TransportConfig};
use crate::utils::http::{self, DEFAULT_RETRY_AFTER};

/// Dialog as returned by `GET /dialogs`.
#[derive(Debug, Deserialize)]
struct WireDialog {
    id: i64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    kind: ChannelKind,
}

/// Message as returned by the history endpoint.
#[derive(Debug, Deserialize)]
struct WireMessage {
    id: i64,
    /// Missing dates happen for service messages; those are skipped.
    #[serde(default)]
    date: Option<DateTime<Utc>>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    entities: Vec<LinkEntity>,
}

#[derive(Debug, Deserialize)]
struct WireError {
    #[serde(default)]
    retry_after: Option<f64>,
    #[serde(default)]
    error: Option<String>,
}

/// `MessageSource` backed by the JSON gateway.
pub struct HttpSource {
    client: Client,
    base_url: Url,
    token: Option<String>,
    account: String,
}

impl HttpSource {
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let mut base = config.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }

        Ok(Self {
            client: http::create_async_client(config)?,
            base_url: Url::parse(&base)?,
            token: config.resolved_token(),
            account: config.session_name.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    async fn get(&self, url: Url, context: &str) -> Result<Response> {
        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        Self::check_status(response, context).await
    }

    /// Map non-success statuses onto the error taxonomy.
    async fn check_status(response: Response, context: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let header_wait = http::retry_after_header(response.headers());
        let body = response.text().await.unwrap_or_default();
        let wire: Option<WireError> = serde_json::from_str(&body).ok();

        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                let wait = header_wait
                    .or_else(|| wire.as_ref().and_then(|w| w.retry_after).and_then(http::seconds))
                    .unwrap_or(DEFAULT_RETRY_AFTER);
                Err(AppError::rate_limited(wait))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let reason = wire
                    .and_then(|w| w.error)
                    .unwrap_or_else(|| format!("gateway returned {status}"));
                Err(AppError::auth(reason))
            }
            _ => {
                let reason = wire
                    .and_then(|w| w.error)
                    .unwrap_or_else(|| format!("gateway returned {status}"));
                Err(AppError::transport(context, reason))
            }
        }
    }

    async fn fetch_wire_page(
        &self,
        channel: &Channel,
        before: Option<i64>,
        limit: usize,
    ) -> Result<Vec<WireMessage>> {
        let mut url = self.endpoint(&format!("dialogs/{}/messages", channel.id))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &limit.to_string());
            if let Some(before) = before {
                query.append_pair("before_id", &before.to_string());
            }
        }

        let context = format!("dialog {}", channel.id);
        Ok(self.get(url, &context).await?.json().await?)
    }
}

#[async_trait]
impl MessageSource for HttpSource {
    fn account_key(&self) -> &str {
        &self.account
    }

    async fn connect(&self) -> Result<()> {
        let url = self.endpoint("me")?;
        match self.get(url, "me").await {
            Ok(_) => {
                log::info!("Gateway connected & authorized as '{}'", self.account);
                Ok(())
            }
            Err(AppError::Http(e)) => Err(AppError::auth(format!(
                "gateway unreachable at {}: {}",
                self.base_url, e
            ))),
            Err(e) => Err(e),
        }
    }

    async fn list_channels(&self) -> Result<Vec<Channel>> {
        let url = self.endpoint("dialogs")?;
        let dialogs: Vec<WireDialog> = self.get(url, "dialogs").await?.json().await?;

        Ok(dialogs
            .into_iter()
            .map(|d| Channel {
                id: d.id,
                title: d.title,
                description: d.description.filter(|s| !s.trim().is_empty()),
                kind: d.kind,
            })
            .collect())
    }

    async fn fetch_messages_page(
        &self,
        channel: &Channel,
        before: Option<i64>,
        limit: usize,
    ) -> Result<Vec<Message>> {
        dated_page(channel.id, before, move |cursor| {
            self.fetch_wire_page(channel, cursor, limit)
        })
        .await
    }
}

/// Dated messages of the first page that has any.
///
/// Dateless service messages are dropped, but a page holding only those is
/// not the start of history: fetch again below its lowest id.
async fn dated_page<F, Fut>(
    channel_id: i64,
    mut before: Option<i64>,
    mut fetch: F,
) -> Result<Vec<Message>>
where
    F: FnMut(Option<i64>) -> Fut,
    Fut: Future<Output = Result<Vec<WireMessage>>>,
{
    loop {
        let wire = fetch(before).await?;
        let Some(lowest) = wire.iter().map(|m| m.id).min() else {
            return Ok(Vec::new());
        };

        let page: Vec<Message> = wire
            .into_iter()
            .filter_map(|m| {
                Some(Message {
                    channel_id,
                    id: m.id,
                    date: m.date?,
                    text: m.text,
                    entities: m.entities,
                })
            })
            .collect();
        if !page.is_empty() {
            return Ok(page);
        }

        if before.is_some_and(|b| lowest >= b) {
            return Err(AppError::transport(
                format!("dialog {channel_id}"),
                "history cursor did not advance",
            ));
        }
        log::debug!(
            "Dialog {}: page of service messages only, continuing below {}",
            channel_id,
            lowest
        );
        before = Some(lowest);
    }
}
