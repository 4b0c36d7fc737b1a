//! Narrow interface to the messaging backend.
//!
//! The core only ever lists channels and pages backward through one channel's
//! history. Login and session persistence belong to whatever sits behind a
//! `MessageSource`.

pub mod export;
#[cfg(test)]
pub(crate) mod fake;
pub mod http;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Channel, Config, Message, TransportKind};

pub use export::ExportSource;
pub use http::HttpSource;

/// Backend able to list channels and serve message history pages.
///
/// Pages must be ordered newest first, with strictly decreasing message ids
/// and non-increasing timestamps. The collector's early stop relies on it.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Identity of the logged-in account, used to key the selection cache.
    fn account_key(&self) -> &str;

    /// Verify the session is usable.
    ///
    /// Fails with `AuthenticationRequired` when no collection can start.
    async fn connect(&self) -> Result<()>;

    /// All dialogs visible to the account, in backend listing order.
    async fn list_channels(&self) -> Result<Vec<Channel>>;

    /// Up to `limit` messages older than `before` (or the newest when `None`).
    ///
    /// An empty page means the start of history was reached.
    async fn fetch_messages_page(
        &self,
        channel: &Channel,
        before: Option<i64>,
        limit: usize,
    ) -> Result<Vec<Message>>;
}

/// Build the source selected by `transport.kind`.
pub fn from_config(config: &Config) -> Result<Arc<dyn MessageSource>> {
    let source: Arc<dyn MessageSource> = match config.transport.kind {
        TransportKind::Http => Arc::new(HttpSource::new(&config.transport)?),
        TransportKind::Export => Arc::new(ExportSource::new(&config.transport)),
    };
    Ok(source)
}
