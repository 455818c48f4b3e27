//! Transport-facing types — inbound events and the outbound notifier seam.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::ChannelError;

/// An inbound event from the chat transport, tagged with the sender's
/// chat id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserEvent {
    /// A plain text message (including commands).
    Text { chat_id: i64, text: String },
    /// An image upload, carried as an opaque file id.
    Photo { chat_id: i64, file_id: String },
}

impl UserEvent {
    pub fn chat_id(&self) -> i64 {
        match self {
            Self::Text { chat_id, .. } | Self::Photo { chat_id, .. } => *chat_id,
        }
    }
}

/// Stream of inbound events produced by a channel's listener task.
pub type EventStream = Pin<Box<dyn Stream<Item = UserEvent> + Send>>;

/// Outbound message delivery. Implemented by the Telegram channel and by
/// recording mocks in tests.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a plain text message.
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), ChannelError>;

    /// Re-send a previously uploaded photo by its file id, with an optional
    /// caption.
    async fn send_photo(
        &self,
        chat_id: i64,
        file_id: &str,
        caption: Option<&str>,
    ) -> Result<(), ChannelError>;

    /// Send a prompt with a reply keyboard, one button per option. Empty
    /// `options` removes any existing keyboard instead.
    async fn send_prompt(
        &self,
        chat_id: i64,
        text: &str,
        options: &[String],
    ) -> Result<(), ChannelError>;
}
