//! Hexagonal ports the core drives. The Telegram adapter implements both;
//! tests implement them with in-memory fakes.

use std::time::Duration;

use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    update::Update,
    Result,
};

/// Source of incoming updates (long-poll transport).
///
/// Implementations own their retry policy for transient network failures;
/// an error returned from here is treated as fatal by the poll loop.
#[async_trait]
pub trait UpdateTransport: Send + Sync {
    /// Discard every update queued before this session started.
    async fn drop_pending_updates(&self) -> Result<()>;

    /// Fetch updates with id >= `offset`, waiting up to `timeout` for new ones.
    async fn get_updates(&self, offset: Option<i32>, timeout: Duration) -> Result<Vec<Update>>;

    /// Acknowledge everything below `offset` before shutting down so it is
    /// not redelivered to the next session.
    async fn close(&self, offset: Option<i32>) -> Result<()> {
        let _ = offset;
        Ok(())
    }
}

/// Outbound messaging used by handlers to reply.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef>;
    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef>;
}
