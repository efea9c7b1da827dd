//! Outbound channel trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::OutgoingMessage;

/// A delivery channel to the admin endpoint.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Channel name (e.g. "telegram").
    fn name(&self) -> &str;

    /// Deliver one message.
    async fn send(&self, message: OutgoingMessage) -> Result<()>;

    /// Acknowledge a button press, optionally with a short popup text.
    async fn answer_callback(&self, _query_id: &str, _text: Option<&str>) -> Result<()> {
        Ok(())
    }

    /// Remove the buttons of a previously sent message.
    async fn clear_buttons(&self, _thread_id: &str, _message_id: i64) -> Result<()> {
        Ok(())
    }
}
