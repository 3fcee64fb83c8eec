//! Chat platform implementations.

pub mod discord;

use async_trait::async_trait;

use crate::error::ChannelError;
use crate::message::ChannelMessage;

/// A chat platform that can post a message into a channel.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Get the name of this platform.
    fn name(&self) -> &'static str;

    /// Check if this platform is configured (credentials present).
    fn enabled(&self) -> bool;

    /// Post a message to the given channel.
    async fn post_message(
        &self,
        channel_id: u64,
        message: &ChannelMessage,
    ) -> Result<(), ChannelError>;
}
