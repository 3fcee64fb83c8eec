//! Error types for chat platform delivery.

use thiserror::Error;

/// Errors that can occur when posting a message to a channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Platform client is not configured
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Rate limited by the platform
    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds to wait before retrying
        retry_after_secs: u64,
    },

    /// The bot lacks permission to post in the channel
    #[error("Missing permission to post in channel {channel_id}")]
    MissingPermission {
        /// Target channel
        channel_id: u64,
    },

    /// The channel does not exist (deleted, or never visible to the bot)
    #[error("Channel {channel_id} not found")]
    ChannelNotFound {
        /// Target channel
        channel_id: u64,
    },

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ChannelError {
    /// Short machine-readable kind, used in delivery reports.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::NotConfigured(_) => "not_configured",
            Self::Serialization(_) => "serialization",
            Self::RateLimited { .. } => "rate_limited",
            Self::MissingPermission { .. } => "missing_permission",
            Self::ChannelNotFound { .. } => "channel_not_found",
            Self::Other(_) => "other",
        }
    }
}
