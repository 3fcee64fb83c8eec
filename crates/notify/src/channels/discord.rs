//! Discord bot REST channel.
//!
//! Posts embeds with `POST /channels/{channel_id}/messages`, authenticated
//! with a bot token.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::ChatPlatform;
use crate::error::ChannelError;
use crate::message::{ChannelMessage, Notification};

/// Environment variable for the Discord bot token.
const ENV_DISCORD_BOT_TOKEN: &str = "DISCORD_BOT_TOKEN";

/// Environment variable overriding the Discord API base URL.
const ENV_DISCORD_API_BASE: &str = "DISCORD_API_BASE";

/// Default Discord REST API base.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Fallback wait when a 429 carries no usable retry hint.
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Discord bot channel.
pub struct DiscordChannel {
    bot_token: Option<String>,
    api_base: String,
    client: reqwest::Client,
}

impl DiscordChannel {
    /// Create a new Discord channel from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let bot_token = std::env::var(ENV_DISCORD_BOT_TOKEN)
            .ok()
            .filter(|t| !t.is_empty());
        let api_base =
            std::env::var(ENV_DISCORD_API_BASE).unwrap_or_else(|_| DEFAULT_API_BASE.to_string());

        if bot_token.is_some() {
            debug!("Discord delivery enabled");
        } else {
            debug!("Discord delivery disabled (DISCORD_BOT_TOKEN not set)");
        }

        Self {
            bot_token,
            api_base,
            client: reqwest::Client::new(),
        }
    }

    /// Create a Discord channel with a specific bot token.
    #[must_use]
    pub fn new(bot_token: String) -> Self {
        Self {
            bot_token: Some(bot_token),
            api_base: DEFAULT_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point the client at a different API base (proxies, tests).
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Format a message as a Discord create-message payload.
    fn format_payload(message: &ChannelMessage) -> DiscordPayload {
        DiscordPayload {
            content: message.content.clone(),
            embeds: vec![DiscordEmbed::from(&message.notification)],
            allowed_mentions: DiscordAllowedMentions {
                parse: vec!["roles", "users"],
            },
        }
    }

    /// Work out how long Discord wants us to back off.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    async fn retry_after(response: reqwest::Response) -> u64 {
        let from_header = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<f64>().ok());

        let secs = match from_header {
            Some(secs) => Some(secs),
            None => response
                .json::<DiscordRateLimit>()
                .await
                .ok()
                .map(|body| body.retry_after),
        };

        secs.filter(|s| s.is_finite() && *s >= 0.0)
            .map_or(DEFAULT_RETRY_AFTER_SECS, |s| s.ceil() as u64)
    }
}

#[async_trait]
impl ChatPlatform for DiscordChannel {
    fn name(&self) -> &'static str {
        "discord"
    }

    fn enabled(&self) -> bool {
        self.bot_token.is_some()
    }

    async fn post_message(
        &self,
        channel_id: u64,
        message: &ChannelMessage,
    ) -> Result<(), ChannelError> {
        let token = self
            .bot_token
            .as_ref()
            .ok_or_else(|| ChannelError::NotConfigured(ENV_DISCORD_BOT_TOKEN.to_string()))?;

        let payload = Self::format_payload(message);
        let url = format!("{}/channels/{channel_id}/messages", self.api_base);

        debug!(
            channel = "discord",
            channel_id,
            title = %message.notification.title,
            "Posting message"
        );

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, format!("Bot {token}"))
            .json(&payload)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                debug!(channel = "discord", channel_id, "Message posted");
                Ok(())
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after_secs = Self::retry_after(response).await;
                warn!(
                    channel = "discord",
                    channel_id,
                    retry_after_secs,
                    "Rate limited by Discord"
                );
                Err(ChannelError::RateLimited { retry_after_secs })
            }
            StatusCode::FORBIDDEN => {
                warn!(channel = "discord", channel_id, "Missing permission for channel");
                Err(ChannelError::MissingPermission { channel_id })
            }
            StatusCode::NOT_FOUND => {
                warn!(channel = "discord", channel_id, "Channel not found");
                Err(ChannelError::ChannelNotFound { channel_id })
            }
            status => {
                let body = response.text().await.unwrap_or_default();

                warn!(
                    channel = "discord",
                    channel_id,
                    status = %status,
                    body = %body,
                    "Discord request failed"
                );

                Err(ChannelError::Other(format!(
                    "Discord returned {status}: {body}"
                )))
            }
        }
    }
}

// =============================================================================
// Discord API types
// =============================================================================

#[derive(Debug, Serialize)]
struct DiscordPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    embeds: Vec<DiscordEmbed>,
    allowed_mentions: DiscordAllowedMentions,
}

#[derive(Debug, Serialize)]
struct DiscordAllowedMentions {
    parse: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct DiscordEmbed {
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    color: u32,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    author: Option<DiscordAuthor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    footer: Option<DiscordFooter>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<DiscordField>,
}

impl From<&Notification> for DiscordEmbed {
    fn from(n: &Notification) -> Self {
        Self {
            title: n.title.clone(),
            url: n.url.clone(),
            description: n.description.clone(),
            color: n.color,
            timestamp: n.timestamp.to_rfc3339(),
            author: n.author.as_ref().map(|a| DiscordAuthor {
                name: a.name.clone(),
                url: a.url.clone().filter(|u| !u.is_empty()),
                icon_url: a.icon_url.clone().filter(|u| !u.is_empty()),
            }),
            footer: n.footer.as_ref().map(|text| DiscordFooter { text: text.clone() }),
            fields: n
                .fields
                .iter()
                .map(|f| DiscordField {
                    name: f.name.clone(),
                    value: f.value.clone(),
                    inline: f.inline,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DiscordAuthor {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct DiscordFooter {
    text: String,
}

#[derive(Debug, Serialize)]
struct DiscordField {
    name: String,
    value: String,
    inline: bool,
}

#[derive(Debug, Deserialize)]
struct DiscordRateLimit {
    retry_after: f64,
}
