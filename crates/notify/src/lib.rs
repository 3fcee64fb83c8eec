//! Chat platform delivery for relayed GitHub notifications.
//!
//! This crate owns the outbound side of the relay: the platform-neutral
//! [`Notification`] model and the [`ChatPlatform`] trait, plus a Discord
//! implementation that posts embeds through the bot REST API.
//!
//! # Usage
//!
//! ```no_run
//! use notify::{ChannelMessage, ChatPlatform, DiscordChannel, Field, Notification};
//!
//! # async fn run() -> Result<(), notify::ChannelError> {
//! let discord = DiscordChannel::from_env();
//!
//! let notification = Notification::new("Push to main", notify::colors::BRAND)
//!     .field(Field::inline("Commits", "3"));
//!
//! discord
//!     .post_message(123_456_789, &ChannelMessage::new(notification))
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! - `DISCORD_BOT_TOKEN`: bot token used for `Authorization: Bot ...`
//! - `DISCORD_API_BASE`: override the REST base URL (defaults to v10)

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod channels;
pub mod error;
pub mod message;

pub use channels::discord::DiscordChannel;
pub use channels::ChatPlatform;
pub use error::ChannelError;
pub use message::{colors, truncate, Author, ChannelMessage, Field, Notification};
