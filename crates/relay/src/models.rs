//! Configuration records: repositories, channel mappings and filters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// GitHub event categories the relay knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Push,
    PullRequest,
    Issues,
    Release,
    Deployment,
    WorkflowRun,
    Star,
    Fork,
}

impl EventType {
    /// Every supported event type, in display order.
    pub const ALL: [Self; 8] = [
        Self::Push,
        Self::PullRequest,
        Self::Issues,
        Self::Release,
        Self::Deployment,
        Self::WorkflowRun,
        Self::Star,
        Self::Fork,
    ];

    /// The `X-GitHub-Event` header value for this type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::PullRequest => "pull_request",
            Self::Issues => "issues",
            Self::Release => "release",
            Self::Deployment => "deployment",
            Self::WorkflowRun => "workflow_run",
            Self::Star => "star",
            Self::Fork => "fork",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown event type tag.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported event type: {0}")]
pub struct UnknownEventType(pub String);

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownEventType(s.to_string()))
    }
}

/// A repository registered for one guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub id: u64,
    /// Full name, `owner/name`.
    pub repo_name: String,
    pub guild_id: u64,
    pub webhook_secret: String,
    #[serde(default)]
    pub category_id: Option<u64>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Binding of an event type to a destination channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMapping {
    pub id: u64,
    pub repo_id: u64,
    pub event_type: EventType,
    pub channel_id: u64,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Embed color, stored and exchanged as a hex string (`0x5865F2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EmbedColor(pub u32);

impl EmbedColor {
    /// Brand default.
    pub const DEFAULT: Self = Self(notify::colors::BRAND);

    /// Parse `0x5865F2`, `#5865F2` or `5865F2`.
    pub fn parse(input: &str) -> Result<Self, InvalidColor> {
        let trimmed = input.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .or_else(|| trimmed.strip_prefix('#'))
            .unwrap_or(trimmed);

        if digits.is_empty() || digits.len() > 6 {
            return Err(InvalidColor(input.to_string()));
        }

        u32::from_str_radix(digits, 16)
            .map(Self)
            .map_err(|_| InvalidColor(input.to_string()))
    }

    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl Default for EmbedColor {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for EmbedColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:06X}", self.0)
    }
}

/// Color string that is not a 24-bit hex value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid embed color: {0}")]
pub struct InvalidColor(pub String);

impl Serialize for EmbedColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EmbedColor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(u32),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(value) if value <= 0x00ff_ffff => Ok(Self(value)),
            Raw::Int(value) => Err(serde::de::Error::custom(format!(
                "embed color {value:#x} exceeds 24 bits"
            ))),
            Raw::Text(text) => Self::parse(&text).map_err(serde::de::Error::custom),
        }
    }
}

/// Per-repository routing rules and decoration.
///
/// An empty list leaves that axis unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Branch glob patterns.
    #[serde(default)]
    pub branch_filter: Vec<String>,
    /// Labels, any of which admits the event.
    #[serde(default)]
    pub label_filter: Vec<String>,
    /// Allowed actor usernames.
    #[serde(default)]
    pub author_filter: Vec<String>,
    /// Roles to mention (id or name).
    #[serde(default)]
    pub mention_roles: Vec<String>,
    /// Users to mention (id or name).
    #[serde(default)]
    pub mention_users: Vec<String>,
    #[serde(default)]
    pub embed_color: EmbedColor,
}

/// Split a comma-separated list, trimming entries and dropping blanks.
#[must_use]
pub fn split_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
