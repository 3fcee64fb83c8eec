//! Platform-neutral notification model.
//!
//! A [`Notification`] is the rendered form of one event: a title, an optional
//! body, a color, and a list of named fields. A [`ChannelMessage`] wraps it
//! with the plain-text content (mentions) posted alongside.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of an embed title.
pub const TITLE_LIMIT: usize = 256;

/// Maximum length of an embed description.
pub const DESCRIPTION_LIMIT: usize = 4096;

/// Maximum length of a field name.
pub const FIELD_NAME_LIMIT: usize = 256;

/// Maximum length of a field value.
pub const FIELD_VALUE_LIMIT: usize = 1024;

/// Maximum number of fields on one embed.
pub const MAX_FIELDS: usize = 25;

/// Common embed colors.
pub mod colors {
    /// Discord blurple, the default embed color.
    pub const BRAND: u32 = 0x0058_65f2;
    /// Opened / success.
    pub const GREEN: u32 = 0x002e_cc71;
    /// Closed / failure.
    pub const RED: u32 = 0x00e7_4c3c;
    /// Merged.
    pub const PURPLE: u32 = 0x009b_59b6;
    /// Reopened.
    pub const BLUE: u32 = 0x0034_98db;
    /// Published / starred.
    pub const ORANGE: u32 = 0x00f3_9c12;
    /// Cancelled.
    pub const GREY: u32 = 0x0095_a5a6;
}

/// Author line shown at the top of a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

/// A single named field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl Field {
    /// Create an inline field.
    pub fn inline(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, value, true)
    }

    /// Create a full-width field.
    pub fn block(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, value, false)
    }

    fn new(name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        let value = value.into();
        // Empty field values are rejected by the platform.
        let value = if value.trim().is_empty() {
            "-".to_string()
        } else {
            truncate(&value, FIELD_VALUE_LIMIT)
        };
        Self {
            name: truncate(&name.into(), FIELD_NAME_LIMIT),
            value,
            inline,
        }
    }
}

/// A rendered notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub color: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    /// Start a notification with a title and color, timestamped now.
    pub fn new(title: impl Into<String>, color: u32) -> Self {
        Self {
            title: truncate(&title.into(), TITLE_LIMIT),
            url: None,
            description: None,
            color,
            author: None,
            fields: Vec::new(),
            footer: None,
            timestamp: Utc::now(),
        }
    }

    /// Set the link target. Empty URLs are dropped.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.url = (!url.is_empty()).then_some(url);
        self
    }

    /// Set the body text. Empty text is dropped.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.description =
            (!description.is_empty()).then(|| truncate(&description, DESCRIPTION_LIMIT));
        self
    }

    #[must_use]
    pub fn with_author(mut self, author: Author) -> Self {
        self.author = Some(author);
        self
    }

    #[must_use]
    pub fn with_footer(mut self, footer: impl Into<String>) -> Self {
        let footer = footer.into();
        self.footer = (!footer.is_empty()).then_some(footer);
        self
    }

    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Append a field. Fields past [`MAX_FIELDS`] are dropped.
    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        if self.fields.len() < MAX_FIELDS {
            self.fields.push(field);
        }
        self
    }

    /// Look up a field value by name.
    #[must_use]
    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }
}

/// What actually gets posted to a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Plain-text content (mention prefix), if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub notification: Notification,
}

impl ChannelMessage {
    #[must_use]
    pub const fn new(notification: Notification) -> Self {
        Self {
            content: None,
            notification,
        }
    }

    /// Attach mention content. Blank content is ignored.
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        let content = content.into();
        self.content = (!content.trim().is_empty()).then_some(content);
        self
    }
}

/// Truncate to at most `max` characters, ending in `...` when cut.
#[must_use]
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}
