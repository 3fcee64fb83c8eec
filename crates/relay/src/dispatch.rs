//! Fan-out of a rendered message to mapped channels.
//!
//! Every enabled mapping gets one delivery attempt, bounded by a timeout and
//! run with limited concurrency. Failures are recorded per channel and never
//! abort the other deliveries.

use futures::stream::{self, StreamExt};
use notify::{ChannelError, ChannelMessage, ChatPlatform};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::ChannelMapping;

/// Default per-delivery timeout.
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of deliveries in flight per message.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Why a single channel delivery failed.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),
}

impl DeliveryError {
    /// Short machine-readable failure class.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Channel(e) => e.kind(),
            Self::Timeout(_) => "timeout",
        }
    }
}

/// Result of one delivery attempt.
#[derive(Debug)]
pub struct ChannelOutcome {
    pub channel_id: u64,
    pub result: Result<(), DeliveryError>,
}

impl ChannelOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// All attempts made for one message.
#[derive(Debug, Default)]
pub struct DeliveryReport {
    pub attempts: Vec<ChannelOutcome>,
}

impl DeliveryReport {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.attempts.iter().filter(|a| a.is_success()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.attempts.len() - self.succeeded()
    }

    /// True when at least one attempt was made and none failed.
    #[must_use]
    pub fn is_complete_success(&self) -> bool {
        !self.attempts.is_empty() && self.failed() == 0
    }

    /// Serializable view for HTTP responses.
    #[must_use]
    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            attempted: self.attempts.len(),
            succeeded: self.succeeded(),
            failed: self.failed(),
            failures: self
                .attempts
                .iter()
                .filter_map(|a| {
                    a.result.as_ref().err().map(|e| FailureSummary {
                        channel_id: a.channel_id,
                        kind: e.kind(),
                        error: e.to_string(),
                    })
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<FailureSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureSummary {
    pub channel_id: u64,
    pub kind: &'static str,
    pub error: String,
}

/// Delivers messages through a chat platform.
#[derive(Clone)]
pub struct Dispatcher {
    platform: Arc<dyn ChatPlatform>,
    timeout: Duration,
    max_concurrency: usize,
}

impl Dispatcher {
    #[must_use]
    pub fn new(platform: Arc<dyn ChatPlatform>) -> Self {
        Self {
            platform,
            timeout: DEFAULT_DELIVERY_TIMEOUT,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Values below one are raised to one.
    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Deliver `message` to every enabled mapping and wait for all attempts.
    pub async fn dispatch(
        &self,
        message: &ChannelMessage,
        mappings: &[ChannelMapping],
    ) -> DeliveryReport {
        let targets: Vec<u64> = mappings
            .iter()
            .filter(|m| {
                if !m.enabled {
                    debug!(channel_id = m.channel_id, "Channel mapping disabled, skipping");
                }
                m.enabled
            })
            .map(|m| m.channel_id)
            .collect();

        if targets.is_empty() {
            debug!("No enabled channel mappings");
            return DeliveryReport::default();
        }

        let attempts: Vec<ChannelOutcome> = stream::iter(targets)
            .map(|channel_id| self.deliver(channel_id, message))
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        let report = DeliveryReport { attempts };
        info!(
            platform = self.platform.name(),
            attempted = report.attempts.len(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Dispatch finished"
        );
        report
    }

    async fn deliver(&self, channel_id: u64, message: &ChannelMessage) -> ChannelOutcome {
        let result =
            match tokio::time::timeout(self.timeout, self.platform.post_message(channel_id, message))
                .await
            {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(DeliveryError::Channel(e)),
                Err(_) => Err(DeliveryError::Timeout(self.timeout)),
            };

        match &result {
            Ok(()) => debug!(channel_id, "Notification delivered"),
            Err(e) => warn!(
                channel_id,
                kind = e.kind(),
                error = %e,
                "Notification delivery failed"
            ),
        }

        ChannelOutcome { channel_id, result }
    }
}

/// Build the mention line: roles first, then users.
///
/// Numeric entries become `<@&id>` / `<@id>`; anything else is written as
/// `@name`.
#[must_use]
pub fn mention_content(roles: &[String], users: &[String]) -> Option<String> {
    let roles = roles.iter().map(|r| mention(r, "<@&"));
    let users = users.iter().map(|u| mention(u, "<@"));
    let parts: Vec<String> = roles.chain(users).flatten().collect();
    (!parts.is_empty()).then(|| parts.join(" "))
}

fn mention(entry: &str, prefix: &str) -> Option<String> {
    let entry = entry.trim();
    if entry.is_empty() {
        return None;
    }
    if entry.bytes().all(|b| b.is_ascii_digit()) {
        return Some(format!("{prefix}{entry}>"));
    }
    let name = entry.trim_start_matches('@');
    Some(format!("@{name}"))
}
