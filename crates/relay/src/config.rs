//! Configuration for the relay service.

use std::path::PathBuf;
use std::time::Duration;

use crate::dispatch::{DEFAULT_DELIVERY_TIMEOUT, DEFAULT_MAX_CONCURRENCY};

/// GitHub's maximum webhook payload size.
pub const DEFAULT_MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Relay service configuration.
#[derive(Clone)]
pub struct Config {
    /// Interface to bind.
    pub host: String,
    /// HTTP server port.
    pub port: u16,
    /// Discord bot token.
    pub discord_token: Option<String>,
    /// Discord REST base URL.
    pub discord_api_base: String,
    /// Snapshot file for the config store. `None` keeps state in memory only.
    pub data_path: Option<PathBuf>,
    /// Externally reachable base URL, used in the webhook URL handed out by setup.
    pub public_url: Option<String>,
    /// Bearer token guarding `/admin`. `None` leaves the admin API open.
    pub admin_token: Option<String>,
    /// Per-channel delivery timeout.
    pub delivery_timeout: Duration,
    /// Deliveries in flight per event.
    pub max_concurrent_deliveries: usize,
    /// Request body limit.
    pub max_body_bytes: usize,
}

/// Built-in defaults. Environment overrides are applied by the binary's CLI.
impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            discord_token: None,
            discord_api_base: notify::channels::discord::DEFAULT_API_BASE.to_string(),
            data_path: Some(PathBuf::from("./data/relay.json")),
            public_url: None,
            admin_token: None,
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
            max_concurrent_deliveries: DEFAULT_MAX_CONCURRENCY,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl Config {
    /// Base URL GitHub should deliver to.
    #[must_use]
    pub fn base_url(&self) -> String {
        self.public_url.as_deref().map_or_else(
            || format!("http://{}:{}", self.host, self.port),
            |url| url.trim_end_matches('/').to_string(),
        )
    }

    /// Webhook URL for one guild's registrations.
    #[must_use]
    pub fn webhook_url(&self, guild_id: u64) -> String {
        format!("{}/webhook?guild={guild_id}", self.base_url())
    }
}
