//! GitHub webhook relay for Discord.
//!
//! This crate provides:
//! - Signature verification over raw webhook bodies
//! - Per-guild repository registry and config store with JSON snapshots
//! - Typed GitHub event parsing and notification rendering
//! - Branch/label/author filtering and mention decoration
//! - Bounded, timed fan-out to mapped Discord channels
//! - HTTP server for webhooks plus an admin API

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod admin;
pub mod config;
pub mod dispatch;
pub mod events;
pub mod filter;
pub mod models;
pub mod pipeline;
pub mod registry;
pub mod render;
pub mod server;
pub mod signature;
pub mod store;

pub use config::Config;
pub use dispatch::{DeliveryError, DeliveryReport, Dispatcher};
pub use events::{EventError, GitHubEvent};
pub use filter::{allows, EventFacts};
pub use models::{ChannelMapping, EmbedColor, EventType, FilterConfig, RepositoryConfig};
pub use pipeline::{InboundEvent, Pipeline, PipelineOutcome, Rejection};
pub use registry::{Registry, RegistryError};
pub use render::{render, render_raw, RenderedNotification};
pub use server::{build_router, AppState};
pub use store::{ConfigStore, MemoryStore, StoreError};
