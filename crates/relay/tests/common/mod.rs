//! Shared harness for relay integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use notify::{ChannelError, ChannelMessage, ChatPlatform};
use relay::store::{ConfigStore, NewRepository};
use relay::{build_router, AppState, Config, Dispatcher, EventType, MemoryStore, Pipeline, Registry};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

pub const SECRET: &str = "integration-secret";
pub const GUILD: u64 = 1000;

// =============================================================================
// Recording chat platform
// =============================================================================

/// Records every post; channels in `failing` answer 404.
#[derive(Default)]
pub struct RecordingPlatform {
    pub posts: Mutex<Vec<(u64, ChannelMessage)>>,
    pub failing: HashSet<u64>,
}

impl RecordingPlatform {
    pub fn failing(channels: &[u64]) -> Self {
        Self {
            failing: channels.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn post_count(&self) -> usize {
        self.posts.lock().unwrap().len()
    }

    pub fn channels(&self) -> Vec<u64> {
        let mut channels: Vec<u64> = self.posts.lock().unwrap().iter().map(|(c, _)| *c).collect();
        channels.sort_unstable();
        channels
    }
}

#[async_trait]
impl ChatPlatform for RecordingPlatform {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn enabled(&self) -> bool {
        true
    }

    async fn post_message(
        &self,
        channel_id: u64,
        message: &ChannelMessage,
    ) -> Result<(), ChannelError> {
        self.posts.lock().unwrap().push((channel_id, message.clone()));
        if self.failing.contains(&channel_id) {
            return Err(ChannelError::ChannelNotFound { channel_id });
        }
        Ok(())
    }
}

// =============================================================================
// Server
// =============================================================================

pub struct TestServer {
    pub addr: SocketAddr,
    pub store: Arc<MemoryStore>,
    pub platform: Arc<RecordingPlatform>,
    pub client: reqwest::Client,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Register `octo/app` in [`GUILD`] with push mapped to `channels`.
    pub async fn register_push(&self, channels: &[u64]) -> u64 {
        let repo = self
            .store
            .create_repository(NewRepository {
                repo_name: "octo/app".into(),
                guild_id: GUILD,
                webhook_secret: SECRET.into(),
                category_id: None,
            })
            .await
            .unwrap();
        for channel in channels {
            self.store
                .upsert_channel_mapping(repo.id, EventType::Push, *channel, true)
                .await
                .unwrap();
        }
        repo.id
    }

    /// POST a webhook signed with `secret`.
    pub async fn deliver(
        &self,
        path: &str,
        event: &str,
        body: &serde_json::Value,
        secret: &str,
    ) -> reqwest::Response {
        let body = serde_json::to_vec(body).unwrap();
        self.client
            .post(self.url(path))
            .header("X-GitHub-Event", event)
            .header("X-GitHub-Delivery", "72d3162e-cc78-11e3-81ab-4c9367dc0958")
            .header(
                "X-Hub-Signature-256",
                relay::signature::sign(secret.as_bytes(), &body),
            )
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .expect("Failed to send webhook")
    }
}

pub fn test_config(admin_token: Option<&str>) -> Config {
    Config {
        host: "127.0.0.1".into(),
        port: 0,
        discord_token: None,
        data_path: None,
        public_url: Some("https://relay.example.com".into()),
        admin_token: admin_token.map(String::from),
        delivery_timeout: Duration::from_secs(2),
        ..Config::default()
    }
}

/// Start the relay on a random port.
pub async fn start_server(config: Config, platform: RecordingPlatform) -> TestServer {
    let store = Arc::new(MemoryStore::new());
    let platform = Arc::new(platform);

    let dispatcher = Dispatcher::new(platform.clone())
        .with_timeout(config.delivery_timeout)
        .with_max_concurrency(config.max_concurrent_deliveries);
    let pipeline = Pipeline::new(Registry::new(store.clone()), dispatcher);
    let app = build_router(AppState::new(config, pipeline));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        addr,
        store,
        platform,
        client: reqwest::Client::new(),
    }
}

// =============================================================================
// Payloads
// =============================================================================

pub fn push_payload(branch: &str) -> serde_json::Value {
    serde_json::json!({
        "ref": format!("refs/heads/{branch}"),
        "compare": "https://github.com/octo/app/compare/abc...def",
        "commits": [{
            "id": "abc1234def5678",
            "message": "Fix relay\n\nDetails",
            "author": { "name": "Octo Cat" },
            "url": "https://github.com/octo/app/commit/abc1234"
        }],
        "pusher": { "name": "octocat" },
        "repository": { "full_name": "octo/app", "html_url": "https://github.com/octo/app" },
        "sender": { "login": "octocat" }
    })
}
