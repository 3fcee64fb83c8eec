//! End-to-end webhook tests: signed HTTP requests through the router to a
//! recording chat platform.

mod common;

use common::{push_payload, start_server, test_config, RecordingPlatform, GUILD, SECRET};
use relay::store::{ConfigStore, RepositoryUpdate};
use relay::FilterConfig;
use serde_json::{json, Value};

#[tokio::test]
async fn test_valid_push_reaches_both_channels() {
    let server = start_server(test_config(None), RecordingPlatform::default()).await;
    server.register_push(&[11, 12]).await;

    let response = server
        .deliver("/webhook", "push", &push_payload("main"), SECRET)
        .await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "accepted");
    assert_eq!(body["routes"][0]["guild_id"], GUILD);
    assert_eq!(body["routes"][0]["report"]["succeeded"], 2);

    assert_eq!(server.platform.channels(), vec![11, 12]);
    let posts = server.platform.posts.lock().unwrap();
    let notification = &posts[0].1.notification;
    assert_eq!(notification.title, "Push to main");
    assert_eq!(notification.footer.as_deref(), Some("octo/app"));
}

#[tokio::test]
async fn test_invalid_signature_is_rejected_without_delivery() {
    let server = start_server(test_config(None), RecordingPlatform::default()).await;
    server.register_push(&[11]).await;

    let response = server
        .deliver("/webhook", "push", &push_payload("main"), "not-the-secret")
        .await;

    assert_eq!(response.status(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["reason"], "invalid_signature");
    assert_eq!(server.platform.post_count(), 0);
}

#[tokio::test]
async fn test_missing_signature_is_rejected() {
    let server = start_server(test_config(None), RecordingPlatform::default()).await;
    server.register_push(&[11]).await;

    let response = server
        .client
        .post(server.url("/webhook"))
        .header("X-GitHub-Event", "push")
        .json(&push_payload("main"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    assert_eq!(server.platform.post_count(), 0);
}

#[tokio::test]
async fn test_filtered_event_is_ignored() {
    let server = start_server(test_config(None), RecordingPlatform::default()).await;
    let repo_id = server.register_push(&[11]).await;
    server
        .store
        .put_filter_config(
            repo_id,
            FilterConfig {
                branch_filter: vec!["main".into(), "release/*".into()],
                ..FilterConfig::default()
            },
        )
        .await
        .unwrap();

    let response = server
        .deliver("/webhook", "push", &push_payload("feature/login"), SECRET)
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "status": "ignored", "reason": "filtered" }));
    assert_eq!(server.platform.post_count(), 0);

    let response = server
        .deliver("/webhook", "push", &push_payload("release/2.0"), SECRET)
        .await;
    assert_eq!(response.status(), 200);
    assert_eq!(server.platform.post_count(), 1);
}

#[tokio::test]
async fn test_unknown_repository() {
    let server = start_server(test_config(None), RecordingPlatform::default()).await;

    let response = server
        .deliver("/webhook", "push", &push_payload("main"), SECRET)
        .await;
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["reason"], "unknown_repository");
}

#[tokio::test]
async fn test_disabled_repository() {
    let server = start_server(test_config(None), RecordingPlatform::default()).await;
    let repo_id = server.register_push(&[11]).await;
    server
        .store
        .update_repository(
            repo_id,
            RepositoryUpdate {
                enabled: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let response = server
        .deliver("/webhook", "push", &push_payload("main"), SECRET)
        .await;
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["reason"], "repository_disabled");
    assert_eq!(server.platform.post_count(), 0);
}

#[tokio::test]
async fn test_unsupported_and_malformed_events() {
    let server = start_server(test_config(None), RecordingPlatform::default()).await;
    server.register_push(&[11]).await;

    let response = server
        .deliver("/webhook", "gollum", &push_payload("main"), SECRET)
        .await;
    assert_eq!(response.status(), 422);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["reason"], "unsupported_event");

    let malformed = json!({ "repository": { "full_name": "octo/app" }, "ref": 7 });
    let response = server.deliver("/webhook", "push", &malformed, SECRET).await;
    assert_eq!(response.status(), 422);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["reason"], "malformed_payload");
    assert_eq!(server.platform.post_count(), 0);
}

#[tokio::test]
async fn test_partial_channel_failure() {
    let server = start_server(test_config(None), RecordingPlatform::failing(&[12])).await;
    server.register_push(&[11, 12, 13]).await;

    let response = server
        .deliver("/webhook", "push", &push_payload("main"), SECRET)
        .await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    let report = &body["routes"][0]["report"];
    assert_eq!(report["attempted"], 3);
    assert_eq!(report["succeeded"], 2);
    assert_eq!(report["failed"], 1);
    assert_eq!(report["failures"][0]["channel_id"], 12);
    assert_eq!(report["failures"][0]["kind"], "channel_not_found");
}

#[tokio::test]
async fn test_explicit_repo_and_guild_query() {
    let server = start_server(test_config(None), RecordingPlatform::default()).await;
    server.register_push(&[11]).await;

    let path = format!("/webhook/github?repo=octo/app&guild={GUILD}");
    let response = server
        .deliver(&path, "push", &push_payload("main"), SECRET)
        .await;
    assert_eq!(response.status(), 200);

    let response = server
        .deliver("/webhook?guild=42", "push", &push_payload("main"), SECRET)
        .await;
    assert_eq!(response.status(), 404);
    assert_eq!(server.platform.post_count(), 1);
}

#[tokio::test]
async fn test_ping_and_missing_event_header() {
    let server = start_server(test_config(None), RecordingPlatform::default()).await;
    server.register_push(&[11]).await;

    let ping = json!({ "zen": "Design for failure.", "repository": { "full_name": "octo/app" } });
    let response = server.deliver("/webhook", "ping", &ping, SECRET).await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "pong");

    let response = server
        .client
        .post(server.url("/webhook"))
        .json(&push_payload("main"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    assert_eq!(server.platform.post_count(), 0);
}

#[tokio::test]
async fn test_health_and_ready() {
    let server = start_server(test_config(None), RecordingPlatform::default()).await;

    let health: Value = server
        .client
        .get(server.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");

    let ready = server.client.get(server.url("/ready")).send().await.unwrap();
    assert_eq!(ready.status(), 200);
}

#[tokio::test]
async fn test_oversized_body_is_refused() {
    let mut config = test_config(None);
    config.max_body_bytes = 1024;
    let server = start_server(config, RecordingPlatform::default()).await;
    server.register_push(&[11]).await;

    let mut payload = push_payload("main");
    payload["padding"] = json!("x".repeat(4096));
    let response = server.deliver("/webhook", "push", &payload, SECRET).await;

    assert_eq!(response.status(), 413);
    assert_eq!(server.platform.post_count(), 0);
}
