//! Administrative API: repository registration and routing configuration.
//!
//! Served under `/admin`. When an admin token is configured every request
//! must carry `Authorization: Bearer <token>`.

use axum::{
    extract::{Path, Query, Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use notify::{ChannelMessage, Field, Notification};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{error, info};

use crate::dispatch::mention_content;
use crate::models::{
    split_list, ChannelMapping, EmbedColor, EventType, FilterConfig, RepositoryConfig,
};
use crate::server::AppState;
use crate::store::{ConfigStore, NewRepository, RepositoryUpdate, StoreError};

/// Random bytes in a generated webhook secret.
const SECRET_BYTES: usize = 32;

/// Build the admin router. Mounted under `/admin` by the server.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/guilds/{guild_id}/repositories",
            post(setup_repository).get(list_repositories),
        )
        .route("/guilds/{guild_id}/stats", get(guild_stats))
        .route("/guilds/{guild_id}/export", get(export_guild))
        .route(
            "/repositories/{id}",
            get(get_repository)
                .patch(configure_repository)
                .delete(remove_repository),
        )
        .route(
            "/repositories/{id}/channels/{event_type}",
            put(put_channel).delete(delete_channel),
        )
        .route("/repositories/{id}/filters", put(put_filters))
        .route("/repositories/{id}/test", post(send_test))
        .route_layer(middleware::from_fn_with_state(state, require_admin))
}

/// Reject requests without the configured bearer token.
async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.config.admin_token.as_deref() else {
        return Ok(next.run(request).await);
    };

    let provided = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .unwrap_or_default();

    if bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(next.run(request).await)
    } else {
        Err(ApiError::Unauthorized)
    }
}

/// Generate a webhook secret: 32 random bytes, hex encoded.
#[must_use]
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing or invalid admin token")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unprocessable(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { .. } => Self::Conflict(err.to_string()),
            StoreError::NotFound(_) => Self::NotFound(err.to_string()),
            StoreError::Validation(_) => Self::Unprocessable(err.to_string()),
            StoreError::Io(_) | StoreError::Serialization(_) => {
                error!(error = %err, "Store failure in admin API");
                Self::Internal("store failure".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "status": "error", "error": self.to_string() });
        (self.status_code(), Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// Views
// ============================================================================

/// Repository as exposed by the API. The secret is never included.
#[derive(Debug, Serialize)]
struct RepositoryView {
    id: u64,
    repo_name: String,
    guild_id: u64,
    category_id: Option<u64>,
    enabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<&RepositoryConfig> for RepositoryView {
    fn from(repo: &RepositoryConfig) -> Self {
        Self {
            id: repo.id,
            repo_name: repo.repo_name.clone(),
            guild_id: repo.guild_id,
            category_id: repo.category_id,
            enabled: repo.enabled,
            created_at: repo.created_at,
            updated_at: repo.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct RepositoryDetail {
    repository: RepositoryView,
    channels: Vec<ChannelMapping>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filters: Option<FilterConfig>,
}

async fn load_repository(store: &dyn ConfigStore, id: u64) -> ApiResult<RepositoryConfig> {
    store
        .get_repository_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("repository {id} not found")))
}

fn parse_event_type(raw: &str) -> ApiResult<EventType> {
    raw.parse().map_err(|e: crate::models::UnknownEventType| {
        ApiError::Unprocessable(format!(
            "{e}; expected one of: {}",
            EventType::ALL.map(|t| t.as_str()).join(", ")
        ))
    })
}

fn validate_repo_name(name: &str) -> ApiResult<()> {
    match name.split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
            Ok(())
        }
        _ => Err(ApiError::Unprocessable(format!(
            "repository must be in owner/name form, got {name:?}"
        ))),
    }
}

// ============================================================================
// Repositories
// ============================================================================

#[derive(Debug, Deserialize)]
struct SetupRequest {
    repo_name: String,
    #[serde(default)]
    category_id: Option<u64>,
    /// Event type → channel
    #[serde(default)]
    channels: BTreeMap<String, u64>,
}

/// Register a repository for a guild and hand back its webhook settings.
async fn setup_repository(
    State(state): State<AppState>,
    Path(guild_id): Path<u64>,
    Json(request): Json<SetupRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let repo_name = request.repo_name.trim().to_string();
    validate_repo_name(&repo_name)?;

    let channels = request
        .channels
        .iter()
        .map(|(event, channel)| Ok((parse_event_type(event)?, *channel)))
        .collect::<ApiResult<Vec<_>>>()?;

    let store = state.pipeline.registry().store();
    let secret = generate_secret();
    let repo = store
        .create_repository(NewRepository {
            repo_name: repo_name.clone(),
            guild_id,
            webhook_secret: secret.clone(),
            category_id: request.category_id,
        })
        .await?;

    let mut mappings = Vec::with_capacity(channels.len());
    for (event_type, channel_id) in channels {
        mappings.push(
            store
                .upsert_channel_mapping(repo.id, event_type, channel_id, true)
                .await?,
        );
    }
    store
        .put_filter_config(repo.id, FilterConfig::default())
        .await?;

    info!(
        repo = %repo_name,
        guild_id,
        channels = mappings.len(),
        "Repository registered"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "repository": RepositoryView::from(&repo),
            "channels": mappings,
            "webhook_url": state.config.webhook_url(guild_id),
            "webhook_secret": secret,
            "content_type": "application/json",
            "events": EventType::ALL.map(|t| t.as_str()),
        })),
    ))
}

async fn list_repositories(
    State(state): State<AppState>,
    Path(guild_id): Path<u64>,
) -> ApiResult<Json<Value>> {
    let store = state.pipeline.registry().store();
    let mut repositories = Vec::new();
    for repo in store.list_repositories(guild_id).await? {
        repositories.push(RepositoryDetail {
            channels: store.list_channel_mappings(repo.id).await?,
            repository: RepositoryView::from(&repo),
            filters: None,
        });
    }
    Ok(Json(json!({ "guild_id": guild_id, "repositories": repositories })))
}

async fn get_repository(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Json<RepositoryDetail>> {
    let store = state.pipeline.registry().store();
    let repo = load_repository(&**store, id).await?;
    Ok(Json(RepositoryDetail {
        channels: store.list_channel_mappings(repo.id).await?,
        filters: Some(store.get_filter_config(repo.id).await?.unwrap_or_default()),
        repository: RepositoryView::from(&repo),
    }))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigureRequest {
    #[serde(default)]
    enabled: Option<bool>,
    #[serde(default)]
    category_id: Option<u64>,
    #[serde(default)]
    rotate_secret: bool,
}

async fn configure_repository(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<ConfigureRequest>,
) -> ApiResult<Json<Value>> {
    let store = state.pipeline.registry().store();
    let new_secret = request.rotate_secret.then(generate_secret);

    let repo = store
        .update_repository(
            id,
            RepositoryUpdate {
                webhook_secret: new_secret.clone(),
                category_id: request.category_id,
                enabled: request.enabled,
            },
        )
        .await?;

    info!(
        repo = %repo.repo_name,
        guild_id = repo.guild_id,
        enabled = repo.enabled,
        rotated = new_secret.is_some(),
        "Repository updated"
    );

    let mut body = json!({ "repository": RepositoryView::from(&repo) });
    if let Some(secret) = new_secret {
        body["webhook_secret"] = json!(secret);
    }
    Ok(Json(body))
}

async fn remove_repository(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<StatusCode> {
    state.pipeline.registry().store().delete_repository(id).await?;
    info!(repo_id = id, "Repository removed");
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Channel mappings
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChannelRequest {
    channel_id: u64,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

const fn default_enabled() -> bool {
    true
}

async fn put_channel(
    State(state): State<AppState>,
    Path((id, event_type)): Path<(u64, String)>,
    Json(request): Json<ChannelRequest>,
) -> ApiResult<Json<ChannelMapping>> {
    let event_type = parse_event_type(&event_type)?;
    let mapping = state
        .pipeline
        .registry()
        .store()
        .upsert_channel_mapping(id, event_type, request.channel_id, request.enabled)
        .await?;
    Ok(Json(mapping))
}

#[derive(Debug, Default, Deserialize)]
struct ChannelQuery {
    #[serde(default)]
    channel_id: Option<u64>,
}

async fn delete_channel(
    State(state): State<AppState>,
    Path((id, event_type)): Path<(u64, String)>,
    Query(query): Query<ChannelQuery>,
) -> ApiResult<Json<Value>> {
    let event_type = parse_event_type(&event_type)?;
    let removed = state
        .pipeline
        .registry()
        .store()
        .delete_channel_mappings(id, event_type, query.channel_id)
        .await?;
    Ok(Json(json!({ "removed": removed })))
}

// ============================================================================
// Filters
// ============================================================================

/// A list given either as an array or a comma-separated string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListInput {
    Items(Vec<String>),
    Csv(String),
}

impl ListInput {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::Items(items) => items
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Self::Csv(text) => split_list(&text),
        }
    }
}

/// Partial filter update; absent fields keep their current value.
#[derive(Debug, Default, Deserialize)]
struct FilterUpdate {
    #[serde(default)]
    branch_filter: Option<ListInput>,
    #[serde(default)]
    label_filter: Option<ListInput>,
    #[serde(default)]
    author_filter: Option<ListInput>,
    #[serde(default)]
    mention_roles: Option<ListInput>,
    #[serde(default)]
    mention_users: Option<ListInput>,
    #[serde(default)]
    embed_color: Option<EmbedColor>,
}

impl FilterUpdate {
    fn apply(self, config: &mut FilterConfig) {
        let lists = [
            (self.branch_filter, &mut config.branch_filter),
            (self.label_filter, &mut config.label_filter),
            (self.author_filter, &mut config.author_filter),
            (self.mention_roles, &mut config.mention_roles),
            (self.mention_users, &mut config.mention_users),
        ];
        for (update, target) in lists {
            if let Some(update) = update {
                *target = update.into_vec();
            }
        }
        if let Some(color) = self.embed_color {
            config.embed_color = color;
        }
    }
}

async fn put_filters(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(update): Json<FilterUpdate>,
) -> ApiResult<Json<FilterConfig>> {
    let store = state.pipeline.registry().store();
    let repo = load_repository(&**store, id).await?;

    let mut config = store.get_filter_config(repo.id).await?.unwrap_or_default();
    update.apply(&mut config);
    let config = store.put_filter_config(repo.id, config).await?;

    info!(repo = %repo.repo_name, guild_id = repo.guild_id, "Filters updated");
    Ok(Json(config))
}

// ============================================================================
// Test delivery, stats, export
// ============================================================================

/// Send a test notification to every enabled channel of a repository.
async fn send_test(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Json<Value>> {
    let store = state.pipeline.registry().store();
    let repo = load_repository(&**store, id).await?;
    let filters = store.get_filter_config(repo.id).await?.unwrap_or_default();

    // A channel mapped for several events gets one test message.
    let mut mappings = store.list_channel_mappings(repo.id).await?;
    mappings.sort_by_key(|m| (m.channel_id, !m.enabled));
    mappings.dedup_by_key(|m| m.channel_id);

    let notification = Notification::new("Test Notification", filters.embed_color.value())
        .with_description(format!(
            "Webhook relay for {} is configured and can post to this channel.",
            repo.repo_name
        ))
        .field(Field::inline("Repository", repo.repo_name.clone()))
        .field(Field::inline("Status", if repo.enabled { "Enabled" } else { "Disabled" }))
        .with_footer(repo.repo_name.clone());
    let mut message = ChannelMessage::new(notification);
    if let Some(mentions) = mention_content(&filters.mention_roles, &filters.mention_users) {
        message = message.with_content(mentions);
    }

    let report = state.pipeline.dispatcher().dispatch(&message, &mappings).await;
    Ok(Json(json!({
        "repository": repo.repo_name,
        "report": report.summary(),
    })))
}

async fn guild_stats(
    State(state): State<AppState>,
    Path(guild_id): Path<u64>,
) -> ApiResult<Json<Value>> {
    let store = state.pipeline.registry().store();
    let repositories = store.list_repositories(guild_id).await?;

    let mut channel_mappings = 0;
    for repo in &repositories {
        channel_mappings += store.list_channel_mappings(repo.id).await?.len();
    }
    let enabled = repositories.iter().filter(|r| r.enabled).count();

    Ok(Json(json!({
        "guild_id": guild_id,
        "repositories": repositories.len(),
        "enabled_repositories": enabled,
        "channel_mappings": channel_mappings,
    })))
}

async fn export_guild(
    State(state): State<AppState>,
    Path(guild_id): Path<u64>,
) -> ApiResult<Json<Value>> {
    let store = state.pipeline.registry().store();
    let mut repositories = Vec::new();
    for repo in store.list_repositories(guild_id).await? {
        repositories.push(RepositoryDetail {
            channels: store.list_channel_mappings(repo.id).await?,
            filters: Some(store.get_filter_config(repo.id).await?.unwrap_or_default()),
            repository: RepositoryView::from(&repo),
        });
    }

    Ok(Json(json!({
        "guild_id": guild_id,
        "exported_at": Utc::now(),
        "repositories": repositories,
    })))
}
