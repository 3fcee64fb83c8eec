//! HTTP server for GitHub webhooks.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{debug, warn};

use crate::admin;
use crate::config::Config;
use crate::pipeline::{InboundEvent, Pipeline, PipelineOutcome, Rejection, RouteDisposition};
use crate::signature::SIGNATURE_HEADER;

const EVENT_HEADER: &str = "x-github-event";
const DELIVERY_HEADER: &str = "x-github-delivery";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Configuration.
    pub config: Arc<Config>,
    /// Webhook pipeline; also owns the registry and dispatcher.
    pub pipeline: Pipeline,
}

impl AppState {
    #[must_use]
    pub fn new(config: Config, pipeline: Pipeline) -> Self {
        Self {
            config: Arc::new(config),
            pipeline,
        }
    }
}

/// Build the HTTP router for the relay service.
pub fn build_router(state: AppState) -> Router {
    let max_body_bytes = state.config.max_body_bytes;

    Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/webhook/github", post(webhook_handler))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .nest("/admin", admin::router(state.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(max_body_bytes)),
        )
        .with_state(state)
}

/// Optional routing hints on the webhook URL.
#[derive(Debug, Default, Deserialize)]
pub struct WebhookQuery {
    /// Repository full name (`owner/name`)
    #[serde(default)]
    pub repo: Option<String>,
    /// Guild the registration belongs to
    #[serde(default)]
    pub guild: Option<u64>,
}

/// Handle an incoming GitHub webhook.
async fn webhook_handler(
    State(state): State<AppState>,
    Query(query): Query<WebhookQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let inbound = InboundEvent {
        event_type: header(&headers, EVENT_HEADER).unwrap_or_default(),
        delivery_id: header(&headers, DELIVERY_HEADER),
        signature: header(&headers, SIGNATURE_HEADER),
        repo_name: query.repo,
        guild_id: query.guild,
        body,
    };

    debug!(
        event_type = %inbound.event_type,
        delivery_id = inbound.delivery_id.as_deref(),
        bytes = inbound.body.len(),
        "Received webhook"
    );

    match state.pipeline.handle(inbound).await {
        PipelineOutcome::Completed { routes } => {
            let routes: Vec<Value> = routes
                .iter()
                .map(|route| match &route.disposition {
                    RouteDisposition::Filtered => json!({
                        "guild_id": route.guild_id,
                        "repo_id": route.repo_id,
                        "status": "filtered",
                    }),
                    RouteDisposition::Delivered(report) => json!({
                        "guild_id": route.guild_id,
                        "repo_id": route.repo_id,
                        "status": "delivered",
                        "report": report.summary(),
                    }),
                    RouteDisposition::Failed(_) => json!({
                        "guild_id": route.guild_id,
                        "repo_id": route.repo_id,
                        "status": "failed",
                    }),
                })
                .collect();
            Json(json!({ "status": "accepted", "routes": routes })).into_response()
        }
        PipelineOutcome::Suppressed { .. } => {
            Json(json!({ "status": "ignored", "reason": "filtered" })).into_response()
        }
        PipelineOutcome::Pong => Json(json!({ "status": "pong" })).into_response(),
        PipelineOutcome::Rejected(rejection) => rejection.into_response(),
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

impl Rejection {
    /// HTTP status for this rejection.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Authentication => StatusCode::UNAUTHORIZED,
            Self::UnknownRepository(_) | Self::DisabledRepository(_) => StatusCode::NOT_FOUND,
            Self::UnsupportedEvent(_) | Self::MalformedPayload(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Store details stay in the logs.
        let message = match &self {
            Self::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        };
        let body = json!({
            "status": "rejected",
            "reason": self.reason(),
            "error": message,
        });
        (status, Json(body)).into_response()
    }
}

/// Health check endpoint.
async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// Readiness check endpoint.
async fn readiness_check(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    if let Err(e) = state.pipeline.registry().store().ping().await {
        warn!(error = %e, "Store not ready");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    Ok(Json(json!({ "status": "ready" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_status_codes() {
        assert_eq!(
            Rejection::Authentication.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            Rejection::UnknownRepository("a/b".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Rejection::DisabledRepository("a/b".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Rejection::UnsupportedEvent("gollum".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            Rejection::MalformedPayload("x".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            Rejection::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Rejection::Internal("disk".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_header_trims_and_drops_blank() {
        let mut headers = HeaderMap::new();
        headers.insert(EVENT_HEADER, " push ".parse().unwrap());
        headers.insert(DELIVERY_HEADER, "".parse().unwrap());
        assert_eq!(header(&headers, EVENT_HEADER).as_deref(), Some("push"));
        assert_eq!(header(&headers, DELIVERY_HEADER), None);
        assert_eq!(header(&headers, SIGNATURE_HEADER), None);
    }
}
