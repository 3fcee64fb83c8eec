//! Inbound webhook pipeline.
//!
//! Resolves the target repository (one guild, or every guild when the
//! request does not name one), authenticates the raw body against each
//! candidate's secret, then parses, filters, renders and dispatches.
//! Every failure ends as a [`Rejection`] value.

use axum::body::Bytes;
use notify::ChannelMessage;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::dispatch::{mention_content, DeliveryReport, Dispatcher};
use crate::events::{self, EventError, GitHubEvent};
use crate::filter;
use crate::models::{EventType, RepositoryConfig};
use crate::registry::{Registry, RegistryError};
use crate::render::render;
use crate::signature;
use crate::store::StoreError;

/// `X-GitHub-Event` value GitHub sends when a hook is created.
pub const PING_EVENT: &str = "ping";

/// A webhook request as received.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    /// `X-GitHub-Event`
    pub event_type: String,
    /// `X-GitHub-Delivery`
    pub delivery_id: Option<String>,
    /// `X-Hub-Signature-256`
    pub signature: Option<String>,
    /// Explicit repository, otherwise read from the body
    pub repo_name: Option<String>,
    /// Explicit guild, otherwise every guild registering the repository
    pub guild_id: Option<u64>,
    /// Raw body, exactly as received
    pub body: Bytes,
}

/// Why an event was turned away.
#[derive(Debug, Error)]
pub enum Rejection {
    #[error("missing or invalid signature")]
    Authentication,

    #[error("repository {0} is not configured")]
    UnknownRepository(String),

    #[error("repository {0} is disabled")]
    DisabledRepository(String),

    #[error("unsupported event type: {0}")]
    UnsupportedEvent(String),

    #[error("{0}")]
    MalformedPayload(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("store failure: {0}")]
    Internal(String),
}

impl Rejection {
    /// Short reason code for response bodies.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Authentication => "invalid_signature",
            Self::UnknownRepository(_) => "unknown_repository",
            Self::DisabledRepository(_) => "repository_disabled",
            Self::UnsupportedEvent(_) => "unsupported_event",
            Self::MalformedPayload(_) => "malformed_payload",
            Self::BadRequest(_) => "bad_request",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl From<EventError> for Rejection {
    fn from(err: EventError) -> Self {
        match err {
            EventError::Unsupported(tag) => Self::UnsupportedEvent(tag),
            malformed @ EventError::Malformed { .. } => Self::MalformedPayload(malformed.to_string()),
        }
    }
}

impl From<StoreError> for Rejection {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

/// What happened for one matched (repository, guild) pair.
#[derive(Debug)]
pub struct RouteOutcome {
    pub repo_id: u64,
    pub guild_id: u64,
    pub disposition: RouteDisposition,
}

#[derive(Debug)]
pub enum RouteDisposition {
    /// Dropped by the repository's filters
    Filtered,
    /// Dispatched to the mapped channels
    Delivered(DeliveryReport),
    /// Store access failed before dispatch
    Failed(String),
}

/// Terminal state of one inbound event.
#[derive(Debug)]
pub enum PipelineOutcome {
    Rejected(Rejection),
    /// No route dispatched the event
    Suppressed { routes: Vec<RouteOutcome> },
    /// At least one route dispatched
    Completed { routes: Vec<RouteOutcome> },
    /// Authenticated ping
    Pong,
}

/// Webhook processing, from raw request to delivery report.
#[derive(Clone)]
pub struct Pipeline {
    registry: Registry,
    dispatcher: Dispatcher,
}

impl Pipeline {
    #[must_use]
    pub const fn new(registry: Registry, dispatcher: Dispatcher) -> Self {
        Self {
            registry,
            dispatcher,
        }
    }

    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Process one inbound event to completion.
    #[instrument(
        skip_all,
        fields(event_type = %inbound.event_type, delivery_id = inbound.delivery_id.as_deref())
    )]
    pub async fn handle(&self, inbound: InboundEvent) -> PipelineOutcome {
        match self.run(&inbound).await {
            Ok(outcome) => outcome,
            Err(rejection) => {
                match &rejection {
                    Rejection::Authentication => warn!("Rejected webhook: invalid signature"),
                    Rejection::UnknownRepository(repo) | Rejection::DisabledRepository(repo) => {
                        info!(repo = %repo, reason = rejection.reason(), "Ignoring webhook");
                    }
                    Rejection::Internal(e) => warn!(error = %e, "Webhook failed on store access"),
                    other => warn!(reason = other.reason(), error = %other, "Rejected webhook"),
                }
                PipelineOutcome::Rejected(rejection)
            }
        }
    }

    async fn run(&self, inbound: &InboundEvent) -> Result<PipelineOutcome, Rejection> {
        if inbound.event_type.trim().is_empty() {
            return Err(Rejection::BadRequest(
                "missing X-GitHub-Event header".to_string(),
            ));
        }

        let repo_name = inbound
            .repo_name
            .clone()
            .filter(|r| !r.is_empty())
            .or_else(|| events::repository_full_name(&inbound.body))
            .ok_or_else(|| {
                Rejection::BadRequest("cannot determine repository for webhook".to_string())
            })?;

        let candidates = self.candidates(&repo_name, inbound.guild_id).await?;

        let verified: Vec<RepositoryConfig> = candidates
            .into_iter()
            .filter(|repo| {
                signature::verify(
                    repo.webhook_secret.as_bytes(),
                    &inbound.body,
                    inbound.signature.as_deref(),
                )
            })
            .collect();
        if verified.is_empty() {
            return Err(Rejection::Authentication);
        }

        let routes: Vec<RepositoryConfig> = verified
            .into_iter()
            .filter(|repo| {
                let enabled = Registry::is_enabled(repo);
                if !enabled {
                    debug!(repo = %repo.repo_name, guild_id = repo.guild_id, "Repository disabled");
                }
                enabled
            })
            .collect();
        if routes.is_empty() {
            return Err(Rejection::DisabledRepository(repo_name));
        }

        if inbound.event_type == PING_EVENT {
            info!(repo = %repo_name, "Ping received");
            return Ok(PipelineOutcome::Pong);
        }

        let event = GitHubEvent::parse(&inbound.event_type, &inbound.body)?;

        let mut outcomes = Vec::with_capacity(routes.len());
        let mut first_error = None;
        for repo in &routes {
            let disposition = match self.route(repo, &event).await {
                Ok(disposition) => disposition,
                Err(e) => {
                    warn!(
                        repo = %repo.repo_name,
                        guild_id = repo.guild_id,
                        error = %e,
                        "Route failed on store access"
                    );
                    let disposition = RouteDisposition::Failed(e.to_string());
                    first_error.get_or_insert(e);
                    disposition
                }
            };
            outcomes.push(RouteOutcome {
                repo_id: repo.id,
                guild_id: repo.guild_id,
                disposition,
            });
        }

        if let Some(e) = first_error {
            if outcomes
                .iter()
                .all(|o| matches!(o.disposition, RouteDisposition::Failed(_)))
            {
                return Err(e.into());
            }
        }

        let any_delivered = outcomes
            .iter()
            .any(|o| matches!(o.disposition, RouteDisposition::Delivered(_)));
        Ok(if any_delivered {
            PipelineOutcome::Completed { routes: outcomes }
        } else {
            PipelineOutcome::Suppressed { routes: outcomes }
        })
    }

    async fn candidates(
        &self,
        repo_name: &str,
        guild_id: Option<u64>,
    ) -> Result<Vec<RepositoryConfig>, Rejection> {
        let result = match guild_id {
            Some(guild_id) => self.registry.resolve(repo_name, guild_id).await.map(|r| vec![r]),
            None => self.registry.candidates(repo_name).await,
        };

        match result {
            Ok(found) if found.is_empty() => {
                Err(Rejection::UnknownRepository(repo_name.to_string()))
            }
            Ok(found) => Ok(found),
            Err(RegistryError::NotFound { repo_name }) => {
                Err(Rejection::UnknownRepository(repo_name))
            }
            Err(RegistryError::Store(e)) => Err(e.into()),
        }
    }

    async fn route(
        &self,
        repo: &RepositoryConfig,
        event: &GitHubEvent,
    ) -> Result<RouteDisposition, StoreError> {
        let store = self.registry.store();
        let filters = store.get_filter_config(repo.id).await?.unwrap_or_default();
        let event_type: EventType = event.event_type();

        if !filter::allows(&filters, &event.facts()) {
            debug!(
                repo = %repo.repo_name,
                guild_id = repo.guild_id,
                event_type = %event_type,
                "Event filtered out"
            );
            return Ok(RouteDisposition::Filtered);
        }

        let notification = render(event, filters.embed_color.value());
        let mut message = ChannelMessage::new(notification);
        if let Some(mentions) = mention_content(&filters.mention_roles, &filters.mention_users) {
            message = message.with_content(mentions);
        }

        let mappings = store.get_channel_mappings(repo.id, event_type).await?;
        let report = self.dispatcher.dispatch(&message, &mappings).await;

        info!(
            repo = %repo.repo_name,
            guild_id = repo.guild_id,
            event_type = %event_type,
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Event relayed"
        );

        Ok(RouteDisposition::Delivered(report))
    }
}
