//! Typed GitHub webhook payloads.
//!
//! [`GitHubEvent::parse`] turns the `X-GitHub-Event` tag and raw body into
//! one variant per supported [`EventType`]. Unknown tags are rejected
//! outright; a payload missing a required field for its declared type is
//! reported as malformed.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::filter::EventFacts;
use crate::models::EventType;

/// Reasons an inbound event cannot be rendered.
#[derive(Debug, Error)]
pub enum EventError {
    /// Event tag outside the supported set
    #[error("unsupported event type: {0}")]
    Unsupported(String),

    /// Payload does not match the declared event type
    #[error("malformed {event} payload: {source}")]
    Malformed {
        event: EventType,
        #[source]
        source: serde_json::Error,
    },
}

// =============================================================================
// Shared payload pieces
// =============================================================================

/// Repository the event belongs to.
#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    /// Full name (owner/repo)
    pub full_name: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub stargazers_count: Option<u64>,
}

/// GitHub account.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub login: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub avatar_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub name: String,
}

/// Git reference (branch)
#[derive(Debug, Clone, Deserialize)]
pub struct GitRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
}

// =============================================================================
// push
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct PushEvent {
    #[serde(rename = "ref")]
    pub ref_name: String,
    #[serde(default)]
    pub compare: String,
    #[serde(default)]
    pub commits: Vec<Commit>,
    #[serde(default)]
    pub head_commit: Option<Commit>,
    pub pusher: Pusher,
    pub repository: Repository,
    #[serde(default)]
    pub sender: Option<User>,
}

impl PushEvent {
    /// Branch name with `refs/heads/` stripped; other refs are kept whole.
    #[must_use]
    pub fn branch(&self) -> &str {
        self.ref_name
            .strip_prefix("refs/heads/")
            .unwrap_or(&self.ref_name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Commit {
    pub id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub author: Option<CommitAuthor>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitAuthor {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pusher {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

// =============================================================================
// pull_request
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestEvent {
    /// Action type (opened, closed, reopened, ...)
    pub action: String,
    pub pull_request: PullRequest,
    pub repository: Repository,
    #[serde(default)]
    pub sender: Option<User>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub html_url: String,
    pub state: String,
    pub user: User,
    /// Target branch
    pub base: GitRef,
    /// Source branch
    pub head: GitRef,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub merged: bool,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

// =============================================================================
// issues
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct IssuesEvent {
    pub action: String,
    pub issue: Issue,
    pub repository: Repository,
    #[serde(default)]
    pub sender: Option<User>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub html_url: String,
    pub state: String,
    pub user: User,
    #[serde(default)]
    pub assignee: Option<User>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

// =============================================================================
// release
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseEvent {
    pub action: String,
    pub release: Release,
    pub repository: Repository,
    #[serde(default)]
    pub sender: Option<User>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    pub html_url: String,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

// =============================================================================
// deployment
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentEvent {
    pub deployment: Deployment,
    pub repository: Repository,
    #[serde(default)]
    pub sender: Option<User>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Deployment {
    pub environment: String,
    #[serde(rename = "ref")]
    pub ref_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

// =============================================================================
// workflow_run
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRunEvent {
    pub action: String,
    pub workflow_run: WorkflowRun,
    pub repository: Repository,
    #[serde(default)]
    pub sender: Option<User>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRun {
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub conclusion: Option<String>,
    pub html_url: String,
    #[serde(default)]
    pub head_branch: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

// =============================================================================
// star / fork
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct StarEvent {
    /// created or deleted
    pub action: String,
    pub repository: Repository,
    pub sender: User,
    #[serde(default)]
    pub starred_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForkEvent {
    pub forkee: Forkee,
    pub repository: Repository,
    pub sender: User,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Forkee {
    pub full_name: String,
    pub html_url: String,
}

// =============================================================================
// Tagged union
// =============================================================================

/// A parsed webhook event, one variant per supported type.
#[derive(Debug, Clone)]
pub enum GitHubEvent {
    Push(PushEvent),
    PullRequest(PullRequestEvent),
    Issues(IssuesEvent),
    Release(ReleaseEvent),
    Deployment(DeploymentEvent),
    WorkflowRun(WorkflowRunEvent),
    Star(StarEvent),
    Fork(ForkEvent),
}

impl GitHubEvent {
    /// Parse a raw body for the given `X-GitHub-Event` tag.
    pub fn parse(event_type: &str, body: &[u8]) -> Result<Self, EventError> {
        let kind: EventType = event_type
            .parse()
            .map_err(|_| EventError::Unsupported(event_type.to_string()))?;

        let malformed = |source| EventError::Malformed { event: kind, source };

        let event = match kind {
            EventType::Push => Self::Push(serde_json::from_slice(body).map_err(malformed)?),
            EventType::PullRequest => {
                Self::PullRequest(serde_json::from_slice(body).map_err(malformed)?)
            }
            EventType::Issues => Self::Issues(serde_json::from_slice(body).map_err(malformed)?),
            EventType::Release => Self::Release(serde_json::from_slice(body).map_err(malformed)?),
            EventType::Deployment => {
                Self::Deployment(serde_json::from_slice(body).map_err(malformed)?)
            }
            EventType::WorkflowRun => {
                Self::WorkflowRun(serde_json::from_slice(body).map_err(malformed)?)
            }
            EventType::Star => Self::Star(serde_json::from_slice(body).map_err(malformed)?),
            EventType::Fork => Self::Fork(serde_json::from_slice(body).map_err(malformed)?),
        };

        Ok(event)
    }

    #[must_use]
    pub const fn event_type(&self) -> EventType {
        match self {
            Self::Push(_) => EventType::Push,
            Self::PullRequest(_) => EventType::PullRequest,
            Self::Issues(_) => EventType::Issues,
            Self::Release(_) => EventType::Release,
            Self::Deployment(_) => EventType::Deployment,
            Self::WorkflowRun(_) => EventType::WorkflowRun,
            Self::Star(_) => EventType::Star,
            Self::Fork(_) => EventType::Fork,
        }
    }

    #[must_use]
    pub const fn repository(&self) -> &Repository {
        match self {
            Self::Push(e) => &e.repository,
            Self::PullRequest(e) => &e.repository,
            Self::Issues(e) => &e.repository,
            Self::Release(e) => &e.repository,
            Self::Deployment(e) => &e.repository,
            Self::WorkflowRun(e) => &e.repository,
            Self::Star(e) => &e.repository,
            Self::Fork(e) => &e.repository,
        }
    }

    /// Extract the attributes the filter engine matches on.
    #[must_use]
    pub fn facts(&self) -> EventFacts {
        match self {
            Self::Push(e) => EventFacts {
                branch: Some(e.branch().to_string()),
                labels: None,
                author: Some(e.pusher.name.clone()),
            },
            Self::PullRequest(e) => EventFacts {
                branch: Some(e.pull_request.base.ref_name.clone()),
                labels: Some(label_names(&e.pull_request.labels)),
                author: Some(e.pull_request.user.login.clone()),
            },
            Self::Issues(e) => EventFacts {
                branch: None,
                labels: Some(label_names(&e.issue.labels)),
                author: Some(e.issue.user.login.clone()),
            },
            Self::WorkflowRun(e) => EventFacts {
                branch: e.workflow_run.head_branch.clone(),
                labels: None,
                author: sender_login(e.sender.as_ref()),
            },
            Self::Release(e) => EventFacts {
                author: sender_login(e.sender.as_ref()),
                ..EventFacts::default()
            },
            Self::Deployment(e) => EventFacts {
                author: sender_login(e.sender.as_ref()),
                ..EventFacts::default()
            },
            Self::Star(e) => EventFacts {
                author: Some(e.sender.login.clone()),
                ..EventFacts::default()
            },
            Self::Fork(e) => EventFacts {
                author: Some(e.sender.login.clone()),
                ..EventFacts::default()
            },
        }
    }
}

fn label_names(labels: &[Label]) -> Vec<String> {
    labels.iter().map(|l| l.name.clone()).collect()
}

fn sender_login(sender: Option<&User>) -> Option<String> {
    sender.map(|s| s.login.clone())
}

/// Read `repository.full_name` from a raw body without a full parse.
#[must_use]
pub fn repository_full_name(body: &[u8]) -> Option<String> {
    #[derive(Deserialize)]
    struct Envelope {
        repository: Option<EnvelopeRepository>,
    }

    #[derive(Deserialize)]
    struct EnvelopeRepository {
        full_name: Option<String>,
    }

    serde_json::from_slice::<Envelope>(body)
        .ok()?
        .repository?
        .full_name
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Minimal payloads shared by renderer, filter and pipeline tests.

    use serde_json::{json, Value};

    pub fn push(branch: &str, commits: usize) -> Value {
        let commits: Vec<Value> = (0..commits)
            .map(|i| {
                json!({
                    "id": format!("{i:07}abcdef0123456789"),
                    "message": format!("Commit number {i}\n\nLonger body"),
                    "author": { "name": format!("dev{i}") },
                    "url": format!("https://github.com/octo/app/commit/{i}")
                })
            })
            .collect();
        json!({
            "ref": format!("refs/heads/{branch}"),
            "compare": "https://github.com/octo/app/compare/a...b",
            "commits": commits,
            "pusher": { "name": "octocat", "email": "octo@example.com" },
            "repository": { "full_name": "octo/app", "html_url": "https://github.com/octo/app" },
            "sender": { "login": "octocat" }
        })
    }

    pub fn pull_request(action: &str, labels: &[&str], merged: bool) -> Value {
        let labels: Vec<Value> = labels.iter().map(|l| json!({ "name": l })).collect();
        json!({
            "action": action,
            "pull_request": {
                "number": 42,
                "title": "Add relay",
                "body": "Implements the relay",
                "html_url": "https://github.com/octo/app/pull/42",
                "state": if action == "closed" { "closed" } else { "open" },
                "user": { "login": "hubot" },
                "base": { "ref": "main" },
                "head": { "ref": "feature-x" },
                "merged": merged,
                "labels": labels,
                "updated_at": "2024-05-01T12:00:00Z"
            },
            "repository": { "full_name": "octo/app" },
            "sender": { "login": "hubot" }
        })
    }

    pub fn issue(action: &str, labels: &[&str]) -> Value {
        let labels: Vec<Value> = labels.iter().map(|l| json!({ "name": l })).collect();
        json!({
            "action": action,
            "issue": {
                "number": 7,
                "title": "Crash on start",
                "body": "Steps to reproduce",
                "html_url": "https://github.com/octo/app/issues/7",
                "state": "open",
                "user": { "login": "reporter" },
                "labels": labels
            },
            "repository": { "full_name": "octo/app" },
            "sender": { "login": "reporter" }
        })
    }
}
