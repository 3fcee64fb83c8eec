//! Turns parsed GitHub events into platform-neutral notifications.

use chrono::{DateTime, Utc};
use notify::{colors, truncate, Author, Field, Notification};

use crate::events::{
    DeploymentEvent, EventError, ForkEvent, GitHubEvent, IssuesEvent, Label, PullRequestEvent,
    PushEvent, ReleaseEvent, StarEvent, User, WorkflowRunEvent,
};
use crate::models::EventType;

/// Commits listed individually on a push before summarizing the rest.
const MAX_LISTED_COMMITS: usize = 5;
const MAX_LISTED_LABELS: usize = 10;
const BODY_PREVIEW: usize = 500;
const RELEASE_BODY_PREVIEW: usize = 1000;

/// A notification ready for dispatch, tagged with its source event type.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedNotification {
    pub event_type: EventType,
    pub notification: Notification,
}

/// Parse and render in one step.
pub fn render_raw(
    event_type: &str,
    body: &[u8],
    base_color: u32,
) -> Result<RenderedNotification, EventError> {
    let event = GitHubEvent::parse(event_type, body)?;
    Ok(RenderedNotification {
        event_type: event.event_type(),
        notification: render(&event, base_color),
    })
}

/// Render a parsed event. `base_color` applies wherever the event type has
/// no color of its own.
#[must_use]
pub fn render(event: &GitHubEvent, base_color: u32) -> Notification {
    let (notification, timestamp) = match event {
        GitHubEvent::Push(e) => render_push(e, base_color),
        GitHubEvent::PullRequest(e) => render_pull_request(e, base_color),
        GitHubEvent::Issues(e) => render_issue(e, base_color),
        GitHubEvent::Release(e) => render_release(e, base_color),
        GitHubEvent::Deployment(e) => render_deployment(e, base_color),
        GitHubEvent::WorkflowRun(e) => render_workflow_run(e, base_color),
        GitHubEvent::Star(e) => render_star(e, base_color),
        GitHubEvent::Fork(e) => render_fork(e, base_color),
    };

    let notification = notification.with_footer(event.repository().full_name.clone());
    match timestamp {
        Some(ts) => notification.with_timestamp(ts),
        None => notification,
    }
}

type Rendered = (Notification, Option<DateTime<Utc>>);

fn render_push(e: &PushEvent, base_color: u32) -> Rendered {
    let branch = e.branch();
    let mut n = Notification::new(format!("Push to {branch}"), base_color)
        .with_url(e.compare.clone())
        .with_author(Author {
            name: e.pusher.name.clone(),
            url: None,
            icon_url: e.sender.as_ref().and_then(avatar),
        })
        .field(Field::inline("Repository", e.repository.full_name.clone()))
        .field(Field::inline("Branch", branch))
        .field(Field::inline("Commits", e.commits.len().to_string()));

    if !e.commits.is_empty() {
        let mut lines: Vec<String> = e
            .commits
            .iter()
            .take(MAX_LISTED_COMMITS)
            .map(|c| {
                let short: String = c.id.chars().take(7).collect();
                let subject = c.message.lines().next().unwrap_or_default();
                let author = c
                    .author
                    .as_ref()
                    .map_or("Unknown", |a| a.name.as_str());
                format!("`{short}` {subject} - {author}")
            })
            .collect();
        if e.commits.len() > MAX_LISTED_COMMITS {
            lines.push(format!(
                "... and {} more",
                e.commits.len() - MAX_LISTED_COMMITS
            ));
        }
        n = n.field(Field::block("Recent Commits", lines.join("\n")));
    }

    let timestamp = e.head_commit.as_ref().and_then(|c| c.timestamp);
    (n, timestamp)
}

fn render_pull_request(e: &PullRequestEvent, base_color: u32) -> Rendered {
    let pr = &e.pull_request;
    let color = match e.action.as_str() {
        "closed" if pr.merged => colors::PURPLE,
        action => action_color(action).unwrap_or(base_color),
    };

    let mut n = Notification::new(format!("Pull Request #{}: {}", pr.number, pr.title), color)
        .with_url(pr.html_url.clone())
        .with_description(preview(pr.body.as_deref(), BODY_PREVIEW))
        .with_author(user_author(&pr.user))
        .field(Field::inline("Action", title_case(&e.action)))
        .field(Field::inline("State", title_case(&pr.state)))
        .field(Field::inline("Repository", e.repository.full_name.clone()));

    if pr.draft {
        n = n.field(Field::inline("Draft", "Yes"));
    }
    if pr.merged {
        n = n.field(Field::inline("Merged", "Yes"));
    }
    n = n.field(Field::block(
        "Branch",
        format!("{} ← {}", pr.base.ref_name, pr.head.ref_name),
    ));
    if let Some(labels) = label_list(&pr.labels) {
        n = n.field(Field::block("Labels", labels));
    }

    (n, pr.updated_at)
}

fn render_issue(e: &IssuesEvent, base_color: u32) -> Rendered {
    let issue = &e.issue;
    let color = action_color(&e.action).unwrap_or(base_color);

    let mut n = Notification::new(format!("Issue #{}: {}", issue.number, issue.title), color)
        .with_url(issue.html_url.clone())
        .with_description(preview(issue.body.as_deref(), BODY_PREVIEW))
        .with_author(user_author(&issue.user))
        .field(Field::inline("Action", title_case(&e.action)))
        .field(Field::inline("State", title_case(&issue.state)))
        .field(Field::inline("Repository", e.repository.full_name.clone()));

    if let Some(assignee) = &issue.assignee {
        n = n.field(Field::inline(
            "Assignee",
            format!("[{}]({})", assignee.login, assignee.html_url),
        ));
    }
    if let Some(labels) = label_list(&issue.labels) {
        n = n.field(Field::block("Labels", labels));
    }

    (n, issue.updated_at)
}

fn render_release(e: &ReleaseEvent, base_color: u32) -> Rendered {
    let release = &e.release;
    let color = if e.action == "published" {
        colors::ORANGE
    } else {
        base_color
    };
    let name = release
        .name
        .as_deref()
        .filter(|n| !n.is_empty())
        .unwrap_or(&release.tag_name);

    let mut n = Notification::new(format!("Release: {name}"), color)
        .with_url(release.html_url.clone())
        .with_description(preview(release.body.as_deref(), RELEASE_BODY_PREVIEW))
        .field(Field::inline("Action", title_case(&e.action)))
        .field(Field::inline("Tag", release.tag_name.clone()))
        .field(Field::inline("Repository", e.repository.full_name.clone()));

    if release.prerelease {
        n = n.field(Field::inline("Pre-release", "Yes"));
    }
    if release.draft {
        n = n.field(Field::inline("Draft", "Yes"));
    }

    (n, release.published_at)
}

fn render_deployment(e: &DeploymentEvent, base_color: u32) -> Rendered {
    let d = &e.deployment;
    let mut n = Notification::new(format!("Deployment: {}", d.environment), base_color)
        .with_url(d.url.clone())
        .field(Field::inline("Environment", d.environment.clone()))
        .field(Field::inline("Ref", d.ref_name.clone()))
        .field(Field::inline("Repository", e.repository.full_name.clone()));

    if let Some(description) = d.description.as_deref().filter(|s| !s.is_empty()) {
        n = n.field(Field::block("Description", description));
    }

    (n, d.created_at)
}

fn render_workflow_run(e: &WorkflowRunEvent, base_color: u32) -> Rendered {
    let run = &e.workflow_run;
    let conclusion = run.conclusion.as_deref().filter(|c| !c.is_empty());
    let color = match conclusion {
        Some("success") => colors::GREEN,
        Some("failure") => colors::RED,
        Some("cancelled") => colors::GREY,
        _ => base_color,
    };

    let mut n = Notification::new(format!("Workflow: {}", run.name), color)
        .with_url(run.html_url.clone())
        .field(Field::inline("Status", title_case(&run.status)));
    if let Some(conclusion) = conclusion {
        n = n.field(Field::inline("Conclusion", title_case(conclusion)));
    }
    n = n.field(Field::inline("Repository", e.repository.full_name.clone()));
    if let Some(branch) = run.head_branch.as_deref().filter(|b| !b.is_empty()) {
        n = n.field(Field::inline("Branch", branch));
    }

    (n, run.updated_at)
}

fn render_star(e: &StarEvent, base_color: u32) -> Rendered {
    let color = if e.action == "created" {
        colors::ORANGE
    } else {
        base_color
    };
    let stars = e.repository.stargazers_count.unwrap_or(0);

    let n = Notification::new(format!("Repository {}", title_case(&e.action)), color)
        .with_url(e.repository.html_url.clone())
        .with_description(format!(
            "{} {} {}",
            e.sender.login, e.action, e.repository.full_name
        ))
        .with_author(user_author(&e.sender))
        .field(Field::inline("Stars", stars.to_string()));

    (n, e.starred_at)
}

fn render_fork(e: &ForkEvent, base_color: u32) -> Rendered {
    let n = Notification::new("Repository Forked", base_color)
        .with_url(e.forkee.html_url.clone())
        .with_description(format!(
            "{} forked {}",
            e.sender.login, e.repository.full_name
        ))
        .with_author(user_author(&e.sender))
        .field(Field::inline("Fork", e.forkee.full_name.clone()));

    (n, None)
}

// =============================================================================
// Helpers
// =============================================================================

fn action_color(action: &str) -> Option<u32> {
    match action {
        "opened" => Some(colors::GREEN),
        "closed" => Some(colors::RED),
        "reopened" => Some(colors::BLUE),
        _ => None,
    }
}

fn user_author(user: &User) -> Author {
    Author {
        name: user.login.clone(),
        url: Some(user.html_url.clone()).filter(|u| !u.is_empty()),
        icon_url: avatar(user),
    }
}

fn avatar(user: &User) -> Option<String> {
    Some(user.avatar_url.clone()).filter(|u| !u.is_empty())
}

fn preview(body: Option<&str>, max: usize) -> String {
    truncate(body.unwrap_or_default(), max)
}

fn label_list(labels: &[Label]) -> Option<String> {
    if labels.is_empty() {
        return None;
    }
    Some(
        labels
            .iter()
            .take(MAX_LISTED_LABELS)
            .map(|l| l.name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    )
}

/// Uppercase the first letter of every word (`in_progress` → `In_Progress`).
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::fixtures;
    use serde_json::json;

    const BASE: u32 = 0x0012_3456;

    fn rendered(event_type: &str, payload: &serde_json::Value) -> Notification {
        render_raw(event_type, &serde_json::to_vec(payload).unwrap(), BASE)
            .unwrap()
            .notification
    }

    #[test]
    fn test_push() {
        let n = rendered("push", &fixtures::push("main", 7));
        assert_eq!(n.title, "Push to main");
        assert_eq!(n.color, BASE);
        assert_eq!(
            n.url.as_deref(),
            Some("https://github.com/octo/app/compare/a...b")
        );
        assert_eq!(n.author.as_ref().unwrap().name, "octocat");
        assert_eq!(n.field_value("Commits"), Some("7"));
        assert_eq!(n.field_value("Branch"), Some("main"));
        assert_eq!(n.footer.as_deref(), Some("octo/app"));

        let commits = n.field_value("Recent Commits").unwrap();
        let lines: Vec<&str> = commits.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "`0000000` Commit number 0 - dev0");
        assert_eq!(lines[5], "... and 2 more");
    }

    #[test]
    fn test_push_lists_every_commit_when_few() {
        let n = rendered("push", &fixtures::push("main", 3));
        assert_eq!(n.field_value("Commits"), Some("3"));

        let commits = n.field_value("Recent Commits").unwrap();
        let lines: Vec<&str> = commits.lines().collect();
        assert_eq!(
            lines,
            vec![
                "`0000000` Commit number 0 - dev0",
                "`0000001` Commit number 1 - dev1",
                "`0000002` Commit number 2 - dev2",
            ]
        );
        assert!(!commits.contains("more"));
    }

    #[test]
    fn test_push_without_commits() {
        let n = rendered("push", &fixtures::push("dev", 0));
        assert_eq!(n.field_value("Commits"), Some("0"));
        assert_eq!(n.field_value("Recent Commits"), None);
    }

    #[test]
    fn test_pull_request_colors() {
        let cases = [
            ("opened", false, colors::GREEN),
            ("closed", false, colors::RED),
            ("closed", true, colors::PURPLE),
            ("reopened", false, colors::BLUE),
            ("edited", false, BASE),
        ];
        for (action, merged, color) in cases {
            let n = rendered("pull_request", &fixtures::pull_request(action, &[], merged));
            assert_eq!(n.color, color, "{action} merged={merged}");
        }
    }

    #[test]
    fn test_pull_request_fields() {
        let mut payload = fixtures::pull_request("closed", &["bug", "ui"], true);
        payload["pull_request"]["body"] = json!("x".repeat(600));
        let n = rendered("pull_request", &payload);

        assert_eq!(n.title, "Pull Request #42: Add relay");
        assert_eq!(n.field_value("Action"), Some("Closed"));
        assert_eq!(n.field_value("Merged"), Some("Yes"));
        assert_eq!(n.field_value("Branch"), Some("main ← feature-x"));
        assert_eq!(n.field_value("Labels"), Some("bug, ui"));
        assert_eq!(n.description.as_ref().unwrap().chars().count(), BODY_PREVIEW);
        assert_eq!(
            n.timestamp,
            "2024-05-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[test]
    fn test_issue() {
        let n = rendered("issues", &fixtures::issue("opened", &["bug"]));
        assert_eq!(n.title, "Issue #7: Crash on start");
        assert_eq!(n.color, colors::GREEN);
        assert_eq!(n.field_value("Labels"), Some("bug"));
        assert_eq!(n.field_value("Assignee"), None);
    }

    #[test]
    fn test_release() {
        let payload = json!({
            "action": "published",
            "release": {
                "tag_name": "v1.0.0",
                "name": null,
                "html_url": "https://github.com/octo/app/releases/v1.0.0",
                "prerelease": true
            },
            "repository": { "full_name": "octo/app" }
        });
        let n = rendered("release", &payload);
        assert_eq!(n.title, "Release: v1.0.0");
        assert_eq!(n.color, colors::ORANGE);
        assert_eq!(n.field_value("Pre-release"), Some("Yes"));
        assert_eq!(n.field_value("Draft"), None);
    }

    #[test]
    fn test_workflow_run() {
        let payload = |conclusion: serde_json::Value| {
            json!({
                "action": "completed",
                "workflow_run": {
                    "name": "CI",
                    "status": "completed",
                    "conclusion": conclusion,
                    "html_url": "https://github.com/octo/app/actions/runs/1",
                    "head_branch": "main"
                },
                "repository": { "full_name": "octo/app" }
            })
        };

        let n = rendered("workflow_run", &payload(json!("failure")));
        assert_eq!(n.title, "Workflow: CI");
        assert_eq!(n.color, colors::RED);
        assert_eq!(n.field_value("Conclusion"), Some("Failure"));
        assert_eq!(n.field_value("Branch"), Some("main"));

        let cancelled = rendered("workflow_run", &payload(json!("cancelled")));
        assert_eq!(cancelled.color, colors::GREY);

        let pending = rendered("workflow_run", &payload(json!(null)));
        assert_eq!(pending.color, BASE);
        assert_eq!(pending.field_value("Conclusion"), None);
    }

    #[test]
    fn test_star_and_fork() {
        let star = rendered(
            "star",
            &json!({
                "action": "created",
                "repository": { "full_name": "octo/app", "stargazers_count": 11 },
                "sender": { "login": "fan" }
            }),
        );
        assert_eq!(star.title, "Repository Created");
        assert_eq!(star.description.as_deref(), Some("fan created octo/app"));
        assert_eq!(star.color, colors::ORANGE);
        assert_eq!(star.field_value("Stars"), Some("11"));

        let fork = rendered(
            "fork",
            &json!({
                "forkee": { "full_name": "fan/app", "html_url": "https://github.com/fan/app" },
                "repository": { "full_name": "octo/app" },
                "sender": { "login": "fan" }
            }),
        );
        assert_eq!(fork.title, "Repository Forked");
        assert_eq!(fork.description.as_deref(), Some("fan forked octo/app"));
        assert_eq!(fork.field_value("Fork"), Some("fan/app"));
        assert_eq!(fork.color, BASE);
    }

    #[test]
    fn test_deployment() {
        let n = rendered(
            "deployment",
            &json!({
                "deployment": { "environment": "production", "ref": "v1.0.0", "description": "" },
                "repository": { "full_name": "octo/app" }
            }),
        );
        assert_eq!(n.title, "Deployment: production");
        assert_eq!(n.field_value("Ref"), Some("v1.0.0"));
        assert_eq!(n.field_value("Description"), None);
    }

    #[test]
    fn test_render_raw_tags_event_type() {
        let body = serde_json::to_vec(&fixtures::issue("closed", &[])).unwrap();
        let rendered = render_raw("issues", &body, BASE).unwrap();
        assert_eq!(rendered.event_type, EventType::Issues);
        assert!(matches!(
            render_raw("gollum", &body, BASE),
            Err(EventError::Unsupported(_))
        ));
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("opened"), "Opened");
        assert_eq!(title_case("in_progress"), "In_Progress");
        assert_eq!(title_case("ready_for_review"), "Ready_For_Review");
    }
}
