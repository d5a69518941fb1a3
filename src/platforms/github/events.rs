// GitHub event message table.
// Maps each event kind to its icon, style and message formatter.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::format::{TimeScale, relative_time};

use super::types::{ActivityEvent, Event};

/// Event type discriminator from the events API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum EventKind {
    PushEvent,
    PullRequestEvent,
    PullRequestReviewEvent,
    PullRequestReviewCommentEvent,
    IssuesEvent,
    IssueCommentEvent,
    WatchEvent,
    ForkEvent,
    CreateEvent,
    DeleteEvent,
    ReleaseEvent,
    MemberEvent,
    PublicEvent,
    #[serde(other)]
    Unknown,
}

/// Visual treatment of an event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventStyle {
    pub kind: &'static str,
    pub icon: &'static str,
    pub style: &'static str,
}

type Formatter = fn(&Event, &str) -> String;

impl EventKind {
    /// Icon and style for this kind.
    pub fn style(self) -> EventStyle {
        let (kind, icon, style) = match self {
            EventKind::PushEvent => ("push", "git-commit", "commit"),
            EventKind::PullRequestEvent => ("pull_request", "git-pull-request", "pr"),
            EventKind::PullRequestReviewEvent | EventKind::PullRequestReviewCommentEvent => {
                ("review", "code-review", "pr")
            }
            EventKind::IssuesEvent => ("issue", "issue-opened", "issue"),
            EventKind::IssueCommentEvent => ("comment", "comment", "issue"),
            EventKind::WatchEvent => ("star", "star", "star"),
            EventKind::ForkEvent => ("fork", "repo-forked", "fork"),
            EventKind::CreateEvent => ("create", "plus", "create"),
            EventKind::DeleteEvent => ("delete", "trash", "delete"),
            EventKind::ReleaseEvent => ("release", "tag", "release"),
            EventKind::MemberEvent => ("member", "person-add", "member"),
            EventKind::PublicEvent => ("public", "globe", "create"),
            EventKind::Unknown => ("other", "pulse", "other"),
        };
        EventStyle { kind, icon, style }
    }

    /// Whether the target repository usually belongs to someone else.
    ///
    /// Stars and forks point at third-party repositories, so the full
    /// `owner/repo` path is kept instead of the short name.
    pub fn targets_foreign_repo(self) -> bool {
        matches!(self, EventKind::WatchEvent | EventKind::ForkEvent)
    }

    fn formatter(self) -> Formatter {
        match self {
            EventKind::PushEvent => push_message,
            EventKind::PullRequestEvent => pull_request_message,
            EventKind::PullRequestReviewEvent | EventKind::PullRequestReviewCommentEvent => {
                review_message
            }
            EventKind::IssuesEvent => issue_message,
            EventKind::IssueCommentEvent => issue_comment_message,
            EventKind::WatchEvent => star_message,
            EventKind::ForkEvent => fork_message,
            EventKind::CreateEvent => create_message,
            EventKind::DeleteEvent => delete_message,
            EventKind::ReleaseEvent => release_message,
            EventKind::MemberEvent => member_message,
            EventKind::PublicEvent => public_message,
            EventKind::Unknown => generic_message,
        }
    }
}

/// Label for the event's repository: full path for foreign repos, short name otherwise.
pub fn repo_label(event: &Event) -> String {
    let full = event.repo.name.as_str();
    if event.kind.targets_foreign_repo() {
        return full.to_string();
    }
    full.rsplit_once('/')
        .map(|(_, name)| name)
        .unwrap_or(full)
        .to_string()
}

/// Normalize one upstream event.
pub fn describe(event: &Event, now: DateTime<Utc>) -> ActivityEvent {
    let style = event.kind.style();
    let repo = repo_label(event);
    let message = (event.kind.formatter())(event, &repo);

    ActivityEvent {
        id: event.id.clone(),
        kind: style.kind,
        icon: style.icon,
        style: style.style,
        message,
        repo,
        repo_url: format!("https://github.com/{}", event.repo.name),
        url: item_url(event),
        time_ago: relative_time(event.created_at, now, TimeScale::GITHUB),
        created_at: event.created_at,
    }
}

/// Normalize a batch of events, newest first, capped at `limit`.
pub fn describe_all(events: &[Event], limit: usize, now: DateTime<Utc>) -> Vec<ActivityEvent> {
    let mut sorted: Vec<&Event> = events.iter().collect();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    sorted
        .into_iter()
        .take(limit)
        .map(|event| describe(event, now))
        .collect()
}

fn item_url(event: &Event) -> Option<String> {
    let payload = &event.payload;
    payload
        .pull_request
        .as_ref()
        .or(payload.issue.as_ref())
        .and_then(|item| item.html_url.clone())
        .or_else(|| {
            payload
                .release
                .as_ref()
                .and_then(|release| release.html_url.clone())
        })
}

fn plural(count: u64, word: &str) -> String {
    if count == 1 {
        format!("{} {}", count, word)
    } else {
        format!("{} {}s", count, word)
    }
}

fn action(event: &Event) -> &str {
    event.payload.action.as_deref().unwrap_or("updated")
}

fn push_message(event: &Event, repo: &str) -> String {
    let count = event
        .payload
        .size
        .unwrap_or(event.payload.commits.len() as u64)
        .max(1);
    let branch = event
        .payload
        .ref_name
        .as_deref()
        .map(|r| r.trim_start_matches("refs/heads/"));
    match branch {
        Some(branch) => format!("Pushed {} to {}/{}", plural(count, "commit"), repo, branch),
        None => format!("Pushed {} to {}", plural(count, "commit"), repo),
    }
}

fn pull_request_message(event: &Event, repo: &str) -> String {
    let Some(pr) = event.payload.pull_request.as_ref() else {
        return format!("Updated a pull request in {}", repo);
    };
    let verb = match action(event) {
        "closed" if pr.merged == Some(true) => "Merged",
        "closed" => "Closed",
        "opened" => "Opened",
        "reopened" => "Reopened",
        _ => "Updated",
    };
    format!("{} PR #{} in {}", verb, pr.number, repo)
}

fn review_message(event: &Event, repo: &str) -> String {
    match event.payload.pull_request.as_ref() {
        Some(pr) => format!("Reviewed PR #{} in {}", pr.number, repo),
        None => format!("Reviewed a pull request in {}", repo),
    }
}

fn issue_message(event: &Event, repo: &str) -> String {
    let number = event
        .payload
        .issue
        .as_ref()
        .map(|i| i.number)
        .or(event.payload.number);
    let verb = match action(event) {
        "opened" => "Opened",
        "closed" => "Closed",
        "reopened" => "Reopened",
        _ => "Updated",
    };
    match number {
        Some(n) => format!("{} issue #{} in {}", verb, n, repo),
        None => format!("{} an issue in {}", verb, repo),
    }
}

fn issue_comment_message(event: &Event, repo: &str) -> String {
    match event.payload.issue.as_ref() {
        Some(issue) => format!("Commented on #{} in {}", issue.number, repo),
        None => format!("Commented in {}", repo),
    }
}

fn star_message(_: &Event, repo: &str) -> String {
    format!("Starred {}", repo)
}

fn fork_message(_: &Event, repo: &str) -> String {
    format!("Forked {}", repo)
}

fn public_message(_: &Event, repo: &str) -> String {
    format!("Made {} public", repo)
}

fn generic_message(_: &Event, repo: &str) -> String {
    format!("Activity in {}", repo)
}

fn create_message(event: &Event, repo: &str) -> String {
    match (event.payload.ref_type.as_deref(), event.payload.ref_name.as_deref()) {
        (Some("repository"), _) | (None, _) => format!("Created repository {}", repo),
        (Some(kind), Some(name)) => format!("Created {} {} in {}", kind, name, repo),
        (Some(kind), None) => format!("Created {} in {}", kind, repo),
    }
}

fn delete_message(event: &Event, repo: &str) -> String {
    match (event.payload.ref_type.as_deref(), event.payload.ref_name.as_deref()) {
        (Some(kind), Some(name)) => format!("Deleted {} {} in {}", kind, name, repo),
        _ => format!("Deleted a ref in {}", repo),
    }
}

fn release_message(event: &Event, repo: &str) -> String {
    match event.payload.release.as_ref() {
        Some(release) => format!("Released {} in {}", release.tag_name, repo),
        None => format!("Published a release in {}", repo),
    }
}

fn member_message(event: &Event, repo: &str) -> String {
    match event.payload.member.as_ref() {
        Some(member) => format!("Added {} to {}", member.login, repo),
        None => format!("Updated members of {}", repo),
    }
}
