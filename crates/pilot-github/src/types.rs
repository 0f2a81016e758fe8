//! Wire shapes returned by `gh` and their conversion into core records.

use chrono::{DateTime, Utc};
use pilot_core::{IssueSummary, RawComment};
use serde::Deserialize;

use crate::error::GithubError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserPayload {
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommentPayload {
    pub id: u64,
    #[serde(default)]
    pub issue_url: String,
    pub user: Option<UserPayload>,
    #[serde(default)]
    pub body: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IssuePayload {
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedCommentPayload {
    pub id: u64,
}

/// `https://api.github.com/repos/o/r/issues/42` -> `Some(42)`.
pub fn issue_number_from_url(url: &str) -> Option<u64> {
    let (prefix, number) = url.trim_end_matches('/').rsplit_once('/')?;
    if !prefix.ends_with("/issues") {
        return None;
    }
    number.parse::<u64>().ok().filter(|number| *number > 0)
}

/// Parse `gh api --paginate` output, which concatenates one JSON array per page.
///
/// Comments without a positive issue number are dropped. The result is
/// ordered by `(created_at, id)` ascending.
pub fn parse_comment_pages(raw: &str) -> Result<Vec<RawComment>, GithubError> {
    let mut comments = Vec::new();
    let pages = serde_json::Deserializer::from_str(raw).into_iter::<Vec<CommentPayload>>();

    for page in pages {
        let page = page.map_err(|err| GithubError::parse("issue comments", err))?;
        for payload in page {
            let Some(issue_number) = issue_number_from_url(&payload.issue_url) else {
                continue;
            };
            comments.push(RawComment {
                id: payload.id,
                issue_number,
                author: payload.user.map(|user| user.login).unwrap_or_default(),
                body: payload.body.unwrap_or_default(),
                created_at: payload.created_at,
            });
        }
    }

    comments.sort_by(|left, right| {
        left.created_at
            .cmp(&right.created_at)
            .then(left.id.cmp(&right.id))
    });
    Ok(comments)
}

pub fn parse_issue(raw: &str) -> Result<IssueSummary, GithubError> {
    let payload: IssuePayload =
        serde_json::from_str(raw).map_err(|err| GithubError::parse("issue", err))?;
    Ok(IssueSummary {
        title: payload.title,
        body: payload.body.unwrap_or_default(),
    })
}

pub fn parse_created_comment_id(raw: &str) -> Result<u64, GithubError> {
    let payload: CreatedCommentPayload =
        serde_json::from_str(raw).map_err(|err| GithubError::parse("create comment", err))?;
    Ok(payload.id)
}

/// `gh pr create` prints the new pull request URL on its last line.
pub fn parse_pr_number(raw: &str) -> Result<u64, GithubError> {
    let url = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .unwrap_or_default();

    url.rsplit_once("/pull/")
        .and_then(|(_, number)| number.trim_end_matches('/').parse::<u64>().ok())
        .ok_or_else(|| {
            GithubError::parse("pr create", format!("no pull request number in '{url}'"))
        })
}
