use chrono::{DateTime, SecondsFormat, Utc};
use pilot_core::{IssueSummary, RawComment};
use tracing::debug;

use crate::command::GhCli;
use crate::error::GithubError;
use crate::types::{parse_comment_pages, parse_created_comment_id, parse_issue, parse_pr_number};

/// Issue tracker operations for one repository.
pub trait IssueTracker {
    /// Comments created or updated at or after `since`, ascending by `(created_at, id)`.
    fn list_new_comments(&self, since: Option<DateTime<Utc>>) -> Result<Vec<RawComment>, GithubError>;
    fn get_issue(&self, issue_number: u64) -> Result<IssueSummary, GithubError>;
    /// Returns the new comment's id.
    fn post_comment(&self, issue_number: u64, body: &str) -> Result<u64, GithubError>;
    /// Returns the new pull request number.
    fn open_change_request(
        &self,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<u64, GithubError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubClient {
    pub cli: GhCli,
    /// `owner/name`
    pub repo: String,
}

impl GithubClient {
    pub fn new(repo: impl Into<String>) -> Self {
        Self {
            cli: GhCli::default(),
            repo: repo.into(),
        }
    }

    pub fn with_cli(repo: impl Into<String>, cli: GhCli) -> Self {
        Self {
            cli,
            repo: repo.into(),
        }
    }

    pub fn comments_endpoint(&self, since: Option<DateTime<Utc>>) -> String {
        let mut endpoint = format!(
            "repos/{}/issues/comments?per_page=100&sort=created&direction=asc",
            self.repo
        );
        if let Some(since) = since {
            endpoint.push_str("&since=");
            endpoint.push_str(&since.to_rfc3339_opts(SecondsFormat::Secs, true));
        }
        endpoint
    }
}

impl IssueTracker for GithubClient {
    fn list_new_comments(&self, since: Option<DateTime<Utc>>) -> Result<Vec<RawComment>, GithubError> {
        let endpoint = self.comments_endpoint(since);
        let stdout = self.cli.run(["api", endpoint.as_str(), "--paginate"])?;
        let comments = parse_comment_pages(&stdout)?;
        debug!(repo = %self.repo, count = comments.len(), "listed issue comments");
        Ok(comments)
    }

    fn get_issue(&self, issue_number: u64) -> Result<IssueSummary, GithubError> {
        let endpoint = format!("repos/{}/issues/{issue_number}", self.repo);
        let stdout = self.cli.run(["api", endpoint.as_str()])?;
        parse_issue(&stdout)
    }

    fn post_comment(&self, issue_number: u64, body: &str) -> Result<u64, GithubError> {
        let endpoint = format!("repos/{}/issues/{issue_number}/comments", self.repo);
        let field = format!("body={body}");
        let stdout = self.cli.run([
            "api",
            endpoint.as_str(),
            "--method",
            "POST",
            "-f",
            field.as_str(),
        ])?;
        parse_created_comment_id(&stdout)
    }

    fn open_change_request(
        &self,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<u64, GithubError> {
        let stdout = self.cli.run([
            "pr",
            "create",
            "--repo",
            self.repo.as_str(),
            "--head",
            head,
            "--base",
            base,
            "--title",
            title,
            "--body",
            body,
        ])?;
        parse_pr_number(&stdout)
    }
}
