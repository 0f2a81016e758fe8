//! Core records shared by the daemon and its adapters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::TaskStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub i64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Durable record for one issue's change lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub repo: String,
    pub issue_number: u64,
    pub status: TaskStatus,
    /// Comment id of the posted plan.
    pub plan_artifact_id: Option<u64>,
    pub plan_text: Option<String>,
    pub branch_name: Option<String>,
    /// Pull request number.
    pub change_request_id: Option<u64>,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn label(&self) -> String {
        format!("{}#{}", self.repo, self.issue_number)
    }
}

/// A comment as delivered by the issue tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawComment {
    pub id: u64,
    pub issue_number: u64,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueSummary {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Mention,
    Approve,
    Reject,
    Abort,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Mention => "mention",
            EventType::Approve => "approve",
            EventType::Reject => "reject",
            EventType::Abort => "abort",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An actionable comment, classified by trigger keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedEvent {
    pub kind: EventType,
    pub repo: String,
    pub issue_number: u64,
    pub source_comment_id: u64,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}
