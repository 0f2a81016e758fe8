//! In-memory collaborators for exercising the router and execute loop.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use pilot_agents::{AgentError, AiCollaborator};
use pilot_core::{
    EventType, IssueSummary, ProcessError, RawComment, RepoConfig, TriggerConfig, TypedEvent,
};
use pilot_git::{GitError, WorkspaceOps};
use pilot_github::{GithubError, IssueTracker};
use pilot_verify::{CommandFailure, FailureKind, VerificationReport, Verifier, VerifyError};

use crate::context::PilotContext;
use crate::service::TaskService;

pub const REPO: &str = "acme/widgets";

pub fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 2, 10, minute, 0)
        .single()
        .expect("valid timestamp")
}

pub fn triggers() -> TriggerConfig {
    TriggerConfig {
        mention: "@issue-pilot".to_string(),
        approve: "/approve".to_string(),
        reject: "/reject".to_string(),
        abort: "/abort".to_string(),
    }
}

pub fn repo_config() -> RepoConfig {
    RepoConfig {
        name: REPO.to_string(),
        local_path: PathBuf::from("/srv/src/widgets"),
        base_branch: "main".to_string(),
        allowed_authors: vec!["alice".to_string()],
        verify_commands: vec!["cargo test".to_string()],
        worktree_root: PathBuf::from(".pilot/wt"),
    }
}

pub fn comment(id: u64, issue_number: u64, author: &str, body: &str, minute: u32) -> RawComment {
    RawComment {
        id,
        issue_number,
        author: author.to_string(),
        body: body.to_string(),
        created_at: at(minute),
    }
}

pub fn event(kind: EventType, issue_number: u64, comment_id: u64, body: &str) -> TypedEvent {
    TypedEvent {
        kind,
        repo: REPO.to_string(),
        issue_number,
        source_comment_id: comment_id,
        author: "alice".to_string(),
        body: body.to_string(),
        created_at: at(comment_id as u32 % 60),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRequestCall {
    pub head: String,
    pub base: String,
    pub title: String,
    pub body: String,
}

pub struct FakeTracker {
    pub comments: RefCell<Vec<RawComment>>,
    pub issue: IssueSummary,
    pub posted: RefCell<Vec<(u64, String)>>,
    pub change_requests: RefCell<Vec<ChangeRequestCall>>,
    pub list_calls: RefCell<Vec<Option<DateTime<Utc>>>>,
    pub fail_listing: Cell<bool>,
    pub fail_issue: Cell<bool>,
    pub fail_change_request: Cell<bool>,
    /// Return every comment regardless of `since`, like an edited old comment.
    pub ignore_since: Cell<bool>,
    next_comment_id: Cell<u64>,
}

impl Default for FakeTracker {
    fn default() -> Self {
        Self {
            comments: RefCell::new(Vec::new()),
            issue: IssueSummary {
                title: "Crash on empty input".to_string(),
                body: "Running with no args panics.".to_string(),
            },
            posted: RefCell::new(Vec::new()),
            change_requests: RefCell::new(Vec::new()),
            list_calls: RefCell::new(Vec::new()),
            fail_listing: Cell::new(false),
            fail_issue: Cell::new(false),
            fail_change_request: Cell::new(false),
            ignore_since: Cell::new(false),
            next_comment_id: Cell::new(9000),
        }
    }
}

impl FakeTracker {
    pub fn push_comment(&self, comment: RawComment) {
        self.comments.borrow_mut().push(comment);
    }

    pub fn posted_bodies(&self) -> Vec<String> {
        self.posted.borrow().iter().map(|(_, body)| body.clone()).collect()
    }

    fn failure(&self, what: &str) -> GithubError {
        GithubError::CommandFailed {
            command: format!("gh {what}"),
            status: Some(1),
            stderr: "HTTP 502: Bad Gateway".to_string(),
        }
    }
}

impl IssueTracker for FakeTracker {
    /// Inclusive `since`, like the real API.
    fn list_new_comments(&self, since: Option<DateTime<Utc>>) -> Result<Vec<RawComment>, GithubError> {
        self.list_calls.borrow_mut().push(since);
        if self.fail_listing.get() {
            return Err(self.failure("api comments"));
        }
        let mut comments: Vec<RawComment> = self
            .comments
            .borrow()
            .iter()
            .filter(|comment| {
                self.ignore_since.get() || since.map_or(true, |since| comment.created_at >= since)
            })
            .cloned()
            .collect();
        comments.sort_by(|l, r| l.created_at.cmp(&r.created_at).then(l.id.cmp(&r.id)));
        Ok(comments)
    }

    fn get_issue(&self, _issue_number: u64) -> Result<IssueSummary, GithubError> {
        if self.fail_issue.get() {
            return Err(self.failure("api issue"));
        }
        Ok(self.issue.clone())
    }

    fn post_comment(&self, issue_number: u64, body: &str) -> Result<u64, GithubError> {
        let id = self.next_comment_id.get();
        self.next_comment_id.set(id + 1);
        self.posted.borrow_mut().push((issue_number, body.to_string()));
        Ok(id)
    }

    fn open_change_request(&self, head: &str, base: &str, title: &str, body: &str) -> Result<u64, GithubError> {
        if self.fail_change_request.get() {
            return Err(self.failure("pr create"));
        }
        self.change_requests.borrow_mut().push(ChangeRequestCall {
            head: head.to_string(),
            base: base.to_string(),
            title: title.to_string(),
            body: body.to_string(),
        });
        Ok(77)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiCall {
    Plan,
    Generate,
    Analyze,
}

pub struct FakeAi {
    pub plan_text: String,
    pub calls: RefCell<Vec<(AiCall, String)>>,
    pub fail_plan: Cell<bool>,
    pub fail_generate: Cell<bool>,
    pub time_out_plan: Cell<bool>,
}

impl Default for FakeAi {
    fn default() -> Self {
        Self {
            plan_text: "1. Guard against empty input in main.rs".to_string(),
            calls: RefCell::new(Vec::new()),
            fail_plan: Cell::new(false),
            fail_generate: Cell::new(false),
            time_out_plan: Cell::new(false),
        }
    }
}

impl FakeAi {
    pub fn count(&self, kind: AiCall) -> usize {
        self.calls.borrow().iter().filter(|(call, _)| *call == kind).count()
    }

    pub fn prompts(&self, kind: AiCall) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter(|(call, _)| *call == kind)
            .map(|(_, prompt)| prompt.clone())
            .collect()
    }
}

impl AiCollaborator for FakeAi {
    fn plan(&self, prompt: &str, _workdir: &Path) -> Result<String, AgentError> {
        self.calls.borrow_mut().push((AiCall::Plan, prompt.to_string()));
        if self.time_out_plan.get() {
            return Err(AgentError::Process(ProcessError::TimedOut {
                command: "claude -p".to_string(),
                timeout: std::time::Duration::from_secs(600),
            }));
        }
        if self.fail_plan.get() {
            return Err(AgentError::NonZeroExit {
                command: "claude -p".to_string(),
                status: Some(1),
                stderr: "rate limited".to_string(),
            });
        }
        Ok(self.plan_text.clone())
    }

    fn generate(&self, prompt: &str, _workdir: &Path) -> Result<String, AgentError> {
        self.calls.borrow_mut().push((AiCall::Generate, prompt.to_string()));
        if self.fail_generate.get() {
            return Err(AgentError::NonZeroExit {
                command: "claude -p".to_string(),
                status: Some(1),
                stderr: "model overloaded".to_string(),
            });
        }
        Ok("edited files".to_string())
    }

    fn analyze(&self, prompt: &str) -> Result<String, AgentError> {
        self.calls.borrow_mut().push((AiCall::Analyze, prompt.to_string()));
        Ok("Fix the failing assertion in tests/cli.rs".to_string())
    }
}

#[derive(Default)]
pub struct FakeWorkspace {
    pub created: RefCell<Vec<(PathBuf, String, String)>>,
    pub commits: Cell<u32>,
    pub pushes: RefCell<Vec<String>>,
    pub removed: RefCell<Vec<PathBuf>>,
    pub fail_create: Cell<bool>,
    pub fail_push: Cell<bool>,
}

impl WorkspaceOps for FakeWorkspace {
    fn create_isolated_workspace(&self, path: &Path, branch: &str, base: &str) -> Result<(), GitError> {
        if self.fail_create.get() {
            return Err(GitError::CommandFailed {
                command: format!("git fetch origin {base}"),
                status: Some(128),
                stdout: String::new(),
                stderr: "could not read from remote".to_string(),
            });
        }
        self.created
            .borrow_mut()
            .push((path.to_path_buf(), branch.to_string(), base.to_string()));
        Ok(())
    }

    fn remove_workspace(&self, path: &Path) -> Result<(), GitError> {
        self.removed.borrow_mut().push(path.to_path_buf());
        Ok(())
    }

    fn commit_all(&self, _path: &Path, _message: &str) -> Result<bool, GitError> {
        self.commits.set(self.commits.get() + 1);
        Ok(true)
    }

    fn push(&self, _path: &Path, branch: &str) -> Result<(), GitError> {
        if self.fail_push.get() {
            return Err(GitError::CommandFailed {
                command: format!("git push -u origin {branch}"),
                status: Some(1),
                stdout: String::new(),
                stderr: "remote rejected".to_string(),
            });
        }
        self.pushes.borrow_mut().push(branch.to_string());
        Ok(())
    }

    fn has_uncommitted_changes(&self, _path: &Path) -> Result<bool, GitError> {
        Ok(false)
    }
}

/// Replays scripted pass/fail results, then repeats `default_pass`.
pub struct FakeVerifier {
    pub script: RefCell<VecDeque<bool>>,
    pub default_pass: bool,
    pub runs: Cell<u32>,
}

impl FakeVerifier {
    pub fn passing() -> Self {
        Self::scripted(Vec::new(), true)
    }

    pub fn failing() -> Self {
        Self::scripted(Vec::new(), false)
    }

    pub fn scripted(results: Vec<bool>, default_pass: bool) -> Self {
        Self {
            script: RefCell::new(results.into()),
            default_pass,
            runs: Cell::new(0),
        }
    }
}

impl Verifier for FakeVerifier {
    fn verify(&self, _workdir: &Path, commands: &[String]) -> Result<VerificationReport, VerifyError> {
        self.runs.set(self.runs.get() + 1);
        let pass = self
            .script
            .borrow_mut()
            .pop_front()
            .unwrap_or(self.default_pass);

        let failures = if pass {
            Vec::new()
        } else {
            commands
                .iter()
                .map(|command| CommandFailure {
                    command: command.clone(),
                    kind: FailureKind::NonZeroExit,
                    exit_code: Some(101),
                    output: "test cli::empty_input ... FAILED".to_string(),
                })
                .collect()
        };

        let now = Utc::now();
        Ok(VerificationReport {
            started_at: now,
            finished_at: now,
            commands_run: commands.len(),
            failures,
        })
    }
}

/// Owns one of each collaborator and lends them out as a context.
pub struct Harness {
    pub service: TaskService,
    pub tracker: FakeTracker,
    pub ai: FakeAi,
    pub workspace: FakeWorkspace,
    pub verifier: FakeVerifier,
    pub triggers: TriggerConfig,
    pub repo: RepoConfig,
    pub max_retries: u32,
}

impl Harness {
    pub fn new(verifier: FakeVerifier) -> Self {
        Self {
            service: TaskService::open_in_memory().expect("open service"),
            tracker: FakeTracker::default(),
            ai: FakeAi::default(),
            workspace: FakeWorkspace::default(),
            verifier,
            triggers: triggers(),
            repo: repo_config(),
            max_retries: 2,
        }
    }

    pub fn ctx(&self) -> PilotContext<'_> {
        PilotContext {
            service: &self.service,
            tracker: &self.tracker,
            ai: &self.ai,
            workspace: &self.workspace,
            verifier: &self.verifier,
            triggers: &self.triggers,
            repo: &self.repo,
            max_retries: self.max_retries,
        }
    }
}
