use pilot_agents::AiCollaborator;
use pilot_core::{RepoConfig, TriggerConfig};
use pilot_git::WorkspaceOps;
use pilot_github::IssueTracker;
use pilot_verify::Verifier;

use crate::service::TaskService;

/// Everything one poll cycle needs, borrowed for its duration.
pub struct PilotContext<'a> {
    pub service: &'a TaskService,
    pub tracker: &'a dyn IssueTracker,
    pub ai: &'a dyn AiCollaborator,
    pub workspace: &'a dyn WorkspaceOps,
    pub verifier: &'a dyn Verifier,
    pub triggers: &'a TriggerConfig,
    pub repo: &'a RepoConfig,
    pub max_retries: u32,
}
