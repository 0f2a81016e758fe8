use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use pilot_core::{run_with_timeout, AgentConfig, TimeoutConfig};
use tracing::{debug, info};

use crate::error::AgentError;

const PLAN_TOOLS: &str = "Read,Glob,Grep,WebFetch,WebSearch";
const ANALYZE_TOOLS: &str = "Read,Glob,Grep";

/// Text-in, text-out AI assistant used by the plan phase and the execute loop.
pub trait AiCollaborator {
    /// Read-only exploration of `workdir` producing an implementation plan.
    fn plan(&self, prompt: &str, workdir: &Path) -> Result<String, AgentError>;
    /// Edit files in `workdir`.
    fn generate(&self, prompt: &str, workdir: &Path) -> Result<String, AgentError>;
    /// Turn verification failures into fix instructions.
    fn analyze(&self, prompt: &str) -> Result<String, AgentError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationMode {
    Plan,
    Generate,
    Analyze,
}

impl InvocationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            InvocationMode::Plan => "plan",
            InvocationMode::Generate => "generate",
            InvocationMode::Analyze => "analyze",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaudeCli {
    pub binary: String,
    pub plan_model: String,
    pub execute_model: String,
    pub verify_model: String,
    pub plan_timeout: Duration,
    pub execute_timeout: Duration,
    /// Working directory for analysis runs, which need no checkout.
    pub scratch_dir: PathBuf,
}

impl ClaudeCli {
    pub fn from_config(agent: &AgentConfig, timeouts: &TimeoutConfig) -> Self {
        Self {
            binary: agent.binary.clone(),
            plan_model: agent.plan_model.clone(),
            execute_model: agent.execute_model.clone(),
            verify_model: agent.verify_model.clone(),
            plan_timeout: timeouts.plan(),
            execute_timeout: timeouts.execute(),
            scratch_dir: std::env::temp_dir(),
        }
    }

    pub fn model_for(&self, mode: InvocationMode) -> &str {
        match mode {
            InvocationMode::Plan => &self.plan_model,
            InvocationMode::Generate => &self.execute_model,
            InvocationMode::Analyze => &self.verify_model,
        }
    }

    pub fn timeout_for(&self, mode: InvocationMode) -> Duration {
        match mode {
            InvocationMode::Plan | InvocationMode::Analyze => self.plan_timeout,
            InvocationMode::Generate => self.execute_timeout,
        }
    }

    pub fn build_args(&self, mode: InvocationMode, prompt: &str) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            prompt.to_string(),
            "--model".to_string(),
            self.model_for(mode).to_string(),
        ];
        match mode {
            InvocationMode::Plan => {
                args.push("--allowedTools".to_string());
                args.push(PLAN_TOOLS.to_string());
            }
            InvocationMode::Analyze => {
                args.push("--allowedTools".to_string());
                args.push(ANALYZE_TOOLS.to_string());
            }
            InvocationMode::Generate => {
                args.push("--dangerously-skip-permissions".to_string());
            }
        }
        args.push("--output-format".to_string());
        args.push("text".to_string());
        args
    }

    fn invoke(&self, mode: InvocationMode, prompt: &str, workdir: &Path) -> Result<String, AgentError> {
        if prompt.trim().is_empty() {
            return Err(AgentError::InvalidRequest {
                message: "prompt must not be empty".to_string(),
            });
        }

        let mut command = Command::new(&self.binary);
        command
            .args(self.build_args(mode, prompt))
            .current_dir(workdir)
            // A nested session refuses to start when this is inherited.
            .env_remove("CLAUDECODE");

        let timeout = self.timeout_for(mode);
        info!(
            mode = mode.as_str(),
            model = self.model_for(mode),
            workdir = %workdir.display(),
            timeout_secs = timeout.as_secs(),
            "invoking agent"
        );

        let output = run_with_timeout(command, timeout)?;
        if !output.success {
            return Err(AgentError::NonZeroExit {
                command: output.command,
                status: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }

        debug!(mode = mode.as_str(), chars = output.stdout.len(), "agent finished");
        Ok(output.stdout)
    }
}

impl AiCollaborator for ClaudeCli {
    fn plan(&self, prompt: &str, workdir: &Path) -> Result<String, AgentError> {
        self.invoke(InvocationMode::Plan, prompt, workdir)
    }

    fn generate(&self, prompt: &str, workdir: &Path) -> Result<String, AgentError> {
        self.invoke(InvocationMode::Generate, prompt, workdir)
    }

    fn analyze(&self, prompt: &str) -> Result<String, AgentError> {
        self.invoke(InvocationMode::Analyze, prompt, &self.scratch_dir)
    }
}
