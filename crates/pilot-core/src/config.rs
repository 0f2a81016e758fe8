//! Configuration types for the pilot daemon.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub const DEFAULT_WORKTREE_ROOT: &str = ".pilot/wt";
pub const DEFAULT_SQLITE_PATH: &str = ".pilot/state.sqlite";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PilotConfig {
    #[serde(default)]
    pub polling: PollingConfig,
    pub triggers: TriggerConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub repos: Vec<RepoConfig>,
}

impl PilotConfig {
    /// The repository this process drives. Extra entries are ignored.
    pub fn primary_repo(&self) -> Option<&RepoConfig> {
        self.repos.first()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingConfig {
    pub interval_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Keywords that turn a comment into an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerConfig {
    pub mention: String,
    pub approve: String,
    pub reject: String,
    pub abort: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub binary: String,
    pub plan_model: String,
    pub execute_model: String,
    pub verify_model: String,
    pub max_verify_retries: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            binary: "claude".to_string(),
            plan_model: "opus".to_string(),
            execute_model: "sonnet".to_string(),
            verify_model: "sonnet".to_string(),
            max_verify_retries: 2,
        }
    }
}

/// Per-phase ceilings for blocking calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub plan_secs: u64,
    pub execute_secs: u64,
    pub verify_command_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            plan_secs: 600,
            execute_secs: 1800,
            verify_command_secs: 120,
        }
    }
}

impl TimeoutConfig {
    pub fn plan(&self) -> Duration {
        Duration::from_secs(self.plan_secs)
    }

    pub fn execute(&self) -> Duration {
        Duration::from_secs(self.execute_secs)
    }

    pub fn verify_command(&self) -> Duration {
        Duration::from_secs(self.verify_command_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub sqlite_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from(DEFAULT_SQLITE_PATH),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoConfig {
    /// `owner/name` on the issue tracker.
    pub name: String,
    pub local_path: PathBuf,
    pub base_branch: String,
    pub allowed_authors: Vec<String>,
    #[serde(default)]
    pub verify_commands: Vec<String>,
    #[serde(default = "default_worktree_root")]
    pub worktree_root: PathBuf,
}

impl RepoConfig {
    pub fn allows_author(&self, login: &str) -> bool {
        self.allowed_authors.iter().any(|author| author == login)
    }
}

fn default_worktree_root() -> PathBuf {
    PathBuf::from(DEFAULT_WORKTREE_ROOT)
}

pub fn parse_pilot_config(contents: &str) -> Result<PilotConfig, toml::de::Error> {
    toml::from_str(contents)
}

pub fn load_pilot_config(path: impl AsRef<Path>) -> Result<PilotConfig, ConfigError> {
    let path_ref = path.as_ref();
    let body = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
        path: path_ref.to_path_buf(),
        source,
    })?;
    parse_pilot_config(&body).map_err(|source| ConfigError::Parse {
        path: path_ref.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sample_config() -> &'static str {
        r#"
[polling]
interval_secs = 30

[triggers]
mention = "@issue-pilot"
approve = "/approve"
reject = "/reject"
abort = "/abort"

[agent]
binary = "claude"
plan_model = "opus"
execute_model = "sonnet"
verify_model = "haiku"
max_verify_retries = 3

[[repos]]
name = "acme/widgets"
local_path = "/srv/src/widgets"
base_branch = "main"
allowed_authors = ["alice", "bob"]
verify_commands = ["cargo check", "cargo test"]
"#
    }

    #[test]
    fn parse_pilot_config_parses_full_shape() {
        let config = parse_pilot_config(sample_config()).expect("parse config");
        assert_eq!(config.polling.interval_secs, 30);
        assert_eq!(config.triggers.approve, "/approve");
        assert_eq!(config.agent.verify_model, "haiku");
        assert_eq!(config.agent.max_verify_retries, 3);

        let repo = config.primary_repo().expect("primary repo");
        assert_eq!(repo.name, "acme/widgets");
        assert_eq!(repo.verify_commands.len(), 2);
        assert_eq!(repo.worktree_root, PathBuf::from(DEFAULT_WORKTREE_ROOT));
        assert!(repo.allows_author("bob"));
        assert!(!repo.allows_author("mallory"));
    }

    #[test]
    fn optional_sections_fall_back_to_defaults() {
        let config = parse_pilot_config(
            r#"
[triggers]
mention = "@p"
approve = "/approve"
reject = "/reject"
abort = "/abort"

[[repos]]
name = "acme/widgets"
local_path = "/srv/src/widgets"
base_branch = "main"
allowed_authors = ["alice"]
"#,
        )
        .expect("parse minimal config");

        assert_eq!(config.polling, PollingConfig::default());
        assert_eq!(config.agent, AgentConfig::default());
        assert_eq!(config.timeouts.plan(), Duration::from_secs(600));
        assert_eq!(config.timeouts.execute(), Duration::from_secs(1800));
        assert_eq!(config.timeouts.verify_command(), Duration::from_secs(120));
        assert_eq!(config.storage.sqlite_path, PathBuf::from(DEFAULT_SQLITE_PATH));
        assert!(config.repos[0].verify_commands.is_empty());
    }

    #[test]
    fn load_pilot_config_classifies_read_and_parse_errors() {
        let dir = tempfile::tempdir().expect("temp dir");

        let missing_path = dir.path().join("missing.toml");
        let err = load_pilot_config(&missing_path).expect_err("missing file should fail");
        assert!(matches!(err, ConfigError::Read { path, .. } if path == missing_path));

        let invalid_path = dir.path().join("invalid.toml");
        fs::write(&invalid_path, "repos = [").expect("write invalid config fixture");
        let err = load_pilot_config(&invalid_path).expect_err("invalid config should fail");
        assert!(matches!(err, ConfigError::Parse { path, .. } if path == invalid_path));
    }

    #[test]
    fn load_pilot_config_reads_file_from_disk() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("pilot.toml");
        fs::write(&path, sample_config()).expect("write config");

        let loaded = load_pilot_config(&path).expect("load config");
        assert_eq!(loaded, parse_pilot_config(sample_config()).expect("parse"));
    }
}
