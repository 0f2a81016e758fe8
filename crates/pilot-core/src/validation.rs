//! Startup validation for pilot configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::config::{PilotConfig, RepoConfig, TriggerConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationLevel {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub level: ValidationLevel,
    pub code: &'static str,
    pub message: String,
}

pub trait Validate {
    fn validate(&self) -> Vec<ValidationIssue>;
}

pub fn has_errors(issues: &[ValidationIssue]) -> bool {
    issues
        .iter()
        .any(|issue| issue.level == ValidationLevel::Error)
}

impl Validate for PilotConfig {
    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if self.polling.interval_secs == 0 {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "polling.interval.zero",
                message: "polling.interval_secs must be greater than zero".to_string(),
            });
        }

        if self.repos.is_empty() {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "repos.empty",
                message: "at least one [[repos]] entry is required".to_string(),
            });
        }

        if self.repos.len() > 1 {
            issues.push(ValidationIssue {
                level: ValidationLevel::Warning,
                code: "repos.multiple",
                message: format!(
                    "{} repos configured; only the first ({}) is processed",
                    self.repos.len(),
                    self.repos[0].name
                ),
            });
        }

        let timeouts = [
            ("timeouts.plan.zero", "plan_secs", self.timeouts.plan_secs),
            ("timeouts.execute.zero", "execute_secs", self.timeouts.execute_secs),
            (
                "timeouts.verify_command.zero",
                "verify_command_secs",
                self.timeouts.verify_command_secs,
            ),
        ];
        for (code, field, value) in timeouts {
            if value == 0 {
                issues.push(ValidationIssue {
                    level: ValidationLevel::Error,
                    code,
                    message: format!("timeouts.{field} must be greater than zero"),
                });
            }
        }

        if self.agent.binary.trim().is_empty() {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "agent.binary.empty",
                message: "agent.binary must not be empty".to_string(),
            });
        }

        issues.extend(self.triggers.validate());
        for repo in &self.repos {
            issues.extend(repo.validate());
        }

        issues
    }
}

impl Validate for TriggerConfig {
    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let keywords = [
            ("mention", &self.mention),
            ("approve", &self.approve),
            ("reject", &self.reject),
            ("abort", &self.abort),
        ];

        for (name, keyword) in keywords {
            if keyword.trim().is_empty() {
                issues.push(ValidationIssue {
                    level: ValidationLevel::Error,
                    code: "triggers.keyword.empty",
                    message: format!("triggers.{name} must not be empty"),
                });
            }
        }

        let mut seen = HashSet::new();
        for (name, keyword) in keywords {
            let lowered = keyword.trim().to_lowercase();
            if !lowered.is_empty() && !seen.insert(lowered) {
                issues.push(ValidationIssue {
                    level: ValidationLevel::Error,
                    code: "triggers.keyword.duplicate",
                    message: format!("triggers.{name} duplicates another trigger keyword"),
                });
            }
        }

        issues
    }
}

impl Validate for RepoConfig {
    fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if self.name.trim().is_empty() || !self.name.contains('/') {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "repo.name.invalid",
                message: format!("repo name '{}' must look like owner/name", self.name),
            });
        }

        if self.local_path.as_os_str().is_empty() {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "repo.local_path.empty",
                message: "local_path must not be empty".to_string(),
            });
        }

        if self.base_branch.trim().is_empty() {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "repo.base_branch.empty",
                message: "base_branch must not be empty".to_string(),
            });
        }

        if self.allowed_authors.is_empty() {
            issues.push(ValidationIssue {
                level: ValidationLevel::Warning,
                code: "repo.allowed_authors.empty",
                message: format!("no allowed authors for {}; every comment will be ignored", self.name),
            });
        }

        if self
            .allowed_authors
            .iter()
            .any(|author| author.trim().is_empty())
        {
            issues.push(ValidationIssue {
                level: ValidationLevel::Error,
                code: "repo.allowed_authors.blank",
                message: "allowed_authors must contain only non-empty logins".to_string(),
            });
        }

        if self.verify_commands.is_empty() {
            issues.push(ValidationIssue {
                level: ValidationLevel::Warning,
                code: "repo.verify_commands.empty",
                message: "no verify commands; every change will pass verification".to_string(),
            });
        }

        issues
    }
}
