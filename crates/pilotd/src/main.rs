mod cli;

use std::fs;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use pilot_agents::ClaudeCli;
use pilot_core::{
    has_errors, load_pilot_config, PilotConfig, RepoConfig, Task, Validate, ValidationLevel,
};
use pilot_git::{GitCli, GitWorkspace};
use pilot_github::GithubClient;
use pilot_verify::ShellVerifier;
use pilotd::{run_daemon, PilotContext, TaskService};
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};

fn main() {
    if let Err(err) = run() {
        eprintln!("pilot failed: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = load_config(&cli.config)?;
    let repo = config
        .primary_repo()
        .context("no repository configured")?;
    let service = open_service(&config)?;

    match cli.command {
        Command::Run { once } => run_pilot(&config, repo, &service, once),
        Command::Status { all, json } => print_status(&service, all, json),
        Command::ResetCheckpoint { to } => {
            service
                .reset_checkpoint(&repo.name, to)
                .context("failed to reset poll checkpoint")?;
            match to {
                Some(at) => println!("checkpoint for {} set to {}", repo.name, at.to_rfc3339()),
                None => println!("checkpoint for {} cleared", repo.name),
            }
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn load_config(path: &Path) -> Result<PilotConfig> {
    let config = load_pilot_config(path)?;

    let issues = config.validate();
    for issue in &issues {
        match issue.level {
            ValidationLevel::Error => error!(code = issue.code, "{}", issue.message),
            ValidationLevel::Warning => warn!(code = issue.code, "{}", issue.message),
        }
    }
    if has_errors(&issues) {
        bail!("invalid config at {}", path.display());
    }
    Ok(config)
}

fn open_service(config: &PilotConfig) -> Result<TaskService> {
    let sqlite_path = &config.storage.sqlite_path;
    if let Some(parent) = sqlite_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    TaskService::open(sqlite_path)
        .with_context(|| format!("failed to open task store at {}", sqlite_path.display()))
}

fn run_pilot(config: &PilotConfig, repo: &RepoConfig, service: &TaskService, once: bool) -> Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&shutdown))
            .context("failed to install signal handler")?;
    }

    let tracker = GithubClient::new(repo.name.clone());
    let ai = ClaudeCli::from_config(&config.agent, &config.timeouts);
    let workspace = GitWorkspace::new(GitCli::default(), repo.local_path.clone());
    let verifier = ShellVerifier::new(config.timeouts.verify_command());

    let ctx = PilotContext {
        service,
        tracker: &tracker,
        ai: &ai,
        workspace: &workspace,
        verifier: &verifier,
        triggers: &config.triggers,
        repo,
        max_retries: config.agent.max_verify_retries,
    };

    info!(repo = %repo.name, local_path = %repo.local_path.display(), "starting pilot");
    run_daemon(&ctx, config.polling.interval(), &shutdown, once);
    Ok(())
}

fn print_status(service: &TaskService, all: bool, json: bool) -> Result<()> {
    let tasks = if all {
        service.list_tasks()?
    } else {
        service.list_active_tasks()?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&tasks)?);
        return Ok(());
    }

    if tasks.is_empty() {
        println!("no tasks");
        return Ok(());
    }
    for task in &tasks {
        println!("{}", status_line(task));
        if let Some(err) = task.last_error.as_deref() {
            println!("       last error: {}", err.lines().next().unwrap_or_default());
        }
    }
    Ok(())
}

fn status_line(task: &Task) -> String {
    let waiting = if task.status.awaits_human() {
        "  (awaiting reply)"
    } else {
        ""
    };
    format!(
        "{:>5}  {:<14} {:<24} retries={} updated={}{}",
        task.id.0,
        task.status.as_str(),
        task.label(),
        task.retry_count,
        task.updated_at.to_rfc3339(),
        waiting
    )
}
