//! Daemon loop: one testable `run_cycle` plus the sleeping driver around it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::context::PilotContext;
use crate::error::PilotError;
use crate::poller::{admit_comment, fetch_new_comments, Admission};
use crate::router::{route, RouteOutcome};

const SLEEP_SLICE: Duration = Duration::from_millis(200);

/// What one poll cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub dispatched: usize,
    pub ignored: usize,
    pub duplicates: usize,
    pub discarded: usize,
    /// Events whose routing returned an error. The first one stops the cycle.
    pub errors: usize,
    pub checkpoint: Option<DateTime<Utc>>,
}

/// Fetch, classify, route and checkpoint every new comment, oldest first.
///
/// A routing error is logged and counted, and the cycle stops there without
/// moving the checkpoint past that comment, so the next cycle redelivers it.
/// A failed fetch or ledger/checkpoint write returns `Err`.
pub fn run_cycle(ctx: &PilotContext<'_>) -> Result<CycleReport, PilotError> {
    let comments = fetch_new_comments(ctx)?;
    let mut report = CycleReport {
        fetched: comments.len(),
        checkpoint: ctx.service.checkpoint(&ctx.repo.name)?,
        ..CycleReport::default()
    };

    for comment in &comments {
        match admit_comment(ctx, comment)? {
            Admission::Fresh(event) => match route(ctx, &event) {
                Ok(outcome) => {
                    match outcome {
                        RouteOutcome::Dispatched { .. } => report.dispatched += 1,
                        RouteOutcome::Ignored { reason } => {
                            info!(comment_id = comment.id, reason = %reason, "event ignored");
                            report.ignored += 1;
                        }
                    }
                    ctx.service.mark_event_processed(&ctx.repo.name, comment.id)?;
                }
                Err(err) => {
                    error!(comment_id = comment.id, error = %err, "failed to route event, will retry");
                    report.errors += 1;
                    break;
                }
            },
            Admission::Duplicate => report.duplicates += 1,
            Admission::Discarded => report.discarded += 1,
        }

        report.checkpoint = Some(
            ctx.service
                .advance_checkpoint(&ctx.repo.name, comment.created_at)?,
        );
    }

    Ok(report)
}

/// Run cycles until `shutdown` is set. With `once`, return after one cycle.
pub fn run_daemon(ctx: &PilotContext<'_>, interval: Duration, shutdown: &AtomicBool, once: bool) {
    info!(repo = %ctx.repo.name, interval_secs = interval.as_secs(), "daemon started");

    while !shutdown.load(Ordering::Relaxed) {
        match run_cycle(ctx) {
            Ok(report) if report.fetched > 0 => info!(
                fetched = report.fetched,
                dispatched = report.dispatched,
                ignored = report.ignored,
                duplicates = report.duplicates,
                discarded = report.discarded,
                errors = report.errors,
                "poll cycle finished"
            ),
            Ok(_) => {}
            Err(err) => warn!(error = %err, "poll cycle failed"),
        }

        if once {
            break;
        }
        sleep_unless_shutdown(interval, shutdown);
    }

    info!("daemon stopped");
}

fn sleep_unless_shutdown(interval: Duration, shutdown: &AtomicBool) {
    let deadline = Instant::now() + interval;
    while !shutdown.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}
