//! Incremental comment fetch plus dedup against the processed-event ledger.

use pilot_core::{parse_comment, RawComment, TypedEvent};
use tracing::debug;

use crate::context::PilotContext;
use crate::error::PilotError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Actionable comment not yet in the ledger.
    Fresh(TypedEvent),
    Duplicate,
    /// Signed by us, not allow-listed, or no keyword.
    Discarded,
}

/// Comments at or after the stored checkpoint, oldest first.
pub fn fetch_new_comments(ctx: &PilotContext<'_>) -> Result<Vec<RawComment>, PilotError> {
    let since = ctx.service.checkpoint(&ctx.repo.name)?;
    let comments = ctx.tracker.list_new_comments(since)?;
    debug!(repo = %ctx.repo.name, since = ?since, count = comments.len(), "fetched comments");
    Ok(comments)
}

/// Classify a comment and check it against the ledger. The comment is only
/// recorded once routing has handled it.
pub fn admit_comment(ctx: &PilotContext<'_>, comment: &RawComment) -> Result<Admission, PilotError> {
    let Some(event) = parse_comment(comment, ctx.repo, ctx.triggers) else {
        debug!(comment_id = comment.id, author = %comment.author, "comment discarded");
        return Ok(Admission::Discarded);
    };

    if ctx.service.is_event_processed(&ctx.repo.name, comment.id)? {
        debug!(comment_id = comment.id, "comment already processed");
        return Ok(Admission::Duplicate);
    }

    Ok(Admission::Fresh(event))
}
