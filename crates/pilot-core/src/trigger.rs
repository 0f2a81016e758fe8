//! Classifies raw issue comments into typed events.

use crate::config::{RepoConfig, TriggerConfig};
use crate::types::{EventType, RawComment, TypedEvent};

/// Marker embedded in every comment the daemon posts.
pub const SELF_SIGNATURE: &str = "<!-- issue-pilot -->";

/// Appends the signature marker to an outgoing comment body.
pub fn sign_comment(body: &str) -> String {
    format!("{}\n\n{SELF_SIGNATURE}", body.trim_end())
}

/// Turn a raw comment into at most one typed event.
///
/// Signed comments and non-allow-listed authors are dropped before keyword
/// matching. Keywords are checked as `approve > reject > abort > mention`.
pub fn parse_comment(
    comment: &RawComment,
    repo: &RepoConfig,
    triggers: &TriggerConfig,
) -> Option<TypedEvent> {
    if comment.body.contains(SELF_SIGNATURE) {
        return None;
    }

    if !repo.allows_author(&comment.author) {
        return None;
    }

    let kind = classify_body(&comment.body, triggers)?;

    Some(TypedEvent {
        kind,
        repo: repo.name.clone(),
        issue_number: comment.issue_number,
        source_comment_id: comment.id,
        author: comment.author.clone(),
        body: comment.body.clone(),
        created_at: comment.created_at,
    })
}

fn classify_body(body: &str, triggers: &TriggerConfig) -> Option<EventType> {
    let lower = body.to_lowercase();
    let ordered = [
        (EventType::Approve, &triggers.approve),
        (EventType::Reject, &triggers.reject),
        (EventType::Abort, &triggers.abort),
        (EventType::Mention, &triggers.mention),
    ];

    ordered
        .into_iter()
        .find(|(_, keyword)| {
            let keyword = keyword.trim().to_lowercase();
            !keyword.is_empty() && lower.contains(&keyword)
        })
        .map(|(kind, _)| kind)
}
