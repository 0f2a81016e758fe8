//! Retry logic: decides whether a failed verification earns another attempt.

/// Decision returned by the retry evaluator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryDecision {
    pub should_retry: bool,
    /// Human-readable explanation.
    pub reason: String,
}

/// `retry_count` is the number of retries already consumed.
pub fn evaluate_retry(retry_count: u32, max_retries: u32) -> RetryDecision {
    if retry_count >= max_retries {
        return RetryDecision {
            should_retry: false,
            reason: format!("max retries ({max_retries}) exhausted"),
        };
    }

    RetryDecision {
        should_retry: true,
        reason: format!("retrying (attempt {}/{max_retries})", retry_count + 1),
    }
}
