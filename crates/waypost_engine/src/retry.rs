//! Retry policy matrix (spec §4.8/§7): turns a classified error plus the
//! job's current attempt count into a requeue-now / requeue-after-delay /
//! terminal decision. Attempt budget is enforced here, not by the store.

use std::time::Duration;

use crate::error::ErrorClass;

/// Total attempts a job gets before terminal failure (spec §4.8: "3
/// attempts total by default, i.e. two retries").
pub const DEFAULT_MAX_ATTEMPTS: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryNow,
    RetryAfter(Duration),
    Terminal,
}

/// `attempt` is the job's attempt counter AFTER the just-finished run was
/// claimed (i.e. `jobs::claim` has already bumped it once for this try).
pub fn decide(class: ErrorClass, attempt: i64, max_attempts: i64) -> RetryDecision {
    match class {
        // Terminal regardless of remaining budget: these error classes
        // mean retrying can't help (spec §7 items 5-7).
        ErrorClass::NotFound | ErrorClass::Denied | ErrorClass::Invariant => RetryDecision::Terminal,

        // Recovery, not failure: the pipeline already fell through to the
        // cold path before this ever reaches the retry wrapper. Treated
        // as an immediate retry if it somehow does (defensive default).
        ErrorClass::HandleInvalid => retry_or_terminal(attempt, max_attempts, RetryDecision::RetryNow),

        ErrorClass::FloodControl { retry_after_secs } => retry_or_terminal(
            attempt,
            max_attempts,
            RetryDecision::RetryAfter(Duration::from_secs(retry_after_secs)),
        ),

        ErrorClass::Transient => retry_or_terminal(attempt, max_attempts, RetryDecision::RetryNow),
    }
}

fn retry_or_terminal(attempt: i64, max_attempts: i64, retry: RetryDecision) -> RetryDecision {
    if attempt >= max_attempts {
        RetryDecision::Terminal
    } else {
        retry
    }
}
