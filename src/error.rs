/// Fatal configuration problems. Raised once at task start, never per call.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown strategy \"{0}\" (expected none, sliding-window, or smart-trim)")]
    UnknownStrategy(String),
    #[error("window size must be positive, got {0} tokens")]
    ZeroTokenBudget(u32),
    #[error("window size must be positive, got {0} messages")]
    ZeroMessageBudget(usize),
    #[error(
        "preservation rules contradict the budget: preserve_first ({first}) + \
         preserve_last ({last}) exceeds a {budget}-message window"
    )]
    ContradictoryPreservation {
        first: usize,
        last: usize,
        budget: usize,
    },
    #[error("keyword list \"{0}\" contains an empty entry")]
    EmptyKeyword(&'static str),
}

/// Internal invariant violations. Recovered locally by falling back to the
/// unreduced transcript for that turn — never crosses the crate boundary.
#[derive(Debug, thiserror::Error)]
pub enum ReductionError {
    #[error("tool result at index {index} has no matching call (id {id})")]
    OrphanedResult { index: usize, id: String },
    #[error("tool call id {id} appears on {count} calls, expected exactly one")]
    DuplicateCallId { id: String, count: usize },
}
