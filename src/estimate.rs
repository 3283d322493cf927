use tracing::debug;

use crate::message::Message;

/// Fixed per-message cost for role framing and wire formatting.
const ROLE_OVERHEAD_TOKENS: u32 = 4;

/// Raised by estimators that can fail (e.g. a model-specific tokenizer
/// rejecting malformed input). Never propagates: callers fall back to the
/// character heuristic for the offending message only.
#[derive(Debug, thiserror::Error)]
#[error("token estimation failed: {0}")]
pub struct EstimateError(pub String);

/// Maps text to an approximate token cost. Implementations must be
/// monotonic in text length and cheap enough to run on every message,
/// every turn.
pub trait TokenEstimator {
    fn try_estimate(&self, text: &str) -> Result<u32, EstimateError>;
}

/// chars/4 heuristic. Good enough for trend detection — the same estimate
/// local agent tooling uses in place of a real tokenizer. Cannot fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEstimator;

impl TokenEstimator for HeuristicEstimator {
    fn try_estimate(&self, text: &str) -> Result<u32, EstimateError> {
        Ok(heuristic_tokens(text))
    }
}

fn heuristic_tokens(text: &str) -> u32 {
    (text.len() as u32) / 4
}

/// Token cost of one message: content plus tool-call framing plus role
/// overhead. Falls back to the character heuristic if the estimator fails,
/// so a bad message can never abort a reduction pass.
pub fn estimate_message(estimator: &dyn TokenEstimator, msg: &Message) -> u32 {
    let content = match estimator.try_estimate(&msg.content) {
        Ok(tokens) => tokens,
        Err(e) => {
            debug!(index = msg.index, error = %e, "estimator failed, using heuristic");
            heuristic_tokens(&msg.content)
        }
    };

    let framing = msg
        .tool_call_id
        .as_ref()
        .map(|id| id.len() as u32 / 4)
        .unwrap_or(0)
        + msg
            .tool_name
            .as_ref()
            .map(|n| n.len() as u32 / 4)
            .unwrap_or(0);

    content + framing + ROLE_OVERHEAD_TOKENS
}

/// Total cost of a transcript.
pub fn estimate_transcript(estimator: &dyn TokenEstimator, messages: &[Message]) -> u32 {
    messages.iter().map(|m| estimate_message(estimator, m)).sum()
}
