use crate::classify::{classify, Category, Classification};
use crate::config::{ContextConfig, ScoreWeights};
use crate::estimate::{estimate_message, TokenEstimator};
use crate::message::Message;

/// One annotation pass over a transcript: classification, token cost, and
/// importance score per message. Derived data lives here, not on the
/// message, so the pass stays pure and repeatable.
#[derive(Debug, Clone)]
pub struct Annotated {
    /// Position in the transcript slice being reduced.
    pub position: usize,
    pub flags: Classification,
    pub tokens: u32,
    pub score: f64,
}

/// Compute the importance score for one message, in [0, 1].
///
/// Additive over weighted factors: category base weight, exponential
/// recency decay from the transcript end
/// (`recency_weight * e^(-distance * ln(2) / half_life)`), flat boosts for
/// error/state-change flags, and a penalty for oversized payloads.
pub fn score(
    flags: &Classification,
    tokens: u32,
    position: usize,
    transcript_len: usize,
    weights: &ScoreWeights,
) -> f64 {
    let base = match flags.category {
        Category::System => weights.system_base,
        Category::User => weights.user_base,
        Category::Agent => weights.agent_base,
        Category::ToolCall => weights.tool_call_base,
        Category::ToolResult => weights.tool_result_base,
    };

    let last = transcript_len.saturating_sub(1);
    let distance = last.saturating_sub(position) as f64;
    let decay_rate = (2.0_f64).ln() / weights.recency_half_life.max(f64::EPSILON);
    let recency = weights.recency_weight * (-decay_rate * distance).exp();

    let mut total = base + recency;
    if flags.is_error {
        total += weights.error_boost;
    }
    if flags.is_state_change {
        total += weights.state_change_boost;
    }
    if tokens > weights.oversize_threshold_tokens {
        total -= weights.oversize_penalty;
    }

    total.clamp(0.0, 1.0)
}

/// Annotate every message in a transcript. Deterministic: repeated calls
/// over the same input yield identical annotations.
pub fn annotate(
    transcript: &[Message],
    config: &ContextConfig,
    estimator: &dyn TokenEstimator,
) -> Vec<Annotated> {
    let len = transcript.len();
    transcript
        .iter()
        .enumerate()
        .map(|(position, msg)| {
            let flags = classify(msg, position, config);
            let tokens = estimate_message(estimator, msg);
            let score = score(&flags, tokens, position, len, &config.weights);
            Annotated {
                position,
                flags,
                tokens,
                score,
            }
        })
        .collect()
}

/// Sort positions by descending score, breaking ties toward recency
/// (higher position wins). `total_cmp` keeps the order total and
/// reproducible even for pathological float values.
pub fn rank_descending(annotations: &[Annotated]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..annotations.len()).collect();
    order.sort_by(|&a, &b| {
        annotations[b]
            .score
            .total_cmp(&annotations[a].score)
            .then(b.cmp(&a))
    });
    order
}
