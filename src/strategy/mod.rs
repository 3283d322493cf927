//! Reduction strategies: pluggable algorithms mapping (transcript, budget)
//! to a smaller transcript. All variants share one contract — output is a
//! chronological subsequence, tool-call/result pairs survive or vanish
//! together, and the budget is honored except where preservation rules
//! alone force an overrun (recorded in metrics, never silently violated).

mod noop;
mod smart;
mod window;

pub use noop::NoOpStrategy;
pub use smart::SmartTrimStrategy;
pub use window::SlidingWindowStrategy;

use std::collections::BTreeSet;

use crate::config::{Budget, ContextConfig, StrategyKind};
use crate::error::ReductionError;
use crate::estimate::{estimate_transcript, TokenEstimator};
use crate::message::Message;
use crate::metrics::{ReductionResult, TurnMetrics};
use crate::score::Annotated;

/// One reduction algorithm. Implementations are stateless; everything they
/// need arrives as arguments, so independent runs share nothing.
pub trait ReductionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn reduce(
        &self,
        transcript: &[Message],
        config: &ContextConfig,
        estimator: &dyn TokenEstimator,
    ) -> Result<ReductionResult, ReductionError>;
}

/// Map a validated strategy kind to its implementation. Infallible by
/// construction — unknown identifiers were rejected when the config was
/// parsed, so there is no string dispatch left at call time.
pub fn resolve(kind: StrategyKind) -> Box<dyn ReductionStrategy> {
    match kind {
        StrategyKind::None => Box::new(NoOpStrategy),
        StrategyKind::SlidingWindow => Box::new(SlidingWindowStrategy),
        StrategyKind::SmartTrim => Box::new(SmartTrimStrategy),
    }
}

/// For each position, the position of its call/result partner. A tool
/// result must pair with exactly one preceding call; anything else is an
/// input invariant violation and aborts the pass (the hook falls back to
/// the unreduced transcript for the turn).
pub(crate) fn pair_partners(transcript: &[Message]) -> Result<Vec<Option<usize>>, ReductionError> {
    let mut partners: Vec<Option<usize>> = vec![None; transcript.len()];
    let mut open_calls: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();

    for (pos, msg) in transcript.iter().enumerate() {
        if msg.is_tool_call() {
            let id = msg.tool_call_id.as_deref().unwrap_or_default();
            if open_calls.insert(id, pos).is_some() {
                let count = transcript
                    .iter()
                    .filter(|m| m.is_tool_call() && m.tool_call_id.as_deref() == Some(id))
                    .count();
                return Err(ReductionError::DuplicateCallId {
                    id: id.to_string(),
                    count,
                });
            }
        } else if msg.is_tool_result() {
            let id = msg.tool_call_id.as_deref().unwrap_or_default();
            match open_calls.remove(id) {
                Some(call_pos) => {
                    partners[pos] = Some(call_pos);
                    partners[call_pos] = Some(pos);
                }
                None => {
                    return Err(ReductionError::OrphanedResult {
                        index: msg.index,
                        id: id.to_string(),
                    });
                }
            }
        }
    }

    Ok(partners)
}

/// Incremental selection with pair closure and running cost. Adding a
/// position pulls its partner in atomically, so a picked set can never
/// contain half a tool-call pair.
pub(crate) struct Picker {
    keep: BTreeSet<usize>,
    tokens: u64,
    count: usize,
}

impl Picker {
    pub(crate) fn new() -> Self {
        Self {
            keep: BTreeSet::new(),
            tokens: 0,
            count: 0,
        }
    }

    /// Add a position and its pair partner.
    pub(crate) fn add(&mut self, pos: usize, partners: &[Option<usize>], annotations: &[Annotated]) {
        for p in [Some(pos), partners[pos]].into_iter().flatten() {
            if self.keep.insert(p) {
                self.tokens += u64::from(annotations[p].tokens);
                self.count += 1;
            }
        }
    }

    /// Cost of adding a position (and its partner) without committing:
    /// (tokens, messages) not yet in the set.
    pub(crate) fn cost_of(
        &self,
        pos: usize,
        partners: &[Option<usize>],
        annotations: &[Annotated],
    ) -> (u64, usize) {
        let mut tokens = 0;
        let mut count = 0;
        for p in [Some(pos), partners[pos]].into_iter().flatten() {
            if !self.keep.contains(&p) {
                tokens += u64::from(annotations[p].tokens);
                count += 1;
            }
        }
        (tokens, count)
    }

    pub(crate) fn contains(&self, pos: usize) -> bool {
        self.keep.contains(&pos)
    }

    pub(crate) fn tokens(&self) -> u64 {
        self.tokens
    }

    pub(crate) fn count(&self) -> usize {
        self.count
    }

    /// The selected positions in chronological order.
    pub(crate) fn positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.keep.iter().copied()
    }

    pub(crate) fn fits(&self, budget: Budget) -> bool {
        match budget {
            Budget::Tokens(max) => self.tokens <= u64::from(max),
            Budget::Messages(max) => self.count <= max,
        }
    }

    /// Would the set still fit after adding `extra_tokens` / one message?
    pub(crate) fn fits_with(&self, budget: Budget, extra_tokens: u64, extra_count: usize) -> bool {
        match budget {
            Budget::Tokens(max) => self.tokens + extra_tokens <= u64::from(max),
            Budget::Messages(max) => self.count + extra_count <= max,
        }
    }
}

/// True when the whole transcript already fits the budget.
pub(crate) fn under_budget(budget: Budget, total_tokens: u32, message_count: usize) -> bool {
    match budget {
        Budget::Tokens(max) => total_tokens <= max,
        Budget::Messages(max) => message_count <= max,
    }
}

/// Result for the trivial cases: empty input or input already under budget.
pub(crate) fn passthrough(
    name: &str,
    transcript: &[Message],
    estimator: &dyn TokenEstimator,
) -> ReductionResult {
    let tokens = estimate_transcript(estimator, transcript);
    ReductionResult {
        messages: transcript.to_vec(),
        metrics: TurnMetrics {
            strategy: name.to_string(),
            original_messages: transcript.len(),
            reduced_messages: transcript.len(),
            original_tokens: tokens,
            reduced_tokens: tokens,
            ..TurnMetrics::default()
        },
    }
}

/// Keep head + tail of a string with a truncation marker in the middle.
/// Splits only on char boundaries.
pub(crate) fn middle_truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }

    let marker = format!("\n... [{} chars truncated] ...\n", s.len() - max_len);
    if max_len <= marker.len() {
        let end = floor_char_boundary(s, max_len);
        return s[..end].to_string();
    }

    let available = max_len - marker.len();
    let head_len = floor_char_boundary(s, available / 2);
    let tail_start = ceil_char_boundary(s, s.len() - (available - head_len));
    format!("{}{}{}", &s[..head_len], marker, &s[tail_start..])
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    idx = idx.min(s.len());
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(s: &str, mut idx: usize) -> usize {
    idx = idx.min(s.len());
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}
