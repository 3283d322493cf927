use serde::{Deserialize, Serialize};

use crate::message::Message;

/// What one reduction pass did to one transcript.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnMetrics {
    pub strategy: String,
    pub original_messages: usize,
    pub reduced_messages: usize,
    pub original_tokens: u32,
    pub reduced_tokens: u32,
    /// Messages removed outright.
    pub dropped: usize,
    /// Messages collapsed into summary entries.
    pub merged: usize,
    /// True when preservation rules alone forced the output past the budget.
    pub budget_overrun: bool,
    /// True when the strategy failed and the unreduced transcript was sent.
    pub fallback: bool,
}

/// The output of one reduction pass: the transcript to send plus what it
/// cost. Created and consumed every turn; the metrics half is merged into
/// [`RunMetrics`] and the message half goes to the model.
#[derive(Debug, Clone)]
pub struct ReductionResult {
    pub messages: Vec<Message>,
    pub metrics: TurnMetrics,
}

/// Aggregate reduction metrics for one task run. Mutated additively as
/// turns complete; read-only after the run ends, when reporting consumes
/// it (and may serialize it — hence the serde derives).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunMetrics {
    pub strategy: String,
    pub total_original_tokens: u64,
    pub total_reduced_tokens: u64,
    pub total_dropped: usize,
    pub total_merged: usize,
    pub overrun_turns: usize,
    pub fallback_turns: usize,
    /// Per-turn breakdown, in turn order.
    pub turns: Vec<TurnMetrics>,
}

impl RunMetrics {
    pub fn new(strategy: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            ..Self::default()
        }
    }

    /// Fold one turn's result into the running totals.
    pub fn record(&mut self, turn: TurnMetrics) {
        self.total_original_tokens += u64::from(turn.original_tokens);
        self.total_reduced_tokens += u64::from(turn.reduced_tokens);
        self.total_dropped += turn.dropped;
        self.total_merged += turn.merged;
        if turn.budget_overrun {
            self.overrun_turns += 1;
        }
        if turn.fallback {
            self.fallback_turns += 1;
        }
        self.turns.push(turn);
    }

    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    /// Aggregate reduction as a percentage of tokens seen. 0.0 for an
    /// empty run.
    pub fn reduction_percent(&self) -> f64 {
        if self.total_original_tokens == 0 {
            return 0.0;
        }
        let saved = self.total_original_tokens - self.total_reduced_tokens.min(self.total_original_tokens);
        saved as f64 / self.total_original_tokens as f64 * 100.0
    }

    /// JSON rendering for external reporting (run summaries, dashboards).
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
