use tracing::debug;

use crate::config::ContextConfig;
use crate::error::ReductionError;
use crate::estimate::{estimate_transcript, TokenEstimator};
use crate::message::Message;
use crate::metrics::{ReductionResult, TurnMetrics};
use crate::score::{annotate, rank_descending};

use super::{middle_truncate, pair_partners, passthrough, under_budget, Picker, ReductionStrategy};

/// No fixed zones: every message is scored, the best are kept greedily
/// (ties go to recency) with tool-call pairs pulled in atomically, and the
/// survivors are emitted back in chronological order. Gets a better
/// reduction ratio than the sliding window on unevenly-important
/// transcripts, at the price of positional predictability.
pub struct SmartTrimStrategy;

impl ReductionStrategy for SmartTrimStrategy {
    fn name(&self) -> &'static str {
        "smart-trim"
    }

    fn reduce(
        &self,
        transcript: &[Message],
        config: &ContextConfig,
        estimator: &dyn TokenEstimator,
    ) -> Result<ReductionResult, ReductionError> {
        if transcript.is_empty() {
            return Ok(passthrough(self.name(), transcript, estimator));
        }

        let annotations = annotate(transcript, config, estimator);
        let partners = pair_partners(transcript)?;
        let total: u32 = annotations.iter().map(|a| a.tokens).sum();

        if under_budget(config.budget, total, transcript.len()) {
            return Ok(passthrough(self.name(), transcript, estimator));
        }

        let n = transcript.len();
        let mut picker = Picker::new();

        // Unconditional set: the original objective and error-recovery
        // context survive regardless of score.
        for a in &annotations {
            if a.flags.is_initial_instruction || a.flags.is_error {
                picker.add(a.position, &partners, &annotations);
            }
        }

        let budget_overrun = !picker.fits(config.budget);

        if !budget_overrun {
            for pos in rank_descending(&annotations) {
                if picker.contains(pos) {
                    continue;
                }
                let (tokens, count) = picker.cost_of(pos, &partners, &annotations);
                if picker.fits_with(config.budget, tokens, count) {
                    picker.add(pos, &partners, &annotations);
                }
            }
        }

        let keep: Vec<usize> = picker.positions().collect();
        let dropped = n - keep.len();
        let mut messages: Vec<Message> = keep.iter().map(|&p| transcript[p].clone()).collect();
        compress_except_latest_pair(&mut messages, config);

        let reduced_tokens = estimate_transcript(estimator, &messages);
        debug!(
            original = n,
            reduced = messages.len(),
            dropped,
            budget_overrun,
            "smart-trim reduction applied"
        );

        Ok(ReductionResult {
            metrics: TurnMetrics {
                strategy: self.name().to_string(),
                original_messages: n,
                reduced_messages: messages.len(),
                original_tokens: total,
                reduced_tokens,
                dropped,
                merged: 0,
                budget_overrun,
                fallback: false,
            },
            messages,
        })
    }
}

/// Middle-truncate retained tool results, leaving the most recent pair and
/// any error result verbatim.
fn compress_except_latest_pair(messages: &mut [Message], config: &ContextConfig) {
    let Some(cap) = config.compression.max_result_chars() else {
        return;
    };

    let latest_result = messages.iter().rposition(|m| m.is_tool_result());
    for (i, msg) in messages.iter_mut().enumerate() {
        if Some(i) == latest_result || !msg.is_tool_result() || msg.content.len() <= cap {
            continue;
        }
        let lower = msg.content.to_lowercase();
        if config
            .error_keywords
            .iter()
            .any(|k| lower.contains(k.to_lowercase().as_str()))
        {
            continue;
        }
        msg.content = middle_truncate(&msg.content, cap);
    }
}
