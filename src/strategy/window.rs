use tracing::debug;

use std::collections::BTreeSet;

use crate::config::{Budget, ContextConfig};
use crate::error::ReductionError;
use crate::estimate::{estimate_message, estimate_transcript, TokenEstimator};
use crate::message::{Message, Role};
use crate::metrics::{ReductionResult, TurnMetrics};
use crate::score::{annotate, rank_descending, Annotated};

use super::{middle_truncate, pair_partners, passthrough, under_budget, Picker, ReductionStrategy};

/// A tool result longer than this is data, not a confirmation, and is
/// never a merge candidate.
const CONFIRMATION_MAX_CHARS: usize = 160;

/// Snippet length per merged result in a summary entry.
const MERGE_SNIPPET_CHARS: usize = 60;

/// Three-zone reduction: a fixed prefix (instructions), a fixed suffix
/// (most recent interaction, extended to keep tool-call pairs whole), and
/// a middle kept only for flagged messages or by descending importance
/// until the budget runs out. Runs of same-tool confirmation pairs in the
/// retained set collapse into one summary entry.
pub struct SlidingWindowStrategy;

impl ReductionStrategy for SlidingWindowStrategy {
    fn name(&self) -> &'static str {
        "sliding-window"
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

        // Prefix zone: the opening instructions.
        for pos in 0..config.preserve_first.min(n) {
            picker.add(pos, &partners, &annotations);
        }

        // Suffix zone: the most recent interaction. Pair closure in the
        // picker extends it backward when the boundary would split a pair.
        let suffix_start = n.saturating_sub(config.preserve_last.min(n));
        for pos in suffix_start..n {
            picker.add(pos, &partners, &annotations);
        }

        // Middle zone, pass 1: flagged messages survive unconditionally.
        for a in &annotations {
            if a.flags.is_flagged() && !picker.contains(a.position) {
                picker.add(a.position, &partners, &annotations);
            }
        }

        // If preservation alone blew the budget, stop here and say so.
        let budget_overrun = !picker.fits(config.budget);

        // Middle zone, pass 2: fill by descending score while room remains.
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
        let (mut messages, merged) = emit_merged(
            transcript,
            &keep,
            &partners,
            &annotations,
            config.budget,
            estimator,
        );
        compress_middle(
            &mut messages,
            config,
            transcript,
            config.preserve_first.min(n),
            suffix_start,
        );

        let reduced_tokens = estimate_transcript(estimator, &messages);
        debug!(
            original = n,
            reduced = messages.len(),
            dropped,
            merged,
            budget_overrun,
            "sliding-window reduction applied"
        );

        Ok(ReductionResult {
            metrics: TurnMetrics {
                strategy: self.name().to_string(),
                original_messages: n,
                reduced_messages: messages.len(),
                original_tokens: total,
                reduced_tokens,
                dropped,
                merged,
                budget_overrun,
                fallback: false,
            },
            messages,
        })
    }
}

/// Emit the kept positions in order, collapsing runs of two or more
/// consecutive same-tool non-error confirmation pairs: the first pair
/// stays, the rest become one summary entry naming the tool and what it
/// returned. Under a token budget a summary only replaces pairs it is
/// strictly cheaper than, so merging can never push a compliant selection
/// over the budget. Returns (messages, count of originals merged away).
fn emit_merged(
    transcript: &[Message],
    keep: &[usize],
    partners: &[Option<usize>],
    annotations: &[Annotated],
    budget: Budget,
    estimator: &dyn TokenEstimator,
) -> (Vec<Message>, usize) {
    let mut out = Vec::with_capacity(keep.len());
    let mut merged = 0;
    let mut i = 0;

    while i < keep.len() {
        let run = confirmation_run(transcript, keep, partners, annotations, i);
        if run >= 2 {
            let tool = transcript[keep[i]]
                .tool_name
                .clone()
                .unwrap_or_else(|| "tool".to_string());
            let snippets: Vec<String> = (1..run)
                .map(|p| snippet(&transcript[keep[i + 2 * p + 1]].content))
                .collect();
            let extra = run - 1;
            let summary = Message {
                index: transcript[keep[i + 2]].index,
                role: Role::Tool,
                content: format!(
                    "[merged {extra} additional {tool} result(s): {}]",
                    snippets.join("; ")
                ),
                tool_call_id: None,
                tool_name: Some(tool),
                timestamp: transcript[keep[i + 2]].timestamp,
            };

            let replaced: u32 = keep[i + 2..i + 2 * run]
                .iter()
                .map(|&p| annotations[p].tokens)
                .sum();
            let worthwhile = match budget {
                // A message budget always gains: 2 * extra entries become one.
                Budget::Messages(_) => true,
                Budget::Tokens(_) => estimate_message(estimator, &summary) < replaced,
            };

            if worthwhile {
                // First pair survives verbatim.
                out.push(transcript[keep[i]].clone());
                out.push(transcript[keep[i + 1]].clone());
                out.push(summary);
                merged += 2 * extra;
                i += 2 * run;
                continue;
            }
        }

        out.push(transcript[keep[i]].clone());
        i += 1;
    }

    (out, merged)
}

/// Length (in pairs) of the confirmation run starting at kept position `i`,
/// or 0 if none starts there. A run is consecutive call/result pairs — the
/// result immediately follows its call in the kept sequence — sharing one
/// tool name, with short, non-error results.
fn confirmation_run(
    transcript: &[Message],
    keep: &[usize],
    partners: &[Option<usize>],
    annotations: &[Annotated],
    i: usize,
) -> usize {
    let tool = match transcript[keep[i]].tool_name.as_deref() {
        Some(t) if transcript[keep[i]].is_tool_call() => t,
        _ => return 0,
    };

    let mut pairs = 0;
    let mut j = i;
    while j + 1 < keep.len() {
        let call = &transcript[keep[j]];
        let result_pos = keep[j + 1];
        let is_pair = call.is_tool_call()
            && call.tool_name.as_deref() == Some(tool)
            && partners[keep[j]] == Some(result_pos);
        if !is_pair {
            break;
        }
        let result = &transcript[result_pos];
        if annotations[result_pos].flags.is_error || result.content.len() > CONFIRMATION_MAX_CHARS {
            break;
        }
        pairs += 1;
        j += 2;
    }
    pairs
}

fn snippet(content: &str) -> String {
    if content.len() <= MERGE_SNIPPET_CHARS {
        return content.to_string();
    }
    let mut end = MERGE_SNIPPET_CHARS;
    while end > 0 && !content.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &content[..end])
}

/// Middle-truncate retained tool results that sit between the prefix and
/// suffix zones. Error results stay intact — they are exactly the context
/// the agent may need verbatim to recover. The zones are transcript
/// positions, so membership is resolved through the source slice rather
/// than assumed from `Message::index`.
fn compress_middle(
    messages: &mut [Message],
    config: &ContextConfig,
    transcript: &[Message],
    prefix_len: usize,
    suffix_start: usize,
) {
    let Some(cap) = config.compression.max_result_chars() else {
        return;
    };

    let middle: BTreeSet<usize> = transcript
        .get(prefix_len..suffix_start)
        .unwrap_or_default()
        .iter()
        .map(|m| m.index)
        .collect();

    for msg in messages.iter_mut() {
        if !middle.contains(&msg.index) || !msg.is_tool_result() || msg.content.len() <= cap {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Budget, CompressionLevel};
    use crate::estimate::HeuristicEstimator;

    fn reduce(transcript: &[Message], config: &ContextConfig) -> ReductionResult {
        SlidingWindowStrategy
            .reduce(transcript, config, &HeuristicEstimator)
            .unwrap()
    }

    /// user instruction + `pairs` click call/result pairs with bulky results.
    fn transcript_with_pairs(pairs: usize) -> Vec<Message> {
        let mut messages = vec![Message::new(0, Role::User, "fill out the signup flow")];
        for p in 0..pairs {
            let idx = messages.len();
            messages.push(Message::tool_call(
                idx,
                format!("c{p}"),
                "click",
                format!("{{\"selector\": \"#button-{p}\"}}"),
            ));
            messages.push(Message::tool_result(
                idx + 1,
                format!("c{p}"),
                "click",
                "x".repeat(400),
            ));
        }
        messages
    }

    #[test]
    fn empty_transcript_yields_empty_result() {
        let result = reduce(&[], &ContextConfig::default());
        assert!(result.messages.is_empty());
        assert_eq!(result.metrics.reduced_tokens, 0);
    }

    #[test]
    fn under_budget_transcript_is_untouched() {
        let transcript = transcript_with_pairs(2);
        let config = ContextConfig::default().with_budget(Budget::Tokens(100_000));
        let result = reduce(&transcript, &config);
        assert_eq!(result.messages, transcript);
        assert_eq!(result.metrics.dropped, 0);
    }

    #[test]
    fn middle_is_dropped_and_zones_survive() {
        let transcript = transcript_with_pairs(20);
        let config = ContextConfig::default()
            .with_budget(Budget::Messages(9))
            .with_preserve_first(1)
            .with_preserve_last(6)
            .with_compression(CompressionLevel::None);
        let result = reduce(&transcript, &config);

        // Opening instruction survives.
        assert_eq!(result.messages[0].index, 0);
        // The most recent pair survives.
        let last = result.messages.last().unwrap();
        assert_eq!(last.index, transcript.len() - 1);
        assert!(result.metrics.dropped > 0);
    }

    #[test]
    fn suffix_boundary_never_splits_a_pair() {
        let transcript = transcript_with_pairs(10);
        // preserve_last = 3 lands the boundary on a result, splitting a pair.
        let config = ContextConfig::default()
            .with_budget(Budget::Messages(8))
            .with_preserve_first(1)
            .with_preserve_last(3)
            .with_compression(CompressionLevel::None);
        let result = reduce(&transcript, &config);

        for msg in &result.messages {
            if msg.is_tool_result() {
                let id = msg.tool_call_id.as_ref().unwrap();
                assert!(
                    result
                        .messages
                        .iter()
                        .any(|m| m.is_tool_call() && m.tool_call_id.as_ref() == Some(id)),
                    "result {id} retained without its call"
                );
            }
        }
    }

    #[test]
    fn flagged_error_in_middle_survives() {
        let mut transcript = transcript_with_pairs(20);
        // Plant an error result deep in the middle.
        transcript[10].content = "error: submit button not found".to_string();

        let config = ContextConfig::default()
            .with_budget(Budget::Messages(12))
            .with_preserve_first(1)
            .with_preserve_last(4)
            .with_compression(CompressionLevel::None);
        let result = reduce(&transcript, &config);

        assert!(
            result.messages.iter().any(|m| m.index == 10),
            "error-flagged middle message must be retained"
        );
    }

    #[test]
    fn preservation_overrun_is_flagged_not_violated() {
        let transcript = transcript_with_pairs(10);
        // Budget far below what the zones alone need.
        let config = ContextConfig::default()
            .with_budget(Budget::Tokens(10))
            .with_preserve_first(1)
            .with_preserve_last(4);
        let result = reduce(&transcript, &config);

        assert!(result.metrics.budget_overrun);
        // Zones still emitted, nothing panicked or errored.
        assert!(result.messages.len() >= 5);
    }

    #[test]
    fn consecutive_confirmation_pairs_merge() {
        // Instruction, junk middle to force reduction, then two adjacent
        // same-tool confirmation pairs at the end.
        let mut messages = vec![Message::new(0, Role::User, "archive every open ticket")];
        for i in 0..10 {
            messages.push(Message::new(1 + i, Role::Agent, "thinking ".repeat(100)));
        }
        let base = messages.len();
        messages.push(Message::tool_call(base, "a1", "archive", "{\"ticket\": 1}"));
        messages.push(Message::tool_result(base + 1, "a1", "archive", "archived ticket 1"));
        messages.push(Message::tool_call(base + 2, "a2", "archive", "{\"ticket\": 2}"));
        messages.push(Message::tool_result(base + 3, "a2", "archive", "archived ticket 2"));

        let config = ContextConfig::default()
            .with_budget(Budget::Messages(5))
            .with_preserve_first(1)
            .with_preserve_last(4)
            .with_compression(CompressionLevel::None);
        let result = reduce(&messages, &config);

        // Pre-merge retention is 5 messages; the second pair collapses into
        // one summary entry → 4.
        assert_eq!(result.messages.len(), 4);
        assert_eq!(result.metrics.merged, 2);
        let summary = result.messages.last().unwrap();
        assert!(summary.content.contains("archive"));
        assert!(summary.content.contains("archived ticket 2"));
    }

    #[test]
    fn merging_never_exceeds_a_token_budget() {
        // Two tiny confirmation pairs: a summary entry would cost more
        // tokens than the pair it replaces, so it must not be emitted.
        let mut messages = vec![Message::new(0, Role::User, "archive every open ticket")];
        for i in 0..10 {
            messages.push(Message::new(1 + i, Role::Agent, "thinking ".repeat(100)));
        }
        let base = messages.len();
        messages.push(Message::tool_call(base, "a1", "archive", "{\"ticket\": 1}"));
        messages.push(Message::tool_result(base + 1, "a1", "archive", "archived ticket 1"));
        messages.push(Message::tool_call(base + 2, "a2", "archive", "{\"ticket\": 2}"));
        messages.push(Message::tool_result(base + 3, "a2", "archive", "archived ticket 2"));

        // Budget covers exactly the instruction plus the last two pairs.
        let zone_tokens = estimate_transcript(&HeuristicEstimator, &messages[0..1])
            + estimate_transcript(&HeuristicEstimator, &messages[base..]);
        let config = ContextConfig::default()
            .with_budget(Budget::Tokens(zone_tokens))
            .with_preserve_first(1)
            .with_preserve_last(4)
            .with_compression(CompressionLevel::None);
        let result = reduce(&messages, &config);

        assert!(!result.metrics.budget_overrun);
        assert!(
            result.metrics.reduced_tokens <= zone_tokens,
            "budget {zone_tokens}, reduced {}",
            result.metrics.reduced_tokens
        );
        assert_eq!(result.metrics.merged, 0);
        assert_eq!(result.messages.len(), 5);
    }

    #[test]
    fn error_pairs_are_never_merged() {
        let mut messages = vec![Message::new(0, Role::User, "archive tickets")];
        for i in 0..10 {
            messages.push(Message::new(1 + i, Role::Agent, "thinking ".repeat(100)));
        }
        let base = messages.len();
        messages.push(Message::tool_call(base, "a1", "archive", "{}"));
        messages.push(Message::tool_result(base + 1, "a1", "archive", "archived"));
        messages.push(Message::tool_call(base + 2, "a2", "archive", "{}"));
        messages.push(Message::tool_result(base + 3, "a2", "archive", "failed: ticket locked"));

        let config = ContextConfig::default()
            .with_budget(Budget::Messages(5))
            .with_preserve_first(1)
            .with_preserve_last(4)
            .with_compression(CompressionLevel::None);
        let result = reduce(&messages, &config);

        assert_eq!(result.metrics.merged, 0);
        assert!(result
            .messages
            .iter()
            .any(|m| m.content.contains("ticket locked")));
    }

    #[test]
    fn middle_tool_results_are_compressed() {
        // Like transcript_with_pairs, but with payloads well over the cap.
        let mut transcript = vec![Message::new(0, Role::User, "scrape every product page")];
        for p in 0..20 {
            let idx = transcript.len();
            transcript.push(Message::tool_call(
                idx,
                format!("c{p}"),
                "fetch",
                format!("{{\"page\": {p}}}"),
            ));
            transcript.push(Message::tool_result(
                idx + 1,
                format!("c{p}"),
                "fetch",
                "y".repeat(2000),
            ));
        }

        let config = ContextConfig::default()
            .with_budget(Budget::Messages(20))
            .with_preserve_first(1)
            .with_preserve_last(4)
            .with_compression(CompressionLevel::High);
        let result = reduce(&transcript, &config);

        let middle_results: Vec<&Message> = result
            .messages
            .iter()
            .filter(|m| m.is_tool_result() && m.index < transcript.len() - 4)
            .collect();
        assert!(!middle_results.is_empty());
        for m in middle_results {
            assert!(
                m.content.len() <= 512,
                "middle result at {} should be truncated to 512 chars, got {}",
                m.index,
                m.content.len()
            );
            assert!(m.content.contains("chars truncated"));
        }

        // Suffix results stay verbatim.
        let last = result.messages.last().unwrap();
        assert_eq!(last.content.len(), 2000);
    }

    #[test]
    fn compression_zones_follow_positions_not_raw_indexes() {
        // Indexes offset far from their positions, as in a transcript whose
        // head was already discarded upstream.
        let mut transcript = vec![Message::new(500, Role::User, "scrape every product page")];
        for p in 0..20 {
            let idx = 500 + transcript.len();
            transcript.push(Message::tool_call(
                idx,
                format!("c{p}"),
                "fetch",
                format!("{{\"page\": {p}}}"),
            ));
            transcript.push(Message::tool_result(
                idx + 1,
                format!("c{p}"),
                "fetch",
                "y".repeat(2000),
            ));
        }

        let config = ContextConfig::default()
            .with_budget(Budget::Messages(20))
            .with_preserve_first(1)
            .with_preserve_last(4)
            .with_compression(CompressionLevel::High);
        let result = reduce(&transcript, &config);

        let suffix_first = transcript[transcript.len() - 4].index;
        let middle_results: Vec<&Message> = result
            .messages
            .iter()
            .filter(|m| m.is_tool_result() && m.index < suffix_first)
            .collect();
        assert!(!middle_results.is_empty());
        for m in middle_results {
            assert!(
                m.content.len() <= 512,
                "middle result at {} should be truncated, got {} chars",
                m.index,
                m.content.len()
            );
        }
        assert_eq!(result.messages.last().unwrap().content.len(), 2000);
    }

    #[test]
    fn output_is_ordered_without_duplicates() {
        let transcript = transcript_with_pairs(30);
        let config = ContextConfig::default()
            .with_budget(Budget::Tokens(800))
            .with_preserve_first(1)
            .with_preserve_last(4);
        let result = reduce(&transcript, &config);

        let indexes: Vec<usize> = result.messages.iter().map(|m| m.index).collect();
        let mut sorted = indexes.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(indexes, sorted, "output must be an ordered subsequence");
    }
}
