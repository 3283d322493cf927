use tracing::{debug, warn};

use crate::config::ContextConfig;
use crate::error::ConfigError;
use crate::estimate::{estimate_transcript, HeuristicEstimator, TokenEstimator};
use crate::message::Message;
use crate::metrics::{RunMetrics, TurnMetrics};
use crate::strategy::{resolve, ReductionStrategy};

/// The single integration point between the executor and the reduction
/// core. Built once per task run: validates the config and resolves the
/// strategy eagerly, so a bad identifier fails before the first turn ever
/// runs. Holds no state between calls beyond cumulative [`RunMetrics`].
///
/// Call [`reduce_for_model`](Self::reduce_for_model) exactly once per
/// turn, after the previous turn's results were appended and before the
/// next model call. The canonical transcript is never mutated — a new
/// sequence is derived each time.
pub struct ContextHook {
    config: ContextConfig,
    strategy: Box<dyn ReductionStrategy>,
    estimator: Box<dyn TokenEstimator + Send + Sync>,
    metrics: RunMetrics,
}

impl ContextHook {
    /// Build a hook with the default chars/4 estimator.
    pub fn new(config: ContextConfig) -> Result<Self, ConfigError> {
        Self::with_estimator(config, HeuristicEstimator)
    }

    /// Build a hook with a custom token estimator (e.g. a model-specific
    /// tokenizer). Estimator failures still fall back per message and
    /// never surface.
    pub fn with_estimator(
        config: ContextConfig,
        estimator: impl TokenEstimator + Send + Sync + 'static,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let strategy = resolve(config.strategy);
        let metrics = RunMetrics::new(strategy.name());
        Ok(Self {
            config,
            strategy,
            estimator: Box::new(estimator),
            metrics,
        })
    }

    /// Reduce the canonical transcript for the next model call.
    ///
    /// Any internal strategy failure is logged and degrades to the
    /// unmodified input for this turn only — task-execution correctness
    /// always outranks token savings.
    pub fn reduce_for_model(&mut self, transcript: &[Message]) -> Vec<Message> {
        if !self.config.enabled {
            let tokens = estimate_transcript(self.estimator.as_ref(), transcript);
            self.metrics.record(TurnMetrics {
                strategy: self.strategy.name().to_string(),
                original_messages: transcript.len(),
                reduced_messages: transcript.len(),
                original_tokens: tokens,
                reduced_tokens: tokens,
                ..TurnMetrics::default()
            });
            return transcript.to_vec();
        }

        match self
            .strategy
            .reduce(transcript, &self.config, self.estimator.as_ref())
        {
            Ok(result) => {
                debug!(
                    turn = self.metrics.turn_count(),
                    original_tokens = result.metrics.original_tokens,
                    reduced_tokens = result.metrics.reduced_tokens,
                    "transcript reduced"
                );
                self.metrics.record(result.metrics);
                result.messages
            }
            Err(e) => {
                warn!(error = %e, "reduction failed, sending unreduced transcript");
                let tokens = estimate_transcript(self.estimator.as_ref(), transcript);
                self.metrics.record(TurnMetrics {
                    strategy: self.strategy.name().to_string(),
                    original_messages: transcript.len(),
                    reduced_messages: transcript.len(),
                    original_tokens: tokens,
                    reduced_tokens: tokens,
                    fallback: true,
                    ..TurnMetrics::default()
                });
                transcript.to_vec()
            }
        }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Cumulative metrics so far. Read-only; reporting usually waits for
    /// [`into_metrics`](Self::into_metrics) at run end.
    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    /// Consume the hook at run end and hand the metrics to reporting.
    pub fn into_metrics(self) -> RunMetrics {
        self.metrics
    }
}
