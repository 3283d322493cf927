//! Context window management for tool-using agent loops.
//!
//! Long automation tasks resend a growing transcript to the model every
//! turn. This crate selects a bounded-size transcript before each model
//! call: it classifies and scores messages, applies a pluggable reduction
//! strategy, and reports what it saved — all without ever corrupting
//! tool-call pairing or message order, and without mutating the canonical
//! transcript the executor owns.
//!
//! The integration surface is [`ContextHook`]: build it once per run from
//! a validated [`ContextConfig`], call
//! [`reduce_for_model`](ContextHook::reduce_for_model) once per turn, and
//! collect [`RunMetrics`] when the run ends. Every failure mode past
//! construction degrades to sending the unreduced transcript — task
//! correctness always outranks token savings.

pub mod classify;
pub mod config;
pub mod error;
pub mod estimate;
pub mod hook;
pub mod message;
pub mod metrics;
pub mod score;
pub mod strategy;

pub use classify::{classify, Category, Classification};
pub use config::{Budget, CompressionLevel, ContextConfig, ScoreWeights, StrategyKind};
pub use error::{ConfigError, ReductionError};
pub use estimate::{
    estimate_message, estimate_transcript, EstimateError, HeuristicEstimator, TokenEstimator,
};
pub use hook::ContextHook;
pub use message::{Message, Role};
pub use metrics::{ReductionResult, RunMetrics, TurnMetrics};
pub use score::{annotate, score, Annotated};
pub use strategy::{
    resolve, NoOpStrategy, ReductionStrategy, SlidingWindowStrategy, SmartTrimStrategy,
};
