use crate::config::ContextConfig;
use crate::error::ReductionError;
use crate::estimate::TokenEstimator;
use crate::message::Message;
use crate::metrics::ReductionResult;

use super::{passthrough, ReductionStrategy};

/// The correctness baseline: returns the transcript unchanged. Other
/// strategies must never retain fewer essential messages than this one
/// would under an unbounded budget.
pub struct NoOpStrategy;

impl ReductionStrategy for NoOpStrategy {
    fn name(&self) -> &'static str {
        "none"
    }

    fn reduce(
        &self,
        transcript: &[Message],
        _config: &ContextConfig,
        estimator: &dyn TokenEstimator,
    ) -> Result<ReductionResult, ReductionError> {
        Ok(passthrough(self.name(), transcript, estimator))
    }
}
