use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// The closed set of shipped reduction strategies. Selected and validated
/// once at task start — never dispatched by string at call time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    None,
    SlidingWindow,
    SmartTrim,
}

impl StrategyKind {
    /// Parse a configured strategy identifier. Unknown names are a fatal
    /// configuration error, raised before the first turn.
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name {
            "none" => Ok(Self::None),
            "sliding-window" => Ok(Self::SlidingWindow),
            "smart-trim" => Ok(Self::SmartTrim),
            other => Err(ConfigError::UnknownStrategy(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::SlidingWindow => "sliding-window",
            Self::SmartTrim => "smart-trim",
        }
    }
}

/// Window size, denominated in tokens or messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Budget {
    Tokens(u32),
    Messages(usize),
}

/// How aggressively retained tool results are truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionLevel {
    None,
    Low,
    Medium,
    High,
}

impl CompressionLevel {
    /// Character cap applied to tool-result payloads outside the protected
    /// recent region. `None` disables truncation entirely.
    pub fn max_result_chars(&self) -> Option<usize> {
        match self {
            Self::None => None,
            Self::Low => Some(2048),
            Self::Medium => Some(1024),
            Self::High => Some(512),
        }
    }
}

/// Weights for the importance scoring function. All factors are additive;
/// the final score is clamped to [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Base weight per category, role-derived.
    pub system_base: f64,
    pub user_base: f64,
    pub agent_base: f64,
    pub tool_call_base: f64,
    pub tool_result_base: f64,
    /// Maximum recency contribution, earned by the transcript's last message.
    pub recency_weight: f64,
    /// Distance from the transcript end (in messages) at which the recency
    /// contribution halves.
    pub recency_half_life: f64,
    pub error_boost: f64,
    pub state_change_boost: f64,
    /// Penalty applied once a message's token cost crosses the threshold.
    pub oversize_penalty: f64,
    pub oversize_threshold_tokens: u32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            system_base: 0.60,
            user_base: 0.50,
            agent_base: 0.30,
            tool_call_base: 0.25,
            tool_result_base: 0.20,
            recency_weight: 0.30,
            recency_half_life: 10.0,
            error_boost: 0.25,
            state_change_boost: 0.15,
            oversize_penalty: 0.10,
            oversize_threshold_tokens: 1_000,
        }
    }
}

/// Per-run reduction configuration. Immutable after task start; `validate`
/// runs once before the first turn and is the only place configuration
/// errors can surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    pub enabled: bool,
    pub strategy: StrategyKind,
    pub budget: Budget,
    /// Messages unconditionally kept from the transcript start (instructions).
    pub preserve_first: usize,
    /// Messages unconditionally kept from the transcript end (most recent
    /// interaction).
    pub preserve_last: usize,
    pub compression: CompressionLevel,
    /// Case-insensitive substrings marking a message as error context.
    pub error_keywords: Vec<String>,
    /// Case-insensitive substrings marking a domain state transition.
    pub state_change_keywords: Vec<String>,
    pub weights: ScoreWeights,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strategy: StrategyKind::SlidingWindow,
            budget: Budget::Tokens(16_000),
            preserve_first: 2,
            preserve_last: 10,
            compression: CompressionLevel::Medium,
            error_keywords: [
                "error",
                "failed",
                "failure",
                "exception",
                "timeout",
                "timed out",
                "not found",
                "refused",
            ]
            .map(String::from)
            .to_vec(),
            state_change_keywords: [
                "navigated",
                "clicked",
                "submitted",
                "logged in",
                "logged out",
                "page loaded",
                "form filled",
                "downloaded",
                "uploaded",
                "checkout",
            ]
            .map(String::from)
            .to_vec(),
            weights: ScoreWeights::default(),
        }
    }
}

impl ContextConfig {
    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the strategy from a configured identifier string.
    pub fn with_strategy_name(mut self, name: &str) -> Result<Self, ConfigError> {
        self.strategy = StrategyKind::parse(name)?;
        Ok(self)
    }

    pub fn with_budget(mut self, budget: Budget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_preserve_first(mut self, n: usize) -> Self {
        self.preserve_first = n;
        self
    }

    pub fn with_preserve_last(mut self, n: usize) -> Self {
        self.preserve_last = n;
        self
    }

    pub fn with_compression(mut self, level: CompressionLevel) -> Self {
        self.compression = level;
        self
    }

    pub fn with_error_keywords(mut self, keywords: Vec<String>) -> Self {
        self.error_keywords = keywords;
        self
    }

    pub fn with_state_change_keywords(mut self, keywords: Vec<String>) -> Self {
        self.state_change_keywords = keywords;
        self
    }

    pub fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Validate once at task start. A message-denominated budget smaller
    /// than the unconditional preserve zones can never be satisfied and is
    /// rejected here; token budgets are checked at runtime instead, where
    /// an overrun is recorded as a metric rather than an error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.budget {
            Budget::Tokens(0) => return Err(ConfigError::ZeroTokenBudget(0)),
            Budget::Messages(0) => return Err(ConfigError::ZeroMessageBudget(0)),
            Budget::Messages(n) if n < self.preserve_first + self.preserve_last => {
                return Err(ConfigError::ContradictoryPreservation {
                    first: self.preserve_first,
                    last: self.preserve_last,
                    budget: n,
                });
            }
            _ => {}
        }

        if self.error_keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(ConfigError::EmptyKeyword("error_keywords"));
        }
        if self.state_change_keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(ConfigError::EmptyKeyword("state_change_keywords"));
        }

        Ok(())
    }
}
