use serde::{Deserialize, Serialize};

use crate::config::ContextConfig;
use crate::message::{Message, Role};

/// Coarse message category, derived from role first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    System,
    User,
    Agent,
    ToolCall,
    ToolResult,
}

/// Classifier output: category plus advisory salience flags. Flags are
/// best-effort keyword signals — a false negative degrades retention
/// quality, never correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub category: Category,
    pub is_error: bool,
    pub is_state_change: bool,
    pub is_initial_instruction: bool,
}

impl Classification {
    /// True when any preservation-relevant flag is set.
    pub fn is_flagged(&self) -> bool {
        self.is_error || self.is_state_change || self.is_initial_instruction
    }
}

/// Classify one message. Pure and deterministic: same (message, position,
/// config) always yields the same output.
pub fn classify(msg: &Message, position: usize, config: &ContextConfig) -> Classification {
    let category = match msg.role {
        Role::System => Category::System,
        Role::User => Category::User,
        Role::Agent if msg.is_tool_call() => Category::ToolCall,
        Role::Agent => Category::Agent,
        Role::Tool => Category::ToolResult,
    };

    let content = msg.content.to_lowercase();
    let is_error = contains_any(&content, &config.error_keywords);
    let is_state_change = contains_any(&content, &config.state_change_keywords);
    let is_initial_instruction = position == 0 && msg.role == Role::User;

    Classification {
        category,
        is_error,
        is_state_change,
        is_initial_instruction,
    }
}

fn contains_any(content_lower: &str, keywords: &[String]) -> bool {
    keywords
        .iter()
        .any(|k| content_lower.contains(k.to_lowercase().as_str()))
}
