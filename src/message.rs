use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Agent,
    Tool,
}

/// One entry in a transcript. Immutable once appended — derived data
/// (category, flags, score, token cost) lives in per-pass annotations,
/// never on the message itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Monotonic position in the canonical transcript.
    pub index: usize,
    pub role: Role,
    pub content: String,
    /// Present on tool-call messages (role Agent) and tool-result messages
    /// (role Tool). A result's id must match exactly one preceding call.
    pub tool_call_id: Option<String>,
    pub tool_name: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(index: usize, role: Role, content: impl Into<String>) -> Self {
        Self {
            index,
            role,
            content: content.into(),
            tool_call_id: None,
            tool_name: None,
            timestamp: Utc::now(),
        }
    }

    /// A model-issued request to invoke a tool.
    pub fn tool_call(
        index: usize,
        id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            index,
            role: Role::Agent,
            content: content.into(),
            tool_call_id: Some(id.into()),
            tool_name: Some(name.into()),
            timestamp: Utc::now(),
        }
    }

    /// The linked outcome of a tool call.
    pub fn tool_result(
        index: usize,
        id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            index,
            role: Role::Tool,
            content: content.into(),
            tool_call_id: Some(id.into()),
            tool_name: Some(name.into()),
            timestamp: Utc::now(),
        }
    }

    pub fn is_tool_call(&self) -> bool {
        self.role == Role::Agent && self.tool_call_id.is_some()
    }

    pub fn is_tool_result(&self) -> bool {
        self.role == Role::Tool && self.tool_call_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_call_and_result_are_distinguished_by_role() {
        let call = Message::tool_call(3, "c1", "click", "{\"selector\": \"#submit\"}");
        let result = Message::tool_result(4, "c1", "click", "clicked");
        assert!(call.is_tool_call());
        assert!(!call.is_tool_result());
        assert!(result.is_tool_result());
        assert!(!result.is_tool_call());
    }

    #[test]
    fn plain_messages_carry_no_call_id() {
        let msg = Message::new(0, Role::User, "navigate to the login page");
        assert!(!msg.is_tool_call());
        assert!(!msg.is_tool_result());
        assert!(msg.tool_call_id.is_none());
    }
}
