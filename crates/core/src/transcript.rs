//! The append-only conversation transcript owned by a session.

use crate::tool::{ToolCall, ToolResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One exchange unit: a user utterance or an assistant utterance, optionally
/// carrying the tool calls the model issued and their results. Never mutated
/// after append.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolResult>,
    pub at: DateTime<Utc>,
}

/// Rejected transcript appends.
#[derive(Debug, thiserror::Error)]
pub enum TranscriptError {
    #[error("tool result {0} answers no recorded tool call")]
    OrphanResult(String),
}

/// Ordered, append-only record of a conversation. Append order is the
/// conversation's total order; a result may only be appended alongside or
/// after the call it answers.
#[derive(Default)]
pub struct Transcript {
    turns: Vec<ConversationTurn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_user(&mut self, text: impl Into<String>) {
        self.turns.push(ConversationTurn {
            role: Role::User,
            text: text.into(),
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            at: Utc::now(),
        });
    }

    pub fn append_assistant(&mut self, text: impl Into<String>) -> Result<(), TranscriptError> {
        self.append_assistant_with_tools(text, Vec::new(), Vec::new())
    }

    /// Appends an assistant turn embedding the tool exchange that produced
    /// it. Each result must answer a call in this turn or an earlier one.
    pub fn append_assistant_with_tools(
        &mut self,
        text: impl Into<String>,
        tool_calls: Vec<ToolCall>,
        tool_results: Vec<ToolResult>,
    ) -> Result<(), TranscriptError> {
        for result in &tool_results {
            let in_turn = tool_calls.iter().any(|c| c.id == result.call_id);
            let in_history = self
                .turns
                .iter()
                .any(|t| t.tool_calls.iter().any(|c| c.id == result.call_id));
            if !in_turn && !in_history {
                return Err(TranscriptError::OrphanResult(result.call_id.clone()));
            }
        }
        self.turns.push(ConversationTurn {
            role: Role::Assistant,
            text: text.into(),
            tool_calls,
            tool_results,
            at: Utc::now(),
        });
        Ok(())
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{ToolArguments, ToolOutcome};
    use uuid::Uuid;

    fn call(id: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: "lookup_weather".to_string(),
            arguments: ToolArguments::new(),
            session_id: Uuid::new_v4(),
        }
    }

    fn result(call_id: &str) -> ToolResult {
        ToolResult {
            call_id: call_id.to_string(),
            outcome: ToolOutcome::success(serde_json::json!({})),
        }
    }

    #[test]
    fn appends_preserve_order() {
        let mut transcript = Transcript::new();
        transcript.append_user("hello");
        transcript.append_assistant("hi there").unwrap();
        transcript.append_user("what's the weather?");

        let roles: Vec<Role> = transcript.turns().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
        assert_eq!(transcript.turns()[0].text, "hello");
    }

    #[test]
    fn result_must_answer_a_recorded_call() {
        let mut transcript = Transcript::new();
        transcript.append_user("weather in Paris?");
        let err = transcript
            .append_assistant_with_tools("It rains.", vec![], vec![result("call_0")])
            .unwrap_err();
        assert!(matches!(err, TranscriptError::OrphanResult(id) if id == "call_0"));
    }

    #[test]
    fn result_may_answer_call_in_same_turn() {
        let mut transcript = Transcript::new();
        transcript.append_user("weather in Paris?");
        transcript
            .append_assistant_with_tools("It rains.", vec![call("call_0")], vec![result("call_0")])
            .unwrap();
        assert_eq!(transcript.len(), 2);
    }

    #[test]
    fn result_may_answer_call_from_earlier_turn() {
        let mut transcript = Transcript::new();
        transcript
            .append_assistant_with_tools("checking", vec![call("call_0")], vec![])
            .unwrap();
        transcript
            .append_assistant_with_tools("done", vec![], vec![result("call_0")])
            .unwrap();
        assert_eq!(transcript.len(), 2);
    }
}
