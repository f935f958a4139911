//! The tool-invocation contract between the assistant and its callable tools.
//!
//! A tool is a named unit of work the language model may request mid-turn.
//! The contract is deliberately narrow: a tool receives a string-keyed
//! argument mapping and *always* hands back a [`ToolOutcome`], either a
//! result payload or an error descriptor, never both and never a propagated
//! failure. A tool that let an error escape would take the whole conversation
//! down with it, so the boundary converts every failure into data.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// String-keyed argument mapping as the model emits it.
pub type ToolArguments = Map<String, Value>;

/// Per-invocation context handed to every tool, used for log tagging only.
#[derive(Debug, Clone, Copy)]
pub struct ToolContext {
    /// Identifier of the session on whose behalf the tool runs.
    pub session_id: Uuid,
}

impl ToolContext {
    pub fn new(session_id: Uuid) -> Self {
        Self { session_id }
    }
}

/// The outcome of one tool invocation.
///
/// On the wire this is either `{"result": <value>}` or `{"error": "<text>"}`.
/// The enum makes "exactly one of the two" a property of the type rather
/// than a convention callers must remember.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolOutcome {
    Success { result: Value },
    Error { error: String },
}

impl ToolOutcome {
    pub fn success(result: Value) -> Self {
        Self::Success { result }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// One invocation of a tool as requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call identifier assigned by the model; echoed back with the result.
    pub id: String,
    /// Declared name of the tool being invoked.
    pub name: String,
    pub arguments: ToolArguments,
    pub session_id: Uuid,
}

/// The answer to one [`ToolCall`], consumed once by the model context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Identifier of the call this result answers.
    pub call_id: String,
    pub outcome: ToolOutcome,
}

/// A named, independently invocable unit of work.
///
/// Implementations must be side-effect-free from the session's point of
/// view: nothing beyond the returned outcome and log emission. `invoke`
/// may suspend on remote calls but must contain every failure internally.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ToolFunction: Send + Sync {
    /// Declared name, unique within a registry.
    fn name(&self) -> &str;

    /// One-line description surfaced to the model.
    fn description(&self) -> &str;

    /// JSON schema of the accepted argument mapping.
    fn parameters(&self) -> Value;

    /// Runs the tool. Infallible by contract: failures become
    /// [`ToolOutcome::Error`], never a panic or a propagated error.
    async fn invoke(&self, args: &ToolArguments, ctx: &ToolContext) -> ToolOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outcome_serializes_as_result_envelope() {
        let outcome = ToolOutcome::success(json!({"temperature": 21.5}));
        let wire = serde_json::to_value(&outcome).unwrap();
        assert_eq!(wire, json!({"result": {"temperature": 21.5}}));
    }

    #[test]
    fn outcome_serializes_as_error_envelope() {
        let outcome = ToolOutcome::error("Mistral API key not configured");
        let wire = serde_json::to_value(&outcome).unwrap();
        assert_eq!(wire, json!({"error": "Mistral API key not configured"}));
    }

    #[test]
    fn outcome_wire_shape_is_exclusive() {
        // Exactly one of the two keys, never both.
        for outcome in [
            ToolOutcome::success(json!([1, 2, 3])),
            ToolOutcome::error("boom"),
        ] {
            let wire = serde_json::to_value(&outcome).unwrap();
            let obj = wire.as_object().unwrap();
            assert_eq!(obj.len(), 1);
            assert!(obj.contains_key("result") ^ obj.contains_key("error"));
        }
    }

    #[test]
    fn outcome_round_trips_from_wire() {
        let success: ToolOutcome = serde_json::from_value(json!({"result": 42})).unwrap();
        assert_eq!(success, ToolOutcome::success(json!(42)));
        assert!(!success.is_error());

        let error: ToolOutcome = serde_json::from_value(json!({"error": "no"})).unwrap();
        assert_eq!(error, ToolOutcome::error("no"));
        assert!(error.is_error());
    }

    #[test]
    fn tool_call_round_trips() {
        let mut arguments = ToolArguments::new();
        arguments.insert("city".to_string(), json!("Paris"));
        let call = ToolCall {
            id: "call_0".to_string(),
            name: "lookup_weather".to_string(),
            arguments,
            session_id: Uuid::new_v4(),
        };
        let wire = serde_json::to_string(&call).unwrap();
        let parsed: ToolCall = serde_json::from_str(&wire).unwrap();
        assert_eq!(parsed, call);
    }
}
