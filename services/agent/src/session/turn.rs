//! One conversation turn: transcript in, final reply text out.
//!
//! The model first decides between answering directly and calling tools.
//! Tool calls are dispatched sequentially in issue order, their results are
//! folded back into the model context in that same order, and the model then
//! streams the final reply.

use super::SessionError;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionTool, ChatCompletionToolArgs, ChatCompletionToolType, FunctionCall,
    FunctionObjectArgs,
};
use futures_util::StreamExt;
use parley_core::{
    llm::{LLMAction, LLMClient, LLMStreamEvent},
    persona::Persona,
    registry::ToolRegistry,
    tool::{ToolCall, ToolContext, ToolOutcome, ToolResult},
    transcript::{Role, Transcript},
};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

fn model_err(e: impl Into<anyhow::Error>) -> SessionError {
    SessionError::Model(e.into())
}

/// The input driving a turn: a user utterance, or an instruction for an
/// assistant-initiated reply (the greeting path).
pub(crate) enum TurnInput<'a> {
    User(&'a str),
    Instruction(&'a str),
}

/// Runs one full turn against the model and appends it to the transcript.
/// Returns the final reply text.
pub(crate) async fn run_turn(
    llm: &Arc<dyn LLMClient>,
    persona: &Persona,
    transcript: &mut Transcript,
    session_id: Uuid,
    input: TurnInput<'_>,
) -> Result<String, SessionError> {
    if let TurnInput::User(text) = &input {
        transcript.append_user(*text);
    }
    let messages = build_messages(persona, transcript, &input)?;
    let tools = tool_declarations(persona.tools())?;

    let action = llm
        .decide_action(messages.clone(), tools, session_id)
        .await
        .map_err(model_err)?;

    match action {
        LLMAction::TextResponse(text) => {
            transcript.append_assistant(text.clone())?;
            Ok(text)
        }
        LLMAction::ToolCalls(calls) => {
            info!(count = calls.len(), "model requested tool calls");
            let results = dispatch_tool_calls(persona.tools(), &calls).await;

            let mut history_with_tools = messages;
            history_with_tools.push(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .tool_calls(
                        calls
                            .iter()
                            .map(vendor_tool_call)
                            .collect::<Result<Vec<_>, _>>()?,
                    )
                    .build()
                    .map_err(model_err)?
                    .into(),
            );
            for result in &results {
                history_with_tools.push(
                    ChatCompletionRequestToolMessageArgs::default()
                        .tool_call_id(result.call_id.clone())
                        .content(serde_json::to_string(&result.outcome).map_err(model_err)?)
                        .build()
                        .map_err(model_err)?
                        .into(),
                );
            }

            let mut final_stream = llm
                .stream_after_tools(history_with_tools)
                .await
                .map_err(model_err)?;
            let mut full_response = String::new();
            while let Some(event_result) = final_stream.next().await {
                match event_result {
                    Ok(LLMStreamEvent::TextChunk(chunk)) => full_response.push_str(&chunk),
                    Err(e) => return Err(model_err(e)),
                }
            }

            transcript.append_assistant_with_tools(full_response.clone(), calls, results)?;
            Ok(full_response)
        }
    }
}

/// Invokes the requested tools one after another, in issue order.
///
/// Nothing here can fail the turn: an unknown name or a failing dependency
/// becomes an error outcome, and the result list always lines up one-to-one
/// with the call list.
pub(crate) async fn dispatch_tool_calls(
    registry: &ToolRegistry,
    calls: &[ToolCall],
) -> Vec<ToolResult> {
    let mut results = Vec::with_capacity(calls.len());
    for call in calls {
        let ctx = ToolContext::new(call.session_id);
        let outcome = match registry.get(&call.name) {
            Some(tool) => tool.invoke(&call.arguments, &ctx).await,
            None => {
                warn!(tool = %call.name, session_id = %call.session_id, "model called an unregistered tool");
                ToolOutcome::error(format!("Unknown tool: {}", call.name))
            }
        };
        results.push(ToolResult {
            call_id: call.id.clone(),
            outcome,
        });
    }
    results
}

fn build_messages(
    persona: &Persona,
    transcript: &Transcript,
    input: &TurnInput<'_>,
) -> Result<Vec<ChatCompletionRequestMessage>, SessionError> {
    let mut messages: Vec<ChatCompletionRequestMessage> = vec![
        ChatCompletionRequestSystemMessageArgs::default()
            .content(persona.instructions().to_string())
            .build()
            .map_err(model_err)?
            .into(),
    ];
    for turn in transcript.turns() {
        match turn.role {
            Role::User => messages.push(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(turn.text.clone())
                    .build()
                    .map_err(model_err)?
                    .into(),
            ),
            Role::Assistant => messages.push(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .content(turn.text.clone())
                    .build()
                    .map_err(model_err)?
                    .into(),
            ),
        }
    }
    if let TurnInput::Instruction(instructions) = input {
        messages.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(instructions.to_string())
                .build()
                .map_err(model_err)?
                .into(),
        );
    }
    Ok(messages)
}

fn tool_declarations(
    registry: &ToolRegistry,
) -> Result<Vec<ChatCompletionTool>, SessionError> {
    registry
        .iter()
        .map(|tool| {
            Ok(ChatCompletionToolArgs::default()
                .function(
                    FunctionObjectArgs::default()
                        .name(tool.name())
                        .description(tool.description())
                        .parameters(tool.parameters())
                        .build()
                        .map_err(model_err)?,
                )
                .build()
                .map_err(model_err)?)
        })
        .collect()
}

fn vendor_tool_call(call: &ToolCall) -> Result<ChatCompletionMessageToolCall, SessionError> {
    Ok(ChatCompletionMessageToolCall {
        id: call.id.clone(),
        r#type: ChatCompletionToolType::Function,
        function: FunctionCall {
            name: call.name.clone(),
            arguments: serde_json::to_string(&call.arguments).map_err(model_err)?,
        },
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;
    use parley_core::llm::LLMStream;
    use parley_core::tool::{ToolArguments, ToolFunction};
    use serde_json::{Value, json};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a scripted sequence of decisions; every post-tool stream
    /// yields the scripted final reply in two chunks.
    pub(crate) struct ScriptedLlm {
        decisions: Mutex<VecDeque<LLMAction>>,
        final_reply: String,
    }

    impl ScriptedLlm {
        pub(crate) fn new(decisions: Vec<LLMAction>, final_reply: &str) -> Self {
            Self {
                decisions: Mutex::new(decisions.into()),
                final_reply: final_reply.to_string(),
            }
        }
    }

    #[async_trait]
    impl LLMClient for ScriptedLlm {
        async fn decide_action(
            &self,
            _messages: Vec<ChatCompletionRequestMessage>,
            _tools: Vec<ChatCompletionTool>,
            _session_id: Uuid,
        ) -> anyhow::Result<LLMAction> {
            self.decisions
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("scripted LLM ran out of decisions"))
        }

        async fn stream_after_tools(
            &self,
            _messages: Vec<ChatCompletionRequestMessage>,
        ) -> anyhow::Result<LLMStream> {
            let midpoint = self.final_reply.len() / 2;
            let (head, tail) = self.final_reply.split_at(midpoint);
            let chunks: Vec<Result<LLMStreamEvent, async_openai::error::OpenAIError>> = vec![
                Ok(LLMStreamEvent::TextChunk(head.to_string())),
                Ok(LLMStreamEvent::TextChunk(tail.to_string())),
            ];
            Ok(Box::pin(futures_util::stream::iter(chunks)))
        }
    }

    /// Records invocation order into a shared log and returns a fixed outcome.
    pub(crate) struct RecordingTool {
        name: String,
        outcome: ToolOutcome,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingTool {
        pub(crate) fn new(
            name: &str,
            outcome: ToolOutcome,
            log: Arc<Mutex<Vec<String>>>,
        ) -> Arc<dyn ToolFunction> {
            Arc::new(Self {
                name: name.to_string(),
                outcome,
                log,
            })
        }
    }

    #[async_trait]
    impl ToolFunction for RecordingTool {
        fn name(&self) -> &str {
            &self.name
        }

        fn description(&self) -> &str {
            "test tool"
        }

        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        async fn invoke(&self, _args: &ToolArguments, _ctx: &ToolContext) -> ToolOutcome {
            self.log.lock().unwrap().push(self.name.clone());
            self.outcome.clone()
        }
    }

    pub(crate) fn call_named(id: &str, name: &str, session_id: Uuid) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments: ToolArguments::new(),
            session_id,
        }
    }
}
