//! The language-model seam.
//!
//! A session talks to the model twice per tool-using turn: once to decide
//! between answering directly and calling tools, and once more (streaming)
//! after the tool results have been appended to the history.

use crate::tool::ToolCall;
use anyhow::{Context, Result, anyhow};
use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, ChatCompletionTool, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse,
    },
};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use uuid::Uuid;

/// Events yielded from a streaming text response.
#[derive(Debug, Clone)]
pub enum LLMStreamEvent {
    TextChunk(String),
}

/// A stream of text chunks from the model.
pub type LLMStream = Pin<Box<dyn Stream<Item = Result<LLMStreamEvent, OpenAIError>> + Send>>;

/// The two possible outcomes of the model's decision turn.
#[derive(Debug, Clone)]
pub enum LLMAction {
    /// The model answered directly with text.
    TextResponse(String),
    /// The model requested one or more tool invocations, in issue order.
    ToolCalls(Vec<ToolCall>),
}

/// A generic client for a chat-completion model with tool support.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// A single non-streaming call deciding on the next action.
    async fn decide_action(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
        tools: Vec<ChatCompletionTool>,
        session_id: Uuid,
    ) -> Result<LLMAction>;

    /// A streaming call after tool results have been folded into the history.
    async fn stream_after_tools(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
    ) -> Result<LLMStream>;
}

/// An implementation of [`LLMClient`] for any OpenAI-compatible API.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAICompatibleClient {
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }
}

#[async_trait]
impl LLMClient for OpenAICompatibleClient {
    async fn decide_action(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
        tools: Vec<ChatCompletionTool>,
        session_id: Uuid,
    ) -> Result<LLMAction> {
        let mut request = CreateChatCompletionRequestArgs::default();
        request.model(&self.model).messages(messages);
        if !tools.is_empty() {
            request.tools(tools).tool_choice("auto");
        }
        let request = request.build()?;

        let response: CreateChatCompletionResponse = self.client.chat().create(request).await?;
        let choice = response
            .choices
            .first()
            .context("No response choice from the model")?;

        if let Some(tool_calls) = &choice.message.tool_calls {
            let calls = tool_calls
                .iter()
                .map(|call| {
                    let arguments = serde_json::from_str(&call.function.arguments)
                        .with_context(|| {
                            format!(
                                "malformed arguments for tool call '{}'",
                                call.function.name
                            )
                        })?;
                    Ok(ToolCall {
                        id: call.id.clone(),
                        name: call.function.name.clone(),
                        arguments,
                        session_id,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(LLMAction::ToolCalls(calls))
        } else if let Some(content) = &choice.message.content {
            Ok(LLMAction::TextResponse(content.clone()))
        } else {
            Err(anyhow!(
                "Model response had neither text content nor tool calls."
            ))
        }
    }

    async fn stream_after_tools(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
    ) -> Result<LLMStream> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .stream(true)
            .build()?;

        let stream = self.client.chat().create_stream(request).await?;

        Ok(Box::pin(stream.filter_map(|result| async {
            match result {
                Ok(response) => {
                    let choice = response.choices.first()?;
                    if let Some(content) = &choice.delta.content {
                        if !content.is_empty() {
                            return Some(Ok(LLMStreamEvent::TextChunk(content.clone())));
                        }
                    }
                    None
                }
                Err(e) => Some(Err(e)),
            }
        })))
    }
}
