//! Web search backed by Mistral's hosted agents API.
//!
//! Each invocation creates a short-lived search agent on the provider,
//! starts a one-shot conversation with it, and deletes the agent afterwards.
//! Deletion is best effort: the remote resource is allowed to leak rather
//! than fail the user-facing call.

use crate::tool::{ToolArguments, ToolContext, ToolFunction, ToolOutcome};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Instant;
use tracing::{debug, error, info, warn};

const MISTRAL_API_BASE: &str = "https://api.mistral.ai";
const SEARCH_AGENT_MODEL: &str = "mistral-medium-2505";

/// Request and response shapes for the Mistral agents API.
mod mistral_types {
    use serde::{Deserialize, Serialize};

    #[derive(Serialize)]
    pub(super) struct CreateAgentRequest {
        pub model: String,
        pub name: String,
        pub description: String,
        pub instructions: String,
        pub tools: Vec<AgentTool>,
        pub completion_args: CompletionArgs,
    }

    #[derive(Serialize)]
    pub(super) struct AgentTool {
        pub r#type: String,
    }

    #[derive(Serialize)]
    pub(super) struct CompletionArgs {
        pub temperature: f32,
        pub top_p: f32,
    }

    #[derive(Deserialize)]
    pub(super) struct Agent {
        pub id: String,
    }

    #[derive(Serialize)]
    pub(super) struct StartConversationRequest {
        pub agent_id: String,
        pub inputs: Vec<ConversationInput>,
    }

    #[derive(Serialize)]
    pub(super) struct ConversationInput {
        pub role: String,
        pub content: String,
    }

    #[derive(Deserialize)]
    pub(super) struct ConversationResponse {
        pub outputs: Vec<ConversationOutput>,
    }

    #[derive(Deserialize)]
    pub(super) struct ConversationOutput {
        #[serde(default)]
        pub content: Option<OutputContent>,
    }

    /// Tool-execution entries carry plain-string content; message entries
    /// carry a chunk list.
    #[derive(Deserialize)]
    #[serde(untagged)]
    pub(super) enum OutputContent {
        Text(String),
        Chunks(Vec<ContentChunk>),
    }

    #[derive(Deserialize)]
    pub(super) struct ContentChunk {
        #[serde(default)]
        pub text: Option<String>,
    }
}

#[derive(Debug, thiserror::Error)]
enum SearchError {
    #[error("request to the search provider failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected response shape from the search provider: {0}")]
    Shape(String),
}

impl SearchError {
    fn kind(&self) -> &'static str {
        match self {
            SearchError::Http(_) => "http",
            SearchError::Shape(_) => "malformed_response",
        }
    }
}

#[derive(Deserialize, JsonSchema, Debug)]
pub struct SearchArgs {
    /// Free-text query to search the web for.
    pub query: String,
}

/// Web search tool. Degrades to an error outcome when the provider key is
/// absent; no network call is attempted in that case.
pub struct WebSearchTool {
    api_key: Option<String>,
    http: reqwest::Client,
    base_url: String,
}

impl WebSearchTool {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            http: reqwest::Client::new(),
            base_url: MISTRAL_API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn create_search_agent(&self, api_key: &str) -> Result<String, SearchError> {
        let request = mistral_types::CreateAgentRequest {
            model: SEARCH_AGENT_MODEL.to_string(),
            name: "Web Search Agent".to_string(),
            description: "Agent able to search information over the web".to_string(),
            instructions: "You have the ability to perform web searches to find up-to-date \
                           information. Provide concise, accurate answers suitable for voice \
                           responses."
                .to_string(),
            tools: vec![mistral_types::AgentTool {
                r#type: "web_search".to_string(),
            }],
            completion_args: mistral_types::CompletionArgs {
                temperature: 0.3,
                top_p: 0.95,
            },
        };
        let agent: mistral_types::Agent = self
            .http
            .post(format!("{}/v1/agents", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(agent.id)
    }

    async fn run_conversation(
        &self,
        api_key: &str,
        agent_id: &str,
        query: &str,
    ) -> Result<String, SearchError> {
        let request = mistral_types::StartConversationRequest {
            agent_id: agent_id.to_string(),
            inputs: vec![mistral_types::ConversationInput {
                role: "user".to_string(),
                content: query.to_string(),
            }],
        };
        let response: mistral_types::ConversationResponse = self
            .http
            .post(format!("{}/v1/conversations", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // The first output is the web-search execution entry; the answer is
        // the first text chunk of the second output.
        let answer = response
            .outputs
            .get(1)
            .and_then(|output| output.content.as_ref())
            .and_then(|content| match content {
                mistral_types::OutputContent::Text(text) => Some(text.clone()),
                mistral_types::OutputContent::Chunks(chunks) => {
                    chunks.first().and_then(|chunk| chunk.text.clone())
                }
            })
            .ok_or_else(|| SearchError::Shape("conversation outputs held no answer text".into()))?;
        Ok(answer)
    }

    async fn delete_search_agent(&self, api_key: &str, agent_id: &str) -> Result<(), SearchError> {
        self.http
            .delete(format!("{}/v1/agents/{}", self.base_url, agent_id))
            .bearer_auth(api_key)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl ToolFunction for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for up-to-date information."
    }

    fn parameters(&self) -> Value {
        schemars::schema_for!(SearchArgs).to_value()
    }

    async fn invoke(&self, args: &ToolArguments, ctx: &ToolContext) -> ToolOutcome {
        let started = Instant::now();
        let Some(query) = args.get("query").and_then(Value::as_str) else {
            warn!(session_id = %ctx.session_id, "web search called without a query");
            return ToolOutcome::error("Missing required argument 'query'");
        };
        info!(query, session_id = %ctx.session_id, "web search initiated");

        let Some(api_key) = self.api_key.as_deref() else {
            error!(query, session_id = %ctx.session_id, error = "missing_api_key", "Mistral API key not configured");
            return ToolOutcome::error("Mistral API key not configured");
        };

        let agent_id = match self.create_search_agent(api_key).await {
            Ok(agent_id) => {
                info!(agent_id, session_id = %ctx.session_id, query, "search agent created");
                agent_id
            }
            Err(e) => {
                error!(
                    query,
                    session_id = %ctx.session_id,
                    error_type = e.kind(),
                    error_message = %e,
                    duration_seconds = started.elapsed().as_secs_f64(),
                    success = false,
                    "web search failed"
                );
                return ToolOutcome::error(format!("Web search failed: {}", e));
            }
        };

        let search_started = Instant::now();
        let answer = self.run_conversation(api_key, &agent_id, query).await;
        let search_duration = search_started.elapsed().as_secs_f64();

        // Best effort: a leaked remote agent is preferable to a failed call.
        match self.delete_search_agent(api_key, &agent_id).await {
            Ok(()) => debug!(agent_id, session_id = %ctx.session_id, "search agent cleanup successful"),
            Err(e) => warn!(
                agent_id,
                session_id = %ctx.session_id,
                cleanup_error = %e,
                "search agent cleanup failed"
            ),
        }

        let duration_seconds = started.elapsed().as_secs_f64();
        match answer {
            Ok(text) => {
                info!(
                    query,
                    session_id = %ctx.session_id,
                    agent_id,
                    search_duration_seconds = search_duration,
                    result_length_chars = text.len(),
                    duration_seconds,
                    success = true,
                    "web search completed"
                );
                ToolOutcome::success(json!({
                    "text": text,
                    "duration_seconds": duration_seconds,
                    "success": true,
                }))
            }
            Err(e) => {
                error!(
                    query,
                    session_id = %ctx.session_id,
                    agent_id,
                    error_type = e.kind(),
                    error_message = %e,
                    duration_seconds,
                    success = false,
                    "web search failed"
                );
                ToolOutcome::error(format!("Web search failed: {}", e))
            }
        }
    }
}
