//! The assistant personas this worker can serve.

use crate::config::{Config, PersonaKind};
use anyhow::{Context, Result};
use parley_core::{
    persona::{GreetingPolicy, Persona},
    registry::ToolRegistry,
    tools::{RemoteToolset, WeatherTool, WebSearchTool},
};
use std::sync::Arc;

const ASSISTANT_INSTRUCTIONS: &str = "You are a helpful voice AI assistant.";

const RETRIEVAL_INSTRUCTIONS: &str = "You can retrieve data via the retrieval server. The \
    interface is voice-based: accept spoken user queries and respond with synthesized speech.";

/// Builds the persona selected by configuration.
///
/// The general assistant defers its greeting to the entry point; the
/// retrieval persona greets on enter and draws its tools from the remote
/// retrieval server.
pub async fn build(config: &Config) -> Result<Arc<Persona>> {
    match config.persona {
        PersonaKind::Assistant => {
            let tools = ToolRegistry::new(vec![
                Arc::new(WeatherTool::new()),
                Arc::new(WebSearchTool::new(config.mistral_api_key.clone())),
            ])?;
            Ok(Arc::new(Persona::new(
                "assistant",
                ASSISTANT_INSTRUCTIONS,
                tools,
                GreetingPolicy::Deferred,
            )))
        }
        PersonaKind::Retrieval => {
            let url = config
                .retrieval_url
                .as_deref()
                .context("retrieval persona requires RETRIEVAL_SERVER_URL")?;
            let remote_tools = RemoteToolset::connect(url, config.retrieval_timeout).await?;
            let tools = ToolRegistry::new(remote_tools)?;
            Ok(Arc::new(Persona::new(
                "retrieval",
                RETRIEVAL_INSTRUCTIONS,
                tools,
                GreetingPolicy::OnEnter,
            )))
        }
    }
}
