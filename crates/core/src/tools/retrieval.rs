//! Tools served by a remote retrieval server over the Model Context Protocol.
//!
//! The server advertises its own tool list; each advertised tool is wrapped
//! as a [`ToolFunction`] so the registry and the model see it exactly like a
//! local tool. The connection is established once at persona construction
//! and shared by every wrapped tool.

use crate::tool::{ToolArguments, ToolContext, ToolFunction, ToolOutcome};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rmcp::{
    ServiceExt,
    model::{CallToolRequestParam, RawContent},
    service::{RoleClient, RunningService},
    transport::StreamableHttpClientTransport,
};
use serde_json::Value;
use std::{sync::Arc, time::Duration, time::Instant};
use tracing::{error, info};

/// Connects to a remote retrieval server and wraps each advertised tool.
pub struct RemoteToolset;

impl RemoteToolset {
    pub async fn connect(url: &str, timeout: Duration) -> Result<Vec<Arc<dyn ToolFunction>>> {
        let transport = StreamableHttpClientTransport::from_uri(url.to_string());
        let client = tokio::time::timeout(timeout, ().serve(transport))
            .await
            .context("timed out connecting to the retrieval server")?
            .context("failed to connect to the retrieval server")?;
        let client = Arc::new(client);

        let advertised = tokio::time::timeout(timeout, client.list_all_tools())
            .await
            .context("timed out listing retrieval server tools")?
            .context("failed to list retrieval server tools")?;

        info!(url, tool_count = advertised.len(), "connected to retrieval server");

        Ok(advertised
            .into_iter()
            .map(|tool| {
                Arc::new(RemoteTool {
                    name: tool.name.to_string(),
                    description: tool
                        .description
                        .map(|d| d.to_string())
                        .unwrap_or_default(),
                    schema: serde_json::to_value(&*tool.input_schema)
                        .unwrap_or(Value::Null),
                    client: client.clone(),
                    timeout,
                }) as Arc<dyn ToolFunction>
            })
            .collect())
    }
}

struct RemoteTool {
    name: String,
    description: String,
    schema: Value,
    client: Arc<RunningService<RoleClient, ()>>,
    timeout: Duration,
}

impl RemoteTool {
    async fn call_remote(&self, args: &ToolArguments) -> Result<ToolOutcome> {
        let result = tokio::time::timeout(
            self.timeout,
            self.client.peer().call_tool(CallToolRequestParam {
                name: self.name.clone().into(),
                arguments: Some(args.clone()),
            }),
        )
        .await
        .context("retrieval server call timed out")?
        .context("retrieval server call failed")?;

        let annotated = result
            .content
            .context("retrieval server returned no content")?
            .pop()
            .context("retrieval server content list was empty")?;
        let text = match annotated.raw {
            RawContent::Text(text_content) => text_content.text,
            _ => anyhow::bail!("unexpected content type from the retrieval server"),
        };

        if result.is_error == Some(true) {
            Ok(ToolOutcome::error(text))
        } else {
            Ok(ToolOutcome::success(serde_json::json!({ "text": text })))
        }
    }
}

#[async_trait]
impl ToolFunction for RemoteTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.schema.clone()
    }

    async fn invoke(&self, args: &ToolArguments, ctx: &ToolContext) -> ToolOutcome {
        let started = Instant::now();
        info!(tool = %self.name, session_id = %ctx.session_id, "retrieval call initiated");
        match self.call_remote(args).await {
            Ok(outcome) => {
                info!(
                    tool = %self.name,
                    session_id = %ctx.session_id,
                    duration_seconds = started.elapsed().as_secs_f64(),
                    success = !outcome.is_error(),
                    "retrieval call completed"
                );
                outcome
            }
            Err(e) => {
                error!(
                    tool = %self.name,
                    session_id = %ctx.session_id,
                    error_message = %e,
                    duration_seconds = started.elapsed().as_secs_f64(),
                    success = false,
                    "retrieval call failed"
                );
                ToolOutcome::error(format!("Retrieval failed: {}", e))
            }
        }
    }
}
