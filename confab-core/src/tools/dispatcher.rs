use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use confab_llm::{ToolCallRequest, ToolDescriptor};
use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, warn};

use super::types::{AnyTool, ToolError, ToolExecution, ToolResult};

/// Registry of the tools a service exposes. Shared read-only once built.
#[derive(Default, Clone)]
pub struct ToolDispatcher {
    tools: Vec<Arc<dyn AnyTool>>,
    index: HashMap<String, usize>,
}

impl ToolDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: AnyTool + 'static>(&mut self, tool: T) -> Result<(), ToolError> {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&mut self, tool: Arc<dyn AnyTool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(ToolError::DuplicateTool(name));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|tool| tool.name()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn AnyTool>> {
        self.index.get(name).map(|i| &self.tools[*i])
    }

    /// Declarations sent with every model request, in registration order
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|tool| tool.descriptor()).collect()
    }

    /// Run one call. Never fails: unknown tools and bad arguments become
    /// error results for the model.
    pub async fn dispatch(&self, request: &ToolCallRequest) -> ToolResult {
        let Some(tool) = self.get(&request.name) else {
            warn!(target: "service::tool", tool = %request.name, id = %request.id, "unknown tool requested");
            return ToolError::ToolNotFound(request.name.clone()).into();
        };

        let arguments = match parse_arguments(&request.arguments) {
            Ok(arguments) => arguments,
            Err(reason) => {
                warn!(target: "service::tool", tool = %request.name, id = %request.id, %reason, "undecodable arguments");
                return ToolError::ToolArgumentDecode { name: request.name.clone(), reason }.into();
            }
        };

        debug!(target: "service::tool", tool = %request.name, id = %request.id, arguments = %request.arguments, "executing");
        let result = tool.execute_json(arguments).await;
        debug!(target: "service::tool", tool = %request.name, id = %request.id, success = result.is_success(), "executed");
        result
    }

    async fn timed(&self, request: &ToolCallRequest) -> ToolExecution {
        let started = Instant::now();
        let result = self.dispatch(request).await;
        ToolExecution {
            request: request.clone(),
            result,
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// Run all calls of one model turn concurrently, results come back in request order
    pub async fn dispatch_all(&self, requests: &[ToolCallRequest]) -> Vec<ToolExecution> {
        join_all(requests.iter().map(|request| self.timed(request))).await
    }
}

fn parse_arguments(raw: &str) -> Result<Value, String> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(raw).map_err(|e| e.to_string())
}
