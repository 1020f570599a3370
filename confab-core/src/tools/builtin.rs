// Small demo tools: integer arithmetic and today's date
use std::collections::HashMap;
use std::sync::Arc;
use chrono::Local;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::types::{AnyTool, ToolEmptyParams, ToolResult};
use super::tool;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OperandsParams {
    /// first operand
    pub a: i64,
    /// second operand
    pub b: i64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AddTool;

#[tool(name = "add", description = "Adds two integers and returns their sum")]
impl AddTool {
    async fn execute(&self, params: OperandsParams) -> ToolResult {
        match params.a.checked_add(params.b) {
            Some(sum) => ToolResult::success(sum.to_string()),
            None => ToolResult::error(format!("{} + {} overflows a 64 bit integer", params.a, params.b)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MultiplyTool;

#[tool(name = "multiply", description = "Multiplies two integers and returns their product")]
impl MultiplyTool {
    async fn execute(&self, params: OperandsParams) -> ToolResult {
        match params.a.checked_mul(params.b) {
            Some(product) => ToolResult::success(product.to_string()),
            None => ToolResult::error(format!("{} * {} overflows a 64 bit integer", params.a, params.b)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentDateTool;

#[tool(name = "current_date", description = "Returns today's date (YYYY-MM-DD) in the local timezone")]
impl CurrentDateTool {
    async fn execute(&self, params: ToolEmptyParams) -> ToolResult {
        let now = Local::now();
        ToolResult::Success {
            output: now.format("%Y-%m-%d").to_string(),
            metadata: Some(HashMap::from([
                ("weekday".to_string(), json!(now.format("%A").to_string())),
                ("timezone".to_string(), json!(now.format("%:z").to_string())),
            ])),
        }
    }
}

/// add, multiply and current_date
pub fn builtin_tools() -> Vec<Arc<dyn AnyTool>> {
    vec![Arc::new(AddTool), Arc::new(MultiplyTool), Arc::new(CurrentDateTool)]
}
