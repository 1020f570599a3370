use std::time::{Duration, Instant};
use confab_llm::{ToolCallRequest, ToolDescription};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::*;
use crate::tools::builtin::OperandsParams;

#[derive(Serialize, Deserialize, JsonSchema)]
struct SleepParams {
    label: String,
    #[serde(default = "default_duration")]
    duration_ms: u64,
}

fn default_duration() -> u64 {
    50
}

struct SleepingTool;

#[tool(name = "sleeping_tool", description = "Sleeps then echoes its label")]
impl SleepingTool {
    async fn execute(&self, params: SleepParams) -> ToolResult {
        tokio::time::sleep(Duration::from_millis(params.duration_ms)).await;
        ToolResult::success(params.label)
    }
}

fn dispatcher() -> ToolDispatcher {
    let mut dispatcher = ToolDispatcher::new();
    for tool in builtin_tools() {
        dispatcher.register_arc(tool).unwrap();
    }
    dispatcher
}

fn call(id: &str, name: &str, arguments: &str) -> ToolCallRequest {
    ToolCallRequest::new(id, name, arguments)
}

#[tokio::test]
async fn test_add() {
    let result = dispatcher().dispatch(&call("c1", "add", r#"{"a": 2, "b": 3}"#)).await;
    assert_eq!(result, ToolResult::success("5"));
}

#[tokio::test]
async fn test_multiply_overflow_is_error_result() {
    let result = dispatcher()
        .dispatch(&call("c1", "multiply", &format!(r#"{{"a": {}, "b": 2}}"#, i64::MAX)))
        .await;
    assert!(!result.is_success());
    assert!(result.text().contains("overflows"));
}

#[tokio::test]
async fn test_current_date_without_arguments() {
    let dispatcher = dispatcher();
    for arguments in ["", "{}", "null"] {
        let result = dispatcher.dispatch(&call("c1", "current_date", arguments)).await;
        assert!(result.is_success(), "arguments {:?} gave {:?}", arguments, result);
        assert_eq!(result.text().len(), "2024-01-01".len());
    }
}

#[tokio::test]
async fn test_unknown_tool_is_reported_not_raised() {
    let result = dispatcher().dispatch(&call("c1", "divide", r#"{"a":1,"b":0}"#)).await;
    assert_eq!(result, ToolResult::from(ToolError::ToolNotFound("divide".to_string())));
    let message = result.to_message("c1");
    assert_eq!(message.tool_call_id(), Some("c1"));
    assert!(matches!(message, confab_llm::Message::ToolResult { is_error: true, .. }));
}

#[tokio::test]
async fn test_bad_arguments_are_reported() {
    let dispatcher = dispatcher();

    let wrong_type = dispatcher.dispatch(&call("c1", "add", r#"{"a": "two", "b": 3}"#)).await;
    assert!(wrong_type.text().contains("invalid arguments for tool `add`"));

    let missing = dispatcher.dispatch(&call("c2", "add", r#"{"a": 2}"#)).await;
    assert!(missing.text().contains("missing field `b`"));

    let not_json = dispatcher.dispatch(&call("c3", "add", "a=2,b=3")).await;
    assert!(!not_json.is_success());
}

#[test]
fn test_duplicate_registration() {
    let mut dispatcher = dispatcher();
    assert_eq!(dispatcher.register(AddTool), Err(ToolError::DuplicateTool("add".to_string())));
    assert_eq!(dispatcher.len(), 3);
}

#[test]
fn test_descriptors() {
    let dispatcher = dispatcher();
    assert_eq!(dispatcher.names(), vec!["add", "multiply", "current_date"]);

    let descriptors = dispatcher.descriptors();
    assert_eq!(descriptors[0].name, "add");
    assert_eq!(descriptors[0].parameter_names(), vec!["a".to_string(), "b".to_string()]);
    assert_eq!(descriptors[0].parameters["properties"]["a"]["type"], "integer");
    assert_eq!(descriptors[0].parameters["required"], serde_json::json!(["a", "b"]));
    assert!(descriptors[2].parameter_names().is_empty());
}

#[test]
fn test_macro_generated_description() {
    assert_eq!(SleepingTool.name(), "sleeping_tool");
    assert_eq!(SleepingTool.description(), "Sleeps then echoes its label");
    let schema = SleepingTool.parameters_schema();
    assert_eq!(schema["required"], serde_json::json!(["label"]));
}

#[tokio::test]
async fn test_typed_execute() {
    let result = Tool::execute(&AddTool, OperandsParams { a: 40, b: 2 }).await;
    assert_eq!(result.text(), "42");
}

#[tokio::test]
async fn test_dispatch_all_runs_concurrently_and_keeps_order() {
    let mut dispatcher = ToolDispatcher::new();
    dispatcher.register(SleepingTool).unwrap();
    dispatcher.register(AddTool).unwrap();

    let requests = vec![
        call("c1", "sleeping_tool", r#"{"label": "slow", "duration_ms": 300}"#),
        call("c2", "sleeping_tool", r#"{"label": "fast", "duration_ms": 10}"#),
        call("c3", "add", r#"{"a": 1, "b": 1}"#),
        call("c4", "nope", "{}"),
    ];

    let started = Instant::now();
    let executions = dispatcher.dispatch_all(&requests).await;
    assert!(started.elapsed() < Duration::from_millis(600));

    let ids: Vec<&str> = executions.iter().map(|e| e.request.id.as_str()).collect();
    assert_eq!(ids, vec!["c1", "c2", "c3", "c4"]);
    assert_eq!(executions[0].result.text(), "slow");
    assert_eq!(executions[1].result.text(), "fast");
    assert_eq!(executions[2].result.text(), "2");
    assert!(!executions[3].result.is_success());
}
