use std::collections::BTreeMap;
use std::pin::Pin;
use futures::{Stream, StreamExt};
use openai_dive::v1::resources::chat::ChatCompletionChunkResponse;
use serde_json::Value;

use crate::error::LlmError;
use crate::message::{Message, ToolCallRequest};
use crate::provider::LlmStream;
use crate::response::{ChatResponse, FinishReason, StreamEvent, TokenUsage};
use crate::wire;

pub type ChatStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

#[derive(Debug, Default)]
struct PartialToolCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Folds streamed chunks back into a complete `ChatResponse`.
/// Tool call fragments are keyed by their `index` and concatenated.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    text: String,
    tool_calls: BTreeMap<u64, PartialToolCall>,
    finish_reason: Option<FinishReason>,
    usage: TokenUsage,
    model: String,
}

impl StreamAccumulator {
    /// Feed one chunk, returns the text delta it carried (if any)
    pub fn push(&mut self, chunk: &ChatCompletionChunkResponse) -> Result<Option<String>, LlmError> {
        if self.model.is_empty() {
            self.model = chunk.model.clone();
        }
        if chunk.usage.is_some() {
            self.usage = wire::usage(chunk.usage.as_ref());
        }

        let Some(choice) = chunk.choices.first() else {
            return Ok(None);
        };

        if let Some(reason) = wire::finish_reason(choice.finish_reason.as_ref()) {
            self.finish_reason = Some(reason);
        }

        let delta = serde_json::to_value(&choice.delta)?;
        if let Some(calls) = delta.get("tool_calls").and_then(Value::as_array) {
            for call in calls {
                self.push_tool_call(call);
            }
        }

        match delta.get("content").and_then(Value::as_str) {
            Some(text) if !text.is_empty() => {
                self.text.push_str(text);
                Ok(Some(text.to_string()))
            }
            _ => Ok(None),
        }
    }

    fn push_tool_call(&mut self, call: &Value) {
        let index = call
            .get("index")
            .and_then(Value::as_u64)
            .unwrap_or(self.tool_calls.len() as u64);
        let entry = self.tool_calls.entry(index).or_default();

        if let Some(id) = call.get("id").and_then(Value::as_str).filter(|id| !id.is_empty()) {
            entry.id = Some(id.to_string());
        }
        if let Some(function) = call.get("function") {
            if let Some(name) = function.get("name").and_then(Value::as_str) {
                entry.name.push_str(name);
            }
            if let Some(arguments) = function.get("arguments").and_then(Value::as_str) {
                entry.arguments.push_str(arguments);
            }
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn finish(self) -> ChatResponse {
        let tool_calls: Vec<ToolCallRequest> = self
            .tool_calls
            .into_values()
            .filter(|call| !call.name.is_empty())
            .map(|call| {
                let id = call.id.unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));
                let arguments = if call.arguments.trim().is_empty() { "{}".to_string() } else { call.arguments };
                ToolCallRequest::new(id, call.name, arguments)
            })
            .collect();

        let finish_reason = self.finish_reason.unwrap_or(if tool_calls.is_empty() {
            FinishReason::Stop
        } else {
            FinishReason::ToolCalls
        });
        let content = if self.text.is_empty() { None } else { Some(self.text) };

        let mut response = ChatResponse::new(Message::assistant_tool_calls(content, tool_calls), self.usage, finish_reason);
        response.model = self.model;
        response
    }
}

/// Turn a provider chunk stream into partial-text events ending with exactly
/// one terminal event.
pub fn into_events(mut chunks: LlmStream) -> ChatStream {
    Box::pin(async_stream::stream! {
        let mut accumulator = StreamAccumulator::default();
        while let Some(item) = chunks.next().await {
            let pushed = item.and_then(|chunk| accumulator.push(&chunk));
            match pushed {
                Ok(Some(text)) => yield StreamEvent::Partial(text),
                Ok(None) => {}
                Err(e) => {
                    yield StreamEvent::Error(e);
                    return;
                }
            }
        }
        yield StreamEvent::Complete(accumulator.finish());
    })
}

/// A stream made of a single error event
pub fn failed(error: LlmError) -> ChatStream {
    Box::pin(futures::stream::once(async move { StreamEvent::Error(error) }))
}

/// Cut any stream after its first terminal event, and emit an error event if
/// the inner stream ends without one.
pub fn terminated<S>(inner: S) -> ChatStream
where
    S: Stream<Item = StreamEvent> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut inner = Box::pin(inner);
        while let Some(event) = inner.next().await {
            let terminal = event.is_terminal();
            yield event;
            if terminal {
                return;
            }
        }
        yield StreamEvent::Error(LlmError::Stream("stream ended without a terminal event".to_string()));
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chunk(delta: Value, finish_reason: Option<&str>) -> ChatCompletionChunkResponse {
        serde_json::from_value(json!({
            "id": "chunk",
            "object": "chat.completion.chunk",
            "created": 1,
            "model": "gpt-4o-mini",
            "choices": [{ "index": 0, "delta": delta, "finish_reason": finish_reason }]
        }))
        .expect("valid chunk")
    }

    fn provider_stream(items: Vec<Result<ChatCompletionChunkResponse, LlmError>>) -> LlmStream {
        Box::new(futures::stream::iter(items))
    }

    #[tokio::test]
    async fn test_text_chunks_then_complete() {
        let events: Vec<StreamEvent> = into_events(provider_stream(vec![
            Ok(chunk(json!({ "role": "assistant", "content": "Why did " }), None)),
            Ok(chunk(json!({ "content": "the chicken" }), None)),
            Ok(chunk(json!({}), Some("stop"))),
        ]))
        .collect()
        .await;

        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], StreamEvent::Partial(t) if t == "Why did "));
        assert!(matches!(&events[1], StreamEvent::Partial(t) if t == "the chicken"));
        let StreamEvent::Complete(response) = &events[2] else {
            panic!("expected complete event, got {:?}", events[2]);
        };
        assert_eq!(response.text(), "Why did the chicken");
        assert_eq!(response.finish_reason, FinishReason::Stop);
    }

    #[tokio::test]
    async fn test_tool_call_fragments_are_joined() {
        let events: Vec<StreamEvent> = into_events(provider_stream(vec![
            Ok(chunk(json!({ "role": "assistant", "tool_calls": [{ "index": 0, "id": "call_1", "type": "function", "function": { "name": "add", "arguments": "" } }] }), None)),
            Ok(chunk(json!({ "tool_calls": [{ "index": 0, "function": { "arguments": "{\"a\":2," } }] }), None)),
            Ok(chunk(json!({ "tool_calls": [{ "index": 0, "function": { "arguments": "\"b\":3}" } }] }), None)),
            Ok(chunk(json!({}), Some("tool_calls"))),
        ]))
        .collect()
        .await;

        assert_eq!(events.len(), 1);
        let StreamEvent::Complete(response) = &events[0] else {
            panic!("expected complete event");
        };
        assert!(response.requests_tools());
        assert_eq!(response.tool_calls(), &[ToolCallRequest::new("call_1", "add", r#"{"a":2,"b":3}"#)]);
    }

    #[tokio::test]
    async fn test_error_is_terminal() {
        let events: Vec<StreamEvent> = into_events(provider_stream(vec![
            Ok(chunk(json!({ "content": "partial" }), None)),
            Err(LlmError::Stream("connection reset".to_string())),
            Ok(chunk(json!({ "content": "never seen" }), None)),
        ]))
        .collect()
        .await;

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], StreamEvent::Partial(_)));
        assert!(matches!(&events[1], StreamEvent::Error(LlmError::Stream(_))));
    }

    #[tokio::test]
    async fn test_stream_without_finish_marker_still_completes() {
        let events: Vec<StreamEvent> = into_events(provider_stream(vec![
            Ok(chunk(json!({ "content": "hello" }), None)),
        ]))
        .collect()
        .await;

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], StreamEvent::Complete(r) if r.text() == "hello"));
    }

    #[tokio::test]
    async fn test_terminated_drops_events_after_terminal() {
        let inner = futures::stream::iter(vec![
            StreamEvent::Partial("a".to_string()),
            StreamEvent::Error(LlmError::Transport("boom".to_string())),
            StreamEvent::Partial("b".to_string()),
            StreamEvent::Complete(ChatResponse::new(Message::assistant("late"), TokenUsage::default(), FinishReason::Stop)),
        ]);
        let events: Vec<StreamEvent> = terminated(inner).collect().await;
        assert_eq!(events.len(), 2);
        assert!(events[1].is_terminal());
    }

    #[tokio::test]
    async fn test_terminated_adds_missing_terminal() {
        let inner = futures::stream::iter(vec![StreamEvent::Partial("a".to_string())]);
        let events: Vec<StreamEvent> = terminated(inner).collect().await;
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], StreamEvent::Error(_)));
    }
}
