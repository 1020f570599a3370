// Conversion between the conversation model and the chat-completions wire types
use openai_dive::v1::resources::chat::{
    ChatCompletionFunction, ChatCompletionParameters, ChatCompletionResponse, ChatCompletionResponseFormat,
    ChatCompletionTool, ChatCompletionToolChoice, ChatCompletionToolType, ChatMessage, ChatMessageContent,
    ChatMessageContentPart, Function, ToolCall,
};
use openai_dive::v1::resources::shared::{FinishReason as WireFinishReason, Usage};
use serde_json::json;

use crate::error::LlmError;
use crate::message::{Content, ContentPart, Message, ToolCallRequest};
use crate::request::ModelRequest;
use crate::response::{ChatResponse, FinishReason, TokenUsage};
use crate::tool::ToolDescriptor;

pub fn to_chat_message(message: &Message) -> Result<ChatMessage, LlmError> {
    let converted = match message {
        Message::System { content } => ChatMessage::System {
            content: ChatMessageContent::Text(content.clone()),
            name: None,
        },
        Message::User { content, name } => ChatMessage::User {
            content: to_content(content)?,
            name: name.clone(),
        },
        Message::Assistant { content, tool_calls } => ChatMessage::Assistant {
            content: content.clone().map(ChatMessageContent::Text),
            reasoning_content: None,
            refusal: None,
            name: None,
            audio: None,
            tool_calls: if tool_calls.is_empty() {
                None
            } else {
                Some(tool_calls.iter().map(to_tool_call).collect())
            },
        },
        Message::ToolResult { tool_call_id, content, .. } => ChatMessage::Tool {
            content: content.clone(),
            tool_call_id: tool_call_id.clone(),
        },
    };
    Ok(converted)
}

fn to_content(content: &Content) -> Result<ChatMessageContent, LlmError> {
    match content {
        Content::Text(text) => Ok(ChatMessageContent::Text(text.clone())),
        Content::Parts(parts) => {
            let wire: Vec<serde_json::Value> = parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => json!({ "type": "text", "text": text }),
                    ContentPart::Image { url } => json!({ "type": "image_url", "image_url": { "url": url } }),
                })
                .collect();
            serde_json::from_value(serde_json::Value::Array(wire))
                .map_err(|e| LlmError::Decode(format!("cannot encode content parts: {}", e)))
        }
    }
}

fn to_tool_call(call: &ToolCallRequest) -> ToolCall {
    ToolCall {
        id: call.id.clone(),
        r#type: "function".to_string(),
        function: Function {
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        },
    }
}

pub fn to_tool(descriptor: &ToolDescriptor) -> ChatCompletionTool {
    ChatCompletionTool {
        r#type: ChatCompletionToolType::Function,
        function: ChatCompletionFunction {
            name: descriptor.name.clone(),
            description: Some(descriptor.description.clone()),
            parameters: descriptor.parameters.clone(),
        },
    }
}

/// Serialize the full history plus tool declarations into the request shape
pub fn to_parameters(request: &ModelRequest) -> Result<ChatCompletionParameters, LlmError> {
    let messages = request
        .messages
        .iter()
        .map(to_chat_message)
        .collect::<Result<Vec<_>, _>>()?;

    let (tools, tool_choice) = if request.tools.is_empty() {
        (None, None)
    } else {
        (
            Some(request.tools.iter().map(to_tool).collect::<Vec<_>>()),
            Some(ChatCompletionToolChoice::Auto),
        )
    };

    let response_format = request
        .params
        .response_format
        .to_wire()
        .map(serde_json::from_value::<ChatCompletionResponseFormat>)
        .transpose()
        .map_err(|e| LlmError::Configuration(format!("unsupported response format: {}", e)))?;

    Ok(ChatCompletionParameters {
        model: request.params.model.clone(),
        messages,
        temperature: request.params.temperature,
        max_tokens: request.params.max_tokens,
        tools,
        tool_choice,
        response_format,
        ..Default::default()
    })
}

pub(crate) fn content_text(content: &ChatMessageContent) -> String {
    match content {
        ChatMessageContent::Text(text) => text.clone(),
        ChatMessageContent::ContentPart(parts) => parts
            .iter()
            .filter_map(|part| match part {
                ChatMessageContentPart::Text(text_part) => Some(text_part.text.clone()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" "),
        ChatMessageContent::None => String::new(),
    }
}

pub(crate) fn finish_reason(reason: Option<&WireFinishReason>) -> Option<FinishReason> {
    let reason = reason?;
    serde_json::to_value(reason)
        .ok()
        .and_then(|v| v.as_str().map(FinishReason::from_wire))
}

pub(crate) fn usage(usage: Option<&Usage>) -> TokenUsage {
    usage
        .map(|u| {
            let prompt = u.prompt_tokens.unwrap_or(0);
            let completion = u.completion_tokens.unwrap_or(0);
            TokenUsage {
                prompt_tokens: prompt,
                completion_tokens: completion,
                total_tokens: u.total_tokens.max(prompt.saturating_add(completion)),
            }
        })
        .unwrap_or_default()
}

/// Convert the provider answer into a `ChatResponse`, only the first choice is kept
pub fn from_completion(response: ChatCompletionResponse) -> Result<ChatResponse, LlmError> {
    let usage = usage(response.usage.as_ref());
    let model = response.model.clone();
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::Decode("response contains no choices".to_string()))?;

    let ChatMessage::Assistant { content, tool_calls, reasoning_content, .. } = choice.message else {
        return Err(LlmError::Decode("first choice is not an assistant message".to_string()));
    };

    let tool_calls: Vec<ToolCallRequest> = tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| ToolCallRequest::new(call.id, call.function.name, call.function.arguments))
        .collect();

    let text = content.as_ref().map(content_text).filter(|t| !t.is_empty());
    let finish_reason = finish_reason(choice.finish_reason.as_ref()).unwrap_or(if tool_calls.is_empty() {
        FinishReason::Stop
    } else {
        FinishReason::ToolCalls
    });

    let mut chat_response = ChatResponse::new(Message::assistant_tool_calls(text, tool_calls), usage, finish_reason);
    chat_response.model = model;
    chat_response.reasoning = reasoning_content;
    Ok(chat_response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{GenerationParams, ResponseFormat};

    fn completion(body: serde_json::Value) -> ChatCompletionResponse {
        serde_json::from_value(body).expect("valid completion body")
    }

    #[test]
    fn test_request_carries_history_and_tools() {
        let request = ModelRequest::new(
            GenerationParams::new("gpt-4o-mini").temperature(0.2),
            vec![
                Message::system("be brief"),
                Message::user("what is 2+3?"),
                Message::assistant_tool_calls(None, vec![ToolCallRequest::new("call_1", "add", r#"{"a":2,"b":3}"#)]),
                Message::tool_result("call_1", "5"),
            ],
        )
        .with_tools(vec![ToolDescriptor::new("add", "adds two integers", json!({"type": "object"}))]);

        let params = to_parameters(&request).unwrap();
        let wire = serde_json::to_value(&params).unwrap();

        assert_eq!(wire["model"], "gpt-4o-mini");
        assert_eq!(wire["messages"].as_array().unwrap().len(), 4);
        assert_eq!(wire["messages"][0]["role"], "system");
        assert_eq!(wire["messages"][2]["tool_calls"][0]["id"], "call_1");
        assert_eq!(wire["messages"][2]["tool_calls"][0]["function"]["name"], "add");
        assert_eq!(wire["messages"][3]["role"], "tool");
        assert_eq!(wire["messages"][3]["tool_call_id"], "call_1");
        assert_eq!(wire["tools"][0]["function"]["name"], "add");
        assert_eq!(wire["tool_choice"], "auto");
    }

    #[test]
    fn test_request_without_tools_omits_tool_choice() {
        let request = ModelRequest::new(GenerationParams::new("m"), vec![Message::user("hi")]);
        let params = to_parameters(&request).unwrap();
        assert!(params.tools.is_none());
        assert!(params.tool_choice.is_none());
        assert!(params.response_format.is_none());
    }

    #[test]
    fn test_json_object_response_format() {
        let request = ModelRequest::new(
            GenerationParams::new("m").response_format(ResponseFormat::JsonObject),
            vec![Message::user("give me json")],
        );
        let wire = serde_json::to_value(to_parameters(&request).unwrap()).unwrap();
        assert_eq!(wire["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_image_parts_are_encoded() {
        let message = Message::user_with_images("describe", &["https://example.com/cat.png".to_string()]);
        let wire = serde_json::to_value(to_chat_message(&message).unwrap()).unwrap();
        assert_eq!(wire["content"][0]["type"], "text");
        assert_eq!(wire["content"][1]["type"], "image_url");
        assert_eq!(wire["content"][1]["image_url"]["url"], "https://example.com/cat.png");
    }

    #[test]
    fn test_from_completion_text() {
        let response = from_completion(completion(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1,
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "Paris" },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12 }
        })))
        .unwrap();

        assert_eq!(response.text(), "Paris");
        assert_eq!(response.finish_reason, FinishReason::Stop);
        assert_eq!(response.usage, TokenUsage::new(10, 2));
        assert_eq!(response.model, "gpt-4o-mini");
        assert!(response.sources.is_empty());
    }

    #[test]
    fn test_from_completion_tool_calls() {
        let response = from_completion(completion(json!({
            "id": "chatcmpl-2",
            "object": "chat.completion",
            "created": 1,
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": { "name": "multiply", "arguments": "{\"a\":3,\"b\":4}" }
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        })))
        .unwrap();

        assert!(response.requests_tools());
        assert_eq!(response.finish_reason, FinishReason::ToolCalls);
        assert_eq!(response.tool_calls()[0], ToolCallRequest::new("call_9", "multiply", r#"{"a":3,"b":4}"#));
        assert_eq!(response.usage, TokenUsage::default());
    }

    #[test]
    fn test_from_completion_without_choices_is_decode_error() {
        let result = from_completion(completion(json!({
            "id": "chatcmpl-3",
            "object": "chat.completion",
            "created": 1,
            "model": "m",
            "choices": []
        })));
        assert!(matches!(result, Err(LlmError::Decode(_))));
    }
}
