// Chat-completions transport with JSON manipulation hooks
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use openai_dive::v1::resources::chat::{ChatCompletionChunkResponse, ChatCompletionParameters, ChatCompletionResponse};
use reqwest::{Method, RequestBuilder};
use reqwest_eventsource::{Event, EventSource, RequestBuilderExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::pin::Pin;
use tracing::{debug, trace};

use crate::error::LlmError;

/// Trait for JSON manipulation hooks
#[async_trait]
pub trait JsonHooks: Send + Sync {
    /// Called before sending JSON to the API
    async fn before_send(&self, json: Value) -> Result<Value, LlmError> {
        Ok(json)
    }

    /// Called after receiving JSON from the API (non-streaming)
    async fn after_receive(&self, json: Value) -> Result<Value, LlmError> {
        Ok(json)
    }

    /// Called after receiving JSON from the API (streaming chunks)
    async fn after_receive_stream(&self, json: Value) -> Result<Value, LlmError> {
        self.after_receive(json).await
    }
}

/// Many OpenAI-compatible servers drop fields the OpenAI schema marks as
/// mandatory, put them back before deserializing.
#[derive(Clone, Copy, Default)]
pub struct CompatHooks;

impl CompatHooks {
    fn fix_tool_calls(message: &mut Value) {
        if let Some(tool_calls) = message.get_mut("tool_calls").and_then(|tc| tc.as_array_mut()) {
            for tool_call in tool_calls {
                if let Some(obj) = tool_call.as_object_mut() {
                    obj.entry("type").or_insert_with(|| Value::String("function".to_string()));
                }
            }
        }
    }

    fn fix(mut json: Value, object: &str, message_key: &str) -> Value {
        if let Some(obj) = json.as_object_mut() {
            obj.entry("object").or_insert_with(|| Value::String(object.to_string()));
            obj.entry("created").or_insert(Value::from(0));
        }
        if let Some(choices) = json.get_mut("choices").and_then(|c| c.as_array_mut()) {
            for (i, choice) in choices.iter_mut().enumerate() {
                if let Some(obj) = choice.as_object_mut() {
                    obj.entry("index").or_insert(Value::from(i));
                }
                if let Some(message) = choice.get_mut(message_key) {
                    Self::fix_tool_calls(message);
                }
            }
        }
        json
    }
}

#[async_trait]
impl JsonHooks for CompatHooks {
    async fn after_receive(&self, json: Value) -> Result<Value, LlmError> {
        Ok(Self::fix(json, "chat.completion", "message"))
    }

    async fn after_receive_stream(&self, json: Value) -> Result<Value, LlmError> {
        Ok(Self::fix(json, "chat.completion.chunk", "delta"))
    }
}

/// Flexible chat client
#[derive(Clone, Debug)]
pub struct ChatClient {
    pub http_client: reqwest::Client,
    pub base_url: String,
    pub api_key: String,
    pub headers: Option<HashMap<String, String>>,
    pub organization: Option<String>,
}

impl ChatClient {
    /// Create a new chat client
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            headers: None,
            organization: None,
        }
    }

    pub fn with_organization(mut self, organization: Option<String>) -> Self {
        self.organization = organization;
        self
    }

    /// Build a request with authentication headers
    fn build_request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .http_client
            .request(method, &url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");

        // local servers (ollama) run without a key
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        if let Some(headers) = &self.headers {
            for (key, value) in headers {
                request = request.header(key, value);
            }
        }

        if let Some(organization) = &self.organization {
            request = request.header("OpenAI-Organization", organization);
        }

        request
    }

    /// Check status code and handle errors
    async fn check_status_code(
        result: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<reqwest::Response, LlmError> {
        let response = result?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let error_text = response.text().await.unwrap_or_default();
        Err(LlmError::from_status(status, error_text))
    }

    /// POST a JSON body and decode the JSON answer
    pub async fn post_json<B: Serialize + ?Sized, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R, LlmError> {
        let result = self
            .build_request(Method::POST, path)
            .json(body)
            .send()
            .await;

        let response = Self::check_status_code(result).await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Chat completion with JSON hooks
    pub async fn chat_completion<H: JsonHooks>(
        &self,
        parameters: &ChatCompletionParameters,
        hooks: &H,
    ) -> Result<ChatCompletionResponse, LlmError> {
        let mut json = serde_json::to_value(parameters)?;
        json = hooks.before_send(json).await?;
        debug!(target: "llm::request", url = %self.base_url, model = %parameters.model, messages = parameters.messages.len());

        let result = self
            .build_request(Method::POST, "/chat/completions")
            .json(&json)
            .send()
            .await;

        let response = Self::check_status_code(result).await?;
        let response_text = response.text().await?;
        trace!(target: "llm::request", body = %response_text);

        let mut response_json: Value = serde_json::from_str(&response_text)?;
        response_json = hooks.after_receive(response_json).await?;

        Ok(serde_json::from_value(response_json)?)
    }

    /// Chat completion streaming with JSON hooks
    pub async fn chat_completion_stream<H: JsonHooks + 'static>(
        &self,
        parameters: &ChatCompletionParameters,
        hooks: H,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<ChatCompletionChunkResponse, LlmError>> + Send>>, LlmError> {
        let mut json = serde_json::to_value(parameters)?;
        json["stream"] = Value::Bool(true);
        json = hooks.before_send(json).await?;
        debug!(target: "llm::request", url = %self.base_url, model = %parameters.model, stream = true);

        let event_source = self
            .build_request(Method::POST, "/chat/completions")
            .json(&json)
            .eventsource()
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let stream = async_stream::stream! {
            let mut event_source: EventSource = event_source;
            while let Some(event) = event_source.next().await {
                match event {
                    Ok(Event::Open) => {}
                    Ok(Event::Message(message)) => {
                        if message.data == "[DONE]" {
                            break;
                        }

                        let chunk = match serde_json::from_str::<Value>(&message.data) {
                            Ok(json) => match hooks.after_receive_stream(json).await {
                                Ok(fixed) => serde_json::from_value::<ChatCompletionChunkResponse>(fixed).map_err(LlmError::from),
                                Err(e) => Err(e),
                            },
                            Err(e) => Err(LlmError::from(e)),
                        };
                        let failed = chunk.is_err();
                        yield chunk;
                        if failed {
                            break;
                        }
                    }
                    Err(reqwest_eventsource::Error::StreamEnded) => break,
                    Err(reqwest_eventsource::Error::InvalidStatusCode(status, response)) => {
                        let text = response.text().await.unwrap_or_default();
                        yield Err(LlmError::from_status(status.as_u16(), text));
                        break;
                    }
                    Err(e) => {
                        yield Err(LlmError::Stream(e.to_string()));
                        break;
                    }
                }
            }
            event_source.close();
        };

        Ok(Box::pin(stream))
    }
}
