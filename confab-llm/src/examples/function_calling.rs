// Function calling: declare a tool, answer the call, get the final text
use confab_llm::{GenerationParams, LlmClient, LlmError, Message, ModelClient, ModelRequest, ToolDescriptor};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), LlmError> {
    let client = LlmClient::first_from_env()
        .ok_or_else(|| LlmError::Configuration("no provider configured, set OPENAI_API_KEY".to_string()))?;

    let weather = ToolDescriptor::new(
        "get_weather",
        "Get current weather information for a given location",
        json!({
            "type": "object",
            "properties": {
                "location": { "type": "string", "description": "The city, e.g. Paris" }
            },
            "required": ["location"]
        }),
    );

    let params = GenerationParams::new(client.model()).temperature(0.1);
    let mut history = vec![Message::user("What is the weather like in Paris right now?")];

    let response = client
        .send(ModelRequest::new(params.clone(), history.clone()).with_tools(vec![weather.clone()]))
        .await?;
    if !response.requests_tools() {
        println!("Model answered directly: {}", response.text());
        return Ok(());
    }

    history.push(response.message.clone());
    for call in response.tool_calls() {
        println!("{}({})", call.name, call.arguments);
        let args: serde_json::Value = serde_json::from_str(&call.arguments)?;
        let location = args["location"].as_str().unwrap_or("Unknown");
        let result = json!({ "location": location, "temperature": 18, "unit": "celsius", "condition": "Partly cloudy" });
        history.push(Message::tool_result(call.id.clone(), result.to_string()));
    }

    let final_response = client
        .send(ModelRequest::new(params, history).with_tools(vec![weather]))
        .await?;
    println!("Final answer: {}", final_response.text());

    Ok(())
}
