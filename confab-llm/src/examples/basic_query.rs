// Basic query: one user message, one answer
use confab_llm::{GenerationParams, LlmClient, LlmError, Message, ModelClient, ModelRequest};

#[tokio::main]
async fn main() -> Result<(), LlmError> {
    let client = LlmClient::first_from_env()
        .ok_or_else(|| LlmError::Configuration("no provider configured, set OPENAI_API_KEY".to_string()))?;
    println!("Using {} / {}", client.provider_name(), client.model());

    let request = ModelRequest::new(
        GenerationParams::new(client.model()).temperature(0.7).max_tokens(100),
        vec![Message::user("What is the capital of France?")],
    );

    let response = client.send(request).await?;
    println!("Response: {}", response.text());
    println!("Tokens: {:?}", response.usage);

    Ok(())
}
