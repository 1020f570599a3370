// Streaming query: print partial text as it arrives
use std::io::Write;
use confab_llm::{GenerationParams, LlmClient, LlmError, Message, ModelClient, ModelRequest, StreamEvent};
use futures::StreamExt;

#[tokio::main]
async fn main() -> Result<(), LlmError> {
    let client = LlmClient::first_from_env()
        .ok_or_else(|| LlmError::Configuration("no provider configured, set OPENAI_API_KEY".to_string()))?;

    let request = ModelRequest::new(
        GenerationParams::new(client.model()).temperature(0.8).max_tokens(300),
        vec![Message::user("Tell me a joke about robots learning to paint.")],
    );

    let mut stream = client.send_streaming(request).await;
    while let Some(event) = stream.next().await {
        match event {
            StreamEvent::Partial(text) => {
                print!("{}", text);
                let _ = std::io::stdout().flush();
            }
            StreamEvent::Complete(response) => {
                println!("\n\nfinish: {:?}, tokens: {:?}", response.finish_reason, response.usage);
            }
            StreamEvent::Error(e) => return Err(e),
        }
    }

    Ok(())
}
