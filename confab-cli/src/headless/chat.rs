use std::io::Write;
use confab_core::service::{AiService, ServiceError, ServiceEvent, TurnInput};
use console::style;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use super::app::print_result;

/// Line based chat on stdin. Memory lives as long as the process.
pub struct ChatRepl {
    service: AiService,
    id: String,
    stream: bool,
}

impl ChatRepl {
    pub fn new(service: AiService, id: String, stream: bool) -> Self {
        Self { service, id, stream }
    }

    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        eprintln!("{}", style("/clear forgets the conversation, /history shows it, /exit quits").dim());
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            eprint!("{} ", style(">").cyan().bold());
            std::io::stderr().flush()?;
            let Some(line) = lines.next_line().await? else {
                break;
            };
            let line = line.trim();
            match line {
                "" => continue,
                "/exit" | "/quit" => break,
                "/clear" => {
                    self.service.memory().clear(&self.id).await?;
                    eprintln!("{}", style("conversation cleared").dim());
                }
                "/history" => {
                    for message in self.service.memory().history(&self.id).await? {
                        println!("{} {}", style(format!("[{:?}]", message.role())).dim(), message.text());
                    }
                }
                text => {
                    let outcome = if self.stream {
                        self.stream_turn(text).await
                    } else {
                        self.turn(text).await
                    };
                    match outcome {
                        Ok(()) => {}
                        Err(ServiceError::Cancelled) => eprintln!("{}", style("cancelled").yellow()),
                        Err(e) => eprintln!("{} {}", style("error:").red().bold(), e),
                    }
                }
            }
        }
        Ok(())
    }

    /// Ctrl-C cancels the turn in flight, not the session
    fn cancel_on_ctrl_c() -> CancellationToken {
        let token = CancellationToken::new();
        let child = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => child.cancel(),
                _ = child.cancelled() => {}
            }
        });
        token
    }

    async fn turn(&self, text: &str) -> Result<(), ServiceError> {
        let cancel = Self::cancel_on_ctrl_c();
        let outcome = self.service.converse_with(&self.id, TurnInput::new(text), cancel.clone()).await;
        cancel.cancel();
        let result = outcome?;
        print_result(&result, false).map_err(|e| ServiceError::Configuration(e.to_string()))
    }

    async fn stream_turn(&self, text: &str) -> Result<(), ServiceError> {
        let cancel = Self::cancel_on_ctrl_c();
        let mut events = self.service.converse_streaming_with(&self.id, TurnInput::new(text), cancel.clone());
        let mut outcome = Ok(());
        while let Some(event) = events.next().await {
            match event {
                ServiceEvent::Partial(text) => {
                    print!("{}", text);
                    let _ = std::io::stdout().flush();
                }
                ServiceEvent::ToolExecuted(execution) => {
                    eprintln!("{}", style(format!("[{} -> {}]", execution.request.name, execution.result.text())).dim());
                }
                ServiceEvent::Complete(result) => {
                    println!();
                    eprintln!("{}", style(format!("{} tokens", result.usage.total_tokens)).dim());
                }
                ServiceEvent::Error(e) => {
                    println!();
                    outcome = Err(e);
                }
            }
        }
        cancel.cancel();
        outcome
    }
}
