use std::sync::Arc;
use confab_core::config::ConfabConfig;
use confab_core::service::{AiService, AiServiceBuilder, BlocklistModeration, ServiceError, ServiceResult};
use confab_llm::{LlmClient, ModerationModel, OpenAiModerationModel};
use console::style;

use super::tools::{list_all_tools, parse_tools_list, ToolConfig};

/// One-shot conversations, nothing is kept once the process exits
pub struct AppHeadless {
    config: ConfabConfig,
}

impl AppHeadless {
    pub fn new(config: ConfabConfig) -> Self {
        Self { config }
    }

    fn builder(&self) -> Result<AiServiceBuilder, Box<dyn std::error::Error>> {
        let builder = self.config.service_builder()?;
        if let Some(provider) = self.config.get_selected_provider() {
            let model = if provider.model.is_empty() { "default model" } else { provider.model.as_str() };
            eprintln!("{}", style(format!("{} on {}", model, provider.provider)).dim());
        }
        Ok(builder)
    }

    pub async fn ask(&self, prompt: String, json: bool) -> Result<(), Box<dyn std::error::Error>> {
        if prompt.trim().is_empty() {
            eprintln!("Error: Please provide a prompt");
            eprintln!("Usage: confab ask \"your prompt here\"");
            return Ok(());
        }
        let service = self.builder()?.build()?;
        let result = service.converse("ask", prompt).await?;
        print_result(&result, json)
    }

    pub async fn tools(
        &self,
        prompt: String,
        list: bool,
        tools: Option<String>,
        remove: Option<String>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if list {
            list_all_tools();
            return Ok(());
        }

        let tools = match (tools, remove) {
            (Some(tools_str), _) => ToolConfig::with_tools(parse_tools_list(&tools_str)?),
            (None, Some(remove_str)) => ToolConfig::new().remove_tools(parse_tools_list(&remove_str)?),
            (None, None) => ToolConfig::new(),
        };

        let service = self.builder()?.tools(tools.build_toolbox()).build()?;
        let result = service.converse("tools", prompt).await?;
        for execution in &result.tool_executions {
            eprintln!(
                "{}",
                style(format!(
                    "{}({}) -> {} [{}ms]",
                    execution.request.name,
                    execution.request.arguments,
                    execution.result.text(),
                    execution.duration_ms
                ))
                .dim()
            );
        }
        print_result(&result, false)
    }

    pub async fn moderate(&self, prompt: String, openai: bool) -> Result<(), Box<dyn std::error::Error>> {
        let moderation: Arc<dyn ModerationModel> = if openai {
            Arc::new(OpenAiModerationModel::from_env().ok_or("OPENAI_API_KEY is not set")?)
        } else {
            Arc::new(BlocklistModeration::with_default_rules()?)
        };

        let service = self.builder()?.moderation(moderation).build()?;
        match service.converse("moderate", prompt).await {
            Ok(result) => print_result(&result, false),
            Err(ServiceError::ModerationViolation { categories }) => {
                eprintln!("{} {}", style("blocked:").red().bold(), categories.join(", "));
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn providers(&self) {
        println!("Available providers:");
        for info in LlmClient::list_providers() {
            println!("  {} ({})", style(info.name).bold(), info.display_name);
            for var in &info.env_vars {
                let marker = if var.required { "required" } else { "optional" };
                println!("    {:<28} {} [{}]", var.name, var.description, marker);
            }
        }

        println!();
        println!("Configured:");
        for (index, provider, model) in self.config.list_providers() {
            let selected = if index == self.config.selected_provider { "*" } else { " " };
            println!("  {} {} {}", selected, provider, model);
        }
    }
}

pub fn print_result(result: &ServiceResult, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        println!("{}", result.text());
        eprintln!(
            "{}",
            style(format!(
                "{} tokens, {} tool rounds",
                result.usage.total_tokens, result.rounds
            ))
            .dim()
        );
    }
    Ok(())
}

/// Shared by the REPL
pub fn service(config: &ConfabConfig) -> Result<AiService, Box<dyn std::error::Error>> {
    Ok(config.service_builder()?.build()?)
}
