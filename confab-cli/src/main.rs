mod headless;

use clap::{Parser, Subcommand};
use confab_core::config::ConfabConfig;
use confab_core::logging::LoggingConfig;

use headless::app::{self, AppHeadless};
use headless::chat::ChatRepl;

#[derive(Parser)]
#[command(name = "confab", version, about = "Chat with LLMs: memory, tools and moderation")]
struct Args {
    /// provider to use instead of the configured one (openai, zhipu, openai_compatible, ollama)
    #[arg(long, global = true)]
    provider: Option<String>,

    /// model to use instead of the configured one
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat with memory
    Chat {
        /// conversation id
        #[arg(long, default_value = "default")]
        id: String,
        /// print the answer as it is generated
        #[arg(long)]
        stream: bool,
    },
    /// Ask a single question
    Ask {
        prompt: Vec<String>,
        /// print the whole result as json
        #[arg(long)]
        json: bool,
    },
    /// Ask a question with calculator and date tools enabled
    Tools {
        prompt: Vec<String>,
        /// list the available tools and exit
        #[arg(long)]
        list: bool,
        /// comma separated tools to enable
        #[arg(long)]
        tools: Option<String>,
        /// comma separated tools to disable
        #[arg(long)]
        remove: Option<String>,
    },
    /// Ask a question behind the moderation gate
    Moderate {
        prompt: Vec<String>,
        /// use the OpenAI moderation endpoint instead of the local blocklist
        #[arg(long)]
        openai: bool,
    },
    /// List providers and the environment variables they need
    Providers,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = LoggingConfig::from_env().init() {
        eprintln!("could not initialise logging: {}", e);
    }

    let args = Args::parse();
    let config = ConfabConfig::load().unwrap_or_default().with_overrides(|key| match key {
        "CONFAB_PROVIDER" => args.provider.clone().or_else(|| std::env::var(key).ok()),
        "CONFAB_MODEL" => args.model.clone().or_else(|| std::env::var(key).ok()),
        _ => std::env::var(key).ok(),
    });

    let app = AppHeadless::new(config.clone());
    match args.command {
        Commands::Chat { id, stream } => ChatRepl::new(app::service(&config)?, id, stream).run().await,
        Commands::Ask { prompt, json } => app.ask(prompt.join(" "), json).await,
        Commands::Tools { prompt, list, tools, remove } => app.tools(prompt.join(" "), list, tools, remove).await,
        Commands::Moderate { prompt, openai } => app.moderate(prompt.join(" "), openai).await,
        Commands::Providers => {
            app.providers();
            Ok(())
        }
    }
}
