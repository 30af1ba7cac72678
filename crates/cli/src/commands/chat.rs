//! `relayline chat`: one request, streamed to stdout.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Args;
use relayline_agent::StreamMultiplexer;
use relayline_config::AppConfig;
use relayline_core::event::StreamEvent;
use relayline_core::request::{ChatRequest, KnowledgeConfig};
use relayline_providers::{HttpKnowledgeSearch, OpenAiCompatProvider};
use tokio_stream::StreamExt;
use tracing::debug;

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// The message to send
    #[arg(short, long)]
    pub message: String,

    /// Run the ReAct reasoning loop instead of plain streaming
    #[arg(long)]
    pub react: bool,

    /// System prompt
    #[arg(long)]
    pub system: Option<String>,

    /// Model override
    #[arg(long)]
    pub model: Option<String>,

    /// Ground the answer in this knowledge base
    #[arg(long)]
    pub knowledge_base: Option<String>,

    /// Print every event as a JSON line
    #[arg(long)]
    pub json: bool,
}

impl ChatArgs {
    pub fn to_request(&self) -> ChatRequest {
        let mut request = ChatRequest::new(self.message.clone());
        request.use_react = self.react;
        request.system_prompt = self.system.clone();
        request.model = self.model.clone();
        request.knowledge = self.knowledge_base.as_deref().map(KnowledgeConfig::for_base);
        request
    }
}

pub async fn run(args: ChatArgs, config: &AppConfig) -> anyhow::Result<()> {
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    RELAYLINE_API_KEY, SILICONFLOW_API_KEY, OPENAI_API_KEY");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        bail!("No API key found. See above for setup instructions.");
    }

    let provider = OpenAiCompatProvider::from_config(config).context("Failed to build provider")?;
    let mut mux = StreamMultiplexer::new(Arc::new(provider), config);
    if args.knowledge_base.is_some() {
        let search = HttpKnowledgeSearch::new(&config.knowledge.base_url, config.knowledge.timeout())
            .context("Failed to build knowledge search client")?;
        mux = mux.with_knowledge(Arc::new(search), config);
    }

    debug!(react = args.react, knowledge_base = ?args.knowledge_base, "Starting chat");
    let mut events = mux.stream(args.to_request())?;
    let mut stdout = std::io::stdout().lock();
    while let Some(event) = events.next().await {
        if args.json {
            writeln!(stdout, "{}", serde_json::to_string(&event)?)?;
        } else {
            write!(stdout, "{}", render(&event))?;
        }
        stdout.flush()?;
    }

    Ok(())
}

/// Markers and the terminal summary get their own lines; content is printed
/// as-is.
pub fn render(event: &StreamEvent) -> String {
    if event.finished {
        return format!(
            "\n[{}] ~{} tokens\n",
            event.finish_reason.as_deref().unwrap_or("stop"),
            event.token_usage.unwrap_or_default()
        );
    }
    if event.is_marker() {
        return format!("\n{}\n", event.content);
    }
    event.content.clone()
}
