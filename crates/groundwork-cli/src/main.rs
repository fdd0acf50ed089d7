use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use groundwork_ai::{HttpEmbedder, HttpGenerator};
use groundwork_core::TaskSpec;
use groundwork_service::{AgentRequest, SearchMode, Service, ServiceConfig};
use groundwork_store::{MemoryDoc, MemoryIndex};

mod display;

#[derive(Parser)]
#[command(name = "groundwork", version, about = "Grounded retrieval over engineering standards and legal provisions")]
struct Cli {
    /// JSON corpus file: an array of documents with key/kind/text fields.
    #[arg(long, default_value = "data/corpus.json")]
    corpus: PathBuf,

    #[arg(long, env = "GROUNDWORK_API_BASE", default_value = "https://api.openai.com/v1")]
    api_base: String,

    #[arg(long, env = "OPENAI_API_KEY", default_value = "", hide_env_values = true)]
    api_key: String,

    #[arg(long, env = "GROUNDWORK_EMBED_MODEL", default_value = "text-embedding-3-small")]
    embed_model: String,

    #[arg(long, env = "GROUNDWORK_CHAT_MODEL", default_value = "gpt-4o-mini")]
    chat_model: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ranked evidence plus trust assessment for a query.
    Search {
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value = "hybrid")]
        mode: String,
    },
    /// Evidence-grounded generated answer.
    Answer {
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value = "hybrid")]
        mode: String,
    },
    /// Evidence-grounded execution checklist card.
    Card {
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value = "hybrid")]
        mode: String,
    },
    /// Schedule-adequacy scenarios for a current/target duration.
    Duration {
        #[arg(long)]
        current: f64,
        #[arg(long)]
        target: f64,
        /// JSON file: an array of tasks with name/duration_days flags.
        #[arg(long)]
        tasks: Option<PathBuf>,
        #[arg(long, default_value_t = 6)]
        limit: usize,
        #[arg(long, default_value = "hybrid")]
        mode: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    tracing::info!("groundwork v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();

    let corpus_raw = std::fs::read_to_string(&cli.corpus)
        .map_err(|e| anyhow::anyhow!("read corpus {:?}: {e}", cli.corpus))?;
    let docs: Vec<MemoryDoc> = serde_json::from_str(&corpus_raw)?;
    let index = Arc::new(MemoryIndex::new(docs));

    let service = Arc::new(Service::new(
        ServiceConfig::default(),
        index.clone(),
        index,
        Arc::new(HttpEmbedder::new(
            cli.api_base.clone(),
            cli.api_key.clone(),
            cli.embed_model.clone(),
        )),
        Arc::new(HttpGenerator::new(
            cli.api_base.clone(),
            cli.api_key.clone(),
            cli.chat_model.clone(),
        )),
    ));

    match cli.command {
        Command::Search { query, limit, mode } => {
            let response = service.search(&query, limit, mode.parse::<SearchMode>()?).await?;
            display::search(&response);
        }
        Command::Answer { query, limit, mode } => {
            let response = service.answer(&query, limit, mode.parse::<SearchMode>()?).await?;
            display::search(&response.search);
            display::answer(&response.answer);
        }
        Command::Card { query, limit, mode } => {
            let response = service.card(&query, limit, mode.parse::<SearchMode>()?).await?;
            display::search(&response.search);
            display::card(&response.card);
        }
        Command::Duration {
            current,
            target,
            tasks,
            limit,
            mode,
        } => {
            let tasks: Vec<TaskSpec> = match tasks {
                Some(path) => serde_json::from_str(&std::fs::read_to_string(&path)?)?,
                None => Vec::new(),
            };
            let advice = service
                .duration_agent(AgentRequest {
                    current_days: current,
                    target_days: target,
                    tasks,
                    mode: mode.parse::<SearchMode>()?,
                    limit,
                })
                .await?;
            display::advice(&advice);
        }
    }

    Ok(())
}
