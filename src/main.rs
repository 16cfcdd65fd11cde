// SPDX-License-Identifier: MIT

use clap::{Parser, Subcommand};
use dotenv::dotenv;

use std::sync::Arc;

use weft_rs::agent::{self, ACT};
use weft_rs::checkpoint::{Checkpointer, MemorySaver, SqliteSaver};
use weft_rs::config::{Config, DEFAULT_GEMINI_MODEL};
use weft_rs::engine::Engine;
use weft_rs::error::{ModelError, WeftError};
use weft_rs::llm::{GeminiModel, Message};
use weft_rs::repl;
use weft_rs::tools::{TavilySearchTool, ToolRegistry, TripleTool};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a single question and print the answer
    Ask {
        /// The question to ask
        #[arg(short, long)]
        prompt: String,

        /// Thread id to continue; generated fresh when omitted
        #[arg(short, long)]
        thread: Option<String>,

        /// SQLite checkpoint file; checkpoints stay in memory when omitted
        #[arg(long)]
        db: Option<String>,

        /// Pause for approval before any tool executes
        #[arg(long)]
        approve_tools: bool,
    },
    /// Hold an interactive conversation on one thread
    Chat {
        /// Thread id to continue; generated fresh when omitted
        #[arg(short, long)]
        thread: Option<String>,

        /// SQLite checkpoint file; checkpoints stay in memory when omitted
        #[arg(long)]
        db: Option<String>,

        /// Pause for approval before any tool executes
        #[arg(long)]
        approve_tools: bool,
    },
    /// Print the workflow topology as Mermaid flowchart text
    Graph,
}

async fn build_tools(config: &Config) -> ToolRegistry {
    let registry = ToolRegistry::new();
    registry.register(Arc::new(TripleTool)).await;
    if let Some(key) = &config.tavily_api_key {
        log::info!("Registered tool: tavily_search");
        registry.register(Arc::new(TavilySearchTool::new(key))).await;
    }
    registry
}

async fn build_engine(
    config: &Config,
    db: Option<&str>,
    approve_tools: bool,
) -> Result<Engine, WeftError> {
    let model = Arc::new(GeminiModel::new(&config.model_name, &config.gemini_api_key));
    let registry = build_tools(config).await;
    let graph = agent::build_react_graph(model, registry.all().await)?;

    let checkpointer: Arc<dyn Checkpointer> = match db {
        Some(path) => {
            log::info!("Checkpointing to {path}");
            Arc::new(SqliteSaver::open(path)?)
        }
        None => Arc::new(MemorySaver::new()),
    };

    let mut engine = Engine::new(graph, checkpointer);
    if approve_tools {
        engine = engine.with_interrupt_before([ACT]);
    }
    Ok(engine)
}

fn thread_or_fresh(thread: Option<String>) -> String {
    thread.unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

async fn run(command: Commands) -> Result<(), WeftError> {
    match command {
        Commands::Ask {
            prompt,
            thread,
            db,
            approve_tools,
        } => {
            let config = Config::from_env()?;
            let engine = build_engine(&config, db.as_deref(), approve_tools).await?;
            let thread_id = thread_or_fresh(thread);
            log::info!("Using model {} on thread {}", config.model_name, thread_id);

            let input = agent::message_update(vec![Message::user(&prompt)])?;
            let result = engine.invoke(&thread_id, input).await?;
            let result = repl::approval_loop(&engine, &thread_id, result).await?;

            if result.is_terminated() {
                match repl::last_answer(result.state()) {
                    Some(answer) => println!("{answer}"),
                    None => println!("(no answer)"),
                }
            }
        }
        Commands::Chat {
            thread,
            db,
            approve_tools,
        } => {
            let config = Config::from_env()?;
            let engine = build_engine(&config, db.as_deref(), approve_tools).await?;
            let thread_id = thread_or_fresh(thread);
            log::info!("Using model {} on thread {}", config.model_name, thread_id);

            repl::chat_loop(&engine, &thread_id).await?;
        }
        Commands::Graph => {
            // Topology is static; no credentials are needed to print it.
            let model = Arc::new(GeminiModel::new(DEFAULT_GEMINI_MODEL, ""));
            let graph = agent::build_react_graph(model, vec![Arc::new(TripleTool)])?;
            print!("{}", graph.to_mermaid());
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    if let Err(e) = run(args.command).await {
        eprintln!("Error: {e}");
        if let Some(hint) = e.remediation() {
            eprintln!("{hint}");
        }
        if matches!(
            e,
            WeftError::Model(ModelError::QuotaExhausted { .. })
        ) {
            eprintln!("You can also try setting GEMINI_MODEL to a different model.");
        }
        std::process::exit(1);
    }
}
