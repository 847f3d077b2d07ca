//! Cerebras RAG CLI - ask questions about the Cerebras API documentation
//!
//! Interactive chat by default, plus one-shot questions, a connectivity
//! check and configuration management.

mod interactive;

use anyhow::{bail, Context, Result};
use cerebras_rag::{check_prerequisites, AskOptions, DocsAgent};
use cerebras_rag_core::{
    default_config_paths, init_logging, log_operation_error, log_operation_start,
    log_operation_success, AssistantConfig, LoggingConfig, THREAD_ID_VAR,
};
use clap::{Parser, Subcommand};
use interactive::{stream_answer, ChatSession};
use std::path::PathBuf;
use tracing::info;

/// Thread used by interactive chat when none is given
const CHAT_THREAD_ID: &str = "cli_session";

#[derive(Parser)]
#[command(name = "cerebras-rag")]
#[command(about = "Answer questions about the Cerebras API documentation with quoted citations")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Conversation thread to continue
    #[arg(short, long, global = true, env = THREAD_ID_VAR)]
    thread: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session (default)
    Chat,

    /// Ask a single question
    Ask {
        /// The question to answer
        question: String,

        /// Answer without quoted citations
        #[arg(long)]
        no_citations: bool,

        /// Rerank retrieved chunks before answering
        #[arg(long)]
        rerank: bool,

        /// Print the answer and citations as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check credentials and vector store connectivity
    Status,

    /// Manage configuration
    Config {
        /// Write the default configuration file
        #[arg(long)]
        init: bool,

        /// Show the effective configuration
        #[arg(long)]
        show: bool,

        /// Validate the configuration
        #[arg(long)]
        validate: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AssistantConfig::load(cli.config.as_deref())
        .context("Failed to load configuration")?;

    let logging_config = if cli.verbose {
        LoggingConfig::verbose()
    } else {
        config.logging.clone()
    };
    init_logging(&logging_config).context("Failed to initialize logging")?;

    info!("Starting cerebras-rag v{}", env!("CARGO_PKG_VERSION"));

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            let thread = cli.thread.unwrap_or_else(|| CHAT_THREAD_ID.to_string());
            handle_chat(config, thread).await
        }
        Commands::Ask {
            question,
            no_citations,
            rerank,
            json,
        } => {
            let options = ask_options(no_citations, rerank, cli.thread);
            handle_ask(config, &question, &options, json).await
        }
        Commands::Status => handle_status(config).await,
        Commands::Config {
            init,
            show,
            validate,
        } => handle_config(config, cli.config, init, show, validate),
    }
}

fn ask_options(no_citations: bool, rerank: bool, thread: Option<String>) -> AskOptions {
    let options = AskOptions {
        use_citations: !no_citations,
        use_reranking: rerank,
        thread: None,
    };
    match thread {
        Some(thread) => options.with_thread(thread),
        None => options,
    }
}

/// Plain answers never query the index
fn requires_vector_store(options: &AskOptions) -> bool {
    options.use_citations
}

/// Fail with the list of missing credentials before any network call
fn require_credentials() -> Result<()> {
    let report = check_prerequisites();
    if report.ok {
        return Ok(());
    }

    println!("❌ Missing required environment variables:");
    for line in report.describe_missing() {
        println!("   - {}", line);
    }
    println!("💡 Set them in your shell or in a .env file.");
    bail!("missing credentials: {}", report.missing.join(", "))
}

async fn connect(config: AssistantConfig, require_index: bool) -> Result<DocsAgent> {
    require_credentials()?;

    let agent = DocsAgent::from_env(config).await.map_err(|e| {
        log_operation_error!("create_agent", e);
        e
    })?;

    if require_index {
        let status = agent.initialize_vector_store().await;
        if !status.success {
            println!("❌ {}", status.message);
            bail!("vector store unavailable");
        }
        info!("{}", status.message);
    }

    Ok(agent)
}

async fn handle_chat(config: AssistantConfig, thread: String) -> Result<()> {
    log_operation_start!("chat", thread_id = %thread);

    println!("🤖 Connecting to the documentation index...");
    let options = AskOptions::default().with_thread(thread.clone());
    let agent = connect(config, requires_vector_store(&options)).await?;
    ChatSession::new(&agent, options).run().await?;

    log_operation_success!("chat", thread_id = %thread);
    Ok(())
}

async fn handle_ask(
    config: AssistantConfig,
    question: &str,
    options: &AskOptions,
    json: bool,
) -> Result<()> {
    log_operation_start!("ask", citations = options.use_citations, rerank = options.use_reranking);

    let agent = connect(config, requires_vector_store(options)).await?;

    if json {
        let answer = agent.ask_question(question, options).await.map_err(|e| {
            log_operation_error!("ask", e);
            e
        })?;
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else if !stream_answer(&agent, question, options).await? {
        bail!("failed to answer the question");
    }

    log_operation_success!("ask");
    Ok(())
}

async fn handle_status(config: AssistantConfig) -> Result<()> {
    let report = check_prerequisites();
    if report.ok {
        println!("✅ All required credentials are set");
    } else {
        println!("❌ Missing required environment variables:");
        for line in report.describe_missing() {
            println!("   - {}", line);
        }
        return Ok(());
    }

    println!("🧠 Model: {}", config.llm.model);
    println!("🗂️  Index: {}", config.vector_store.index_name);

    let agent = DocsAgent::from_env(config).await?;
    let status = agent.initialize_vector_store().await;
    if status.success {
        println!("✅ {}", status.message);
    } else {
        println!("❌ {}", status.message);
    }

    Ok(())
}

fn handle_config(
    config: AssistantConfig,
    path: Option<PathBuf>,
    init: bool,
    show: bool,
    validate: bool,
) -> Result<()> {
    if init {
        let target = match path.or_else(|| default_config_paths().into_iter().next()) {
            Some(target) => target,
            None => bail!("no configuration directory available; pass --config <path>"),
        };
        if target.exists() {
            println!("⚠️  Configuration already exists at: {:?}", target);
        } else {
            AssistantConfig::default().save_to_file(&target)?;
            println!("✅ Configuration initialized at: {:?}", target);
            println!("📝 API keys are read from the environment, not from this file.");
        }
    }

    if show || !(init || validate) {
        println!("📋 Current configuration:");
        println!("{}", toml::to_string_pretty(&config)?);
    }

    if validate {
        match config.validate() {
            Ok(()) => println!("✅ Configuration is valid"),
            Err(e) => {
                println!("❌ Configuration validation failed: {}", e);
                return Err(e.into());
            }
        }
    }

    Ok(())
}
