//! Faqbot CLI - ask questions against a local FAQ knowledge base

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use faqbot_core::config::Config;
use faqbot_core::conversation::ConversationTurn;
use faqbot_core::embedding::EmbeddingChain;
use faqbot_core::generation::{AttemptStatus, GenerationOutcome, Orchestrator};
use faqbot_core::knowledge::{KnowledgeEntry, KnowledgeSnapshot};
use faqbot_core::moderation::{INAPPROPRIATE, ModerationFilter};
use faqbot_core::retrieval::{RetrievalQuery, Retriever, SimilarityResult};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use serde::Serialize;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "faqbot")]
#[command(author, version, about = "Answer questions from a FAQ knowledge base", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Options shared by the commands that run the reply pipeline
#[derive(clap::Args, Clone, Debug)]
struct PipelineArgs {
    /// Knowledge base file (JSON array of entries)
    #[arg(short, long)]
    knowledge: Option<PathBuf>,

    /// Request language
    #[arg(short, long, default_value = "en")]
    language: String,

    /// Per-strategy timeout in milliseconds (defaults to generation.timeout_ms)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_ms: Option<u64>,

    /// Use only in-process providers; no network calls
    #[arg(long)]
    offline: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a single question
    Ask {
        /// The message to answer
        message: String,

        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Conversation history file (JSON array of turns)
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Interactive chat session
    Chat {
        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Compute missing vectors in a knowledge base file
    Index {
        /// Knowledge base file (JSON array of entries)
        knowledge: PathBuf,

        /// Write here instead of updating the file in place
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Recompute vectors that are already present
        #[arg(long)]
        force: bool,

        /// Use only the in-process embedding model
        #[arg(long)]
        offline: bool,
    },

    /// Search the knowledge base without generating a reply
    Search {
        /// Search text
        query: String,

        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Restrict to one category
        #[arg(long)]
        category: Option<u64>,

        /// Maximum results per search path
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },

    /// Run the moderation filter over a piece of text
    Moderate {
        /// Text to check
        text: String,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// List all config values
    List,
    /// Reset to defaults
    Reset,
    /// Show the config file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("faqbot=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ask {
            message,
            pipeline,
            history,
        } => cmd_ask(&message, &pipeline, history.as_deref(), cli.format, cli.quiet).await,

        Commands::Chat { pipeline } => cmd_chat(&pipeline, cli.quiet).await,

        Commands::Index {
            knowledge,
            output,
            force,
            offline,
        } => cmd_index(&knowledge, output.as_deref(), force, offline, cli.quiet).await,

        Commands::Search {
            query,
            pipeline,
            category,
            limit,
        } => cmd_search(&query, &pipeline, category, limit, cli.format).await,

        Commands::Moderate { text } => cmd_moderate(&text, cli.format),

        Commands::Config { action } => cmd_config(action, cli.quiet),
    }
}

/// Load the config file, restricted to in-process providers when offline
fn load_config(offline: bool) -> anyhow::Result<Config> {
    let mut config = Config::load()?;
    if offline {
        config.generation.strategies.clear();
        config.embedding.providers.retain(|p| p == "local");
        debug!("Offline mode: generation strategies disabled");
    }
    Ok(config)
}

fn read_entries(path: &Path) -> anyhow::Result<Vec<KnowledgeEntry>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read knowledge file: {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse knowledge file: {}", path.display()))
}

fn read_history(path: &Path) -> anyhow::Result<Vec<ConversationTurn>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read history file: {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse history file: {}", path.display()))
}

/// Build a snapshot, embedding entries that were stored without vectors
async fn load_snapshot(
    path: Option<&Path>,
    chain: &EmbeddingChain,
) -> anyhow::Result<KnowledgeSnapshot> {
    let Some(path) = path else {
        return Ok(KnowledgeSnapshot::default());
    };

    let mut entries = read_entries(path)?;
    let mut indexed = 0;
    for entry in entries.iter_mut().filter(|e| e.question_vector.is_none()) {
        chain.index_entry(entry).await;
        indexed += 1;
    }
    if indexed > 0 {
        debug!(indexed, "Embedded entries without stored vectors");
    }

    Ok(KnowledgeSnapshot::new(entries))
}

fn timeout_for(pipeline: &PipelineArgs, config: &Config) -> Duration {
    pipeline
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.generation.timeout())
}

async fn cmd_ask(
    message: &str,
    pipeline: &PipelineArgs,
    history: Option<&Path>,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let config = load_config(pipeline.offline)?;
    let orchestrator = Orchestrator::from_config(&config)?;
    let snapshot = load_snapshot(
        pipeline.knowledge.as_deref(),
        orchestrator.retriever().embeddings(),
    )
    .await?;
    let history = match history {
        Some(path) => read_history(path)?,
        None => Vec::new(),
    };

    let outcome = orchestrator
        .generate(
            message,
            &history,
            &snapshot,
            &pipeline.language,
            timeout_for(pipeline, &config),
        )
        .await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
        OutputFormat::Text => print_outcome(&outcome, quiet),
    }
    Ok(())
}

fn print_outcome(outcome: &GenerationOutcome, quiet: bool) {
    println!("{}", outcome.text);
    if quiet {
        return;
    }

    println!();
    println!(
        "  provider: {} | latency: {}ms | tokens: {} ({} prompt, {} completion)",
        outcome.provider_used,
        outcome.latency_ms,
        outcome.tokens_used,
        outcome.prompt_tokens,
        outcome.completion_tokens
    );
    for attempt in outcome.attempts.iter().filter(|a| !a.succeeded()) {
        let reason = match &attempt.status {
            AttemptStatus::Failed { code, reason } | AttemptStatus::Errored { code, reason } => {
                format!("[{}] {}", code, reason)
            }
            AttemptStatus::TimedOut => "timed out".to_string(),
            AttemptStatus::Succeeded => continue,
        };
        println!("  skipped {}: {}", attempt.provider, reason);
    }
    if outcome.moderation.flagged {
        println!(
            "  [!!] flagged as {}: {}",
            INAPPROPRIATE,
            outcome.moderation.matched_terms.join(", ")
        );
    }
    if !outcome.relevant_entries.is_empty() {
        println!("  Relevant entries:");
        for result in &outcome.relevant_entries {
            println!("    #{} ({:.3}) {}", result.entry_id, result.score, result.entry.question);
        }
    }
    if !outcome.suggested_questions.is_empty() {
        println!("  You could also ask:");
        for question in &outcome.suggested_questions {
            println!("    - {}", question);
        }
    }
}

async fn cmd_chat(pipeline: &PipelineArgs, quiet: bool) -> anyhow::Result<()> {
    let config = load_config(pipeline.offline)?;
    let orchestrator = Orchestrator::from_config(&config)?;
    let snapshot = load_snapshot(
        pipeline.knowledge.as_deref(),
        orchestrator.retriever().embeddings(),
    )
    .await?;
    let timeout = timeout_for(pipeline, &config);
    let mut history: Vec<ConversationTurn> = Vec::new();

    if !quiet {
        println!(
            "Faqbot chat ({} entries, strategies: {}). Type 'exit' to quit.",
            snapshot.len(),
            display_list(&orchestrator.strategy_names())
        );
    }

    let mut rl = DefaultEditor::new()?;
    loop {
        let line = match rl.readline("you> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if matches!(trimmed.to_ascii_lowercase().as_str(), "exit" | "quit") {
            break;
        }
        rl.add_history_entry(trimmed).ok();

        let outcome = orchestrator
            .generate(trimmed, &history, &snapshot, &pipeline.language, timeout)
            .await?;
        println!("bot> {}", outcome.text);
        if outcome.moderation.flagged && !quiet {
            println!("     [!!] reply flagged for review");
        }

        history.push(ConversationTurn::user(trimmed));
        history.push(ConversationTurn::assistant(outcome.text));
    }

    info!(turns = history.len(), "Chat session ended");
    Ok(())
}

async fn cmd_index(
    knowledge: &Path,
    output: Option<&Path>,
    force: bool,
    offline: bool,
    quiet: bool,
) -> anyhow::Result<()> {
    let config = load_config(offline)?;
    let chain = EmbeddingChain::from_config(&config)?;
    let mut entries = read_entries(knowledge)?;

    let mut indexed = 0;
    for entry in entries
        .iter_mut()
        .filter(|e| force || e.question_vector.is_none() || e.answer_vector.is_none())
    {
        chain.index_entry(entry).await;
        indexed += 1;
    }

    let target = output.unwrap_or(knowledge);
    let contents = serde_json::to_string_pretty(&entries).context("Failed to serialize entries")?;
    fs::write(target, contents)
        .with_context(|| format!("Failed to write knowledge file: {}", target.display()))?;

    if !quiet {
        println!(
            "Indexed {} of {} entries ({} dimensions) into {}",
            indexed,
            entries.len(),
            chain.dimension(),
            target.display()
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct SearchReport<'a> {
    semantic: Vec<SimilarityResult>,
    keyword: Vec<&'a KnowledgeEntry>,
}

async fn cmd_search(
    query: &str,
    pipeline: &PipelineArgs,
    category: Option<u64>,
    limit: usize,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let config = load_config(pipeline.offline)?;
    let retriever = Retriever::new(EmbeddingChain::from_config(&config)?);
    let snapshot = load_snapshot(pipeline.knowledge.as_deref(), retriever.embeddings()).await?;

    let mut request = RetrievalQuery::new(query, &pipeline.language, limit);
    if let Some(category) = category {
        request = request.with_category(category);
    }

    let report = SearchReport {
        semantic: retriever.retrieve(&snapshot, &request).await,
        keyword: retriever.keyword(&snapshot, &request),
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            println!("Semantic matches:");
            if report.semantic.is_empty() {
                println!("  (none)");
            }
            for result in &report.semantic {
                println!("  #{} ({:.3}) {}", result.entry_id, result.score, result.entry.question);
            }
            println!("Keyword matches:");
            if report.keyword.is_empty() {
                println!("  (none)");
            }
            for entry in &report.keyword {
                println!("  #{} {}", entry.id, entry.question);
            }
        }
    }
    Ok(())
}

fn cmd_moderate(text: &str, format: OutputFormat) -> anyhow::Result<()> {
    let config = Config::load()?;
    let result = ModerationFilter::from_config(&config.moderation).moderate(text);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => {
            let score = result.score(INAPPROPRIATE).unwrap_or_default();
            if result.flagged {
                println!(
                    "flagged ({} = {:.2}): {}",
                    INAPPROPRIATE,
                    score,
                    result.matched_terms.join(", ")
                );
            } else {
                println!("clean ({} = {:.2})", INAPPROPRIATE, score);
            }
        }
    }
    Ok(())
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            for (key, value) in config.list()? {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

fn display_list(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

#[cfg(test)]
mod main_tests;
