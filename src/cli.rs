use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Debug, Parser)]
#[command(
    name = "ragline",
    about = "Query a RAG vector database by embedding similarity"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Embedding model name or HuggingFace model id
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Retrieve the most relevant chunks for a query
    Query(QueryArgs),
    /// Show vector database information
    Info(InfoArgs),
    /// List the known embedding models
    Models(ModelsArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Query --

#[derive(Debug, Parser)]
pub struct QueryArgs {
    /// The query text
    pub query: String,

    /// Path to the vector database (defaults to <data-dir>/database.json)
    #[arg(long)]
    pub database: Option<PathBuf>,

    /// Size of the first-stage candidate pool
    #[arg(long, default_value = "3")]
    pub top_k: usize,

    /// Number of results to return (must be <= top-k)
    #[arg(long, default_value = "1")]
    pub best_k: usize,

    /// Skip the reranking pass, return first-stage results directly
    #[arg(long)]
    pub no_rerank: bool,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Info --

#[derive(Debug, Parser)]
pub struct InfoArgs {
    /// Path to the vector database (defaults to <data-dir>/database.json)
    #[arg(long)]
    pub database: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Models --

#[derive(Debug, Parser)]
pub struct ModelsArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "ragline",
            &mut std::io::stdout(),
        );
    }
}
