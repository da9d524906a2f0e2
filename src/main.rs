use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

pub mod cli;
pub mod data_dir;
pub mod database;
pub mod embedder;
pub mod engine;
pub mod error;
pub mod filter;
pub mod matcher;
pub mod reranker;

use cli::{Cli, Command};
use data_dir::DataDir;
use database::Database;
use engine::{Retrieval, Retriever, RetrieverConfig};

fn init_tracing(verbose: u8) {
    let filter = if let Ok(env) = std::env::var("RAGLINE_LOG") {
        EnvFilter::new(env)
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Query(args) => {
            let database_path = resolve_database(cli.data_dir.as_deref(), args.database.as_ref())?;
            let model_name = embedder::resolve_model_name(cli.model.as_deref());
            let model = embedder::create(&model_name)?;

            let config = RetrieverConfig {
                top_k: args.top_k,
                best_k: args.best_k,
                reranking: !args.no_rerank,
            };
            let retriever = Retriever::new(config, model, &database_path)?;
            let result = retriever.retrieve(&args.query)?;

            if args.json {
                format_json(&result, &args.query)?;
            } else {
                format_human(&result);
            }
        }
        Command::Info(args) => {
            let database_path = resolve_database(cli.data_dir.as_deref(), args.database.as_ref())?;
            let database = Database::load(&database_path)?;
            print_info(&database, args.json)?;
        }
        Command::Models(args) => {
            print_models(args.json)?;
        }
        Command::Completions(args) => {
            args.generate();
        }
    }

    Ok(())
}

fn resolve_database(
    data_dir: Option<&std::path::Path>,
    explicit: Option<&PathBuf>,
) -> error::Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.clone()),
        None => Ok(DataDir::resolve(data_dir)?.database_file()),
    }
}

/// Format results for human-readable terminal output.
fn format_human(result: &Retrieval) {
    for (i, ((chunk, score), meta)) in result
        .chunks
        .iter()
        .zip(&result.scores)
        .zip(&result.metadata)
        .enumerate()
    {
        println!("{:>3}. [{:.3}] {}", i + 1, score, meta.source);
        if !chunk.is_empty() {
            println!("     {chunk}");
        }
    }
    println!("\n{} result(s)", result.chunks.len());
}

#[derive(serde::Serialize)]
struct ResultRow<'a> {
    rank: usize,
    score: f32,
    chunk: &'a str,
    metadata: serde_json::Value,
}

#[derive(serde::Serialize)]
struct QueryOutput<'a> {
    query: &'a str,
    result_count: usize,
    results: Vec<ResultRow<'a>>,
}

/// Format results as JSON output.
fn format_json(result: &Retrieval, query: &str) -> error::Result<()> {
    let results: Vec<ResultRow> = result
        .chunks
        .iter()
        .zip(&result.scores)
        .zip(&result.metadata)
        .enumerate()
        .map(|(i, ((chunk, score), meta))| ResultRow {
            rank: i + 1,
            score: *score,
            chunk,
            metadata: meta.to_json(),
        })
        .collect();

    let out = QueryOutput {
        query,
        result_count: results.len(),
        results,
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

#[derive(serde::Serialize)]
struct InfoOutput<'a> {
    description: Option<&'a str>,
    embedding_model: Option<&'a str>,
    generator_files: &'a [String],
    chunks: usize,
    embedding_dim: usize,
}

#[derive(serde::Serialize)]
struct ModelEntry<'a> {
    name: &'a str,
    model_id: &'a str,
    default: bool,
}

fn print_models(json: bool) -> error::Result<()> {
    let entries: Vec<ModelEntry> = embedder::KNOWN_MODELS
        .iter()
        .map(|(name, model_id)| ModelEntry {
            name,
            model_id,
            default: *name == embedder::DEFAULT_MODEL_NAME,
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for entry in &entries {
            let marker = if entry.default { " (default)" } else { "" };
            println!("{} -> {}{marker}", entry.name, entry.model_id);
        }
        println!("\nAny HuggingFace model id (org/name) is also accepted.");
    }
    Ok(())
}

fn print_info(database: &Database, json: bool) -> error::Result<()> {
    let index = database.index();
    if json {
        let out = InfoOutput {
            description: database.description(),
            embedding_model: database.embedding_model(),
            generator_files: database.generator_files(),
            chunks: index.len(),
            embedding_dim: index.dim(),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!(
            "Description:     {}",
            database.description().unwrap_or("(none)")
        );
        println!(
            "Embedding model: {}",
            database.embedding_model().unwrap_or("(not recorded)")
        );
        println!("Chunks:          {}", index.len());
        println!("Embedding dim:   {}", index.dim());
        if !database.generator_files().is_empty() {
            println!("Generated from:");
            for file in database.generator_files() {
                println!("  - {file}");
            }
        }
    }
    Ok(())
}
