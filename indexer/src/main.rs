use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use paperdex_core::{build_prompt, Corpus, Durability, GenerationOptions, QueryRequest, RagConfig, RankBy, Strategy};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "paperdex")]
#[command(about = "Ingest extracted paper text and retrieve context for question answering", long_about = None)]
struct Cli {
    /// Snapshot directory (falls back to PAPERDEX_DATA_DIR, then ./data/vector_store)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add plain-text documents from a file or a directory of .txt/.md files
    Add {
        /// Input path (file or directory)
        #[arg(long)]
        input: PathBuf,
        /// Document id for a single file (defaults to the file name)
        #[arg(long)]
        id: Option<String>,
        /// Extra metadata as key=value; values that parse as JSON are stored as JSON
        #[arg(long = "meta", value_parser = parse_key_val)]
        meta: Vec<(String, String)>,
    },
    /// Remove a document (unknown ids are ignored)
    Remove { doc_id: String },
    /// Remove every document
    Clear,
    /// List stored documents
    List,
    /// Corpus totals and per-document statistics
    Overview,
    /// Print the full text of a document
    Get { doc_id: String },
    /// Rank documents for a query
    Search {
        query: String,
        #[arg(long)]
        k: Option<usize>,
        /// keyword, vector or hybrid
        #[arg(long, default_value = "hybrid")]
        strategy: Strategy,
        /// Primary ranking signal for hybrid results: vector or keyword
        #[arg(long, default_value = "vector")]
        rank_by: RankBy,
    },
    /// Assemble the bounded, classified context for a query
    Context {
        query: String,
        #[arg(long)]
        k: Option<usize>,
        #[arg(long)]
        max_chars: Option<usize>,
    },
    /// Build the generation prompt for a question from retrieved context
    Prompt {
        question: String,
        #[arg(long)]
        k: Option<usize>,
        #[arg(long)]
        max_chars: Option<usize>,
    },
}

#[derive(Serialize)]
struct PromptOutput<'a> {
    template: paperdex_core::PromptTemplate,
    tag: paperdex_core::ContextTag,
    sources: &'a [String],
    options: GenerationOptions,
    prompt: &'a str,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    let mut config = RagConfig::from_env();
    if let Some(dir) = cli.data_dir {
        config.storage_dir = dir;
    }
    let corpus = Corpus::open(config);
    let top_k = |k: Option<usize>| k.unwrap_or(corpus.config().top_k);
    let max_chars = |n: Option<usize>| n.unwrap_or(corpus.config().max_context_chars);

    match cli.command {
        Commands::Add { input, id, meta } => add_documents(&corpus, &input, id, &meta),
        Commands::Remove { doc_id } => report(corpus.remove(&doc_id)),
        Commands::Clear => report(corpus.clear()),
        Commands::List => print_json(&corpus.list()),
        Commands::Overview => print_json(&corpus.overview()),
        Commands::Get { doc_id } => {
            println!("{}", corpus.get(&doc_id)?);
            Ok(())
        }
        Commands::Search { query, k, strategy, rank_by } => {
            let request = QueryRequest::new(&query, top_k(k)).strategy(strategy).rank_by(rank_by);
            print_json(&corpus.query(&request))
        }
        Commands::Context { query, k, max_chars: n } => print_json(&corpus.retrieve_context(&query, top_k(k), max_chars(n))),
        Commands::Prompt { question, k, max_chars: n } => {
            let ctx = corpus.retrieve_context(&question, top_k(k), max_chars(n));
            let prompt = build_prompt(&question, Some(&ctx));
            print_json(&PromptOutput {
                template: prompt.template,
                tag: ctx.tag,
                sources: &ctx.sources,
                options: GenerationOptions::default(),
                prompt: &prompt.text,
            })
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// A degraded write keeps the in-memory change for this process only, so it fails the command.
fn report(durability: Durability) -> Result<()> {
    if let Durability::Degraded(errors) = &durability {
        for e in errors {
            eprintln!("warning: {e}");
        }
        bail!("{durability}");
    }
    Ok(())
}

fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    let (k, v) = s.split_once('=').ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    if k.trim().is_empty() {
        return Err(format!("empty metadata key in '{s}'"));
    }
    Ok((k.trim().to_string(), v.to_string()))
}

fn metadata_for(path: &Path, pairs: &[(String, String)]) -> Map<String, Value> {
    let mut meta = Map::new();
    meta.insert("source_path".into(), Value::String(path.display().to_string()));
    for (k, v) in pairs {
        let value = serde_json::from_str(v).unwrap_or_else(|_| Value::String(v.clone()));
        meta.insert(k.clone(), value);
    }
    meta
}

fn collect_inputs(input: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "txt" | "md") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
        files.sort();
    } else if input.is_file() {
        files.push(input.to_path_buf());
    }
    files
}

fn add_documents(corpus: &Corpus, input: &Path, id: Option<String>, pairs: &[(String, String)]) -> Result<()> {
    let files = collect_inputs(input);
    if files.is_empty() {
        bail!("no .txt or .md input found at {}", input.display());
    }
    if id.is_some() && files.len() > 1 {
        bail!("--id can only be used with a single input file");
    }

    let mut added = 0usize;
    let mut errors = Vec::new();
    for file in &files {
        let text = fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
        if text.trim().is_empty() {
            tracing::warn!(path = %file.display(), "skipping file without text content");
            continue;
        }
        let doc_id = match &id {
            Some(id) => id.clone(),
            None => file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| file.display().to_string()),
        };
        match corpus.ingest(&doc_id, &text, Some(metadata_for(file, pairs)))? {
            Durability::Persisted => {}
            Durability::Degraded(errs) => errors.extend(errs),
        }
        added += 1;
    }
    tracing::info!(added, total = corpus.len(), "ingest complete");
    println!("added {added} document(s), corpus now holds {}", corpus.len());
    report(if errors.is_empty() { Durability::Persisted } else { Durability::Degraded(errors) })
}
