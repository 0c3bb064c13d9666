use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use sift_core::{BuildSession, DocumentInput, EngineConfig, SledStore};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct InputDoc {
    id: String,
    #[serde(default)]
    title: String,
    body: String,
    url: Option<String>,
    description: Option<String>,
}

#[derive(Parser)]
#[command(name = "sift-indexer")]
#[command(about = "Build the TF-IDF index and autocomplete table", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from input JSON/JSONL files or a directory
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
        /// Engine config (JSON); defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, config } => {
            let config = match config {
                Some(path) => EngineConfig::from_json_file(&path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => EngineConfig::default(),
            };
            build_index(Path::new(&input), Path::new(&output), config)
        }
    }
}

fn build_index(input: &Path, output: &Path, config: EngineConfig) -> Result<()> {
    let store = SledStore::create(output).with_context(|| format!("creating index at {}", output.display()))?;
    let mut session = BuildSession::new(store, config)?;
    let mut skipped = 0usize;

    for file in input_files(input) {
        tracing::info!(file = %file.display(), "indexing");
        let is_jsonl = file.extension().and_then(|s| s.to_str()) == Some("jsonl");
        let result = if is_jsonl {
            index_jsonl(&file, &mut session, &mut skipped)
        } else {
            index_json(&file, &mut session, &mut skipped)
        };
        if let Err(e) = result {
            tracing::warn!(file = %file.display(), error = %e, "skipping unreadable file");
            skipped += 1;
        }
    }

    tracing::info!(num_docs = session.num_docs(), num_terms = session.codec().len(), skipped, "ingested documents");
    let summary = session.finish().context("finalizing index")?;
    tracing::info!(output = %output.display(), num_docs = summary.num_docs, postings = summary.postings_updated, "index ready");
    Ok(())
}

fn input_files(input: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    }
    files
}

fn index_jsonl(file: &Path, session: &mut BuildSession<SledStore>, skipped: &mut usize) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<InputDoc>(&line) {
            Ok(doc) => ingest_doc(doc, file, session, skipped),
            Err(e) => {
                tracing::warn!(file = %file.display(), line = lineno + 1, error = %e, "skipping malformed record");
                *skipped += 1;
            }
        }
    }
    Ok(())
}

fn index_json(file: &Path, session: &mut BuildSession<SledStore>, skipped: &mut usize) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    let records = match json {
        serde_json::Value::Array(arr) => arr,
        obj @ serde_json::Value::Object(_) => vec![obj],
        _ => Vec::new(),
    };
    for v in records {
        match serde_json::from_value::<InputDoc>(v) {
            Ok(doc) => ingest_doc(doc, file, session, skipped),
            Err(e) => {
                tracing::warn!(file = %file.display(), error = %e, "skipping malformed record");
                *skipped += 1;
            }
        }
    }
    Ok(())
}

fn ingest_doc(doc: InputDoc, file: &Path, session: &mut BuildSession<SledStore>, skipped: &mut usize) {
    let name = doc.id.clone();
    let input = DocumentInput {
        name: doc.id,
        title: doc.title,
        path: file.display().to_string(),
        url: doc.url,
        description: doc.description,
        content: doc.body.into_bytes(),
    };
    if let Err(e) = session.add_document(input) {
        tracing::warn!(doc = %name, error = %e, "skipping document");
        *skipped += 1;
    }
}
