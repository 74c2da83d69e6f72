//! CLI entry point for docrag: ingest documents into the vector store and query them.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use docrag_core::{
    app_data_dir, extract_fields, extract_text, load_config, scan_documents, set_llm_model,
    set_store_dir, status, RagPipeline, MAX_K,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docrag")]
#[command(about = "docrag: ask questions about your scanned documents")]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Show backend status and effective config.
    Status,
    /// Show where docrag stores its config and index (app data directory).
    DataDir,
    /// Extract, chunk, embed and store a document (or every document under a directory).
    Ingest {
        #[arg(value_name = "PATH")]
        path: PathBuf,
        /// Document id to store chunks under (single file only). Default: <file name>-<random>.
        #[arg(long)]
        doc_id: Option<String>,
        /// OCR language (tesseract code). Default from config.
        #[arg(long)]
        lang: Option<String>,
        /// Store text without masking PAN/Aadhaar/IFSC/account numbers.
        #[arg(long)]
        no_redact: bool,
        #[arg(long)]
        json: bool,
    },
    /// Answer a question from the stored documents.
    Query {
        #[arg(value_name = "QUESTION")]
        query: String,
        /// Number of chunks to retrieve (1 to 10000).
        #[arg(
            short,
            default_value_t = 5,
            value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..=MAX_K as u64)
        )]
        k: usize,
        /// Skip the LLM and return the top contexts.
        #[arg(long)]
        no_llm: bool,
        #[arg(long)]
        json: bool,
    },
    /// Extract loan fields (amount, EMI, ROI, tenure, date) from a document.
    Fields {
        #[arg(value_name = "PATH")]
        path: PathBuf,
        /// OCR language (tesseract code). Default from config.
        #[arg(long)]
        lang: Option<String>,
    },
    /// Set and persist the vector store directory.
    SetStore {
        #[arg(value_name = "DIR")]
        path: PathBuf,
    },
    /// Set and persist the Ollama model used to write answers.
    SetLlm {
        #[arg(value_name = "MODEL")]
        model: String,
    },
}

#[derive(Serialize)]
struct IngestResponse<'a> {
    doc_id: &'a str,
    chunks: usize,
    tokens: usize,
}

#[derive(Serialize)]
struct QueryResponse<'a> {
    answer: &'a str,
    contexts: &'a [String],
    scores: &'a [f32],
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.command.unwrap_or(Commands::Status)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config();

    match command {
        Commands::Status => {
            println!("docrag backend");
            println!("  core: {}", status());
            match config.store_dir() {
                Ok(dir) => println!("  store: {}", dir.display()),
                Err(e) => println!("  store: ({})", e),
            }
            println!("  ollama: {}", config.ollama_url);
            println!("  embed model: {}", config.embed_model);
            println!(
                "  llm model: {}",
                config.llm_model.as_deref().unwrap_or("(not configured)")
            );
        }
        Commands::DataDir => match app_data_dir() {
            Some(p) => println!("{}", p.display()),
            None => eprintln!("Could not determine app data directory."),
        },
        Commands::Ingest {
            path,
            doc_id,
            lang,
            no_redact,
            json,
        } => {
            let files = scan_documents(&path)?;
            if doc_id.is_some() && files.len() > 1 {
                return Err("--doc-id can only be used with a single file".into());
            }
            let lang = lang.unwrap_or_else(|| config.ocr_lang.clone());
            let mut pipeline = RagPipeline::from_config(&config)?;
            for file in files {
                let report = pipeline
                    .ingest_file(&file, doc_id.as_deref(), &lang, !no_redact)
                    .await?;
                if json {
                    let out = IngestResponse {
                        doc_id: &report.doc_id,
                        chunks: report.chunks,
                        tokens: report.tokens,
                    };
                    println!("{}", serde_json::to_string(&out)?);
                } else {
                    println!(
                        "{}  {} chunk(s), ~{} tokens  [{}]",
                        file.display(),
                        report.chunks,
                        report.tokens,
                        report.doc_id
                    );
                }
                if let Some(w) = report.warning {
                    eprintln!("  warning: no text extracted ({})", w);
                }
            }
        }
        Commands::Query {
            query,
            k,
            no_llm,
            json,
        } => {
            let mut pipeline = RagPipeline::from_config(&config)?;
            let ans = pipeline.answer(&query, k, !no_llm).await?;
            if json {
                let out = QueryResponse {
                    answer: &ans.answer,
                    contexts: &ans.contexts,
                    scores: &ans.scores,
                };
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("{}", ans.answer);
                println!();
                for (i, (ctx, score)) in ans.contexts.iter().zip(&ans.scores).enumerate() {
                    if ctx.is_empty() {
                        continue;
                    }
                    let first = ctx.lines().next().unwrap_or("").trim();
                    let preview: String = first.chars().take(60).collect();
                    let ellipsis = if first.chars().count() > 60 { "..." } else { "" };
                    println!("  [{}] {:.3}  {}{}", i + 1, score, preview, ellipsis);
                }
            }
        }
        Commands::Fields { path, lang } => {
            let lang = lang.unwrap_or_else(|| config.ocr_lang.clone());
            let extraction = extract_text(&path, &lang);
            if let Some(reason) = extraction.reason() {
                eprintln!("warning: no text extracted ({})", reason);
            }
            let fields = extract_fields(extraction.value());
            println!("{}", serde_json::to_string_pretty(&fields)?);
        }
        Commands::SetStore { path } => {
            set_store_dir(&path)?;
            println!("Store directory set to {}", path.display());
        }
        Commands::SetLlm { model } => {
            set_llm_model(&model)?;
            println!("LLM model set to {}", model);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query_k(args: &[&str]) -> Result<usize, clap::Error> {
        let cli = Cli::try_parse_from(args)?;
        match cli.command {
            Some(Commands::Query { k, .. }) => Ok(k),
            _ => panic!("expected query command"),
        }
    }

    #[test]
    fn query_k_defaults_to_five() {
        assert_eq!(query_k(&["docrag", "query", "emi?"]).unwrap(), 5);
    }

    #[test]
    fn query_k_is_bounded() {
        assert_eq!(query_k(&["docrag", "query", "emi?", "-k", "10000"]).unwrap(), MAX_K);
        assert!(query_k(&["docrag", "query", "emi?", "-k", "0"]).is_err());
        assert!(query_k(&["docrag", "query", "emi?", "-k", "10001"]).is_err());
        assert!(query_k(&["docrag", "query", "emi?", "-k", "18446744073709551615"]).is_err());
    }
}
