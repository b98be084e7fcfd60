use std::env;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use triage_core::config::{expand_path, Config, Settings};
use triage_core::data_processor::{DataProcessor, SourceRecord};
use triage_core::traits::{DenseEmbedder, SparseEncoder};
use triage_embed::embedder_from_settings;
use triage_llm::OpenAiChatModel;
use triage_pipeline::TriageAgent;
use triage_store::{open_store, Ingestor, OpenedStore};
use triage_text::LexicalEncoder;

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().collect();
    let prog = args.remove(0);
    if args.is_empty() {
        eprintln!("Usage: {prog} <ingest|ask> [args...]");
        std::process::exit(1);
    }
    let cmd = args.remove(0);
    (cmd, args)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn load_records(settings: &Settings, args: &[String]) -> anyhow::Result<Vec<SourceRecord>> {
    let feedback = expand_path(args.first().unwrap_or(&settings.data.feedback_file));
    let bugs = expand_path(args.get(1).unwrap_or(&settings.data.bug_file));
    let processor = DataProcessor::new()?;
    let records = processor
        .load_all(&feedback, &bugs)
        .with_context(|| format!("loading {} and {}", feedback.display(), bugs.display()))?;
    info!(count = records.len(), "loaded source records");
    Ok(records)
}

/// Opens the configured store and seeds it when it is new.
async fn prepared_store(
    settings: &Settings,
    records_args: &[String],
) -> anyhow::Result<OpenedStore> {
    let dense: Arc<dyn DenseEmbedder> =
        Arc::from(embedder_from_settings(&settings.embedding, settings.store.dense_dim)?);
    let sparse: Arc<dyn SparseEncoder> = Arc::new(LexicalEncoder::new());
    let opened = open_store(settings, dense.clone(), sparse.clone()).await?;
    if opened.needs_seed {
        let records = load_records(settings, records_args)?;
        Ingestor::new(dense, sparse).ingest(opened.store.as_ref(), &records).await?;
    } else {
        info!("store already populated, skipping ingestion");
    }
    Ok(opened)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {e}");
        e
    })?;
    let settings = config.settings()?;
    let (cmd, args) = parse_args();
    match cmd.as_str() {
        "ingest" => {
            let opened = prepared_store(&settings, &args).await?;
            println!("Store holds {} documents", opened.store.len().await?);
        }
        "ask" => {
            let Some(text) = args.first().filter(|t| !t.trim().is_empty()) else {
                eprintln!("Usage: triage ask \"<question or issue report>\"");
                std::process::exit(1);
            };
            let model = Arc::new(OpenAiChatModel::from_settings(&settings.llm)?);
            let opened = prepared_store(&settings, &[]).await?;
            let agent = TriageAgent::new(model, opened.store, &settings);
            match agent.handle(text).await {
                Ok(response) => println!("{}", serde_json::to_string_pretty(&response)?),
                Err(err) => {
                    eprintln!("{err}");
                    std::process::exit(2);
                }
            }
        }
        _ => {
            eprintln!("Unknown command: {cmd}");
            std::process::exit(1);
        }
    }
    Ok(())
}
