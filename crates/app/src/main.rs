use chrono::Utc;
use clap::{Parser, Subcommand};
use image_rag_core::{
    CollectionStore, EngineError, EngineOptions, OllamaConfig, OllamaEmbedder, OllamaGenerator,
    OllamaVisionExtractor, PromptTemplate, RagEngine,
};
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "image-rag", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Ollama base URL
    #[arg(long, default_value = "http://localhost:11434")]
    ollama_url: String,

    /// Embedding model name
    #[arg(long, default_value = "nomic-embed-text")]
    embedding_model: String,

    /// Generation model name
    #[arg(long, default_value = "llama3.2")]
    generation_model: String,

    /// Multimodal model used to extract text from images
    #[arg(long, default_value = "llama3.2-vision")]
    vision_model: String,

    /// Directory holding the persisted index
    #[arg(long, default_value = "index_storage")]
    persist_dir: String,

    /// Collection name inside the persistence directory
    #[arg(long, default_value = "image_texts")]
    collection: String,

    /// Maximum chunk length in characters
    #[arg(long, default_value = "1000")]
    chunk_size: usize,

    /// Characters of trailing context carried between consecutive chunks
    #[arg(long, default_value = "400")]
    overlap: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Extract text from every image in a folder and index the chunks.
    Ingest {
        /// Folder containing images, scanned recursively.
        #[arg(long)]
        folder: String,
    },
    /// Retrieve the most relevant chunks and answer a question.
    Ask {
        /// Question to answer; prompts on stdin when omitted.
        #[arg(long)]
        query: Option<String>,
        /// Number of chunks to retrieve.
        #[arg(long, default_value = "5")]
        top_k: usize,
        /// Print the retrieved context alongside the answer.
        #[arg(long, default_value_t = false)]
        show_context: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let provider = OllamaConfig {
        base_url: cli.ollama_url.clone(),
        embedding_model: cli.embedding_model.clone(),
        generation_model: cli.generation_model.clone(),
        vision_model: cli.vision_model.clone(),
        ..OllamaConfig::default()
    };

    let options = EngineOptions {
        chunk_size: cli.chunk_size,
        chunk_overlap: cli.overlap,
        top_k: 5,
    };

    let store = CollectionStore::open(Path::new(&cli.persist_dir), &cli.collection)?;
    let mut engine = RagEngine::new(
        OllamaVisionExtractor::new(&provider)?,
        OllamaEmbedder::new(&provider)?,
        OllamaGenerator::new(&provider)?,
        store,
        options,
        PromptTemplate::default(),
    )?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        collection = %cli.collection,
        "image-rag boot"
    );

    match cli.command {
        Command::Ingest { folder } => {
            let report = engine.ingest_folder(Path::new(&folder)).await?;

            if !report.skipped.is_empty() {
                warn!("skipped_images={} for folder={}", report.skipped.len(), folder);
                for skipped in &report.skipped {
                    warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped image");
                }
            }

            println!(
                "{} chunks ingested from {} image(s) at {}",
                report.chunk_count,
                report.documents.len(),
                Utc::now().to_rfc3339()
            );
        }
        Command::Ask {
            query,
            top_k,
            show_context,
        } => {
            let question = match query {
                Some(question) => question,
                None => prompt_for_query()?,
            };

            let retrieved = engine.retrieve(&question, top_k).await?;
            if retrieved.is_empty() {
                println!("no context found in collection '{}'", cli.collection);
                return Ok(());
            }

            if show_context {
                for hit in &retrieved.hits {
                    println!("[score={:.4}] {}", hit.score, hit.record.id);
                    println!("{}\n", hit.record.text);
                }
            }

            match engine.generate_answer(&retrieved, &question).await {
                Ok(answer) => {
                    println!("Response: {answer}");
                    println!("Sources: {:?}", retrieved.sources());
                }
                Err(error @ EngineError::Generation(_)) => {
                    warn!(%error, "generation failed, falling back to raw context");
                    println!("no answer could be generated ({error})");
                    println!("retrieved context, best match first:");
                    for hit in &retrieved.hits {
                        println!("[score={:.4}] {}", hit.score, hit.record.id);
                        println!("{}\n", hit.record.text);
                    }
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    Ok(())
}

fn prompt_for_query() -> anyhow::Result<String> {
    print!("Enter query : ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
