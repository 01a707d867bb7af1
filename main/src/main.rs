use std::sync::Arc;

use clap::{Parser, Subcommand};
use common::{
    storage::{db::SurrealDbClient, types::source::SourceKey},
    utils::{config::get_config, embedding::EmbeddingProvider},
};
use ingestion_pipeline::{crawler::HeadlessChromeCrawler, IngestionConfig, IngestionPipeline};
use retrieval_pipeline::{RetrievalEngine, DEFAULT_MATCH_LIMIT};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "docdex",
    about = "Ingest documentation sites and query them semantically",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a site's sitemap and ingest every listed page
    Ingest { root_url: String },
    /// List the pages ingested for a site
    Pages { root_url: String },
    /// Print the reconstructed content of one ingested page
    Page { root_url: String, url: String },
    /// Answer a question from a site's ingested documentation
    Query {
        root_url: String,
        question: String,
        #[arg(short, long, default_value_t = DEFAULT_MATCH_LIMIT)]
        limit: u8,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let config = get_config()?;

    let db = Arc::new(
        SurrealDbClient::new(
            &config.surrealdb_address,
            &config.surrealdb_username,
            &config.surrealdb_password,
            &config.surrealdb_namespace,
            &config.surrealdb_database,
        )
        .await?,
    );
    db.ensure_indexes(config.embedding_dimensions as usize)
        .await?;

    let openai_client = Arc::new(async_openai::Client::with_config(
        async_openai::config::OpenAIConfig::new()
            .with_api_key(&config.openai_api_key)
            .with_api_base(&config.openai_base_url),
    ));

    let embedding_provider = Arc::new(EmbeddingProvider::new_openai(
        Arc::clone(&openai_client),
        config.embedding_model.clone(),
        config.embedding_dimensions,
    ));
    info!(
        embedding_backend = embedding_provider.backend_label(),
        embedding_dimension = embedding_provider.dimension(),
        "Embedding provider initialized"
    );

    match cli.command {
        Command::Ingest { root_url } => {
            let pipeline = IngestionPipeline::new(
                db,
                openai_client,
                embedding_provider,
                Arc::new(HeadlessChromeCrawler),
                reqwest::Client::new(),
                config.llm_model.clone(),
                IngestionConfig {
                    chunk_size: config.chunk_size,
                    max_concurrency: config.crawl_concurrency,
                },
            );

            let report = pipeline.ingest_site(&root_url).await;
            println!(
                "crawled {} pages ({} failed); persisted {} chunks ({} failed)",
                report.pages_crawled,
                report.pages_failed,
                report.chunks_persisted,
                report.chunks_failed
            );
        }
        Command::Pages { root_url } => {
            let engine = RetrievalEngine::new(db, embedding_provider);
            let source = SourceKey::from_root_url(&root_url);
            for url in engine.list_pages(&source).await? {
                println!("{url}");
            }
        }
        Command::Page { root_url, url } => {
            let engine = RetrievalEngine::new(db, embedding_provider);
            let source = SourceKey::from_root_url(&root_url);
            println!("{}", engine.get_page_content(&source, &url).await?);
        }
        Command::Query {
            root_url,
            question,
            limit,
        } => {
            let engine = RetrievalEngine::new(db, embedding_provider);
            let source = SourceKey::from_root_url(&root_url);
            println!("{}", engine.retrieve(&source, &question, limit).await?);
        }
    }

    Ok(())
}
