mod config;
mod services;

pub use config::IngestionConfig;
#[allow(clippy::module_name_repetitions)]
pub use services::{DefaultPipelineServices, PipelineServices};

use std::sync::Arc;

use common::{
    storage::{db::SurrealDbClient, types::source::SourceKey},
    utils::embedding::EmbeddingProvider,
};
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::{crawler::PageCrawler, enricher::enrich_chunk, segmenter::segment};

/// Aggregate counts for one `ingest_site` invocation. Individual failures
/// are already logged per url/chunk; this is the caller-facing summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub pages_crawled: usize,
    pub pages_failed: usize,
    pub chunks_persisted: usize,
    pub chunks_failed: usize,
}

enum PageOutcome {
    Crawled { persisted: usize, failed: usize },
    Failed,
}

/// Bounded-concurrency supervisor over the crawl → segment → enrich →
/// persist chain.
#[allow(clippy::module_name_repetitions)]
pub struct IngestionPipeline {
    db: Arc<SurrealDbClient>,
    config: IngestionConfig,
    services: Arc<dyn PipelineServices>,
}

impl IngestionPipeline {
    pub fn new(
        db: Arc<SurrealDbClient>,
        openai_client: Arc<async_openai::Client<async_openai::config::OpenAIConfig>>,
        embedding_provider: Arc<EmbeddingProvider>,
        crawler: Arc<dyn PageCrawler>,
        http: reqwest::Client,
        llm_model: String,
        config: IngestionConfig,
    ) -> Self {
        let services = DefaultPipelineServices::new(
            openai_client,
            embedding_provider,
            crawler,
            http,
            llm_model,
        );

        Self::with_services(db, config, Arc::new(services))
    }

    pub fn with_services(
        db: Arc<SurrealDbClient>,
        config: IngestionConfig,
        services: Arc<dyn PipelineServices>,
    ) -> Self {
        Self {
            db,
            config,
            services,
        }
    }

    /// Resolves the site's sitemap and ingests every listed page.
    ///
    /// Sitemap failure is non-fatal: it is logged and treated as "nothing
    /// to crawl". Per-url and per-chunk failures never abort their
    /// siblings.
    #[tracing::instrument(skip_all, fields(root_url = %root_url))]
    pub async fn ingest_site(&self, root_url: &str) -> IngestReport {
        let urls = match self.services.resolve_site_urls(root_url).await {
            Ok(urls) => urls,
            Err(err) => {
                warn!(error = %err, "sitemap resolution failed; nothing to crawl");
                return IngestReport::default();
            }
        };

        if urls.is_empty() {
            info!("sitemap contained no urls");
            return IngestReport::default();
        }

        let source = SourceKey::from_root_url(root_url);
        info!(
            source = %source,
            url_count = urls.len(),
            max_concurrency = self.config.max_concurrency,
            "starting site ingestion"
        );

        self.crawl_parallel(&source, urls).await
    }

    async fn crawl_parallel(&self, source: &SourceKey, urls: Vec<String>) -> IngestReport {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));

        let tasks = urls.into_iter().map(|url| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        warn!(%url, "crawl admission gate closed; skipping url");
                        return PageOutcome::Failed;
                    }
                };

                self.process_url(source, &url).await
            }
        });

        let mut report = IngestReport::default();
        for outcome in join_all(tasks).await {
            match outcome {
                PageOutcome::Crawled { persisted, failed } => {
                    report.pages_crawled += 1;
                    report.chunks_persisted += persisted;
                    report.chunks_failed += failed;
                }
                PageOutcome::Failed => report.pages_failed += 1,
            }
        }

        info!(
            pages_crawled = report.pages_crawled,
            pages_failed = report.pages_failed,
            chunks_persisted = report.chunks_persisted,
            chunks_failed = report.chunks_failed,
            "site ingestion finished"
        );

        report
    }

    async fn process_url(&self, source: &SourceKey, url: &str) -> PageOutcome {
        let markdown = match self.services.fetch_page(url).await {
            Ok(text) => text,
            Err(err) => {
                warn!(%url, error = %err, "crawl failed; skipping url");
                return PageOutcome::Failed;
            }
        };
        info!(%url, "Successfully crawled");

        // Chunk numbers are fixed here, before any concurrent work, so
        // reconstruction order survives out-of-order completion.
        let chunks = segment(&markdown, self.config.chunk_size);

        let enriched = join_all(chunks.into_iter().enumerate().map(|(number, content)| {
            let chunk_number = u32::try_from(number).unwrap_or(u32::MAX);
            enrich_chunk(self.services.as_ref(), source, url, chunk_number, content)
        }))
        .await;

        let results = join_all(enriched.iter().map(|chunk| async move {
            match chunk.upsert(&self.db).await {
                Ok(()) => {
                    debug!(
                        url = %chunk.url,
                        chunk_number = chunk.chunk_number,
                        "chunk persisted"
                    );
                    true
                }
                Err(err) => {
                    warn!(
                        url = %chunk.url,
                        chunk_number = chunk.chunk_number,
                        error = %err,
                        "failed to persist chunk; dropping it"
                    );
                    false
                }
            }
        }))
        .await;

        let persisted = results.iter().filter(|stored| **stored).count();
        PageOutcome::Crawled {
            persisted,
            failed: results.len() - persisted,
        }
    }
}

#[cfg(test)]
mod tests;
