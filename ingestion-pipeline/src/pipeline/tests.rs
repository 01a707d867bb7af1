use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{site_chunk::SiteChunk, source::SourceKey},
    },
};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{IngestReport, IngestionConfig, IngestionPipeline, PipelineServices};
use crate::enricher::TitleSummary;

const TEST_DIMENSION: usize = 3;
const ROOT_URL: &str = "https://docs.example.com";

struct MockServices {
    sitemap: Vec<String>,
    pages: HashMap<String, String>,
    failing_urls: HashSet<String>,
    fail_sitemap: bool,
    fail_title_summary: bool,
    fail_embedding: bool,
    calls: Mutex<Vec<String>>,
}

impl MockServices {
    fn new(urls: &[&str]) -> Self {
        let pages = urls
            .iter()
            .map(|url| ((*url).to_owned(), two_paragraph_page()))
            .collect();

        Self {
            sitemap: urls.iter().map(|url| (*url).to_owned()).collect(),
            pages,
            failing_urls: HashSet::new(),
            fail_sitemap: false,
            fail_title_summary: false,
            fail_embedding: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    async fn record(&self, call: String) {
        self.calls.lock().await.push(call);
    }
}

#[async_trait]
impl PipelineServices for MockServices {
    async fn resolve_site_urls(&self, _root_url: &str) -> Result<Vec<String>, AppError> {
        self.record("resolve".to_owned()).await;
        if self.fail_sitemap {
            return Err(AppError::Resolution("mock sitemap failure".to_owned()));
        }
        Ok(self.sitemap.clone())
    }

    async fn fetch_page(&self, url: &str) -> Result<String, AppError> {
        self.record(format!("fetch:{url}")).await;
        if self.failing_urls.contains(url) {
            return Err(AppError::Crawl("mock crawl failure".to_owned()));
        }
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| AppError::Crawl(format!("no mock page for {url}")))
    }

    async fn extract_title_summary(
        &self,
        _chunk: &str,
        _url: &str,
    ) -> Result<TitleSummary, AppError> {
        if self.fail_title_summary {
            return Err(AppError::LLMParsing("mock completion failure".to_owned()));
        }
        Ok(TitleSummary {
            title: "Doc Title - Section".to_owned(),
            summary: "A short summary".to_owned(),
        })
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, AppError> {
        if self.fail_embedding {
            return Err(AppError::InternalError("mock embedding failure".to_owned()));
        }
        Ok(vec![0.25; TEST_DIMENSION])
    }

    fn embedding_dimension(&self) -> usize {
        TEST_DIMENSION
    }
}

/// ~2450 characters with a blank-line break near the 1000-character mark,
/// which the segmenter must turn into exactly three chunks.
fn two_paragraph_page() -> String {
    format!("{}\n\n{}", "a".repeat(950), "b".repeat(1500))
}

async fn setup_db() -> Arc<SurrealDbClient> {
    let namespace = "pipeline_test";
    let database = Uuid::new_v4().to_string();
    let db = SurrealDbClient::memory(namespace, &database)
        .await
        .expect("Failed to create in-memory SurrealDB");
    db.ensure_indexes(TEST_DIMENSION)
        .await
        .expect("Failed to define indexes");
    Arc::new(db)
}

fn pipeline(db: Arc<SurrealDbClient>, services: Arc<MockServices>) -> IngestionPipeline {
    IngestionPipeline::with_services(db, IngestionConfig::default(), services)
}

#[tokio::test]
async fn end_to_end_sitemap_ingestion_persists_every_chunk() {
    let db = setup_db().await;
    let services = Arc::new(MockServices::new(&[
        "https://docs.example.com/z-guide",
        "https://docs.example.com/a-guide",
    ]));
    let source = SourceKey::from_root_url(ROOT_URL);

    let report = pipeline(Arc::clone(&db), Arc::clone(&services))
        .ingest_site(ROOT_URL)
        .await;

    assert_eq!(
        report,
        IngestReport {
            pages_crawled: 2,
            pages_failed: 0,
            chunks_persisted: 6,
            chunks_failed: 0,
        }
    );

    // Pages come back sorted lexicographically, regardless of sitemap order.
    let urls = SiteChunk::distinct_urls(&db, &source)
        .await
        .expect("distinct urls");
    assert_eq!(
        urls,
        vec![
            "https://docs.example.com/a-guide".to_owned(),
            "https://docs.example.com/z-guide".to_owned()
        ]
    );

    let mut seen_ids = HashSet::new();
    for url in &urls {
        let chunks = SiteChunk::find_by_url(&db, &source, url)
            .await
            .expect("page chunks");
        let numbers: Vec<u32> = chunks.iter().map(|c| c.chunk_number).collect();
        assert_eq!(numbers, vec![0, 1, 2], "chunk numbers must be contiguous");

        // Expected boundaries: blank-line split at 950, then a hard cut.
        assert_eq!(chunks[0].content, "a".repeat(950));
        assert_eq!(chunks[1].content, "b".repeat(998));
        assert_eq!(chunks[2].content, "b".repeat(502));

        for chunk in &chunks {
            assert!(
                seen_ids.insert(chunk.id.clone()),
                "every (url, chunk_number) pair must map to a unique record"
            );
            assert_eq!(chunk.metadata.source, source.as_str());
        }
    }
    assert_eq!(seen_ids.len(), 6);
}

#[tokio::test]
async fn crawl_failure_does_not_block_other_urls() {
    let db = setup_db().await;
    let mut services = MockServices::new(&[
        "https://docs.example.com/first",
        "https://docs.example.com/second",
        "https://docs.example.com/third",
    ]);
    services
        .failing_urls
        .insert("https://docs.example.com/second".to_owned());
    let services = Arc::new(services);
    let source = SourceKey::from_root_url(ROOT_URL);

    let report = pipeline(Arc::clone(&db), Arc::clone(&services))
        .ingest_site(ROOT_URL)
        .await;

    assert_eq!(report.pages_crawled, 2);
    assert_eq!(report.pages_failed, 1);
    assert_eq!(report.chunks_persisted, 6);

    let first = SiteChunk::find_by_url(&db, &source, "https://docs.example.com/first")
        .await
        .expect("first page");
    let second = SiteChunk::find_by_url(&db, &source, "https://docs.example.com/second")
        .await
        .expect("second page");
    let third = SiteChunk::find_by_url(&db, &source, "https://docs.example.com/third")
        .await
        .expect("third page");

    assert_eq!(first.len(), 3);
    assert!(
        second.is_empty(),
        "a failed crawl must not persist partial chunks"
    );
    assert_eq!(third.len(), 3);
}

#[tokio::test]
async fn sitemap_failure_yields_empty_report() {
    let db = setup_db().await;
    let mut services = MockServices::new(&["https://docs.example.com/unreached"]);
    services.fail_sitemap = true;
    let services = Arc::new(services);
    let source = SourceKey::from_root_url(ROOT_URL);

    let report = pipeline(Arc::clone(&db), Arc::clone(&services))
        .ingest_site(ROOT_URL)
        .await;

    assert_eq!(report, IngestReport::default());

    let calls = services.calls.lock().await.clone();
    assert_eq!(calls, vec!["resolve".to_owned()], "no url may be fetched");

    let urls = SiteChunk::distinct_urls(&db, &source)
        .await
        .expect("distinct urls");
    assert!(urls.is_empty());
}

#[tokio::test]
async fn empty_sitemap_yields_empty_report() {
    let db = setup_db().await;
    let services = Arc::new(MockServices::new(&[]));

    let report = pipeline(db, services).ingest_site(ROOT_URL).await;
    assert_eq!(report, IngestReport::default());
}

#[tokio::test]
async fn enrichment_failures_degrade_without_dropping_chunks() {
    let db = setup_db().await;
    let mut services = MockServices::new(&["https://docs.example.com/degraded"]);
    services.fail_title_summary = true;
    services.fail_embedding = true;
    let services = Arc::new(services);
    let source = SourceKey::from_root_url(ROOT_URL);

    let report = pipeline(Arc::clone(&db), services).ingest_site(ROOT_URL).await;

    assert_eq!(report.pages_crawled, 1);
    assert_eq!(report.chunks_persisted, 3);
    assert_eq!(report.chunks_failed, 0);

    let chunks = SiteChunk::find_by_url(&db, &source, "https://docs.example.com/degraded")
        .await
        .expect("page chunks");
    assert_eq!(chunks.len(), 3);
    for chunk in &chunks {
        assert_eq!(chunk.title, "Error processing title");
        assert_eq!(chunk.summary, "Error processing summary");
        assert_eq!(chunk.embedding, vec![0.0; TEST_DIMENSION]);
    }
}
