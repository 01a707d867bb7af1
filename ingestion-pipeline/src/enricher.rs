//! Per-chunk enrichment: title/summary extraction and embedding.

use common::storage::types::{site_chunk::SiteChunk, source::SourceKey};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::pipeline::PipelineServices;

pub const ERROR_TITLE: &str = "Error processing title";
pub const ERROR_SUMMARY: &str = "Error processing summary";

/// Structured result of the title/summary completion call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleSummary {
    pub title: String,
    pub summary: String,
}

impl TitleSummary {
    pub fn error_sentinel() -> Self {
        Self {
            title: ERROR_TITLE.to_owned(),
            summary: ERROR_SUMMARY.to_owned(),
        }
    }
}

/// Turns one segmented chunk into a fully populated record.
///
/// Both model calls run concurrently and are individually fault-isolated:
/// a failed completion yields the sentinel title/summary, a failed embedding
/// yields an all-zero vector of the provider dimension. Zero vectors rank
/// last in similarity search instead of crashing the pipeline, so this
/// function never fails.
pub async fn enrich_chunk(
    services: &dyn PipelineServices,
    source: &SourceKey,
    url: &str,
    chunk_number: u32,
    content: String,
) -> SiteChunk {
    let (extracted, embedding) = tokio::join!(
        services.extract_title_summary(&content, url),
        services.embed(&content)
    );

    let extracted = extracted.unwrap_or_else(|err| {
        warn!(
            %url,
            chunk_number,
            error = %err,
            "title/summary extraction failed; substituting sentinel values"
        );
        TitleSummary::error_sentinel()
    });

    let embedding = embedding.unwrap_or_else(|err| {
        warn!(
            %url,
            chunk_number,
            error = %err,
            "embedding failed; substituting zero vector"
        );
        vec![0.0; services.embedding_dimension()]
    });

    SiteChunk::new(
        source,
        url.to_owned(),
        chunk_number,
        extracted.title,
        extracted.summary,
        content,
        embedding,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::error::AppError;

    const TEST_DIMENSION: usize = 4;

    struct FakeServices {
        fail_title_summary: bool,
        fail_embedding: bool,
    }

    #[async_trait]
    impl PipelineServices for FakeServices {
        async fn resolve_site_urls(&self, _root_url: &str) -> Result<Vec<String>, AppError> {
            unreachable!("enrichment never resolves sitemaps")
        }

        async fn fetch_page(&self, _url: &str) -> Result<String, AppError> {
            unreachable!("enrichment never fetches pages")
        }

        async fn extract_title_summary(
            &self,
            _chunk: &str,
            _url: &str,
        ) -> Result<TitleSummary, AppError> {
            if self.fail_title_summary {
                Err(AppError::LLMParsing("completion capability down".into()))
            } else {
                Ok(TitleSummary {
                    title: "Install Guide".into(),
                    summary: "How to install the tool".into(),
                })
            }
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, AppError> {
            if self.fail_embedding {
                Err(AppError::InternalError("embedding capability down".into()))
            } else {
                Ok(vec![0.5; TEST_DIMENSION])
            }
        }

        fn embedding_dimension(&self) -> usize {
            TEST_DIMENSION
        }
    }

    fn source() -> SourceKey {
        SourceKey::from_root_url("https://docs.example.com")
    }

    #[tokio::test]
    async fn successful_enrichment_populates_every_field() {
        let services = FakeServices {
            fail_title_summary: false,
            fail_embedding: false,
        };

        let chunk = enrich_chunk(
            &services,
            &source(),
            "https://docs.example.com/guide/install",
            2,
            "Install with the package manager.".to_owned(),
        )
        .await;

        assert_eq!(chunk.title, "Install Guide");
        assert_eq!(chunk.summary, "How to install the tool");
        assert_eq!(chunk.chunk_number, 2);
        assert_eq!(chunk.embedding, vec![0.5; TEST_DIMENSION]);
        assert_eq!(chunk.metadata.url_path, "/guide/install");
        assert_eq!(
            chunk.metadata.chunk_size,
            "Install with the package manager.".len()
        );
    }

    #[tokio::test]
    async fn completion_failure_yields_exact_sentinels() {
        let services = FakeServices {
            fail_title_summary: true,
            fail_embedding: false,
        };

        let chunk = enrich_chunk(
            &services,
            &source(),
            "https://docs.example.com/guide",
            0,
            "Some chunk text.".to_owned(),
        )
        .await;

        assert_eq!(chunk.title, "Error processing title");
        assert_eq!(chunk.summary, "Error processing summary");
        assert_eq!(
            chunk.embedding,
            vec![0.5; TEST_DIMENSION],
            "embedding must be unaffected by the completion failure"
        );
    }

    #[tokio::test]
    async fn embedding_failure_yields_zero_vector_of_expected_dimension() {
        let services = FakeServices {
            fail_title_summary: false,
            fail_embedding: true,
        };

        let chunk = enrich_chunk(
            &services,
            &source(),
            "https://docs.example.com/guide",
            0,
            "Some chunk text.".to_owned(),
        )
        .await;

        assert_eq!(chunk.embedding.len(), TEST_DIMENSION);
        assert!(chunk.embedding.iter().all(|value| *value == 0.0));
        assert_eq!(
            chunk.title, "Install Guide",
            "title must be unaffected by the embedding failure"
        );
    }
}
