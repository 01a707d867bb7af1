//! Read path: turns a natural-language question into a source-filtered
//! vector search and reconstructs full pages from stored chunks.

use std::sync::Arc;

use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{site_chunk::SiteChunk, source::SourceKey},
    },
    utils::embedding::EmbeddingProvider,
};
use tracing::{instrument, warn};

/// Returned instead of an error whenever a query matches nothing.
pub const NO_MATCHES_MESSAGE: &str = "No relevant documentation found.";

pub const DEFAULT_MATCH_LIMIT: u8 = 5;

const MATCH_SEPARATOR: &str = "\n\n---\n\n";

/// Marks where a chunk title switches from page title to section subtitle.
const TITLE_SUBTITLE_SEPARATOR: &str = " - ";

pub struct RetrievalEngine {
    db: Arc<SurrealDbClient>,
    embedding_provider: Arc<EmbeddingProvider>,
}

impl RetrievalEngine {
    pub fn new(db: Arc<SurrealDbClient>, embedding_provider: Arc<EmbeddingProvider>) -> Self {
        Self {
            db,
            embedding_provider,
        }
    }

    /// Embeds the query and returns the `limit` most similar chunks of the
    /// source, formatted for prompting.
    ///
    /// A failed query embedding degrades to a zero vector — low-quality
    /// matches, never an error.
    #[instrument(skip_all, fields(source = %source, limit))]
    pub async fn retrieve(
        &self,
        source: &SourceKey,
        query: &str,
        limit: u8,
    ) -> Result<String, AppError> {
        let embedding = match self.embedding_provider.embed(query).await {
            Ok(embedding) => embedding,
            Err(err) => {
                warn!(error = %err, "query embedding failed; degrading to zero vector");
                vec![0.0; self.embedding_provider.dimension()]
            }
        };

        self.retrieve_with_embedding(source, &embedding, limit).await
    }

    /// Same as [`Self::retrieve`] with the embedding supplied by the caller.
    pub async fn retrieve_with_embedding(
        &self,
        source: &SourceKey,
        embedding: &[f32],
        limit: u8,
    ) -> Result<String, AppError> {
        let matches = SiteChunk::find_similar(&self.db, source, embedding, limit).await?;

        if matches.is_empty() {
            return Ok(NO_MATCHES_MESSAGE.to_owned());
        }

        let formatted: Vec<String> = matches
            .into_iter()
            .map(|chunk| format!("# {}\n\n{}", chunk.title, chunk.content))
            .collect();

        Ok(formatted.join(MATCH_SEPARATOR))
    }

    /// The distinct, sorted urls ingested for a source.
    pub async fn list_pages(&self, source: &SourceKey) -> Result<Vec<String>, AppError> {
        SiteChunk::distinct_urls(&self.db, source).await
    }

    /// Reassembles one page from its chunks, in `chunk_number` order,
    /// headed by the page title derived from the first chunk.
    pub async fn get_page_content(
        &self,
        source: &SourceKey,
        url: &str,
    ) -> Result<String, AppError> {
        let chunks = SiteChunk::find_by_url(&self.db, source, url).await?;

        let Some(first) = chunks.first() else {
            return Ok(format!("No content found for URL: {url}"));
        };

        let page_title = first
            .title
            .split(TITLE_SUBTITLE_SEPARATOR)
            .next()
            .unwrap_or(first.title.as_str());

        let mut formatted = vec![format!("# {page_title}\n")];
        formatted.extend(chunks.iter().map(|chunk| chunk.content.clone()));

        Ok(formatted.join("\n\n"))
    }
}
