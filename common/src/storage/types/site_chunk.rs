use std::collections::BTreeSet;

use sha2::{Digest, Sha256};

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

use super::source::SourceKey;

stored_object!(SiteChunk, "site_page", {
    url: String,
    chunk_number: u32,
    title: String,
    summary: String,
    content: String,
    metadata: ChunkMetadata,
    embedding: Vec<f32>
});

/// Structured metadata persisted alongside every chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    pub source: String,
    pub chunk_size: usize,
    pub crawled_at: DateTime<Utc>,
    pub url_path: String,
}

impl SiteChunk {
    /// Builds a fully enriched chunk record. The record id is derived from
    /// `(source, url, chunk_number)` so re-ingesting the same page overwrites
    /// the previous records instead of duplicating them.
    pub fn new(
        source: &SourceKey,
        url: String,
        chunk_number: u32,
        title: String,
        summary: String,
        content: String,
        embedding: Vec<f32>,
    ) -> Self {
        let now = Utc::now();
        let url_path = url::Url::parse(&url)
            .map(|parsed| parsed.path().to_owned())
            .unwrap_or_default();
        let metadata = ChunkMetadata {
            source: source.as_str().to_owned(),
            chunk_size: content.len(),
            crawled_at: now,
            url_path,
        };

        Self {
            id: Self::record_id(source, &url, chunk_number),
            created_at: now,
            updated_at: now,
            url,
            chunk_number,
            title,
            summary,
            content,
            metadata,
            embedding,
        }
    }

    fn record_id(source: &SourceKey, url: &str, chunk_number: u32) -> String {
        let digest = Sha256::digest(format!("{source}\n{url}\n{chunk_number}").as_bytes());
        digest.iter().map(|byte| format!("{byte:02x}")).collect()
    }

    /// Writes the chunk, replacing any record with the same
    /// `(source, url, chunk_number)` key. Last write wins.
    pub async fn upsert(&self, db: &SurrealDbClient) -> Result<(), AppError> {
        db.upsert_item(self.clone()).await?;
        Ok(())
    }

    /// All chunks of one page, ascending by `chunk_number`.
    pub async fn find_by_url(
        db: &SurrealDbClient,
        source: &SourceKey,
        url: &str,
    ) -> Result<Vec<SiteChunk>, AppError> {
        let mut response = db
            .client
            .query(
                "SELECT * FROM type::table($table) \
                 WHERE metadata.source = $source AND url = $url \
                 ORDER BY chunk_number ASC",
            )
            .bind(("table", Self::table_name()))
            .bind(("source", source.as_str().to_owned()))
            .bind(("url", url.to_owned()))
            .await?;
        let chunks: Vec<SiteChunk> = response.take(0)?;
        Ok(chunks)
    }

    /// The distinct, lexicographically sorted urls ingested for a source.
    pub async fn distinct_urls(
        db: &SurrealDbClient,
        source: &SourceKey,
    ) -> Result<Vec<String>, AppError> {
        #[derive(Deserialize)]
        struct UrlRow {
            url: String,
        }

        let mut response = db
            .client
            .query("SELECT url FROM type::table($table) WHERE metadata.source = $source")
            .bind(("table", Self::table_name()))
            .bind(("source", source.as_str().to_owned()))
            .await?;
        let rows: Vec<UrlRow> = response.take(0)?;

        let urls: BTreeSet<String> = rows.into_iter().map(|row| row.url).collect();
        Ok(urls.into_iter().collect())
    }

    /// Nearest-neighbour lookup over the HNSW index, restricted to one
    /// source. Results come back best match first.
    pub async fn find_similar(
        db: &SurrealDbClient,
        source: &SourceKey,
        embedding: &[f32],
        limit: u8,
    ) -> Result<Vec<SiteChunk>, AppError> {
        let closest_query = format!(
            "SELECT *, vector::distance::knn() AS distance FROM {} \
             WHERE metadata.source = '{}' AND embedding <|{},40|> {:?} \
             ORDER BY distance",
            Self::table_name(),
            source.as_str(),
            limit,
            embedding
        );

        let chunks: Vec<SiteChunk> = db.client.query(closest_query).await?.take(0)?;
        Ok(chunks)
    }
}
