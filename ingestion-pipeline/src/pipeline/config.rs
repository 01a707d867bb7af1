use crate::segmenter::DEFAULT_CHUNK_SIZE;

#[derive(Debug, Clone)]
pub struct IngestionConfig {
    /// Target chunk size in characters handed to the segmenter.
    pub chunk_size: usize,
    /// Maximum number of pages crawled concurrently.
    pub max_concurrency: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_concurrency: 5,
        }
    }
}
