#![allow(clippy::missing_docs_in_private_items)]

pub mod crawler;
pub mod enricher;
pub mod pipeline;
pub mod segmenter;
pub mod sitemap;
pub mod utils;

pub use pipeline::{IngestReport, IngestionConfig, IngestionPipeline, PipelineServices};
