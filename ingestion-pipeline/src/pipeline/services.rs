use std::sync::Arc;

use async_openai::types::{
    ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs, ResponseFormat,
    ResponseFormatJsonSchema,
};
use async_trait::async_trait;
use common::{error::AppError, utils::embedding::EmbeddingProvider};

use crate::{
    crawler::PageCrawler,
    enricher::TitleSummary,
    sitemap::resolve_sitemap,
    utils::llm_instructions::{get_title_summary_schema, TITLE_SUMMARY_SYSTEM_MESSAGE},
};

/// Context window handed to the completion call; middle chunks only need
/// their opening to be titled.
const TITLE_CONTEXT_CHARS: usize = 1000;

/// External capabilities the orchestrator depends on. Injected at
/// construction time so tests can substitute fakes for the crawler, the
/// completion call and the embedding call.
#[async_trait]
pub trait PipelineServices: Send + Sync {
    async fn resolve_site_urls(&self, root_url: &str) -> Result<Vec<String>, AppError>;

    async fn fetch_page(&self, url: &str) -> Result<String, AppError>;

    async fn extract_title_summary(
        &self,
        chunk: &str,
        url: &str,
    ) -> Result<TitleSummary, AppError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError>;

    fn embedding_dimension(&self) -> usize;
}

pub struct DefaultPipelineServices {
    openai_client: Arc<async_openai::Client<async_openai::config::OpenAIConfig>>,
    embedding_provider: Arc<EmbeddingProvider>,
    crawler: Arc<dyn PageCrawler>,
    http: reqwest::Client,
    llm_model: String,
}

impl DefaultPipelineServices {
    pub fn new(
        openai_client: Arc<async_openai::Client<async_openai::config::OpenAIConfig>>,
        embedding_provider: Arc<EmbeddingProvider>,
        crawler: Arc<dyn PageCrawler>,
        http: reqwest::Client,
        llm_model: String,
    ) -> Self {
        Self {
            openai_client,
            embedding_provider,
            crawler,
            http,
            llm_model,
        }
    }

    fn prepare_llm_request(
        &self,
        chunk: &str,
        url: &str,
    ) -> Result<CreateChatCompletionRequest, AppError> {
        let truncated: String = chunk.chars().take(TITLE_CONTEXT_CHARS).collect();
        let user_message = format!("URL: {url}\n\nContent:\n{truncated}...");

        let response_format = ResponseFormat::JsonSchema {
            json_schema: ResponseFormatJsonSchema {
                description: Some("Title and summary of a documentation chunk".into()),
                name: "chunk_title_summary".into(),
                schema: Some(get_title_summary_schema()),
                strict: Some(true),
            },
        };

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.llm_model)
            .messages([
                ChatCompletionRequestSystemMessage::from(TITLE_SUMMARY_SYSTEM_MESSAGE).into(),
                ChatCompletionRequestUserMessage::from(user_message).into(),
            ])
            .response_format(response_format)
            .build()?;

        Ok(request)
    }
}

#[async_trait]
impl PipelineServices for DefaultPipelineServices {
    async fn resolve_site_urls(&self, root_url: &str) -> Result<Vec<String>, AppError> {
        resolve_sitemap(&self.http, root_url).await
    }

    async fn fetch_page(&self, url: &str) -> Result<String, AppError> {
        self.crawler.fetch(url).await
    }

    async fn extract_title_summary(
        &self,
        chunk: &str,
        url: &str,
    ) -> Result<TitleSummary, AppError> {
        let request = self.prepare_llm_request(chunk, url)?;
        let response = self.openai_client.chat().create(request).await?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_ref())
            .ok_or(AppError::LLMParsing(
                "No content found in LLM response".into(),
            ))?;

        serde_json::from_str::<TitleSummary>(content).map_err(|e| {
            AppError::LLMParsing(format!("Failed to parse LLM response into title/summary: {e}"))
        })
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError> {
        self.embedding_provider.embed(text).await.map_err(AppError::from)
    }

    fn embedding_dimension(&self) -> usize {
        self.embedding_provider.dimension()
    }
}
