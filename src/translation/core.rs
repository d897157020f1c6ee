/*!
 * Core translation service implementation.
 *
 * `TranslationService` turns one batch into one request to the configured
 * provider and validates the answer. Retries, pacing and persistence belong
 * to the dispatcher in `batch`.
 */

use anyhow::{Result, anyhow};
use log::debug;
use std::time::Instant;

use crate::app_config::{TranslationConfig, TranslationProvider as ConfigTranslationProvider};
use crate::errors::{ProviderError, TranslationError};
use crate::progress::TranslationRecord;
use crate::providers::Provider;
use crate::providers::gemini::{Gemini, GeminiRequest};
use crate::providers::mock::{MockProvider, MockRequest};
use crate::providers::openai::{OpenAI, OpenAIRequest};

use super::planner::Batch;
use super::prompts::{BatchPrompt, TranslationPromptBuilder, validate_response};

/// Translation provider implementation variants
#[derive(Debug, Clone)]
enum TranslationProviderImpl {
    /// Google Gemini
    Gemini {
        /// Client instance
        client: Gemini,
    },

    /// OpenAI-compatible chat completions
    OpenAI {
        /// Client instance
        client: OpenAI,
    },

    /// In-process mock
    Mock {
        /// Client instance
        client: MockProvider,
    },
}

/// Sends batches to the configured provider and validates the answers
#[derive(Debug, Clone)]
pub struct TranslationService {
    /// Provider implementation
    provider: TranslationProviderImpl,

    /// Configuration for the translation service
    pub config: TranslationConfig,

    /// Prompt builder for the document's source language
    prompts: TranslationPromptBuilder,
}

impl TranslationService {
    /// Create a new translation service with the given configuration
    pub fn new(config: TranslationConfig, source_language: &str) -> Result<Self> {
        let endpoint = config.get_endpoint();
        if url::Url::parse(&endpoint).is_err() {
            return Err(anyhow!("Invalid endpoint for {}: {}", config.provider, endpoint));
        }

        let provider = match config.provider {
            ConfigTranslationProvider::Gemini => TranslationProviderImpl::Gemini {
                client: Gemini::new(config.get_api_key(), endpoint, config.get_timeout_secs()),
            },
            ConfigTranslationProvider::OpenAI => TranslationProviderImpl::OpenAI {
                client: OpenAI::new(config.get_api_key(), endpoint, config.get_timeout_secs()),
            },
        };

        Ok(Self::with_provider(provider, config, source_language))
    }

    /// Create a service backed by a mock provider
    pub fn with_mock(config: TranslationConfig, source_language: &str, mock: MockProvider) -> Self {
        Self::with_provider(TranslationProviderImpl::Mock { client: mock }, config, source_language)
    }

    fn with_provider(provider: TranslationProviderImpl, config: TranslationConfig, source_language: &str) -> Self {
        let prompts = TranslationPromptBuilder::new(source_language, &config.common.system_prompt);
        Self {
            provider,
            config,
            prompts,
        }
    }

    /// Human readable provider and model
    pub fn describe(&self) -> String {
        match &self.provider {
            TranslationProviderImpl::Mock { .. } => "mock provider".to_string(),
            _ => format!("{} ({})", self.config.provider.display_name(), self.config.get_model()),
        }
    }

    /// Test the connection to the translation provider
    pub async fn test_connection(&self) -> Result<(), ProviderError> {
        match &self.provider {
            TranslationProviderImpl::Gemini { client } => client.test_connection().await,
            TranslationProviderImpl::OpenAI { client } => client.test_connection().await,
            TranslationProviderImpl::Mock { client } => client.test_connection().await,
        }
    }

    /// Send one request for `batch` and validate the answer
    pub async fn request_batch(&self, batch: &Batch) -> Result<Vec<TranslationRecord>, TranslationError> {
        let start_time = Instant::now();
        let prompt = self.prompts.build(batch);
        let raw = self.complete(batch, prompt).await?;

        debug!(
            "Batch {} answered in {:?} ({} chars)",
            batch.index + 1,
            start_time.elapsed(),
            raw.len()
        );

        Ok(validate_response(batch, &raw)?)
    }

    async fn complete(&self, batch: &Batch, prompt: BatchPrompt) -> Result<String, ProviderError> {
        let temperature = self.config.common.temperature;

        match &self.provider {
            TranslationProviderImpl::Gemini { client } => {
                let request = GeminiRequest::new(self.config.get_model())
                    .system(prompt.system)
                    .add_user_text(prompt.user)
                    .temperature(temperature);
                let response = client.complete(request).await?;
                Ok(Gemini::extract_text(&response))
            }
            TranslationProviderImpl::OpenAI { client } => {
                let request = OpenAIRequest::new(self.config.get_model())
                    .add_message("system", prompt.system)
                    .add_message("user", prompt.user)
                    .temperature(temperature);
                let response = client.complete(request).await?;
                Ok(OpenAI::extract_text(&response))
            }
            TranslationProviderImpl::Mock { client } => {
                let request = MockRequest {
                    texts: batch.entries.iter().map(|entry| entry.text.clone()).collect(),
                    languages: batch.languages.clone(),
                    prompt: format!("{}\n\n{}", prompt.system, prompt.user),
                };
                let response = client.complete(request).await?;
                Ok(MockProvider::extract_text(&response))
            }
        }
    }
}
