use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;

use crate::translation::concurrency::ProviderProfile;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Language of the source document (ISO 639-1)
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Languages to produce output documents for (ISO 639-1)
    #[serde(default = "default_target_languages")]
    pub target_languages: Vec<String>,

    /// Which parts of the document are translatable
    #[serde(default)]
    pub document: DocumentConfig,

    /// Where the source, progress snapshot and outputs live
    #[serde(default)]
    pub storage: StorageConfig,

    /// Translation config
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Batch sizing
    #[serde(default)]
    pub batching: BatchingConfig,

    /// Process only a small sample of texts and two languages
    #[serde(default)]
    pub test_mode: bool,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: Google Gemini generateContent API
    #[default]
    Gemini,
    // @provider: OpenAI or any OpenAI-compatible chat completions server
    OpenAI,
}

impl TranslationProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Gemini => "Gemini",
            Self::OpenAI => "OpenAI",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Gemini => "gemini".to_string(),
            Self::OpenAI => "openai".to_string(),
        }
    }
}

impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAI),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Max concurrent batch requests
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: usize,

    // @field: Timeout seconds for a single request
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Rate limit (requests per window, see common.rate_limit_window_secs)
    #[serde(default)]
    pub rate_limit: Option<u32>,
}

impl ProviderConfig {
    // @param provider_type: Provider enum
    // @returns: Provider config with defaults
    pub fn new(provider_type: TranslationProvider) -> Self {
        let profile = ProviderProfile::for_provider(provider_type);
        match provider_type {
            TranslationProvider::Gemini => Self {
                provider_type: "gemini".to_string(),
                model: default_gemini_model(),
                api_key: String::new(),
                endpoint: default_gemini_endpoint(),
                concurrent_requests: profile.max_concurrent_requests,
                timeout_secs: default_gemini_timeout_secs(),
                rate_limit: profile.target_rpm,
            },
            TranslationProvider::OpenAI => Self {
                provider_type: "openai".to_string(),
                model: default_openai_model(),
                api_key: String::new(),
                endpoint: default_openai_endpoint(),
                concurrent_requests: profile.max_concurrent_requests,
                timeout_secs: default_timeout_secs(),
                rate_limit: profile.target_rpm,
            },
        }
    }
}

/// Translatable field selection
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DocumentConfig {
    /// Object keys whose string values (or arrays of strings) are translated
    #[serde(default = "default_translatable_fields")]
    pub translatable_fields: Vec<String>,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            translatable_fields: default_translatable_fields(),
        }
    }
}

/// Blob store locations
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root directory of the filesystem blob store
    #[serde(default = "default_storage_root")]
    pub root: String,

    /// Key of the source document
    #[serde(default = "String::new")]
    pub source_key: String,

    /// Prefix prepended to every output document key
    #[serde(default = "default_output_prefix")]
    pub output_prefix: String,

    /// Key of the progress snapshot
    #[serde(default = "default_progress_key")]
    pub progress_key: String,

    /// Append a UTC timestamp to output document names
    #[serde(default)]
    pub timestamp_outputs: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            source_key: String::new(),
            output_prefix: default_output_prefix(),
            progress_key: default_progress_key(),
            timestamp_outputs: false,
        }
    }
}

/// Batch sizing heuristics
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BatchingConfig {
    /// Estimated token ceiling for one request, prompt included
    #[serde(default = "default_max_tokens_per_batch")]
    pub max_tokens_per_batch: usize,

    /// Tokens reserved for the fixed part of the prompt
    #[serde(default = "default_prompt_overhead_tokens")]
    pub prompt_overhead_tokens: usize,

    /// Characters per estimated token
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: usize,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_batch: default_max_tokens_per_batch(),
            prompt_overhead_tokens: default_prompt_overhead_tokens(),
            chars_per_token: default_chars_per_token(),
        }
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Translation provider to use
    #[serde(default)]
    pub provider: TranslationProvider,

    /// Available translation providers
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    /// Common translation settings
    #[serde(default)]
    pub common: TranslationCommonConfig,
}

/// Common translation settings applicable to all providers
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationCommonConfig {
    /// System prompt template for translation
    /// Placeholders: {source_language}, {target_languages}
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Attempts per batch before its texts are marked as failed
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Base backoff between attempts (in milliseconds), doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Upper bound for a single backoff (in milliseconds)
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Length of the rate limit window in seconds
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,

    /// Attempts for each progress snapshot write
    #[serde(default = "default_persist_retry_count")]
    pub persist_retry_count: u32,

    /// Temperature parameter for text generation (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for TranslationCommonConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            rate_limit_window_secs: default_rate_limit_window_secs(),
            persist_retry_count: default_persist_retry_count(),
            temperature: default_temperature(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_source_language() -> String {
    "de".to_string()
}

fn default_target_languages() -> Vec<String> {
    [
        "en", "fr", "nl", "es", "it", "cs", "hu", "ps", "fa", "hi", "zh", "ja", "ru", "ko",
    ]
    .iter()
    .map(|code| code.to_string())
    .collect()
}

fn default_translatable_fields() -> Vec<String> {
    vec!["prose".to_string(), "title".to_string()]
}

fn default_storage_root() -> String {
    ".".to_string()
}

fn default_output_prefix() -> String {
    "translated/".to_string()
}

fn default_progress_key() -> String {
    "translation_progress/progress_data.json".to_string()
}

fn default_max_tokens_per_batch() -> usize {
    4000
}

fn default_prompt_overhead_tokens() -> usize {
    200
}

fn default_chars_per_token() -> usize {
    3
}

fn default_concurrent_requests() -> usize {
    4
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_gemini_timeout_secs() -> u64 {
    // Multi-language batches produce long responses
    300
}

fn default_retry_count() -> u32 {
    5
}

fn default_retry_backoff_ms() -> u64 {
    1000 // 1 second base backoff time, doubled on each retry
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

fn default_rate_limit_window_secs() -> u64 {
    60
}

fn default_persist_retry_count() -> u32 {
    3
}

fn default_temperature() -> f32 {
    0.2
}

fn default_gemini_endpoint() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.5-pro".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_system_prompt() -> String {
    "You are a professional translator and an expert in IT security terminology. \
     Translate texts from {source_language} into each of these languages: {target_languages}. \
     Maintain the professional tone and precise meaning of an IT security expert."
        .to_string()
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        crate::language_utils::validate_language_code(&self.source_language)?;

        if self.target_languages.is_empty() {
            return Err(anyhow!("At least one target language is required"));
        }
        let mut seen = std::collections::HashSet::new();
        for code in &self.target_languages {
            crate::language_utils::validate_language_code(code)?;
            if !seen.insert(code.to_lowercase()) {
                return Err(anyhow!("Target language {} is listed more than once", code));
            }
        }

        if self.document.translatable_fields.is_empty() {
            return Err(anyhow!("At least one translatable field name is required"));
        }

        if self.storage.source_key.trim().is_empty() {
            return Err(anyhow!("A source document key is required"));
        }

        if self.batching.chars_per_token == 0 {
            return Err(anyhow!("batching.chars_per_token must be positive"));
        }
        if self.batching.max_tokens_per_batch <= self.batching.prompt_overhead_tokens {
            return Err(anyhow!(
                "batching.max_tokens_per_batch ({}) must exceed prompt_overhead_tokens ({})",
                self.batching.max_tokens_per_batch,
                self.batching.prompt_overhead_tokens
            ));
        }

        if self.translation.common.retry_count == 0 {
            return Err(anyhow!("translation.common.retry_count must be at least 1"));
        }
        if self.translation.common.rate_limit_window_secs == 0 {
            return Err(anyhow!("translation.common.rate_limit_window_secs must be positive"));
        }
        if self.translation.optimal_concurrent_requests() == 0 {
            return Err(anyhow!("concurrent_requests must be at least 1"));
        }

        if self.translation.get_api_key().is_empty() {
            return Err(anyhow!(
                "Translation API key is required for {} provider",
                self.translation.provider.display_name()
            ));
        }

        Ok(())
    }

    /// Target languages for this run, narrowed to `en`/`es` in test mode
    pub fn effective_target_languages(&self) -> Vec<String> {
        if !self.test_mode {
            return self.target_languages.clone();
        }

        let test_languages = ["en", "es"];
        let configured: Vec<String> = self
            .target_languages
            .iter()
            .filter(|code| test_languages.contains(&code.as_str()))
            .cloned()
            .collect();

        if configured.is_empty() {
            test_languages.iter().map(|code| code.to_string()).collect()
        } else {
            configured
        }
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: default_source_language(),
            target_languages: default_target_languages(),
            document: DocumentConfig::default(),
            storage: StorageConfig::default(),
            translation: TranslationConfig::default(),
            batching: BatchingConfig::default(),
            test_mode: false,
            log_level: LogLevel::default(),
        }
    }
}

impl TranslationConfig {
    /// Concurrent batch requests for the active provider
    pub fn optimal_concurrent_requests(&self) -> usize {
        ProviderProfile::for_provider(self.provider).effective_concurrent_requests(
            self.get_active_provider_config()
                .map(|provider_config| provider_config.concurrent_requests),
        )
    }

    /// Get the active provider configuration from the available_providers array
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        let provider_str = self.provider.to_lowercase_string();
        self.available_providers
            .iter()
            .find(|p| p.provider_type == provider_str)
    }

    /// Mutable access to the active provider configuration, created on demand
    pub fn active_provider_config_mut(&mut self) -> &mut ProviderConfig {
        let provider_str = self.provider.to_lowercase_string();
        if let Some(index) = self
            .available_providers
            .iter()
            .position(|p| p.provider_type == provider_str)
        {
            return &mut self.available_providers[index];
        }

        self.available_providers.push(ProviderConfig::new(self.provider));
        let last = self.available_providers.len() - 1;
        &mut self.available_providers[last]
    }

    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.model.is_empty() {
                return provider_config.model.clone();
            }
        }

        match self.provider {
            TranslationProvider::Gemini => default_gemini_model(),
            TranslationProvider::OpenAI => default_openai_model(),
        }
    }

    /// Get the API key for the active provider
    pub fn get_api_key(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.api_key.is_empty() {
                return provider_config.api_key.clone();
            }
        }

        String::new()
    }

    /// Get the endpoint for the active provider
    pub fn get_endpoint(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.endpoint.is_empty() {
                return provider_config.endpoint.clone();
            }
        }

        match self.provider {
            TranslationProvider::Gemini => default_gemini_endpoint(),
            TranslationProvider::OpenAI => default_openai_endpoint(),
        }
    }

    /// Get the request timeout for the active provider
    pub fn get_timeout_secs(&self) -> u64 {
        if let Some(provider_config) = self.get_active_provider_config() {
            if provider_config.timeout_secs > 0 {
                return provider_config.timeout_secs;
            }
        }

        match self.provider {
            TranslationProvider::Gemini => default_gemini_timeout_secs(),
            TranslationProvider::OpenAI => default_timeout_secs(),
        }
    }

    /// Get the rate limit for the active provider
    pub fn get_rate_limit(&self) -> Option<u32> {
        if let Some(provider_config) = self.get_active_provider_config() {
            return provider_config.rate_limit;
        }

        ProviderProfile::for_provider(self.provider).target_rpm
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            available_providers: vec![
                ProviderConfig::new(TranslationProvider::Gemini),
                ProviderConfig::new(TranslationProvider::OpenAI),
            ],
            common: TranslationCommonConfig::default(),
        }
    }
}
