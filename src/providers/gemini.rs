use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::errors::ProviderError;
use crate::providers::{Provider, check_status, transport_error};

/// Largest answer the 2.5 models accept
const MAX_OUTPUT_TOKENS: u32 = 65535;

const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Gemini client for the Generative Language REST API
#[derive(Debug, Clone)]
pub struct Gemini {
    /// HTTP client for API requests
    client: Client,
    /// API key for authentication
    api_key: String,
    /// API base URL, e.g. `https://generativelanguage.googleapis.com`
    endpoint: String,
}

/// `generateContent` request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    /// Model name, part of the URL rather than the body
    #[serde(skip)]
    model: String,

    /// Conversation turns
    contents: Vec<GeminiContent>,

    /// System instruction
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,

    /// Sampling and output settings
    generation_config: GenerationConfig,

    /// Safety thresholds per harm category
    safety_settings: Vec<SafetySetting>,
}

/// Content block made of text parts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiContent {
    /// Author role (`user` or `model`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Text parts
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

/// One text part
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiPart {
    /// Part text
    #[serde(default)]
    pub text: String,
}

/// Generation settings
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    /// Output token cap
    max_output_tokens: u32,
    /// Requested answer format
    response_mime_type: String,
}

/// Safety threshold for one harm category
#[derive(Debug, Clone, Serialize)]
pub struct SafetySetting {
    category: String,
    threshold: String,
}

/// `generateContent` response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
    /// Generated candidates
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
    /// Feedback about the prompt itself, set when it was blocked
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
    /// Token accounting
    #[serde(default)]
    pub usage_metadata: Option<UsageMetadata>,
}

/// One generated candidate
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    /// Generated content
    #[serde(default)]
    pub content: Option<GeminiContent>,
    /// Why generation stopped (`STOP`, `MAX_TOKENS`, `SAFETY`, `RECITATION`, ...)
    #[serde(default)]
    pub finish_reason: Option<String>,
    /// Safety ratings for the candidate
    #[serde(default)]
    pub safety_ratings: Vec<SafetyRating>,
}

/// Prompt feedback
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    /// Set when the prompt was blocked
    #[serde(default)]
    pub block_reason: Option<String>,
    /// Safety ratings for the prompt
    #[serde(default)]
    pub safety_ratings: Vec<SafetyRating>,
}

/// Safety rating
#[derive(Debug, Clone, Deserialize)]
pub struct SafetyRating {
    /// Harm category
    pub category: String,
    /// Probability bucket
    pub probability: String,
}

/// Token usage information
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    /// Prompt tokens
    #[serde(default)]
    pub prompt_token_count: u64,
    /// Output tokens
    #[serde(default)]
    pub candidates_token_count: u64,
}

impl GeminiRequest {
    /// Create a new request for `model` asking for a JSON answer
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            contents: Vec::new(),
            system_instruction: None,
            generation_config: GenerationConfig {
                temperature: None,
                max_output_tokens: MAX_OUTPUT_TOKENS,
                response_mime_type: "application/json".to_string(),
            },
            safety_settings: HARM_CATEGORIES
                .iter()
                .map(|category| SafetySetting {
                    category: category.to_string(),
                    threshold: "BLOCK_NONE".to_string(),
                })
                .collect(),
        }
    }

    /// Model this request targets
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Add a user turn
    pub fn add_user_text(mut self, text: impl Into<String>) -> Self {
        self.contents.push(GeminiContent {
            role: Some("user".to_string()),
            parts: vec![GeminiPart { text: text.into() }],
        });
        self
    }

    /// Set the system instruction
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system_instruction = Some(GeminiContent {
            role: None,
            parts: vec![GeminiPart { text: system.into() }],
        });
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.generation_config.temperature = Some(temperature);
        self
    }

    /// Set the output token cap
    pub fn max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.generation_config.max_output_tokens = max_output_tokens;
        self
    }
}

fn describe_ratings(ratings: &[SafetyRating]) -> Option<String> {
    if ratings.is_empty() {
        return None;
    }
    Some(
        ratings
            .iter()
            .map(|rating| format!("{}={}", rating.category, rating.probability))
            .collect::<Vec<_>>()
            .join(", "),
    )
}

impl GeminiResponse {
    /// Report a refused or truncated generation as `Blocked`
    pub fn ensure_complete(&self) -> Result<(), ProviderError> {
        if let Some(feedback) = &self.prompt_feedback {
            if let Some(reason) = &feedback.block_reason {
                return Err(ProviderError::Blocked {
                    finish_reason: reason.clone(),
                    details: describe_ratings(&feedback.safety_ratings),
                });
            }
        }

        let Some(candidate) = self.candidates.first() else {
            return Err(ProviderError::Blocked {
                finish_reason: "NO_CANDIDATES".to_string(),
                details: None,
            });
        };

        match candidate.finish_reason.as_deref() {
            Some("STOP") => Ok(()),
            other => Err(ProviderError::Blocked {
                finish_reason: other.unwrap_or("UNSPECIFIED").to_string(),
                details: describe_ratings(&candidate.safety_ratings),
            }),
        }
    }
}

impl Gemini {
    /// Create a new Gemini client
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
        }
    }

    fn url(&self, path: &str) -> Result<Url, ProviderError> {
        let base = if self.endpoint.is_empty() {
            "https://generativelanguage.googleapis.com"
        } else {
            self.endpoint.trim_end_matches('/')
        };
        Url::parse(&format!("{}/{}", base, path))
            .map_err(|e| ProviderError::RequestFailed(format!("Invalid Gemini endpoint {}: {}", base, e)))
    }
}

#[async_trait]
impl Provider for Gemini {
    type Request = GeminiRequest;
    type Response = GeminiResponse;

    async fn complete(&self, request: GeminiRequest) -> Result<GeminiResponse, ProviderError> {
        let url = self.url(&format!("v1beta/models/{}:generateContent", request.model))?;
        debug!("Sending Gemini request to model {}", request.model);

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error("Gemini", e))?;

        let response = check_status("Gemini", response).await.inspect_err(|e| {
            error!("{}", e);
        })?;

        let gemini_response = response
            .json::<GeminiResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(format!("Failed to parse Gemini API response: {}", e)))?;

        gemini_response.ensure_complete()?;
        Ok(gemini_response)
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let response = self
            .client
            .get(self.url("v1beta/models")?)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| transport_error("Gemini", e))?;
        check_status("Gemini", response).await?;
        Ok(())
    }

    fn extract_text(response: &GeminiResponse) -> String {
        response
            .candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| content.parts.iter().map(|part| part.text.as_str()).collect())
            .unwrap_or_default()
    }
}
