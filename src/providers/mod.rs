/*!
 * Provider implementations for text-generation services.
 *
 * This module contains client implementations for the supported services:
 * - Gemini: Google Generative Language API (`generateContent`)
 * - OpenAI: OpenAI-compatible chat completions
 * - Mock: scriptable in-process provider for tests and dry runs
 */

use async_trait::async_trait;
use reqwest::{Response, StatusCode, header};
use std::fmt::Debug;

use crate::errors::ProviderError;

/// Common trait for all LLM providers
///
/// This trait defines the interface that all provider implementations must follow,
/// allowing them to be used interchangeably in the translation service.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// The request type for this provider
    type Request: Send + Sync;

    /// The response type for this provider
    type Response: Send + Sync;

    /// Complete a request using this provider
    ///
    /// # Arguments
    /// * `request` - The request to complete
    ///
    /// # Returns
    /// * `Result<Self::Response, ProviderError>` - The response from the provider or an error.
    ///   A response the service cut short or refused is reported as `ProviderError::Blocked`.
    async fn complete(&self, request: Self::Request) -> Result<Self::Response, ProviderError>;

    /// Test the connection to the provider
    async fn test_connection(&self) -> Result<(), ProviderError>;

    /// Extract text from the provider response
    fn extract_text(response: &Self::Response) -> String;
}

/// Map a transport failure onto the provider error taxonomy
pub(crate) fn transport_error(service: &str, error: reqwest::Error) -> ProviderError {
    if error.is_timeout() {
        ProviderError::ConnectionError(format!("{} request timed out: {}", service, error))
    } else if error.is_connect() {
        ProviderError::ConnectionError(format!("Could not connect to {}: {}", service, error))
    } else {
        ProviderError::RequestFailed(format!("{} request failed: {}", service, error))
    }
}

/// Turn a non-success HTTP response into the matching provider error
pub(crate) async fn check_status(service: &str, response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after_secs = response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok());
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to get error response text".to_string());
    let message = format!("{} API error ({}): {}", service, status, body);

    Err(match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimitExceeded {
            message,
            retry_after_secs,
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::AuthenticationError(message),
        _ => ProviderError::ApiError {
            status_code: status.as_u16(),
            message,
        },
    })
}

pub mod gemini;
pub mod mock;
pub mod openai;
