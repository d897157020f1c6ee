/*!
 * Provider-specific concurrency tuning.
 *
 * Defaults for the dispatcher's two gates: how many batch requests may be in
 * flight and how many may start per minute.
 */

use crate::app_config::TranslationProvider;

/// Provider-specific concurrency profile with tuned defaults
#[derive(Debug, Clone)]
pub struct ProviderProfile {
    /// Maximum concurrent requests
    pub max_concurrent_requests: usize,
    /// Target requests per minute (for rate limiting)
    pub target_rpm: Option<u32>,
}

impl ProviderProfile {
    /// Get the optimal profile for a given provider
    pub fn for_provider(provider: TranslationProvider) -> Self {
        match provider {
            TranslationProvider::Gemini => Self {
                // Paid-tier quota for the pro models is counted per minute
                max_concurrent_requests: 10,
                target_rpm: Some(10),
            },
            TranslationProvider::OpenAI => Self {
                max_concurrent_requests: 10,
                target_rpm: Some(60),
            },
        }
    }

    /// Get effective concurrent requests, respecting any user override
    pub fn effective_concurrent_requests(&self, user_override: Option<usize>) -> usize {
        user_override.unwrap_or(self.max_concurrent_requests)
    }
}
