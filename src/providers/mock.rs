/*!
 * Mock provider implementations for testing.
 *
 * This module provides a mock provider that simulates different behaviors:
 * - `MockProvider::working()` - Always answers with a complete translation
 * - `MockProvider::failing()` - Always fails with a server error
 * - `MockProvider::blocked()` - Always reports a blocked generation
 * - `MockProvider::intermittent(n)` - Fails every n-th request
 * - `MockProvider::malformed()` - Answers with prose instead of JSON
 * - `MockProvider::rate_limited(n, secs)` - Rejects the first n requests for quota
 * - `MockProvider::slow(ms)` - Answers correctly after a delay
 *
 * A working mock answers `"[<lang>] <text>"` for every requested pair unless
 * a custom response generator is set.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::time::Instant;

use crate::errors::ProviderError;
use crate::providers::Provider;

/// Mock request for testing
#[derive(Debug, Clone, PartialEq)]
pub struct MockRequest {
    /// Source texts in batch order; the position is the text id
    pub texts: Vec<String>,
    /// Requested language codes
    pub languages: Vec<String>,
    /// Full prompt sent for the batch
    pub prompt: String,
}

/// Mock response for testing
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// The raw answer text
    pub text: String,
}

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with a proper translation
    Working,
    /// Always fails with a retryable server error
    Failing,
    /// Always fails with an authentication error
    Unauthorized,
    /// Always reports a blocked generation
    Blocked,
    /// Fails intermittently (every Nth request)
    Intermittent { fail_every: usize },
    /// Answers with text that contains no JSON object
    Malformed,
    /// Rejects the first `times` requests with a quota error
    RateLimited { times: usize, retry_after_secs: Option<u64> },
    /// Simulates slow response (for timeout testing)
    Slow { delay_ms: u64 },
}

/// Mock provider for testing translation behavior
#[derive(Debug)]
pub struct MockProvider {
    /// Behavior mode
    behavior: MockBehavior,
    /// Request counter shared between clones
    request_count: Arc<AtomicUsize>,
    /// Requests received, with their arrival time
    requests: Arc<Mutex<Vec<(Instant, MockRequest)>>>,
    /// Custom response generator (optional)
    custom_response: Option<fn(&MockRequest) -> String>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            custom_response: None,
        }
    }

    /// Create a working mock provider that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a failing mock provider that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a mock whose generations are always blocked
    pub fn blocked() -> Self {
        Self::new(MockBehavior::Blocked)
    }

    /// Create an intermittently failing mock provider
    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent {
            fail_every: fail_every.max(1),
        })
    }

    /// Create a mock that answers with prose
    pub fn malformed() -> Self {
        Self::new(MockBehavior::Malformed)
    }

    /// Create a mock that rejects its first `times` requests for quota
    pub fn rate_limited(times: usize, retry_after_secs: Option<u64>) -> Self {
        Self::new(MockBehavior::RateLimited {
            times,
            retry_after_secs,
        })
    }

    /// Create a mock that answers after `delay_ms`
    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Set a custom response generator
    pub fn with_custom_response(mut self, generator: fn(&MockRequest) -> String) -> Self {
        self.custom_response = Some(generator);
        self
    }

    /// Number of requests received so far, across clones
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Requests received so far, in arrival order
    pub fn requests(&self) -> Vec<MockRequest> {
        self.requests.lock().iter().map(|(_, request)| request.clone()).collect()
    }

    /// Arrival times of the requests received so far
    pub fn request_times(&self) -> Vec<Instant> {
        self.requests.lock().iter().map(|(at, _)| *at).collect()
    }

    /// Answer every requested pair with `translate(text, language)`, leaving
    /// out the pairs for which it returns `None`
    pub fn render_response(request: &MockRequest, translate: impl Fn(&str, &str) -> Option<String>) -> String {
        let answers: Map<String, Value> = request
            .texts
            .iter()
            .enumerate()
            .map(|(position, text)| {
                let languages: Map<String, Value> = request
                    .languages
                    .iter()
                    .filter_map(|language| {
                        translate(text, language).map(|translated| (language.clone(), Value::String(translated)))
                    })
                    .collect();
                (position.to_string(), Value::Object(languages))
            })
            .collect();
        Value::Object(answers).to_string()
    }

    /// The default answer: `"[<lang>] <text>"` for every pair
    pub fn generate_batch_response(request: &MockRequest) -> String {
        Self::render_response(request, |text, language| Some(format!("[{}] {}", language, text)))
    }

    fn answer(&self, request: &MockRequest) -> MockResponse {
        let text = match self.custom_response {
            Some(generator) => generator(request),
            None => Self::generate_batch_response(request),
        };
        MockResponse { text }
    }
}

impl Clone for MockProvider {
    fn clone(&self) -> Self {
        Self {
            behavior: self.behavior,
            request_count: Arc::clone(&self.request_count),
            requests: Arc::clone(&self.requests),
            custom_response: self.custom_response,
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    type Request = MockRequest;
    type Response = MockResponse;

    async fn complete(&self, request: Self::Request) -> Result<Self::Response, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push((Instant::now(), request.clone()));

        match self.behavior {
            MockBehavior::Working => Ok(self.answer(&request)),

            MockBehavior::Failing => Err(ProviderError::ApiError {
                message: "Simulated provider failure".to_string(),
                status_code: 500,
            }),

            MockBehavior::Unauthorized => Err(ProviderError::AuthenticationError(
                "Simulated invalid API key".to_string(),
            )),

            MockBehavior::Blocked => Err(ProviderError::Blocked {
                finish_reason: "RECITATION".to_string(),
                details: None,
            }),

            MockBehavior::Intermittent { fail_every } => {
                if count % fail_every == fail_every - 1 {
                    Err(ProviderError::ApiError {
                        message: format!("Simulated intermittent failure (request #{})", count + 1),
                        status_code: 503,
                    })
                } else {
                    Ok(self.answer(&request))
                }
            }

            MockBehavior::Malformed => Ok(MockResponse {
                text: "I am sorry, I can only answer in prose today.".to_string(),
            }),

            MockBehavior::RateLimited {
                times,
                retry_after_secs,
            } => {
                if count < times {
                    Err(ProviderError::RateLimitExceeded {
                        message: format!("Simulated quota exhaustion (request #{})", count + 1),
                        retry_after_secs,
                    })
                } else {
                    Ok(self.answer(&request))
                }
            }

            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                Ok(self.answer(&request))
            }
        }
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        match self.behavior {
            MockBehavior::Unauthorized => Err(ProviderError::AuthenticationError(
                "Simulated invalid API key".to_string(),
            )),
            _ => Ok(()),
        }
    }

    fn extract_text(response: &Self::Response) -> String {
        response.text.clone()
    }
}
