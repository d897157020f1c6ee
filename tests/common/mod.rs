/*!
 * Common test utilities for the doctrans test suite
 */

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

use doctrans::app_config::Config;
use doctrans::app_controller::Controller;
use doctrans::errors::StorageError;
use doctrans::providers::mock::{MockProvider, MockRequest};
use doctrans::storage::{BlobStore, MemoryBlobStore};
use doctrans::translation::TranslationService;

/// Key the source document is stored under in tests
pub const SOURCE_KEY: &str = "source.json";

/// The two-text document used by the end-to-end scenarios
pub const HELLO_WORLD: &str = r#"{"title":"Hello","items":[{"title":"Hello"},{"title":"World"}]}"#;

/// Route library logs to the test output; set RUST_LOG to see them
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Configuration for fast, deterministic runs against a mock provider
pub fn test_config(fields: &[&str], languages: &[&str]) -> Config {
    let mut config = Config::default();
    config.source_language = "en".to_string();
    config.target_languages = languages.iter().map(|code| code.to_string()).collect();
    config.document.translatable_fields = fields.iter().map(|field| field.to_string()).collect();
    config.storage.source_key = SOURCE_KEY.to_string();
    config.translation.common.retry_count = 3;
    config.translation.common.retry_backoff_ms = 1;
    config.translation.common.max_backoff_ms = 5;

    let provider = config.translation.active_provider_config_mut();
    provider.api_key = "test-key".to_string();
    provider.rate_limit = None;
    config
}

/// A memory store holding `source` under `SOURCE_KEY`
pub fn store_with_source(source: &str) -> MemoryBlobStore {
    let store = MemoryBlobStore::new();
    store.insert(SOURCE_KEY, source);
    store
}

/// A controller wired to `store` and `mock`
pub fn mock_controller(config: &Config, store: Arc<dyn BlobStore>, mock: &MockProvider) -> Controller {
    init_logging();
    let service = TranslationService::with_mock(config.translation.clone(), &config.source_language, mock.clone());
    Controller::new(config.clone(), store, service)
}

/// Parse the JSON stored under `key`
pub fn read_json(store: &MemoryBlobStore, key: &str) -> Value {
    let bytes = store.read(key).unwrap_or_else(|| panic!("no blob stored under {}", key));
    serde_json::from_slice(&bytes).unwrap()
}

fn dictionary(text: &str, language: &str) -> Option<&'static str> {
    match (text, language) {
        ("Hello", "fr") => Some("Bonjour"),
        ("World", "fr") => Some("Monde"),
        ("Hello", "es") => Some("Hola"),
        ("World", "es") => Some("Mundo"),
        _ => None,
    }
}

/// Answers Hello/World in French and Spanish
pub fn hello_world_response(request: &MockRequest) -> String {
    MockProvider::render_response(request, |text, language| dictionary(text, language).map(str::to_string))
}

/// Like `hello_world_response`, but never answers World in Spanish
pub fn hello_world_without_spanish_world(request: &MockRequest) -> String {
    MockProvider::render_response(request, |text, language| {
        if text == "World" && language == "es" {
            None
        } else {
            dictionary(text, language).map(str::to_string)
        }
    })
}

/// Default `"[<lang>] <text>"` answers, except that World is never answered
pub fn everything_but_world(request: &MockRequest) -> String {
    MockProvider::render_response(request, |text, language| {
        (text != "World").then(|| format!("[{}] {}", language, text))
    })
}

/// Memory store whose writes to one key start failing after a number of successes
#[derive(Debug, Clone)]
pub struct FlakyBlobStore {
    inner: MemoryBlobStore,
    failing_key: String,
    successes_left: Arc<AtomicUsize>,
    rejected: Arc<AtomicUsize>,
}

impl FlakyBlobStore {
    pub fn new(inner: MemoryBlobStore, failing_key: &str, successes: usize) -> Self {
        Self {
            inner,
            failing_key: failing_key.to_string(),
            successes_left: Arc::new(AtomicUsize::new(successes)),
            rejected: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Writes refused so far
    pub fn rejected(&self) -> usize {
        self.rejected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for FlakyBlobStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        if key == self.failing_key {
            let allowed = self
                .successes_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            if !allowed {
                self.rejected.fetch_add(1, Ordering::SeqCst);
                return Err(StorageError::Io {
                    key: key.to_string(),
                    message: "Simulated disk full".to_string(),
                });
            }
        }
        self.inner.put(key, bytes).await
    }
}
