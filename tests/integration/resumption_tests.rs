/*!
 * Interrupted and repeated run tests
 */

use serde_json::json;
use std::sync::Arc;

use doctrans::app_config::Config;
use doctrans::errors::{AppError, PersistenceError};
use doctrans::providers::mock::MockProvider;
use doctrans::storage::MemoryBlobStore;

use crate::common::{self, FlakyBlobStore};

const OUTPUTS: [&str; 2] = ["translated/translated_french.json", "translated/translated_spanish.json"];

/// Six paragraphs, each too large to share a batch, dispatched one at a time
fn one_batch_per_text() -> (String, Config) {
    let paragraphs: Vec<serde_json::Value> = (0..6)
        .map(|i| json!({ "prose": format!("Paragraph number {}", i), "page": i }))
        .collect();
    let source = json!({ "title": "Paragraph number 0", "chapters": paragraphs }).to_string();

    let mut config = common::test_config(&["title", "prose"], &["fr", "es"]);
    config.batching.max_tokens_per_batch = 20;
    config.batching.prompt_overhead_tokens = 5;
    config.translation.active_provider_config_mut().concurrent_requests = 1;
    (source, config)
}

/// Test that a second run over a finished document sends nothing and rewrites identical bytes
#[tokio::test]
async fn test_run_twice_shouldSendNothingAndWriteIdenticalOutputs() {
    let store = common::store_with_source(common::HELLO_WORLD);
    let config = common::test_config(&["title"], &["fr", "es"]);

    let first = MockProvider::working().with_custom_response(common::hello_world_response);
    common::mock_controller(&config, Arc::new(store.clone()), &first)
        .run()
        .await
        .unwrap();
    let before: Vec<Vec<u8>> = OUTPUTS.iter().map(|key| store.read(key).unwrap()).collect();
    let progress_before = store.read(&config.storage.progress_key).unwrap();

    // A killed run leaves the snapshot but maybe no outputs
    for key in OUTPUTS {
        store.remove(key);
    }

    let second = MockProvider::working().with_custom_response(common::hello_world_response);
    let summary = common::mock_controller(&config, Arc::new(store.clone()), &second)
        .run()
        .await
        .unwrap();

    assert_eq!(second.request_count(), 0);
    assert_eq!(summary.batches_planned, 0);
    assert!(summary.is_complete());
    let after: Vec<Vec<u8>> = OUTPUTS.iter().map(|key| store.read(key).unwrap()).collect();
    assert_eq!(before, after);
    assert_eq!(store.read(&config.storage.progress_key).unwrap(), progress_before);
}

/// Test that a run stopped by a persistence failure resumes to the same result
#[tokio::test]
async fn test_run_interruptedByPersistenceFailure_shouldResumeToIdenticalOutputs() {
    let (source, config) = one_batch_per_text();

    // Uninterrupted reference run
    let reference = common::store_with_source(&source);
    let mock = MockProvider::working();
    let summary = common::mock_controller(&config, Arc::new(reference.clone()), &mock)
        .run()
        .await
        .unwrap();
    assert_eq!(summary.batches_planned, 6);
    assert_eq!(mock.request_count(), 6);

    // The third snapshot write fails on every attempt
    let memory = common::store_with_source(&source);
    let flaky = FlakyBlobStore::new(memory.clone(), &config.storage.progress_key, 2);
    let interrupted = MockProvider::working();
    let result = common::mock_controller(&config, Arc::new(flaky.clone()), &interrupted)
        .run()
        .await;

    assert!(matches!(
        result,
        Err(AppError::Persistence(PersistenceError::Write { .. }))
    ));
    assert_eq!(interrupted.request_count(), 3, "no batch may start after a fatal write failure");
    assert_eq!(flaky.rejected(), config.translation.common.persist_retry_count as usize);
    assert!(memory.read(OUTPUTS[0]).is_none());

    let resumed = MockProvider::working();
    let summary = common::mock_controller(&config, Arc::new(memory.clone()), &resumed)
        .run()
        .await
        .unwrap();

    assert_eq!(resumed.request_count(), 4);
    assert_eq!(summary.batches_planned, 4);
    assert!(summary.is_complete());
    for key in OUTPUTS {
        assert_eq!(memory.read(key), reference.read(key), "{} differs", key);
    }
}

/// Test that an unreadable snapshot stops the run before any request
#[tokio::test]
async fn test_run_withCorruptSnapshot_shouldFailBeforeDispatch() {
    let store = common::store_with_source(common::HELLO_WORLD);
    let config = common::test_config(&["title"], &["fr"]);
    store.insert(config.storage.progress_key.clone(), "{ not json");
    let mock = MockProvider::working();

    let result = common::mock_controller(&config, Arc::new(store.clone()), &mock).run().await;

    assert!(matches!(
        result,
        Err(AppError::Persistence(PersistenceError::Corrupt { .. }))
    ));
    assert_eq!(mock.request_count(), 0);
    assert_eq!(
        store.read(&config.storage.progress_key),
        Some(b"{ not json".to_vec())
    );
}

/// Test that adding a language later only requests the new language
#[tokio::test]
async fn test_run_withAddedLanguage_shouldRequestOnlyNewLanguage() {
    let store: MemoryBlobStore = common::store_with_source(common::HELLO_WORLD);
    let french_only = common::test_config(&["title"], &["fr"]);
    let first = MockProvider::working();
    common::mock_controller(&french_only, Arc::new(store.clone()), &first)
        .run()
        .await
        .unwrap();

    let both = common::test_config(&["title"], &["fr", "it"]);
    let second = MockProvider::working();
    common::mock_controller(&both, Arc::new(store.clone()), &second)
        .run()
        .await
        .unwrap();

    let requests = second.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].languages, vec!["it"]);
    assert_eq!(requests[0].texts, vec!["Hello", "World"]);
    assert_eq!(
        common::read_json(&store, "translated/translated_italian.json")["items"][1]["title"],
        "[it] World"
    );
}
