/*!
 * End-to-end document translation tests
 */

use regex::Regex;
use serde_json::json;
use std::sync::Arc;

use doctrans::app_controller::RunState;
use doctrans::errors::{AppError, ExtractionError};
use doctrans::providers::mock::MockProvider;
use doctrans::storage::MemoryBlobStore;

use crate::common::{self, SOURCE_KEY};

/// Test the basic scenario: two unique texts, one batch, one request
#[tokio::test]
async fn test_run_withHelloWorld_shouldTranslateInOneRequest() {
    let store = common::store_with_source(common::HELLO_WORLD);
    let config = common::test_config(&["title"], &["fr", "es"]);
    let mock = MockProvider::working().with_custom_response(common::hello_world_response);

    let mut controller = common::mock_controller(&config, Arc::new(store.clone()), &mock);
    let summary = controller.run().await.unwrap();
    assert_eq!(controller.state(), RunState::Done);

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].texts, vec!["Hello", "World"]);
    assert_eq!(requests[0].languages, vec!["fr", "es"]);

    assert_eq!(
        common::read_json(&store, "translated/translated_french.json"),
        json!({"title":"Bonjour","items":[{"title":"Bonjour"},{"title":"Monde"}]})
    );
    assert_eq!(
        common::read_json(&store, "translated/translated_spanish.json"),
        json!({"title":"Hola","items":[{"title":"Hola"},{"title":"Mundo"}]})
    );

    assert_eq!(summary.total_locations, 3);
    assert_eq!(summary.unique_texts, 2);
    assert_eq!(summary.batches_planned, 1);
    assert_eq!(summary.requests_sent, 1);
    assert_eq!(summary.fully_translated, 2);
    assert!(summary.is_complete());
    assert_eq!(
        summary.languages[0].output_key.as_deref(),
        Some("translated/translated_french.json")
    );
}

/// Test that a pair the service never answers falls back to the source text
#[tokio::test]
async fn test_run_withMissingSpanishWorld_shouldFallBackAndRetryNextRun() {
    let store = common::store_with_source(common::HELLO_WORLD);
    let config = common::test_config(&["title"], &["fr", "es"]);
    let mock = MockProvider::working().with_custom_response(common::hello_world_without_spanish_world);

    let summary = common::mock_controller(&config, Arc::new(store.clone()), &mock)
        .run()
        .await
        .unwrap();

    assert_eq!(mock.request_count(), config.translation.common.retry_count as usize);
    assert_eq!(
        common::read_json(&store, "translated/translated_french.json"),
        json!({"title":"Bonjour","items":[{"title":"Bonjour"},{"title":"Monde"}]})
    );
    assert_eq!(
        common::read_json(&store, "translated/translated_spanish.json"),
        json!({"title":"Hola","items":[{"title":"Hola"},{"title":"World"}]})
    );

    assert_eq!(summary.batches_exhausted, 1);
    assert_eq!(summary.fully_translated, 1);
    assert_eq!(summary.partially_translated, 1);
    let spanish = &summary.languages[1];
    assert_eq!(spanish.translated_texts, 1);
    assert_eq!(spanish.failed_texts, 1);
    assert_eq!(spanish.fallback_locations, 1);
    assert_eq!(summary.languages[0].fallback_locations, 0);

    // The failed pair is pending again on the next run, and only that pair
    let healthy = MockProvider::working().with_custom_response(common::hello_world_response);
    let summary = common::mock_controller(&config, Arc::new(store.clone()), &healthy)
        .run()
        .await
        .unwrap();

    let requests = healthy.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].texts, vec!["World"]);
    assert_eq!(requests[0].languages, vec!["es"]);
    assert!(summary.is_complete());
    assert_eq!(
        common::read_json(&store, "translated/translated_spanish.json")["items"][1]["title"],
        "Mundo"
    );
}

/// Test that a batch exhausting its attempts does not stop the run or the other batches
#[tokio::test]
async fn test_run_withOneBatchExhausted_shouldTranslateTheRest() {
    let source = r#"{"items":[{"title":"Hello"},{"title":"World"},{"title":"Bye"}]}"#;
    let store = common::store_with_source(source);
    let mut config = common::test_config(&["title"], &["fr"]);
    config.batching.max_tokens_per_batch = 3;
    config.batching.prompt_overhead_tokens = 1;
    let mock = MockProvider::working().with_custom_response(common::everything_but_world);

    let summary = common::mock_controller(&config, Arc::new(store.clone()), &mock)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.batches_planned, 3);
    assert_eq!(summary.batches_exhausted, 1);
    assert_eq!(summary.fully_translated, 2);
    assert_eq!(summary.untranslated, 1);
    assert_eq!(summary.languages[0].failed_texts, 1);
    assert_eq!(summary.languages[0].fallback_locations, 1);

    assert_eq!(
        common::read_json(&store, "translated/translated_french.json"),
        json!({"items":[{"title":"[fr] Hello"},{"title":"World"},{"title":"[fr] Bye"}]})
    );

    let progress: serde_json::Value =
        serde_json::from_slice(&store.read(&config.storage.progress_key).unwrap()).unwrap();
    assert_eq!(progress.as_object().unwrap().len(), 3);
}

/// Test that one text repeated a hundred times costs a single translation
#[tokio::test]
async fn test_run_withHundredIdenticalTexts_shouldTranslateOnce() {
    let source = json!({ "rows": vec![json!({ "title": "OK", "count": 1 }); 100] });
    let store = common::store_with_source(&source.to_string());
    let config = common::test_config(&["title"], &["fr"]);
    let mock = MockProvider::working();

    let summary = common::mock_controller(&config, Arc::new(store.clone()), &mock)
        .run()
        .await
        .unwrap();

    assert_eq!(mock.request_count(), 1);
    assert_eq!(mock.requests()[0].texts, vec!["OK"]);
    assert_eq!(summary.unique_texts, 1);
    assert_eq!(summary.total_locations, 100);

    let french = common::read_json(&store, "translated/translated_french.json");
    let rows = french["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 100);
    assert!(rows.iter().all(|row| row["title"] == "[fr] OK" && row["count"] == 1));
}

/// Test that everything outside translatable fields is copied unchanged
#[tokio::test]
async fn test_run_withMixedContent_shouldPreserveStructure() {
    let source = r#"{"id":7,"title":"Intro","meta":{"author":"Ann","tags":["a","b"],"ratio":0.5,"draft":false,"note":null},"sections":[{"prose":["First","Second",""],"level":2},{"title":"   "}]}"#;
    let store = common::store_with_source(source);
    let config = common::test_config(&["title", "prose"], &["fr"]);
    let mock = MockProvider::working();

    common::mock_controller(&config, Arc::new(store.clone()), &mock)
        .run()
        .await
        .unwrap();

    let output = String::from_utf8(store.read("translated/translated_french.json").unwrap()).unwrap();
    let french: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(
        french,
        json!({
            "id": 7,
            "title": "[fr] Intro",
            "meta": {"author":"Ann","tags":["a","b"],"ratio":0.5,"draft":false,"note":null},
            "sections": [{"prose":["[fr] First","[fr] Second",""],"level":2},{"title":"   "}]
        })
    );

    // Key order follows the source document
    let order: Vec<usize> = ["\"id\"", "\"title\"", "\"meta\"", "\"sections\""]
        .iter()
        .map(|key| output.find(key).unwrap())
        .collect();
    assert!(order.windows(2).all(|pair| pair[0] < pair[1]));
    assert!(output.ends_with('\n'));
}

/// Test that a document without translatable text finishes without any call or output
#[tokio::test]
async fn test_run_withNoTranslatableText_shouldExitEarly() {
    let store = common::store_with_source(r#"{"name":"Hello","items":[{"label":"World"}]}"#);
    let config = common::test_config(&["title"], &["fr"]);
    let mock = MockProvider::working();

    let mut controller = common::mock_controller(&config, Arc::new(store.clone()), &mock);
    let summary = controller.run().await.unwrap();

    assert_eq!(controller.state(), RunState::Done);
    assert_eq!(summary.total_locations, 0);
    assert_eq!(mock.request_count(), 0);
    assert_eq!(store.keys(), vec![SOURCE_KEY.to_string()]);
}

/// Test that a missing or broken source aborts before any remote call
#[tokio::test]
async fn test_run_withBadSource_shouldFailWithExtractionError() {
    let config = common::test_config(&["title"], &["fr"]);
    let mock = MockProvider::working();

    let result = common::mock_controller(&config, Arc::new(MemoryBlobStore::new()), &mock)
        .run()
        .await;
    assert!(matches!(result, Err(AppError::Extraction(ExtractionError::NotFound(_)))));

    let broken = common::store_with_source(r#"{"title": "Hello""#);
    let result = common::mock_controller(&config, Arc::new(broken.clone()), &mock).run().await;
    assert!(matches!(
        result,
        Err(AppError::Extraction(ExtractionError::InvalidJson { .. }))
    ));

    assert_eq!(mock.request_count(), 0);
    assert_eq!(broken.keys(), vec![SOURCE_KEY.to_string()]);
}

/// Test that test mode samples a few texts into English and Spanish only
#[tokio::test]
async fn test_run_withTestMode_shouldTranslateSampleIntoTestLanguages() {
    let titles: Vec<serde_json::Value> = (0..40).map(|i| json!({ "title": format!("Entry {}", i) })).collect();
    let store = common::store_with_source(&json!({ "entries": titles }).to_string());
    let mut config = common::test_config(&["title"], &["fr", "es", "en"]);
    config.test_mode = true;
    let mock = MockProvider::working();

    let summary = common::mock_controller(&config, Arc::new(store.clone()), &mock)
        .run()
        .await
        .unwrap();

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].texts, vec!["Entry 0", "Entry 1"]);
    assert_eq!(requests[0].languages, vec!["es", "en"]);

    assert_eq!(summary.languages.len(), 2);
    assert_eq!(summary.languages[0].translated_texts, 2);
    assert_eq!(summary.languages[0].missing_texts, 38);
    assert!(store.read("translated/translated_french.json").is_none());

    let spanish = common::read_json(&store, "translated/translated_spanish.json");
    assert_eq!(spanish["entries"][1]["title"], "[es] Entry 1");
    assert_eq!(spanish["entries"][2]["title"], "Entry 2");
}

/// Test that timestamped output names carry a UTC suffix
#[tokio::test]
async fn test_run_withTimestampOutputs_shouldSuffixOutputKeys() {
    let store = common::store_with_source(common::HELLO_WORLD);
    let mut config = common::test_config(&["title"], &["fr"]);
    config.storage.timestamp_outputs = true;
    config.storage.output_prefix = "out/".to_string();

    let summary = common::mock_controller(&config, Arc::new(store.clone()), &MockProvider::working())
        .run()
        .await
        .unwrap();

    let key = summary.languages[0].output_key.clone().unwrap();
    let pattern = Regex::new(r"^out/translated_french_\d{8}_\d{6}\.json$").unwrap();
    assert!(pattern.is_match(&key), "unexpected output key {}", key);
    assert!(store.read(&key).is_some());
}
