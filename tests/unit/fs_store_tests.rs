/*!
 * Tests for the filesystem blob store
 */

use std::sync::Arc;

use doctrans::errors::StorageError;
use doctrans::providers::mock::MockProvider;
use doctrans::storage::{BlobStore, FsBlobStore};

use crate::common;

/// Test that keys resolve below the root and traversal is refused
#[tokio::test]
async fn test_fsStore_withKeys_shouldStayUnderRoot() {
    let dir = common::create_temp_dir().unwrap();
    let store = FsBlobStore::new(dir.path());

    let path = store.path_for("translated/translated_french.json").unwrap();
    assert!(path.starts_with(dir.path()));
    assert!(path.ends_with("translated/translated_french.json"));

    for key in ["../escape.json", "/etc/passwd", "a//b.json", "C:/x.json", ""] {
        assert!(
            matches!(store.put(key, b"{}".to_vec()).await, Err(StorageError::InvalidKey(_))),
            "key {:?} should be rejected",
            key
        );
    }
}

/// Test that a replaced value is read back whole
#[test]
fn test_fsStore_putTwice_shouldReturnLatestValue() {
    let dir = common::create_temp_dir().unwrap();
    let store = FsBlobStore::new(dir.path());

    tokio_test::block_on(async {
        store.put("progress/data.json", b"first".to_vec()).await.unwrap();
        store.put("progress/data.json", b"second value".to_vec()).await.unwrap();

        assert_eq!(store.get("progress/data.json").await.unwrap(), Some(b"second value".to_vec()));
        assert!(store.exists("progress/data.json").await.unwrap());
        assert!(!store.exists("progress/other.json").await.unwrap());
    });
}

/// Test a full run against a directory on disk
#[tokio::test]
async fn test_controller_withFsStore_shouldWriteOutputsAndProgressFiles() {
    let dir = common::create_temp_dir().unwrap();
    std::fs::write(dir.path().join(common::SOURCE_KEY), common::HELLO_WORLD).unwrap();

    let mut config = common::test_config(&["title"], &["fr", "es"]);
    config.storage.root = dir.path().to_string_lossy().to_string();
    let mock = MockProvider::working().with_custom_response(common::hello_world_response);
    let store: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(dir.path()));

    let summary = common::mock_controller(&config, store, &mock).run().await.unwrap();
    assert!(summary.is_complete());

    let french = std::fs::read_to_string(dir.path().join("translated/translated_french.json")).unwrap();
    let french: serde_json::Value = serde_json::from_str(&french).unwrap();
    assert_eq!(french["items"][1]["title"], "Monde");
    assert!(dir.path().join("translated/translated_spanish.json").exists());
    assert!(dir.path().join("translation_progress/progress_data.json").exists());

    let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("translated"))
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| !entry.file_name().to_string_lossy().starts_with("translated_"))
        .collect();
    assert!(leftovers.is_empty(), "temporary files left behind: {:?}", leftovers);
}
