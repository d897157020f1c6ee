/*!
 * Tests for application configuration functionality
 */

use doctrans::app_config::{Config, LogLevel, TranslationProvider};

use crate::common;

/// Test default configuration values
#[test]
fn test_default_config_withNoParameters_shouldHaveCorrectDefaults() {
    let config = Config::default();

    assert_eq!(config.source_language, "de");
    assert_eq!(config.target_languages.len(), 14);
    assert_eq!(config.document.translatable_fields, vec!["prose", "title"]);
    assert_eq!(config.storage.output_prefix, "translated/");
    assert_eq!(config.storage.progress_key, "translation_progress/progress_data.json");
    assert_eq!(config.translation.provider, TranslationProvider::Gemini);
    assert_eq!(config.translation.get_rate_limit(), Some(10));
    assert_eq!(config.translation.optimal_concurrent_requests(), 10);
    assert_eq!(config.log_level, LogLevel::Info);
    assert!(!config.test_mode);
}

/// Test configuration validation
#[test]
fn test_config_validation_withVariousConfigs_shouldValidateCorrectly() {
    let mut config = common::test_config(&["title"], &["fr", "es"]);
    assert!(config.validate().is_ok());

    config.target_languages = vec!["fr".to_string(), "xx".to_string()];
    assert!(config.validate().is_err());
    config.target_languages = vec![];
    assert!(config.validate().is_err());
    config.target_languages = vec!["fr".to_string()];

    config.document.translatable_fields.clear();
    assert!(config.validate().is_err());
    config.document.translatable_fields = vec!["title".to_string()];

    config.batching.max_tokens_per_batch = config.batching.prompt_overhead_tokens;
    assert!(config.validate().is_err());
    config.batching.max_tokens_per_batch = 4000;

    config.translation.active_provider_config_mut().api_key.clear();
    assert!(config.validate().is_err());
}

/// Test that a language listed twice is rejected
#[test]
fn test_config_validation_withDuplicateLanguages_shouldFail() {
    let mut config = common::test_config(&["title"], &["fr", "es", "fr"]);
    let error = config.validate().unwrap_err();
    assert!(error.to_string().contains("fr"));

    config.target_languages = vec!["es".to_string(), "ES".to_string()];
    assert!(config.validate().is_err());

    config.target_languages = vec!["es".to_string(), "fr".to_string()];
    assert!(config.validate().is_ok());
}

/// Test that a sparse configuration file fills in defaults
#[test]
fn test_config_deserialize_withPartialJson_shouldUseDefaults() {
    let json = r#"{
        "source_language": "de",
        "target_languages": ["fr"],
        "storage": { "source_key": "catalog.json" },
        "translation": { "provider": "openai" },
        "log_level": "debug"
    }"#;

    let config: Config = serde_json::from_str(json).unwrap();
    assert_eq!(config.storage.source_key, "catalog.json");
    assert_eq!(config.storage.output_prefix, "translated/");
    assert_eq!(config.translation.provider, TranslationProvider::OpenAI);
    assert_eq!(config.translation.get_model(), "gpt-4o-mini");
    assert_eq!(config.translation.common.retry_count, 5);
    assert_eq!(config.batching.chars_per_token, 3);
    assert_eq!(config.log_level, LogLevel::Debug);
}

/// Test that test mode narrows the languages
#[test]
fn test_effectiveTargetLanguages_withTestMode_shouldKeepEnglishAndSpanish() {
    let mut config = common::test_config(&["title"], &["fr", "es", "it"]);
    assert_eq!(config.effective_target_languages(), vec!["fr", "es", "it"]);

    config.test_mode = true;
    assert_eq!(config.effective_target_languages(), vec!["es"]);

    config.target_languages = vec!["fr".to_string()];
    assert_eq!(config.effective_target_languages(), vec!["en", "es"]);
}

/// Test that a default config survives a round trip through conf.json
#[test]
fn test_config_file_withDefaultWritten_shouldLoadBack() {
    let dir = common::create_temp_dir().unwrap();
    let path = dir.path().join("conf.json");
    std::fs::write(&path, serde_json::to_string_pretty(&Config::default()).unwrap()).unwrap();

    let loaded: Config = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(loaded.target_languages, Config::default().target_languages);
    assert_eq!(loaded.translation.available_providers.len(), 2);
}
