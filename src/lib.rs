/*!
 * # doctrans - restartable translation of structured JSON documents
 *
 * A Rust library for translating the text fields of large JSON documents into
 * many target languages with a text-generation service.
 *
 * ## Features
 *
 * - Locate translatable strings by field name anywhere in a document
 * - Translate each distinct text once, however often it occurs
 * - Pack texts into token-bounded batches, one request per batch
 * - Translate through various providers:
 *   - Google Gemini API
 *   - OpenAI-compatible chat completions
 * - Bounded concurrency, sliding-window rate limiting and retries with backoff
 * - Durable progress after every batch, so interrupted runs resume
 * - One output document per language with the source structure preserved
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `document`: Field location, deduplication and reintegration
 * - `progress`: Progress snapshot and its durable store
 * - `storage`: Blob storage for sources, progress and outputs
 * - `translation`: Translation services:
 *   - `translation::planner`: Token-bounded batch planning
 *   - `translation::core`: Core translation functionality
 *   - `translation::batch`: Rate-limited concurrent dispatch with retries
 *   - `translation::prompts`: Prompt rendering and response validation
 * - `app_controller`: Main application controller
 * - `language_utils`: ISO language code utilities
 * - `providers`: Client implementations for the supported services:
 *   - `providers::gemini`: Gemini API client
 *   - `providers::openai`: OpenAI API client
 *   - `providers::mock`: Scriptable provider for tests
 * - `errors`: Custom error types for the application
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod document;
pub mod errors;
pub mod language_utils;
pub mod progress;
pub mod providers;
pub mod storage;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::{Controller, RunSummary};
pub use errors::{AppError, PersistenceError, ProviderError, TranslationError};
pub use storage::{BlobStore, FsBlobStore, MemoryBlobStore};
pub use translation::TranslationService;
