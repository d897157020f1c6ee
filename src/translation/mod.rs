/*!
 * Translation of deduplicated texts through a text-generation service.
 *
 * - `planner`: groups pending texts into token-bounded batches
 * - `prompts`: builds batch prompts and validates answers
 * - `core`: sends one batch to the configured provider
 * - `batch`: concurrent, rate-limited dispatch with retries and persistence
 * - `rate_limit`: sliding-window admission of request starts
 * - `concurrency`: per-provider concurrency and rate defaults
 */

// Re-export main types for easier usage
pub use self::batch::{BatchOutcome, BatchStatus, BatchTranslator, DispatchSettings};
pub use self::core::TranslationService;
pub use self::planner::{Batch, BatchEntry, BatchPlanner, PendingText, pending_texts};
pub use self::prompts::{PromptTemplate, TRANSLATION_FAILED_SENTINEL, TranslationPromptBuilder};
pub use self::rate_limit::RateLimiter;

// Submodules
pub mod batch;
pub mod concurrency;
pub mod core;
pub mod planner;
pub mod prompts;
pub mod rate_limit;
