/*!
 * Batch dispatch.
 *
 * Batches run concurrently under two independent gates: a semaphore bounding
 * the requests in flight and a sliding-window limiter bounding request starts.
 * Every attempt, first or retry, takes a new rate token. A worker keeps its
 * slot through backoff and through persisting the batch's records, so a batch
 * is durable before its slot is handed to the next one.
 */

use futures::stream::{self, StreamExt, TryStreamExt};
use log::{debug, error, warn};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::app_config::TranslationConfig;
use crate::errors::{AppError, ProviderError, TranslationError, ValidationError};
use crate::progress::{ProgressStore, RecordOutcome, TranslationRecord};
use crate::translation::prompts::PartialTranslation;

use super::core::TranslationService;
use super::planner::Batch;
use super::rate_limit::RateLimiter;

/// Retry and pacing settings for the dispatcher
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Maximum number of batch requests in flight
    pub max_concurrent_requests: usize,
    /// Request starts allowed per window, `None` for unlimited
    pub requests_per_window: Option<u32>,
    /// Rate limit window
    pub window: Duration,
    /// Attempts per batch
    pub retry_count: u32,
    /// Base backoff, doubled on each retry
    pub retry_backoff: Duration,
    /// Upper bound for one backoff
    pub max_backoff: Duration,
}

impl DispatchSettings {
    /// Settings for the active provider of `config`
    pub fn from_config(config: &TranslationConfig) -> Self {
        Self {
            max_concurrent_requests: config.optimal_concurrent_requests().max(1),
            requests_per_window: config.get_rate_limit(),
            window: Duration::from_secs(config.common.rate_limit_window_secs),
            retry_count: config.common.retry_count.max(1),
            retry_backoff: Duration::from_millis(config.common.retry_backoff_ms),
            max_backoff: Duration::from_millis(config.common.max_backoff_ms),
        }
    }

    /// Backoff before retry number `attempt + 1`: exponential, capped, with up
    /// to 10% jitter, and never shorter than the service asked for
    pub fn backoff(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        let delay = self.retry_backoff.saturating_mul(factor).min(self.max_backoff);

        let jitter_ms = (delay.as_millis() / 10) as u64;
        let jitter = if jitter_ms > 0 {
            Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
        } else {
            Duration::ZERO
        };

        (delay + jitter).max(retry_after.unwrap_or_default())
    }
}

/// How a batch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// Every pair validated
    Translated,
    /// Retries exhausted; the valid part of the last answer was kept
    Salvaged,
    /// Retries exhausted without a usable answer
    Failed,
}

/// Result of dispatching one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Batch position in the plan
    pub index: usize,
    /// Final status
    pub status: BatchStatus,
    /// Requests sent for this batch
    pub attempts: u32,
    /// Pairs translated
    pub translated: usize,
    /// Pairs marked failed
    pub failed: usize,
}

/// Dispatches batches to the translation service and persists their results
pub struct BatchTranslator {
    /// The translation service to use
    service: Arc<TranslationService>,

    /// Pacing and retry settings
    settings: DispatchSettings,

    /// Bounds the requests in flight
    semaphore: Arc<Semaphore>,

    /// Bounds request starts per window
    limiter: Option<Arc<RateLimiter>>,
}

impl BatchTranslator {
    /// Create a new batch translator
    pub fn new(service: Arc<TranslationService>, settings: DispatchSettings) -> Self {
        let limiter = RateLimiter::per_window(settings.requests_per_window, settings.window).map(Arc::new);
        Self {
            semaphore: Arc::new(Semaphore::new(settings.max_concurrent_requests.max(1))),
            service,
            settings,
            limiter,
        }
    }

    /// Translate `batches`, persisting each batch's records as it completes.
    ///
    /// Exhausted batches are recorded as failures and do not stop the run.
    /// A persistence failure does: no new batch starts once one is returned.
    pub async fn translate_batches<F>(
        &self,
        batches: Vec<Batch>,
        progress: &ProgressStore,
        progress_callback: F,
    ) -> Result<Vec<BatchOutcome>, AppError>
    where
        F: Fn(&BatchOutcome),
    {
        let total_batches = batches.len();
        let progress_callback = &progress_callback;

        let mut outcomes = stream::iter(batches)
            .map(|batch| async move {
                let _permit = self
                    .semaphore
                    .acquire()
                    .await
                    .map_err(|e| AppError::Unknown(format!("Dispatcher closed: {}", e)))?;

                debug!(
                    "Processing batch {} of {} ({} texts, {} languages, ~{} tokens)",
                    batch.index + 1,
                    total_batches,
                    batch.entries.len(),
                    batch.languages.len(),
                    batch.estimated_tokens
                );

                let (records, outcome) = self.dispatch(&batch).await;
                progress.merge_and_persist(&records).await?;
                progress_callback(&outcome);

                Ok::<_, AppError>(outcome)
            })
            .buffer_unordered(self.settings.max_concurrent_requests.max(1))
            .try_collect::<Vec<_>>()
            .await?;

        outcomes.sort_by_key(|outcome| outcome.index);
        Ok(outcomes)
    }

    /// Run one batch to completion or exhaustion
    async fn dispatch(&self, batch: &Batch) -> (Vec<TranslationRecord>, BatchOutcome) {
        let mut attempts = 0;
        let mut last_partial: Option<Box<PartialTranslation>> = None;

        while attempts < self.settings.retry_count {
            if let Some(limiter) = &self.limiter {
                limiter.acquire().await;
            }
            attempts += 1;

            let error = match self.service.request_batch(batch).await {
                Ok(records) => {
                    let outcome = BatchOutcome {
                        index: batch.index,
                        status: BatchStatus::Translated,
                        attempts,
                        translated: records.len(),
                        failed: 0,
                    };
                    return (records, outcome);
                }
                Err(error) => error,
            };

            warn!(
                "Batch {} attempt {}/{} failed: {}",
                batch.index + 1,
                attempts,
                self.settings.retry_count,
                describe(&error)
            );

            let retryable = error.is_retryable();
            let retry_after = error.retry_after();
            last_partial = match error {
                TranslationError::Validation(ValidationError::Incomplete { partial, .. }) => Some(partial),
                _ => None,
            };

            if !retryable {
                error!("Batch {} hit a non-retryable error, giving up", batch.index + 1);
                break;
            }
            if attempts < self.settings.retry_count {
                let delay = self.settings.backoff(attempts - 1, retry_after);
                debug!("Retrying batch {} in {:?}", batch.index + 1, delay);
                tokio::time::sleep(delay).await;
            }
        }

        exhausted(batch, attempts, last_partial)
    }
}

fn describe(error: &TranslationError) -> String {
    match error {
        TranslationError::Provider(ProviderError::Blocked { finish_reason, details }) => {
            format!(
                "generation blocked, finish reason {} (safety ratings: {})",
                finish_reason,
                details.as_deref().unwrap_or("n/a")
            )
        }
        other => other.to_string(),
    }
}

/// Records for a batch whose attempts ran out
fn exhausted(
    batch: &Batch,
    attempts: u32,
    last_partial: Option<Box<PartialTranslation>>,
) -> (Vec<TranslationRecord>, BatchOutcome) {
    let (records, status) = match last_partial {
        Some(partial) => {
            let PartialTranslation { mut records, missing } = *partial;
            records.extend(missing.into_iter().filter_map(|(position, language)| {
                batch
                    .entries
                    .get(position)
                    .map(|entry| TranslationRecord::failed(entry.id.clone(), entry.text.clone(), language))
            }));
            (records, BatchStatus::Salvaged)
        }
        None => {
            let records = batch
                .entries
                .iter()
                .flat_map(|entry| {
                    batch.languages.iter().map(|language| {
                        TranslationRecord::failed(entry.id.clone(), entry.text.clone(), language.clone())
                    })
                })
                .collect();
            (records, BatchStatus::Failed)
        }
    };

    let failed = records
        .iter()
        .filter(|record| record.outcome == RecordOutcome::Failed)
        .count();
    let translated = records.len() - failed;

    warn!(
        "Batch {} exhausted after {} attempts: {} pairs kept, {} marked failed",
        batch.index + 1,
        attempts,
        translated,
        failed
    );

    (
        records,
        BatchOutcome {
            index: batch.index,
            status,
            attempts,
            translated,
            failed,
        },
    )
}
