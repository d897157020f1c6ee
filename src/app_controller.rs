use anyhow::Result;
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::app_config::Config;
use crate::document::{FieldLocator, TranslatedDocument, UniqueText, deduplicate, reintegrate};
use crate::errors::{AppError, ExtractionError};
use crate::language_utils::{describe_language, language_file_slug};
use crate::progress::{ProgressSnapshot, ProgressStore, TranslationStatus, read_snapshot};
use crate::storage::{BlobStore, FsBlobStore};
use crate::translation::{
    BatchPlanner, BatchStatus, BatchTranslator, DispatchSettings, PendingText, TranslationService, pending_texts,
};

// @module: Application controller for document translation runs

/// Stages of a translation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Nothing loaded yet
    Init,
    /// Source loaded and translatable strings located
    Extracted,
    /// Strings collapsed into unique texts
    Deduped,
    /// Progress loaded and batches being planned
    Planning,
    /// Batches in flight
    Dispatching,
    /// Writing per-language documents
    Reintegrating,
    /// All outputs written
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Extracted => "extracted",
            Self::Deduped => "deduped",
            Self::Planning => "planning",
            Self::Dispatching => "dispatching",
            Self::Reintegrating => "reintegrating",
            Self::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// Per-language results of a run
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LanguageSummary {
    /// Target language code
    pub language: String,
    /// Unique texts with a confirmed translation
    pub translated_texts: usize,
    /// Unique texts whose last attempt failed permanently
    pub failed_texts: usize,
    /// Unique texts never attempted (test mode, or interrupted run)
    pub missing_texts: usize,
    /// Locations that kept the source text
    pub fallback_locations: usize,
    /// Key the document was written to, if one was written
    pub output_key: Option<String>,
}

/// Outcome of a run or of a status check
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// Translatable locations in the source
    pub total_locations: usize,
    /// Distinct texts among them
    pub unique_texts: usize,
    /// Batches planned this run
    pub batches_planned: usize,
    /// Batches that exhausted their retries
    pub batches_exhausted: usize,
    /// Requests sent to the service
    pub requests_sent: u32,
    /// Unique texts translated into every target language
    pub fully_translated: usize,
    /// Unique texts translated into some but not all target languages
    pub partially_translated: usize,
    /// Unique texts not translated into any target language
    pub untranslated: usize,
    /// Per-language detail, in target language order
    pub languages: Vec<LanguageSummary>,
}

impl RunSummary {
    fn tally(unique: &[UniqueText], snapshot: &ProgressSnapshot, languages: &[String]) -> Self {
        let mut summary = Self {
            total_locations: unique.iter().map(|text| text.locators.len()).sum(),
            unique_texts: unique.len(),
            languages: languages
                .iter()
                .map(|language| LanguageSummary {
                    language: language.clone(),
                    ..LanguageSummary::default()
                })
                .collect(),
            ..Self::default()
        };

        for text in unique {
            let mut done = 0;
            for language in summary.languages.iter_mut() {
                match snapshot.status(&text.id, &language.language) {
                    TranslationStatus::Done => {
                        language.translated_texts += 1;
                        done += 1;
                    }
                    TranslationStatus::FailedPermanent => language.failed_texts += 1,
                    TranslationStatus::Pending => language.missing_texts += 1,
                }
            }
            match done {
                0 => summary.untranslated += 1,
                n if n == languages.len() => summary.fully_translated += 1,
                _ => summary.partially_translated += 1,
            }
        }

        summary
    }

    /// Whether every location of every language got a translation
    pub fn is_complete(&self) -> bool {
        self.untranslated == 0 && self.partially_translated == 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} locations, {} unique texts: {} fully, {} partially, {} not translated",
            self.total_locations,
            self.unique_texts,
            self.fully_translated,
            self.partially_translated,
            self.untranslated
        )?;
        for language in &self.languages {
            writeln!(
                f,
                "  {:<18} {} translated, {} failed, {} not attempted, {} fallback locations",
                describe_language(&language.language),
                language.translated_texts,
                language.failed_texts,
                language.missing_texts,
                language.fallback_locations
            )?;
        }
        Ok(())
    }
}

/// Main application controller for document translation
pub struct Controller {
    // @field: App configuration
    config: Config,

    // @field: Source, progress and output storage
    store: Arc<dyn BlobStore>,

    // @field: Generation service client
    service: Arc<TranslationService>,

    // @field: Current stage of the run
    state: RunState,
}

impl Controller {
    // @method: Create a new controller from its collaborators
    pub fn new(config: Config, store: Arc<dyn BlobStore>, service: TranslationService) -> Self {
        Self {
            config,
            store,
            service: Arc::new(service),
            state: RunState::Init,
        }
    }

    // @method: Create a controller backed by the filesystem store and the configured provider
    pub fn from_config(config: Config) -> Result<Self> {
        let store: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(&config.storage.root));
        let service = TranslationService::new(config.translation.clone(), &config.source_language)?;
        Ok(Self::new(config, store, service))
    }

    /// Make sure the generation service is reachable and accepts our credentials
    pub async fn check_connection(&self) -> Result<(), AppError> {
        self.service.test_connection().await?;
        debug!("Connection to {} verified", self.service.describe());
        Ok(())
    }

    /// Current stage
    pub fn state(&self) -> RunState {
        self.state
    }

    fn transition(&mut self, next: RunState) {
        info!("Run state: {} -> {}", self.state, next);
        self.state = next;
    }

    /// Run a translation pass: translate everything still pending, then write
    /// one document per target language
    pub async fn run(&mut self) -> Result<RunSummary, AppError> {
        let start_time = Instant::now();
        let run_id = Uuid::new_v4();
        self.state = RunState::Init;
        info!(
            "Starting run {} for {} with {}",
            run_id,
            self.config.storage.source_key,
            self.service.describe()
        );

        let languages = self.config.effective_target_languages();
        if self.config.test_mode {
            warn!("Test mode: translating into {} only, ~5% of pending texts", languages.join(", "));
        }

        let source = self.load_source().await?;
        let locator = FieldLocator::new(self.config.document.translatable_fields.iter().cloned());
        let occurrences = locator.locate(&source);
        self.transition(RunState::Extracted);

        if occurrences.is_empty() {
            warn!(
                "No translatable text found under fields [{}], nothing to do",
                self.config.document.translatable_fields.join(", ")
            );
            self.transition(RunState::Done);
            return Ok(RunSummary::default());
        }

        let total_locations = occurrences.len();
        let unique = deduplicate(occurrences);
        self.transition(RunState::Deduped);
        info!(
            "Found {} translatable locations, {} unique texts ({:.1}% saved by deduplication)",
            total_locations,
            unique.len(),
            100.0 * (1.0 - unique.len() as f64 / total_locations as f64)
        );

        self.transition(RunState::Planning);
        let common = &self.config.translation.common;
        let progress = ProgressStore::load(
            Arc::clone(&self.store),
            self.config.storage.progress_key.clone(),
            common.persist_retry_count,
            Duration::from_millis(common.retry_backoff_ms),
        )
        .await?;

        let snapshot = progress.snapshot().await;
        let mut pending = pending_texts(&unique, &snapshot, &languages);
        info!(
            "{} of {} unique texts still need translation ({} already in progress snapshot)",
            pending.len(),
            unique.len(),
            snapshot.len()
        );
        if self.config.test_mode {
            pending = sample_for_test_mode(pending);
        }

        let planner = BatchPlanner::from_config(&self.config.batching);
        let batches = planner.plan(&pending);
        let batches_planned = batches.len();
        info!(
            "Planned {} batches (ceiling {} tokens per batch)",
            batches_planned,
            planner.usable_tokens()
        );

        self.transition(RunState::Dispatching);
        let mut requests_sent = 0;
        let mut batches_exhausted = 0;
        if !batches.is_empty() {
            let progress_bar = dispatch_progress_bar(batches_planned as u64);
            let translator =
                BatchTranslator::new(Arc::clone(&self.service), DispatchSettings::from_config(&self.config.translation));

            let result = translator
                .translate_batches(batches, &progress, |outcome| {
                    progress_bar.inc(1);
                    if outcome.status != BatchStatus::Translated {
                        progress_bar.set_message(format!("batch {} exhausted", outcome.index + 1));
                    }
                })
                .await;
            progress_bar.finish_and_clear();

            let outcomes = result?;
            requests_sent = outcomes.iter().map(|outcome| outcome.attempts).sum();
            batches_exhausted = outcomes
                .iter()
                .filter(|outcome| outcome.status != BatchStatus::Translated)
                .count();
        } else {
            info!("Nothing pending, skipping dispatch");
        }

        self.transition(RunState::Reintegrating);
        let snapshot = progress.snapshot().await;
        let mut summary = RunSummary::tally(&unique, &snapshot, &languages);
        summary.batches_planned = batches_planned;
        summary.batches_exhausted = batches_exhausted;
        summary.requests_sent = requests_sent;

        let suffix = self
            .config
            .storage
            .timestamp_outputs
            .then(|| Utc::now().format("_%Y%m%d_%H%M%S").to_string())
            .unwrap_or_default();

        for language_summary in summary.languages.iter_mut() {
            let translated = reintegrate(&source, &unique, &snapshot, &language_summary.language);
            let key = self.output_key(&language_summary.language, &suffix);
            self.write_output(&key, &translated).await?;

            language_summary.fallback_locations = translated.fallback_locations();
            language_summary.output_key = Some(key);
        }

        self.transition(RunState::Done);
        info!("Run {} finished in {:.1?}\n{}", run_id, start_time.elapsed(), summary);
        Ok(summary)
    }

    /// Report progress recorded for the source document without contacting the service
    pub async fn status(&self) -> Result<RunSummary, AppError> {
        let source = self.load_source().await?;
        let locator = FieldLocator::new(self.config.document.translatable_fields.iter().cloned());
        let unique = deduplicate(locator.locate(&source));
        let snapshot = read_snapshot(self.store.as_ref(), &self.config.storage.progress_key).await?;

        Ok(RunSummary::tally(
            &unique,
            &snapshot,
            &self.config.effective_target_languages(),
        ))
    }

    async fn load_source(&self) -> Result<Value, ExtractionError> {
        let key = &self.config.storage.source_key;
        let bytes = self
            .store
            .get(key)
            .await?
            .ok_or_else(|| ExtractionError::NotFound(key.clone()))?;

        let document = serde_json::from_slice(&bytes).map_err(|e| ExtractionError::InvalidJson {
            key: key.clone(),
            message: e.to_string(),
        })?;
        debug!("Loaded source document {} ({} bytes)", key, bytes.len());
        Ok(document)
    }

    /// Output key for `language`, e.g. `translated/translated_french.json`
    pub fn output_key(&self, language: &str, suffix: &str) -> String {
        format!(
            "{}translated_{}{}.json",
            self.config.storage.output_prefix,
            language_file_slug(language),
            suffix
        )
    }

    async fn write_output(&self, key: &str, translated: &TranslatedDocument) -> Result<(), AppError> {
        let mut bytes = serde_json::to_vec_pretty(&translated.document)?;
        bytes.push(b'\n');
        self.store.put(key, bytes).await?;

        if translated.warnings.is_empty() {
            info!("Wrote {} ({} locations translated)", key, translated.translated_locations);
        } else {
            warn!(
                "Wrote {} with {} locations falling back to source text",
                key,
                translated.fallback_locations()
            );
        }
        Ok(())
    }
}

/// Keep about 5% (at least one) of the pending texts, in discovery order
fn sample_for_test_mode(pending: Vec<PendingText>) -> Vec<PendingText> {
    let keep = (pending.len() * 5 / 100).max(1).min(pending.len());
    if keep < pending.len() {
        info!("Test mode: processing {} of {} pending texts", keep, pending.len());
    }
    pending.into_iter().take(keep).collect()
}

fn dispatch_progress_bar(total_batches: u64) -> ProgressBar {
    let progress_bar = ProgressBar::new(total_batches);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} batches ({percent}%) {msg} {eta}")
        .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress_bar.set_style(style.progress_chars("█▓▒░"));
    progress_bar
}
