/*!
 * Progress snapshot models.
 *
 * The snapshot is the only durable state of a run. On disk it is a JSON
 * object keyed by text hash:
 *
 * ```json
 * { "<sha256>": { "text": "...", "translations": { "fr": "..." }, "failed": ["es"] } }
 * ```
 */

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::document::{TextId, UniqueText};

/// Translation status of one text in one language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationStatus {
    /// Not translated yet
    Pending,
    /// Translation confirmed
    Done,
    /// Retries exhausted in a previous batch
    FailedPermanent,
}

/// Outcome recorded for one text in one language
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// Validated translation
    Translated(String),
    /// The batch carrying this text exhausted its retries
    Failed,
}

/// Result of a batch for one text/language pair
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationRecord {
    /// Text identity
    pub text_id: TextId,
    /// Source text, stored alongside for readability and integrity checks
    pub text: String,
    /// Target language code
    pub language: String,
    /// Translation or failure marker
    pub outcome: RecordOutcome,
}

impl TranslationRecord {
    /// A validated translation
    pub fn translated(text_id: TextId, text: impl Into<String>, language: impl Into<String>, translation: impl Into<String>) -> Self {
        Self {
            text_id,
            text: text.into(),
            language: language.into(),
            outcome: RecordOutcome::Translated(translation.into()),
        }
    }

    /// A permanent failure marker
    pub fn failed(text_id: TextId, text: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            text_id,
            text: text.into(),
            language: language.into(),
            outcome: RecordOutcome::Failed,
        }
    }
}

/// Progress for one text
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TextProgress {
    /// Source text
    pub text: String,
    /// Confirmed translations by language code
    #[serde(default)]
    pub translations: BTreeMap<String, String>,
    /// Languages whose last attempt failed permanently
    #[serde(default)]
    pub failed: BTreeSet<String>,
}

/// What a merge changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeStats {
    /// New translations stored
    pub translated: usize,
    /// New failure markers stored
    pub failed: usize,
    /// Records ignored because a translation was already confirmed
    pub ignored: usize,
}

/// All confirmed translations and failures, keyed by text hash
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgressSnapshot {
    entries: BTreeMap<TextId, TextProgress>,
}

impl ProgressSnapshot {
    /// An empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of texts with any recorded outcome
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Progress for one text
    pub fn get(&self, id: &TextId) -> Option<&TextProgress> {
        self.entries.get(id)
    }

    /// Iterate over all entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&TextId, &TextProgress)> {
        self.entries.iter()
    }

    /// Status of one text in one language
    pub fn status(&self, id: &TextId, language: &str) -> TranslationStatus {
        match self.entries.get(id) {
            Some(entry) if entry.translations.contains_key(language) => TranslationStatus::Done,
            Some(entry) if entry.failed.contains(language) => TranslationStatus::FailedPermanent,
            _ => TranslationStatus::Pending,
        }
    }

    /// Confirmed translation of one text in one language
    pub fn translation(&self, id: &TextId, language: &str) -> Option<&str> {
        self.entries
            .get(id)
            .and_then(|entry| entry.translations.get(language))
            .map(String::as_str)
    }

    /// Languages of `languages` still lacking a confirmed translation for `text`.
    /// Failed languages count as missing so that a new run retries them.
    pub fn missing_languages(&self, text: &UniqueText, languages: &[String]) -> Vec<String> {
        languages
            .iter()
            .filter(|language| self.status(&text.id, language) != TranslationStatus::Done)
            .cloned()
            .collect()
    }

    /// Merge batch results. A confirmed translation is never overwritten and
    /// a failure marker never hides a confirmed translation.
    pub fn apply(&mut self, records: &[TranslationRecord]) -> MergeStats {
        let mut stats = MergeStats::default();

        for record in records {
            let entry = self
                .entries
                .entry(record.text_id.clone())
                .or_insert_with(|| TextProgress {
                    text: record.text.clone(),
                    ..TextProgress::default()
                });

            if entry.translations.contains_key(&record.language) {
                stats.ignored += 1;
                continue;
            }

            match &record.outcome {
                RecordOutcome::Translated(translation) => {
                    entry.failed.remove(&record.language);
                    entry
                        .translations
                        .insert(record.language.clone(), translation.clone());
                    stats.translated += 1;
                }
                RecordOutcome::Failed => {
                    if entry.failed.insert(record.language.clone()) {
                        stats.failed += 1;
                    } else {
                        stats.ignored += 1;
                    }
                }
            }
        }

        stats
    }

    /// Check that every key is the hash of its text
    pub fn verify(&self) -> Result<(), String> {
        for (id, entry) in &self.entries {
            let expected = TextId::of(&entry.text);
            if &expected != id {
                return Err(format!(
                    "entry {} does not match the hash of its text ({})",
                    id, expected
                ));
            }
        }
        Ok(())
    }
}
