use log::warn;
use serde_json::Value;
use std::fmt;

use crate::document::{Locator, TextId, UniqueText};
use crate::progress::{ProgressSnapshot, TranslationStatus};

/// Why a location kept its source text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningReason {
    /// The text's batch exhausted its retries
    FailedPermanent,
    /// No translation has been recorded yet
    NotTranslated,
    /// The locator no longer points at a string in the source
    PathNotFound,
}

impl fmt::Display for WarningReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FailedPermanent => write!(f, "translation failed permanently"),
            Self::NotTranslated => write!(f, "no translation available"),
            Self::PathNotFound => write!(f, "path not found"),
        }
    }
}

/// A location that kept its source text
#[derive(Debug, Clone, PartialEq)]
pub struct ReintegrationWarning {
    /// Location in the document
    pub locator: Locator,
    /// Text at that location
    pub text_id: TextId,
    /// Output language
    pub language: String,
    /// Why the source text was kept
    pub reason: WarningReason,
}

/// Per-language copy of the source document
#[derive(Debug, Clone)]
pub struct TranslatedDocument {
    /// Target language code
    pub language: String,
    /// The translated tree
    pub document: Value,
    /// Locations that fell back to the source text
    pub warnings: Vec<ReintegrationWarning>,
    /// Number of locations that received a translation
    pub translated_locations: usize,
}

impl TranslatedDocument {
    /// Number of locations that kept the source text
    pub fn fallback_locations(&self) -> usize {
        self.warnings.len()
    }
}

/// Build the `language` copy of `source`, substituting every recorded
/// translation. Locations without one keep the source text and get a warning.
pub fn reintegrate(
    source: &Value,
    unique: &[UniqueText],
    snapshot: &ProgressSnapshot,
    language: &str,
) -> TranslatedDocument {
    let mut document = source.clone();
    let mut warnings = Vec::new();
    let mut translated_locations = 0;

    for text in unique {
        let status = snapshot.status(&text.id, language);
        let translation = snapshot.translation(&text.id, language);

        for locator in &text.locators {
            let Some(slot) = locator.resolve_mut(&mut document) else {
                warnings.push(fallback(locator, text, language, WarningReason::PathNotFound));
                continue;
            };
            if !slot.is_string() {
                warnings.push(fallback(locator, text, language, WarningReason::PathNotFound));
                continue;
            }

            match (status, translation) {
                (TranslationStatus::Done, Some(translated)) => {
                    *slot = Value::String(translated.to_string());
                    translated_locations += 1;
                }
                (TranslationStatus::FailedPermanent, _) => {
                    warnings.push(fallback(locator, text, language, WarningReason::FailedPermanent));
                }
                _ => {
                    warnings.push(fallback(locator, text, language, WarningReason::NotTranslated));
                }
            }
        }
    }

    TranslatedDocument {
        language: language.to_string(),
        document,
        warnings,
        translated_locations,
    }
}

fn fallback(locator: &Locator, text: &UniqueText, language: &str, reason: WarningReason) -> ReintegrationWarning {
    warn!(
        "[{}] keeping source text at {} ({}): {}",
        language,
        locator,
        text.id.short(),
        reason
    );
    ReintegrationWarning {
        locator: locator.clone(),
        text_id: text.id.clone(),
        language: language.to_string(),
        reason,
    }
}
