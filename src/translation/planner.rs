/*!
 * Token-bounded batch planning.
 *
 * A batch requests the union of the languages its texts still miss, so the
 * estimate for a batch is the sum of its texts' token estimates multiplied by
 * the size of that union. Texts fill the current batch in discovery order;
 * when the next text would push it over the ceiling, the batch is closed and
 * a new one started. A text too large on its own gets a batch of its own.
 */

use crate::app_config::BatchingConfig;
use crate::document::{TextId, UniqueText};
use crate::progress::ProgressSnapshot;

/// A UniqueText with the languages it still needs
#[derive(Debug, Clone, PartialEq)]
pub struct PendingText {
    /// Text identity
    pub id: TextId,
    /// Source text
    pub text: String,
    /// Target languages without a confirmed translation
    pub languages: Vec<String>,
}

/// Collect the texts that miss at least one of `languages`, in discovery order
pub fn pending_texts(
    unique: &[UniqueText],
    snapshot: &ProgressSnapshot,
    languages: &[String],
) -> Vec<PendingText> {
    unique
        .iter()
        .filter_map(|text| {
            let missing = snapshot.missing_languages(text, languages);
            (!missing.is_empty()).then(|| PendingText {
                id: text.id.clone(),
                text: text.text.clone(),
                languages: missing,
            })
        })
        .collect()
}

/// One text in a batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry {
    /// Text identity
    pub id: TextId,
    /// Source text
    pub text: String,
}

/// A group of texts sent together in one request
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Position in the plan
    pub index: usize,
    /// Texts in discovery order
    pub entries: Vec<BatchEntry>,
    /// Languages requested for every entry
    pub languages: Vec<String>,
    /// Estimated request size, prompt overhead excluded
    pub estimated_tokens: usize,
}

impl Batch {
    /// Number of text/language pairs requested
    pub fn pair_count(&self) -> usize {
        self.entries.len() * self.languages.len()
    }
}

/// Groups pending texts into batches under a token ceiling
#[derive(Debug, Clone)]
pub struct BatchPlanner {
    max_tokens_per_batch: usize,
    prompt_overhead_tokens: usize,
    chars_per_token: usize,
}

struct OpenBatch {
    entries: Vec<BatchEntry>,
    languages: Vec<String>,
    text_tokens: usize,
}

impl OpenBatch {
    fn languages_with(&self, extra: &[String]) -> usize {
        self.languages.len()
            + extra
                .iter()
                .filter(|language| !self.languages.contains(language))
                .count()
    }

    fn estimate(&self) -> usize {
        self.text_tokens * self.languages.len()
    }
}

impl BatchPlanner {
    /// Create a planner
    pub fn new(max_tokens_per_batch: usize, prompt_overhead_tokens: usize, chars_per_token: usize) -> Self {
        Self {
            max_tokens_per_batch,
            prompt_overhead_tokens,
            chars_per_token: chars_per_token.max(1),
        }
    }

    /// Create a planner from the batching configuration
    pub fn from_config(config: &BatchingConfig) -> Self {
        Self::new(
            config.max_tokens_per_batch,
            config.prompt_overhead_tokens,
            config.chars_per_token,
        )
    }

    /// Token budget left for texts once the prompt overhead is paid
    pub fn usable_tokens(&self) -> usize {
        self.max_tokens_per_batch
            .saturating_sub(self.prompt_overhead_tokens)
    }

    /// Estimated tokens for one text in one language
    pub fn estimate_text(&self, text: &str) -> usize {
        text.chars().count().div_ceil(self.chars_per_token)
    }

    /// Estimated tokens for one text in `languages` languages
    pub fn estimate(&self, text: &str, languages: usize) -> usize {
        self.estimate_text(text) * languages
    }

    /// Plan batches for `pending`
    pub fn plan(&self, pending: &[PendingText]) -> Vec<Batch> {
        let ceiling = self.usable_tokens();
        let mut closed: Vec<OpenBatch> = Vec::new();
        let mut current: Option<OpenBatch> = None;

        for text in pending {
            let tokens = self.estimate_text(&text.text);
            let entry = BatchEntry {
                id: text.id.clone(),
                text: text.text.clone(),
            };

            let fits = current.as_ref().is_some_and(|batch| {
                (batch.text_tokens + tokens) * batch.languages_with(&text.languages) <= ceiling
            });

            match current.as_mut() {
                Some(batch) if fits => {
                    batch.entries.push(entry);
                    batch.text_tokens += tokens;
                    for language in &text.languages {
                        if !batch.languages.contains(language) {
                            batch.languages.push(language.clone());
                        }
                    }
                }
                _ => {
                    let next = OpenBatch {
                        entries: vec![entry],
                        languages: text.languages.clone(),
                        text_tokens: tokens,
                    };
                    closed.extend(current.take());
                    current = Some(next);
                }
            }
        }
        closed.extend(current);

        closed
            .into_iter()
            .enumerate()
            .map(|(index, batch)| Batch {
                index,
                estimated_tokens: batch.estimate(),
                entries: batch.entries,
                languages: batch.languages,
            })
            .collect()
    }
}
