/*!
 * Prompt construction and response validation for batch requests.
 *
 * Batch entries are addressed by positional ids (`"0"`, `"1"`, ...). The model
 * answers with one JSON object mapping each id to an object keyed by
 * language code:
 *
 * ```json
 * { "0": { "fr": "Bonjour", "es": "Hola" }, "1": { "fr": "Monde", "es": "Mundo" } }
 * ```
 */

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::errors::ValidationError;
use crate::language_utils::describe_language;
use crate::progress::TranslationRecord;
use crate::translation::planner::Batch;

/// Answer the model is told to give when it cannot translate a text
pub const TRANSLATION_FAILED_SENTINEL: &str = "TRANSLATION FAILED";

/// Markdown code fences around a JSON answer
static CODE_FENCE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*```[a-zA-Z]*\s*$").unwrap());

/// System prompt template with `{source_language}` and `{target_languages}` placeholders
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// Create a new prompt template.
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    /// Render the template for one batch
    pub fn render(&self, source_language: &str, target_languages: &[String]) -> String {
        let targets = target_languages
            .iter()
            .map(|code| describe_language(code))
            .collect::<Vec<_>>()
            .join(", ");
        self.template
            .replace("{source_language}", &describe_language(source_language))
            .replace("{target_languages}", &targets)
    }
}

/// System and user parts of one batch request
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPrompt {
    /// Role and tone instructions
    pub system: String,
    /// Output rules and the texts to translate
    pub user: String,
}

/// Builds the request prompt for a batch
#[derive(Debug, Clone)]
pub struct TranslationPromptBuilder {
    source_language: String,
    template: PromptTemplate,
}

impl TranslationPromptBuilder {
    /// Create a builder for texts written in `source_language`
    pub fn new(source_language: &str, system_template: &str) -> Self {
        Self {
            source_language: source_language.to_string(),
            template: PromptTemplate::new(system_template),
        }
    }

    /// Build the prompt for `batch`
    pub fn build(&self, batch: &Batch) -> BatchPrompt {
        let codes = batch.languages.join(", ");
        let texts: Map<String, Value> = batch
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (position.to_string(), Value::String(entry.text.clone())))
            .collect();
        let texts = serde_json::to_string_pretty(&Value::Object(texts)).unwrap_or_default();

        let user = format!(
            "Translate every text below into all of these languages: {codes}.\n\
             \n\
             RULES:\n\
             1. Return a single valid JSON object and nothing else. No explanations and no markdown fences.\n\
             2. The top-level keys of the returned object must be the text ids exactly as given.\n\
             3. The value for each id must be an object whose keys are the language codes ({codes}) and whose values are the translations.\n\
             4. Do not translate the ids or the language codes.\n\
             5. If a translation is not possible, use the string \"{sentinel}\" as its value.\n\
             \n\
             Texts to translate, keyed by id:\n\
             {texts}\n",
            codes = codes,
            sentinel = TRANSLATION_FAILED_SENTINEL,
            texts = texts,
        );

        BatchPrompt {
            system: self.template.render(&self.source_language, &batch.languages),
            user,
        }
    }
}

/// Recover the JSON object from a model answer.
///
/// Tolerates markdown fences and prose around the object by keeping the span
/// from the first `{` to the last `}`.
pub fn extract_json(raw: &str) -> Result<Value, ValidationError> {
    let cleaned = CODE_FENCE_REGEX.replace_all(raw, "");
    let start = cleaned.find('{');
    let end = cleaned.rfind('}');

    let candidate = match (start, end) {
        (Some(start), Some(end)) if start < end => &cleaned[start..=end],
        _ => {
            return Err(ValidationError::Unparseable(format!(
                "no JSON object in response ({} chars)",
                raw.len()
            )));
        }
    };

    serde_json::from_str(candidate).map_err(|e| ValidationError::Unparseable(e.to_string()))
}

/// Valid entries of a response that failed validation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialTranslation {
    /// Translations that passed validation
    pub records: Vec<TranslationRecord>,
    /// Entry positions and languages without a usable translation
    pub missing: Vec<(usize, String)>,
}

fn usable(value: Option<&Value>) -> Option<&str> {
    let text = value?.as_str()?;
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.starts_with(TRANSLATION_FAILED_SENTINEL) {
        return None;
    }
    Some(text)
}

/// Check a model answer against the batch it answers.
///
/// Succeeds only when every entry has a usable translation in every requested
/// language and nothing else is present.
pub fn validate_response(batch: &Batch, raw: &str) -> Result<Vec<TranslationRecord>, ValidationError> {
    let value = extract_json(raw)?;
    let Value::Object(answers) = value else {
        return Err(ValidationError::Malformed("top-level value is not an object".to_string()));
    };

    let mut unexpected = answers
        .keys()
        .filter(|key| {
            key.parse::<usize>()
                .map_or(true, |position| position >= batch.entries.len() || position.to_string() != **key)
        })
        .count();

    let mut partial = PartialTranslation::default();

    for (position, entry) in batch.entries.iter().enumerate() {
        let answer = answers.get(&position.to_string()).and_then(Value::as_object);

        if let Some(answer) = answer {
            unexpected += answer
                .keys()
                .filter(|language| !batch.languages.contains(language))
                .count();
        }

        for language in &batch.languages {
            match usable(answer.and_then(|a| a.get(language))) {
                Some(text) => partial.records.push(TranslationRecord::translated(
                    entry.id.clone(),
                    entry.text.clone(),
                    language.clone(),
                    text,
                )),
                None => partial.missing.push((position, language.clone())),
            }
        }
    }

    if partial.missing.is_empty() && unexpected == 0 {
        return Ok(partial.records);
    }

    Err(ValidationError::Incomplete {
        missing: partial.missing.len(),
        unexpected,
        partial: Box::new(partial),
    })
}
