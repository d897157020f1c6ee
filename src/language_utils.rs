use anyhow::{Result, anyhow};
use isolang::Language;

/// Language utilities for ISO language code handling
///
/// Target languages are configured as ISO 639-1 (2-letter) codes, the form
/// generation services expect as JSON keys. ISO 639-3 codes are accepted for
/// languages without a 2-letter code.
/// Language code type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LanguageCodeType {
    /// ISO 639-1 (2-letter) code
    Part1,
    /// ISO 639-3 (3-letter) code
    Part3,
}

/// Validate if a language code is a valid ISO 639-1 or ISO 639-3 code
pub fn validate_language_code(code: &str) -> Result<LanguageCodeType> {
    if code != code.trim() || code.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(anyhow!("Language code must be lowercase without spaces: '{}'", code));
    }

    match code.len() {
        2 if Language::from_639_1(code).is_some() => Ok(LanguageCodeType::Part1),
        3 if Language::from_639_3(code).is_some() => Ok(LanguageCodeType::Part3),
        _ => Err(anyhow!("Invalid language code: {}", code)),
    }
}

fn lookup(code: &str) -> Option<Language> {
    match code.len() {
        2 => Language::from_639_1(code),
        3 => Language::from_639_3(code),
        _ => None,
    }
}

/// Get the English language name from a code
pub fn get_language_name(code: &str) -> Result<String> {
    let lang = lookup(&code.trim().to_lowercase())
        .ok_or_else(|| anyhow!("Failed to get language from code: {}", code))?;

    Ok(lang.to_name().to_string())
}

/// Lowercase English name usable in an output file name, e.g. `french`.
/// Falls back to the code itself for unknown codes.
pub fn language_file_slug(code: &str) -> String {
    match get_language_name(code) {
        Ok(name) => name
            .split(|c: char| !c.is_alphanumeric())
            .filter(|part| !part.is_empty())
            .map(|part| part.to_lowercase())
            .collect::<Vec<_>>()
            .join("_"),
        Err(_) => code.to_string(),
    }
}

/// Human readable label for prompts, e.g. `French (fr)`
pub fn describe_language(code: &str) -> String {
    match get_language_name(code) {
        Ok(name) => format!("{} ({})", name, code),
        Err(_) => code.to_string(),
    }
}
