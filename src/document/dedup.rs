use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;

use super::locator::{Locator, TextOccurrence};

/// Stable identity of a text: lowercase hex SHA-256 of its UTF-8 bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TextId(String);

impl TextId {
    /// Identity of `text`
    pub fn of(text: &str) -> Self {
        Self(format!("{:x}", Sha256::digest(text.as_bytes())))
    }

    /// Hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(8)]
    }
}

impl fmt::Display for TextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A distinct text and every place it occurs
#[derive(Debug, Clone, PartialEq)]
pub struct UniqueText {
    /// Content hash
    pub id: TextId,
    /// The text, byte-for-byte as found in the document
    pub text: String,
    /// All occurrences, in document order
    pub locators: Vec<Locator>,
}

/// Collapse byte-identical texts into `UniqueText`s, in first-discovery order
pub fn deduplicate(occurrences: Vec<TextOccurrence>) -> Vec<UniqueText> {
    let mut index_by_text: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<UniqueText> = Vec::new();

    for occurrence in occurrences {
        match index_by_text.get(&occurrence.text) {
            Some(&index) => unique[index].locators.push(occurrence.locator),
            None => {
                index_by_text.insert(occurrence.text.clone(), unique.len());
                unique.push(UniqueText {
                    id: TextId::of(&occurrence.text),
                    text: occurrence.text,
                    locators: vec![occurrence.locator],
                });
            }
        }
    }

    unique
}
