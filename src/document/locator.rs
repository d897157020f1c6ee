use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

/// One step of a path into a JSON tree
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Object member
    Key(String),
    /// Array element
    Index(usize),
}

/// Path from the document root to one string value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Locator {
    segments: Vec<PathSegment>,
}

impl Locator {
    /// The empty path (document root)
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a locator from explicit segments
    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    /// Path segments from the root
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    fn child(&self, segment: PathSegment) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend_from_slice(&self.segments);
        segments.push(segment);
        Self { segments }
    }

    /// Resolve the locator inside `document`
    pub fn resolve<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        self.segments.iter().try_fold(document, |node, segment| match segment {
            PathSegment::Key(key) => node.as_object()?.get(key),
            PathSegment::Index(index) => node.as_array()?.get(*index),
        })
    }

    /// Resolve the locator inside `document` for modification
    pub fn resolve_mut<'a>(&self, document: &'a mut Value) -> Option<&'a mut Value> {
        self.segments.iter().try_fold(document, |node, segment| match segment {
            PathSegment::Key(key) => node.as_object_mut()?.get_mut(key),
            PathSegment::Index(index) => node.as_array_mut()?.get_mut(*index),
        })
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "$");
        }
        for (position, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if position == 0 => write!(f, "{}", key)?,
                PathSegment::Key(key) => write!(f, ".{}", key)?,
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

/// A translatable string found in the document
#[derive(Debug, Clone, PartialEq)]
pub struct TextOccurrence {
    /// Where the string lives
    pub locator: Locator,
    /// The string itself
    pub text: String,
}

/// Walks a JSON tree and yields the strings stored under recognized field names
///
/// A string is translatable when its containing object key is recognized, or
/// when it sits in an array (possibly nested arrays) whose nearest enclosing
/// object key is recognized. Entering an object resets the inherited field.
/// Empty and whitespace-only strings are skipped.
#[derive(Debug, Clone)]
pub struct FieldLocator {
    fields: HashSet<String>,
}

impl FieldLocator {
    /// Create a locator recognizing the given field names
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `name` is a recognized field
    pub fn is_recognized(&self, name: &str) -> bool {
        self.fields.contains(name)
    }

    /// All translatable strings in document order
    pub fn locate(&self, document: &Value) -> Vec<TextOccurrence> {
        let mut occurrences = Vec::new();
        self.visit(document, &Locator::root(), false, &mut occurrences);
        occurrences
    }

    fn visit(&self, node: &Value, path: &Locator, in_field: bool, out: &mut Vec<TextOccurrence>) {
        match node {
            Value::Object(map) => {
                for (key, value) in map {
                    let child = path.child(PathSegment::Key(key.clone()));
                    self.visit(value, &child, self.is_recognized(key), out);
                }
            }
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    let child = path.child(PathSegment::Index(index));
                    self.visit(item, &child, in_field, out);
                }
            }
            Value::String(text) if in_field && !text.trim().is_empty() => {
                out.push(TextOccurrence {
                    locator: path.clone(),
                    text: text.clone(),
                });
            }
            _ => {}
        }
    }
}
