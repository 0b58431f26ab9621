use std::path::PathBuf;

/// One unit of coordinator work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    Translate { catalog: PathBuf, language: String },
    /// The catalog's own source language: nothing to translate.
    BuildFromSource { language: String },
}

/// Indices into the catalog's units plus the ordinal of the first one.
///
/// The ordinal is shared between the prompt labels and the response keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub units: Vec<usize>,
    pub start: usize,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn key_at(&self, position: usize) -> String {
        (self.start + position).to_string()
    }
}

/// Decoded form of one numbered entry of a model response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTranslation {
    pub translation: String,
    pub plural: Option<Vec<String>>,
}
