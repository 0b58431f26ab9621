use encoding_rs::{Encoding, UTF_8};
use polib::metadata::CatalogMetadata;

use super::unit::TranslationUnit;

/// In-memory gettext catalog: header metadata plus ordered units.
pub struct Catalog {
    pub metadata: CatalogMetadata,
    units: Vec<TranslationUnit>,
    /// Raw `#~` blocks, written back after the live entries.
    obsolete: Vec<String>,
    encoding: &'static Encoding,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(CatalogMetadata::default(), Vec::new())
    }
}

impl Catalog {
    pub fn new(metadata: CatalogMetadata, units: Vec<TranslationUnit>) -> Self {
        Self {
            metadata,
            units,
            obsolete: Vec::new(),
            encoding: UTF_8,
        }
    }

    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_obsolete(mut self, blocks: Vec<String>) -> Self {
        self.obsolete = blocks;
        self
    }

    pub fn units(&self) -> &[TranslationUnit] {
        &self.units
    }

    pub fn units_mut(&mut self) -> &mut [TranslationUnit] {
        &mut self.units
    }

    pub fn obsolete(&self) -> &[String] {
        &self.obsolete
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// `nplurals` from the `Plural-Forms` header.
    pub fn nplurals(&self) -> Option<usize> {
        let n = self.metadata.plural_rules.nplurals;
        (n > 0).then_some(n)
    }

    /// Indices of units that still need a translation.
    pub fn pending_indices(&self) -> Vec<usize> {
        self.units
            .iter()
            .enumerate()
            .filter_map(|(i, u)| (!u.is_translated()).then_some(i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_skips_translated_and_includes_fuzzy() {
        let mut done = TranslationUnit::new("a");
        done.translated_text = Some("A".into());
        let mut fuzzy = TranslationUnit::new("b");
        fuzzy.translated_text = Some("B?".into());
        fuzzy.flags.push("fuzzy".into());
        let todo = TranslationUnit::new("c");

        let cat = Catalog::new(CatalogMetadata::default(), vec![done, fuzzy, todo]);
        assert_eq!(cat.pending_indices(), vec![1, 2]);
    }
}
