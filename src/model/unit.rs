pub const FUZZY: &str = "fuzzy";

/// A `#:` reference. The line is optional because some extractors emit bare file names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    pub line: Option<u32>,
}

impl Location {
    /// Parses one `file:line` token of a `#:` line.
    pub fn parse(token: &str) -> Self {
        match token.rsplit_once(':') {
            Some((file, line)) if !file.is_empty() => match line.parse::<u32>() {
                Ok(n) => Location {
                    file: file.to_string(),
                    line: Some(n),
                },
                Err(_) => Location {
                    file: token.to_string(),
                    line: None,
                },
            },
            _ => Location {
                file: token.to_string(),
                line: None,
            },
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(n) => write!(f, "{}:{n}", self.file),
            None => f.write_str(&self.file),
        }
    }
}

/// One message of a catalog, possibly with a plural counterpart.
///
/// Obsolete (`#~`) entries never become units; the catalog keeps them as raw
/// text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationUnit {
    pub source_text: String,
    pub source_plural: Option<String>,
    pub context: Option<String>,
    pub locations: Vec<Location>,
    pub translated_text: Option<String>,
    pub translated_plural_forms: Option<Vec<String>>,
    /// `#,` flags such as `fuzzy` or `python-format`.
    pub flags: Vec<String>,
    /// Extracted comments (`#. ...`).
    pub extracted_comments: Vec<String>,
}

impl TranslationUnit {
    pub fn new(source_text: impl Into<String>) -> Self {
        Self {
            source_text: source_text.into(),
            ..Self::default()
        }
    }

    pub fn with_plural(source_text: impl Into<String>, source_plural: impl Into<String>) -> Self {
        Self {
            source_text: source_text.into(),
            source_plural: Some(source_plural.into()),
            ..Self::default()
        }
    }

    pub fn is_plural(&self) -> bool {
        self.source_plural.is_some()
    }

    pub fn is_fuzzy(&self) -> bool {
        self.flags.iter().any(|f| f == FUZZY)
    }

    /// A plural unit counts as translated only when every plural form is filled in;
    /// a translated singular alone is not enough.
    pub fn is_translated(&self) -> bool {
        if self.is_fuzzy() {
            return false;
        }

        if self.is_plural() {
            return match &self.translated_plural_forms {
                Some(forms) => !forms.is_empty() && forms.iter().all(|f| !f.is_empty()),
                None => false,
            };
        }

        self.translated_text
            .as_deref()
            .map(|t| !t.is_empty())
            .unwrap_or(false)
    }

    /// Size estimate used by the chunker, in characters.
    pub fn char_estimate(&self) -> usize {
        self.source_text.chars().count()
            + self
                .source_plural
                .as_deref()
                .map(|p| p.chars().count())
                .unwrap_or(0)
    }

    pub fn clear_fuzzy(&mut self) {
        self.flags.retain(|f| f != FUZZY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singular_needs_non_empty_text() {
        let mut u = TranslationUnit::new("Hello");
        assert!(!u.is_translated());

        u.translated_text = Some(String::new());
        assert!(!u.is_translated());

        u.translated_text = Some("Bonjour".into());
        assert!(u.is_translated());
    }

    #[test]
    fn plural_needs_every_form() {
        let mut u = TranslationUnit::with_plural("file", "files");
        u.translated_text = Some("fichier".into());
        assert!(!u.is_translated());

        u.translated_plural_forms = Some(vec!["fichier".into(), String::new()]);
        assert!(!u.is_translated());

        u.translated_plural_forms = Some(vec!["fichier".into(), "fichiers".into()]);
        assert!(u.is_translated());
    }

    #[test]
    fn fuzzy_is_not_translated() {
        let mut u = TranslationUnit::new("Hello");
        u.translated_text = Some("Bonjour".into());
        u.flags.push(FUZZY.into());
        assert!(!u.is_translated());

        u.clear_fuzzy();
        assert!(u.is_translated());
    }

    #[test]
    fn locations_parse_with_and_without_line() {
        let l = Location::parse("../source/index.rst:12");
        assert_eq!(l.file, "../source/index.rst");
        assert_eq!(l.line, Some(12));
        assert_eq!(l.to_string(), "../source/index.rst:12");

        let bare = Location::parse("C:setup");
        assert_eq!(bare.line, None);
        assert_eq!(bare.to_string(), "C:setup");
    }

    #[test]
    fn estimate_counts_characters_not_bytes() {
        let u = TranslationUnit::with_plural("été", "étés");
        assert_eq!(u.char_estimate(), 7);
    }
}
