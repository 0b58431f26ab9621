use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::model::unit::TranslationUnit;
use crate::model::work::{Batch, ParsedTranslation};

/// Why a single unit of a batch was not updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeFailure {
    MissingKey,
    NotAnObject,
    MissingTranslation,
    MissingPlural,
    InvalidPlural,
}

impl std::fmt::Display for MergeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MergeFailure::MissingKey => "entry missing from response",
            MergeFailure::NotAnObject => "entry is not an object",
            MergeFailure::MissingTranslation => "entry has no usable `translation`",
            MergeFailure::MissingPlural => "plural source but no `plural` field",
            MergeFailure::InvalidPlural => "`plural` is not a non-empty list of strings",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitFailure {
    pub key: String,
    pub source_text: String,
    pub reason: MergeFailure,
}

#[derive(Debug, Default)]
pub struct MergeOutcome {
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<UnitFailure>,
}

/// Checks one response entry against what the unit needs.
pub fn validate(value: &Value, plural_required: bool) -> Result<ParsedTranslation, MergeFailure> {
    let obj = value.as_object().ok_or(MergeFailure::NotAnObject)?;

    let translation = obj
        .get("translation")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(MergeFailure::MissingTranslation)?
        .to_string();

    if !plural_required {
        return Ok(ParsedTranslation {
            translation,
            plural: None,
        });
    }

    let items = match obj.get("plural") {
        None | Some(Value::Null) => return Err(MergeFailure::MissingPlural),
        Some(Value::Array(items)) if !items.is_empty() => items,
        Some(_) => return Err(MergeFailure::InvalidPlural),
    };

    let forms = items
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .collect::<Option<Vec<String>>>()
        .ok_or(MergeFailure::InvalidPlural)?;

    Ok(ParsedTranslation {
        translation,
        plural: Some(forms),
    })
}

/// Applies a keyed response to the units of `batch`.
///
/// The unit at batch position `i` reads key `start + i`. A unit is only
/// written once its entry passed validation as a whole, so a plural unit whose
/// `plural` field is missing keeps neither the singular nor any form.
pub fn merge_batch(
    units: &mut [TranslationUnit],
    batch: &Batch,
    parsed: &Map<String, Value>,
    nplurals: Option<usize>,
) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();

    for (pos, &idx) in batch.units.iter().enumerate() {
        let key = batch.key_at(pos);
        let unit = &mut units[idx];

        let result = match parsed.get(&key) {
            None => Err(MergeFailure::MissingKey),
            Some(v) => validate(v, unit.is_plural()),
        };

        match result {
            Ok(parsed) => {
                if let (Some(forms), Some(n)) = (&parsed.plural, nplurals) {
                    if forms.len() != n {
                        warn!(key = %key, got = forms.len(), expected = n, "plural form count differs from header");
                    }
                }

                unit.translated_text = Some(parsed.translation);
                if unit.is_plural() {
                    unit.translated_plural_forms = parsed.plural;
                }
                unit.clear_fuzzy();
                outcome.succeeded += 1;
            }
            Err(reason) => {
                warn!(key = %key, msgid = %unit.source_text, %reason, "entry not applied");
                outcome.failed += 1;
                outcome.failures.push(UnitFailure {
                    key,
                    source_text: unit.source_text.clone(),
                    reason,
                });
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keyed(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn applies_trimmed_translations_by_ordinal() {
        let mut units = vec![TranslationUnit::new("a"), TranslationUnit::new("b")];
        let batch = Batch {
            units: vec![0, 1],
            start: 1,
        };
        let parsed = keyed(json!({
            "1": {"translation": "  A \n"},
            "2": {"translation": "B"}
        }));

        let out = merge_batch(&mut units, &batch, &parsed, None);

        assert_eq!((out.succeeded, out.failed), (2, 0));
        assert_eq!(units[0].translated_text.as_deref(), Some("A"));
        assert!(units[1].is_translated());
    }

    #[test]
    fn offset_batches_read_their_own_keys() {
        let mut units = vec![TranslationUnit::new("a"), TranslationUnit::new("c")];
        let batch = Batch {
            units: vec![1],
            start: 3,
        };
        let parsed = keyed(json!({"1": {"translation": "wrong"}, "3": {"translation": "C"}}));

        let out = merge_batch(&mut units, &batch, &parsed, None);

        assert_eq!(out.succeeded, 1);
        assert_eq!(units[0].translated_text, None);
        assert_eq!(units[1].translated_text.as_deref(), Some("C"));
    }

    #[test]
    fn missing_and_malformed_entries_are_counted_not_applied() {
        let mut units = vec![
            TranslationUnit::new("a"),
            TranslationUnit::new("b"),
            TranslationUnit::new("c"),
            TranslationUnit::new("d"),
        ];
        let batch = Batch {
            units: vec![0, 1, 2, 3],
            start: 1,
        };
        let parsed = keyed(json!({
            "2": "just text",
            "3": {"text": "C"},
            "4": {"translation": 4}
        }));

        let out = merge_batch(&mut units, &batch, &parsed, None);

        assert_eq!((out.succeeded, out.failed), (0, 4));
        let reasons: Vec<_> = out.failures.iter().map(|f| f.reason).collect();
        assert_eq!(
            reasons,
            vec![
                MergeFailure::MissingKey,
                MergeFailure::NotAnObject,
                MergeFailure::MissingTranslation,
                MergeFailure::MissingTranslation,
            ]
        );
        assert!(units.iter().all(|u| u.translated_text.is_none()));
    }

    #[test]
    fn plural_without_plural_field_fails_and_rolls_back() {
        let mut units = vec![TranslationUnit::with_plural("one file", "%d files")];
        let batch = Batch {
            units: vec![0],
            start: 1,
        };
        let parsed = keyed(json!({"1": {"translation": "un fichier"}}));

        let out = merge_batch(&mut units, &batch, &parsed, Some(2));

        assert_eq!((out.succeeded, out.failed), (0, 1));
        assert_eq!(out.failures[0].reason, MergeFailure::MissingPlural);
        assert_eq!(units[0].translated_text, None);
        assert_eq!(units[0].translated_plural_forms, None);
        assert!(!units[0].is_translated());
    }

    #[test]
    fn plural_with_wrong_type_is_invalid() {
        for bad in [json!("x"), json!([]), json!(["ok", 3]), json!(["ok", " "])] {
            let v = json!({"translation": "t", "plural": bad});
            assert_eq!(validate(&v, true), Err(MergeFailure::InvalidPlural));
        }
    }

    #[test]
    fn plural_forms_are_applied() {
        let mut units = vec![TranslationUnit::with_plural("one file", "%d files")];
        units[0].flags.push("fuzzy".into());
        let batch = Batch {
            units: vec![0],
            start: 1,
        };
        let parsed = keyed(json!({
            "1": {"translation": "un fichier", "plural": ["un fichier", "%d fichiers"]}
        }));

        let out = merge_batch(&mut units, &batch, &parsed, Some(2));

        assert_eq!(out.succeeded, 1);
        assert_eq!(
            units[0].translated_plural_forms,
            Some(vec!["un fichier".to_string(), "%d fichiers".to_string()])
        );
        assert!(!units[0].is_fuzzy());
        assert!(units[0].is_translated());
    }

    #[test]
    fn singular_unit_ignores_plural_field() {
        let v = json!({"translation": "t", "plural": 5});
        assert_eq!(
            validate(&v, false),
            Ok(ParsedTranslation {
                translation: "t".into(),
                plural: None
            })
        );
    }
}
