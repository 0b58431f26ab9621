use crate::model::unit::{Location, TranslationUnit};
use crate::model::work::Batch;

/// Builds the instruction text for one batch.
///
/// Entries are labelled with the batch ordinals; the reply is expected to be
/// a JSON object keyed by the same numbers.
pub fn build_prompt(
    units: &[TranslationUnit],
    batch: &Batch,
    file_label: &str,
    target_lang: &str,
    nplurals: Option<usize>,
) -> String {
    let mut p = String::new();

    p.push_str("You are a professional technical documentation translator.\n");
    p.push_str(&format!(
        "Translate the entries below into the language with code `{target_lang}`.\n"
    ));
    p.push_str(
        "Keep reStructuredText markup intact (:ref:, :doc:, **bold**, ``code``, links, \
         substitutions) and keep placeholders such as %s, %(name)s and {0} unchanged.\n\
         Do not add explanations. Reply with strict JSON only.\n\n",
    );

    p.push_str("Reply format:\n");
    p.push_str("1) One JSON object whose keys are the entry numbers as strings.\n");
    p.push_str("2) Singular entries map to {\"translation\": \"...\"}.\n");
    match nplurals {
        Some(n) => p.push_str(&format!(
            "3) Entries with a PLURAL section also need \"plural\": a list of {n} translated plural forms.\n"
        )),
        None => p.push_str(
            "3) Entries with a PLURAL section also need \"plural\": a list with one translation per plural form.\n",
        ),
    }
    p.push_str("4) Keep terminology consistent across entries.\n\n");

    p.push_str("Entries:\n\n");

    for (pos, &idx) in batch.units.iter().enumerate() {
        let unit = &units[idx];

        let occurrences: Vec<String> = unit.locations.iter().map(Location::to_string).collect();

        p.push_str(&format!("### ENTRY {}\n", batch.key_at(pos)));
        p.push_str(&format!("FILE: {file_label}\n"));
        p.push_str(&format!("OCCURRENCES: {}\n", occurrences.join(", ")));
        if let Some(ctx) = &unit.context {
            p.push_str(&format!("CONTEXT: {ctx}\n"));
        }
        for note in &unit.extracted_comments {
            p.push_str(&format!("NOTE: {note}\n"));
        }
        p.push_str("SINGULAR:\n");
        p.push_str(&unit.source_text);
        p.push('\n');
        if let Some(plural) = &unit.source_plural {
            p.push_str("PLURAL:\n");
            p.push_str(plural);
            p.push('\n');
        }
        p.push('\n');
    }

    let first = batch.start;
    p.push_str("Example of the shape only:\n");
    p.push_str(&format!(
        "{{\n  \"{first}\": {{\"translation\": \"...\"}},\n  \"{}\": {{\"translation\": \"...\", \"plural\": [\"...\", \"...\"]}}\n}}\n",
        first + 1
    ));

    p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_entries_with_batch_ordinals() {
        let mut a = TranslationUnit::new("Install");
        a.locations.push(Location {
            file: "install.rst".into(),
            line: Some(4),
        });
        a.context = Some("heading".into());
        let b = TranslationUnit::with_plural("one item", "%d items");
        let units = vec![a, b];

        let batch = Batch {
            units: vec![0, 1],
            start: 11,
        };
        let p = build_prompt(&units, &batch, "install.po", "zh_CN", Some(1));

        assert!(p.contains("### ENTRY 11\nFILE: install.po\nOCCURRENCES: install.rst:4\nCONTEXT: heading\nSINGULAR:\nInstall\n"));
        assert!(p.contains("### ENTRY 12\n"));
        assert!(p.contains("PLURAL:\n%d items\n"));
        assert!(p.contains("a list of 1 translated plural forms"));
        assert!(p.contains("`zh_CN`"));
        assert!(!p.contains("### ENTRY 1\n"));
    }
}
