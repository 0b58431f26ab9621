use std::fs;
use std::path::Path;

use encoding_rs::UTF_8;
use polib::catalog::Catalog as PoCatalog;
use polib::metadata::CatalogMetadata;
use polib::message::{Message, MessageFlags, MessageView};
use polib::po_file;

use crate::error::{Error, Result};
use crate::model::catalog::Catalog;
use crate::model::unit::{Location, TranslationUnit};
use crate::services::encoding;
use crate::services::store;

/// Loads and persists catalogs.
pub trait CatalogProvider: Send + Sync {
    fn load(&self, path: &Path) -> Result<Catalog>;
    fn save(&self, catalog: &Catalog, path: &Path) -> Result<()>;
}

/// `.po` files on the local file system, written back in their own charset.
///
/// polib only reads UTF-8 and has no notion of `#~` entries, so legacy
/// charsets are decoded first and obsolete blocks are cut out of the text it
/// sees, then appended again on save.
#[derive(Debug, Default, Clone, Copy)]
pub struct PoFileProvider;

impl CatalogProvider for PoFileProvider {
    fn load(&self, path: &Path) -> Result<Catalog> {
        let bytes = fs::read(path).map_err(|e| Error::catalog_load(path, e))?;
        let decoded = encoding::decode_catalog(&bytes).map_err(|e| Error::catalog_load(path, e))?;
        let (live, obsolete) = split_obsolete(&decoded.text);

        // Same length means plain UTF-8 without a BOM.
        let as_is = decoded.encoding == UTF_8 && decoded.text.len() == bytes.len() && obsolete.is_empty();
        let po = if as_is {
            po_file::parse(path).map_err(|e| Error::catalog_load(path, e))?
        } else {
            parse_staged(path, &live)?
        };

        Ok(from_po(po)
            .with_encoding(decoded.encoding)
            .with_obsolete(obsolete))
    }

    fn save(&self, catalog: &Catalog, path: &Path) -> Result<()> {
        let po = to_po(catalog, false);

        store::replace_with(path, |tmp| {
            po_file::write(&po, tmp).map_err(|e| Error::catalog_write(path, e))?;

            if catalog.encoding() == UTF_8 && catalog.obsolete().is_empty() {
                return Ok(());
            }

            let mut text = fs::read_to_string(tmp)?;
            for block in catalog.obsolete() {
                text.push('\n');
                text.push_str(block);
                text.push('\n');
            }
            fs::write(tmp, encoding::encode_catalog(&text, catalog.encoding()))?;
            Ok(())
        })
    }
}

fn parse_staged(path: &Path, text: &str) -> Result<PoCatalog> {
    let staged = store::staging_path(path);
    fs::write(&staged, text).map_err(|e| Error::catalog_load(path, e))?;
    let parsed = po_file::parse(&staged);
    let _ = fs::remove_file(&staged);
    parsed.map_err(|e| Error::catalog_load(path, e))
}

/// Separates `#~` lines from the live entries.
///
/// Each run of obsolete lines becomes one block. Its place in the live text is
/// taken by a blank line so the entries around it stay apart.
pub(crate) fn split_obsolete(text: &str) -> (String, Vec<String>) {
    let mut live = String::with_capacity(text.len());
    let mut blocks = Vec::new();
    let mut cur: Vec<&str> = Vec::new();

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim_start().starts_with("#~") {
            if cur.is_empty() {
                live.push('\n');
            }
            cur.push(line.trim_end());
            continue;
        }
        if !cur.is_empty() {
            blocks.push(cur.join("\n"));
            cur.clear();
        }
        live.push_str(line);
        live.push('\n');
    }

    if !cur.is_empty() {
        blocks.push(cur.join("\n"));
    }

    (live, blocks)
}

fn from_po(po: PoCatalog) -> Catalog {
    let units: Vec<TranslationUnit> = po.messages().map(|m| unit_from_message(m)).collect();
    Catalog::new(po.metadata, units)
}

fn unit_from_message(m: &dyn MessageView) -> TranslationUnit {
    let plural = m.is_plural();

    let forms = if plural {
        m.msgstr_plural()
            .ok()
            .filter(|f| f.iter().any(|s| !s.is_empty()))
            .cloned()
    } else {
        None
    };

    let translated_text = if plural {
        forms.as_ref().and_then(|f| f.first().cloned())
    } else {
        m.msgstr().ok().map(str::to_string)
    };

    TranslationUnit {
        source_text: m.msgid().to_string(),
        source_plural: if plural {
            m.msgid_plural().ok().map(str::to_string)
        } else {
            None
        },
        context: Some(m.msgctxt())
            .filter(|c| !c.is_empty())
            .map(str::to_string),
        locations: m.source().split_whitespace().map(Location::parse).collect(),
        translated_text: translated_text.filter(|t| !t.is_empty()),
        translated_plural_forms: forms,
        flags: m.flags().iter().cloned().collect(),
        extracted_comments: m.comments().lines().map(str::to_string).collect(),
    }
}

fn message_from_unit(unit: &TranslationUnit, nplurals: usize) -> Message {
    let mut flags = MessageFlags::new();
    for f in &unit.flags {
        flags.add_flag(f);
    }

    let source = unit
        .locations
        .iter()
        .map(Location::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    let comments = unit.extracted_comments.join("\n");
    let msgctxt = unit.context.clone().unwrap_or_default();

    match &unit.source_plural {
        Some(plural) => {
            let forms = unit
                .translated_plural_forms
                .clone()
                .unwrap_or_else(|| vec![String::new(); nplurals.max(1)]);
            Message::build_plural()
                .with_comments(comments)
                .with_source(source)
                .with_flags(flags)
                .with_msgctxt(msgctxt)
                .with_msgid(unit.source_text.clone())
                .with_msgid_plural(plural.clone())
                .with_msgstr_plural(forms)
                .done()
        }
        None => Message::build_singular()
            .with_comments(comments)
            .with_source(source)
            .with_flags(flags)
            .with_msgctxt(msgctxt)
            .with_msgid(unit.source_text.clone())
            .with_msgstr(unit.translated_text.clone().unwrap_or_default())
            .done(),
    }
}

/// polib's `CatalogMetadata` does not implement `Clone`; copy it field by field.
fn clone_metadata(m: &CatalogMetadata) -> CatalogMetadata {
    let mut copy = CatalogMetadata {
        project_id_version: m.project_id_version.clone(),
        pot_creation_date: m.pot_creation_date.clone(),
        po_revision_date: m.po_revision_date.clone(),
        last_translator: m.last_translator.clone(),
        language_team: m.language_team.clone(),
        mime_version: m.mime_version.clone(),
        content_type: m.content_type.clone(),
        content_transfer_encoding: m.content_transfer_encoding.clone(),
        language: m.language.clone(),
        ..CatalogMetadata::default()
    };
    copy.plural_rules.nplurals = m.plural_rules.nplurals;
    copy.plural_rules.expr = m.plural_rules.expr.clone();
    copy
}

/// Builds the polib catalog for writing. With `translated_only`, pending and
/// fuzzy units are left out, which is what the compiled artifact wants.
pub(crate) fn to_po(catalog: &Catalog, translated_only: bool) -> PoCatalog {
    let nplurals = catalog.nplurals().unwrap_or(2);
    let mut po = PoCatalog::new(clone_metadata(&catalog.metadata));

    for unit in catalog.units() {
        if translated_only && !unit.is_translated() {
            continue;
        }
        po.append_or_update(message_from_unit(unit, nplurals));
    }

    po
}
