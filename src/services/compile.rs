use std::fs;
use std::path::{Path, PathBuf};

use polib::mo_file;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::services::catalog::{to_po, CatalogProvider, PoFileProvider};
use crate::services::store;

/// Turns a source catalog into its binary artifact.
pub trait Compiler: Send + Sync {
    fn artifact_path(&self, source: &Path) -> PathBuf;

    /// Returns whether an artifact was written.
    fn compile(&self, source: &Path) -> Result<bool>;
}

/// GNU `.mo` compiler writing next to the `.po` file.
///
/// Only translated, non-fuzzy units go in. The artifact is always UTF-8,
/// whatever the source charset.
#[derive(Debug, Default, Clone, Copy)]
pub struct MoCompiler;

impl Compiler for MoCompiler {
    fn artifact_path(&self, source: &Path) -> PathBuf {
        source.with_extension("mo")
    }

    fn compile(&self, source: &Path) -> Result<bool> {
        let catalog = PoFileProvider.load(source)?;
        let entries = catalog.units().iter().filter(|u| u.is_translated()).count();
        let mut po = to_po(&catalog, true);
        po.metadata.content_type = "text/plain; charset=UTF-8".to_string();

        let out = self.artifact_path(source);
        store::replace_with(&out, |tmp| {
            mo_file::write(&po, tmp).map_err(|e| Error::catalog_write(&out, e))
        })?;

        info!(artifact = %out.display(), entries, "compiled");
        Ok(true)
    }
}

/// True when the artifact is missing or strictly older than its source.
pub fn is_stale(source: &Path, artifact: &Path) -> bool {
    let built = match fs::metadata(artifact).and_then(|m| m.modified()) {
        Ok(t) => t,
        Err(_) => return true,
    };

    match fs::metadata(source).and_then(|m| m.modified()) {
        Ok(src) => src > built,
        Err(_) => true,
    }
}

pub fn compile_if_stale(compiler: &dyn Compiler, source: &Path) -> Result<bool> {
    let artifact = compiler.artifact_path(source);
    if !is_stale(source, &artifact) {
        debug!(artifact = %artifact.display(), "artifact up to date");
        return Ok(false);
    }
    compiler.compile(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    const MO_MAGIC: u32 = 0x9504_12de;

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn artifact_holds_only_finished_translations() {
        let dir = tempfile::tempdir().unwrap();
        let po = dir.path().join("index.po");
        fs::write(
            &po,
            "msgid \"\"\nmsgstr \"\"\n\"Content-Type: text/plain; charset=UTF-8\\n\"\n\"Plural-Forms: nplurals=2; plural=(n != 1);\\n\"\n\n\
             msgid \"Hello\"\nmsgstr \"Bonjour\"\n\n\
             msgid \"Pending entry\"\nmsgstr \"\"\n\n\
             #, fuzzy\nmsgid \"Draft\"\nmsgstr \"Brouillon\"\n\n\
             msgctxt \"menu\"\nmsgid \"file\"\nmsgid_plural \"files\"\nmsgstr[0] \"fichier\"\nmsgstr[1] \"fichiers\"\n",
        )
        .unwrap();

        assert!(MoCompiler.compile(&po).unwrap());
        let mo = fs::read(MoCompiler.artifact_path(&po)).unwrap();

        let magic = [mo[0], mo[1], mo[2], mo[3]];
        assert!(u32::from_le_bytes(magic) == MO_MAGIC || u32::from_be_bytes(magic) == MO_MAGIC);
        assert!(contains(&mo, b"Bonjour"));
        assert!(contains(&mo, b"fichiers"));
        assert!(!contains(&mo, b"Pending entry"));
        assert!(!contains(&mo, b"Brouillon"));
    }

    #[test]
    fn staleness_follows_modification_times() {
        let dir = tempfile::tempdir().unwrap();
        let po = dir.path().join("index.po");
        fs::write(&po, "msgid \"a\"\nmsgstr \"A\"\n").unwrap();
        let mo = MoCompiler.artifact_path(&po);

        assert!(is_stale(&po, &mo));
        assert!(compile_if_stale(&MoCompiler, &po).unwrap());
        assert!(mo.exists());

        let now = SystemTime::now();
        fs::File::options()
            .write(true)
            .open(&po)
            .unwrap()
            .set_modified(now - Duration::from_secs(60))
            .unwrap();
        assert!(!is_stale(&po, &mo));
        assert!(!compile_if_stale(&MoCompiler, &po).unwrap());

        fs::File::options()
            .write(true)
            .open(&po)
            .unwrap()
            .set_modified(now + Duration::from_secs(60))
            .unwrap();
        assert!(is_stale(&po, &mo));
    }
}
