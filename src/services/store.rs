use std::{
    fs,
    path::{Path, PathBuf},
};

use sha2::{Digest, Sha256};

use crate::error::Result;

/// Writes through a sibling temp file so readers never see a half-written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    replace_with(path, |tmp| Ok(fs::write(tmp, bytes)?))
}

/// Lets `fill` produce the new content at a sibling temp path, then moves it
/// over `path`. The temp file is removed when `fill` fails.
pub fn replace_with<F>(path: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    let tmp = tmp_path(path, "tmp");

    if let Some(parent) = tmp.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    if let Err(err) = fill(&tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }

    // rename only replaces an existing target in place on Unix
    #[cfg(windows)]
    {
        if path.exists() {
            fs::remove_file(path)?;
        }
    }

    fs::rename(&tmp, path)?;

    Ok(())
}

/// Where a UTF-8 copy of a catalog is staged for the PO reader.
pub fn staging_path(path: &Path) -> PathBuf {
    tmp_path(path, "utf8.tmp")
}

fn tmp_path(path: &Path, suffix: &str) -> PathBuf {
    let mut p = path.to_path_buf();
    let file_name = match path.file_name().and_then(|s| s.to_str()) {
        Some(n) => n.to_string(),
        None => "catalog".to_string(),
    };
    p.set_file_name(format!("{file_name}.{suffix}"));
    p
}

/// `foo.po` -> `foo.po.bak`
pub fn backup_path(catalog: &Path) -> PathBuf {
    let mut name = catalog.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}

/// Copies the catalog as it is on disk before anything is merged into it.
pub fn snapshot(catalog: &Path) -> Result<PathBuf> {
    let bak = backup_path(catalog);
    let bytes = fs::read(catalog)?;
    write_atomic(&bak, &bytes)?;
    Ok(bak)
}

/// `<debug_dir>/<lang>/<file name>.<path digest>.batch<k>.resp.txt`
///
/// The digest keeps same-named catalogs from different subdirectories apart.
pub fn artifact_path(debug_dir: &Path, language: &str, catalog: &Path, batch_no: usize) -> PathBuf {
    let name = catalog
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("catalog");

    let mut hasher = Sha256::new();
    hasher.update(catalog.to_string_lossy().as_bytes());
    let digest = hex::encode(hasher.finalize());

    debug_dir
        .join(language)
        .join(format!("{name}.{}.batch{batch_no}.resp.txt", &digest[..8]))
}

/// Keeps a raw model response for later inspection; never read back.
pub fn save_artifact(
    debug_dir: &Path,
    language: &str,
    catalog: &Path,
    batch_no: usize,
    content: &str,
) -> Result<PathBuf> {
    let path = artifact_path(debug_dir, language, catalog, batch_no);
    write_atomic(&path, content.as_bytes())?;
    Ok(path)
}
