//! Export archive packing and unpacking (gzip-compressed tar).
//!
//! Layout:
//! - `export-<stamp>/data.json`: the manifest
//! - `export-<stamp>/uploads/`: media files and format variants by basename

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::error::{MigrateError, Result};

pub const MANIFEST_FILE: &str = "data.json";
pub const UPLOADS_DIR: &str = "uploads";

/// Whether `path` names an archive rather than an extracted folder.
#[must_use]
pub fn is_archive(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    name.ends_with(".tar") || name.ends_with(".tar.gz") || name.ends_with(".tgz")
}

/// Pack `parent/dir_name` into a `.tar.gz` whose single root is `dir_name/`.
///
/// # Errors
///
/// Returns `Archive` if the output cannot be written.
pub fn pack_directory(parent: &Path, dir_name: &str, output: &Path) -> Result<()> {
    let file = File::create(output)
        .map_err(|e| MigrateError::archive(format!("cannot create {}: {e}", output.display())))?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut archive = tar::Builder::new(encoder);

    archive
        .append_dir_all(dir_name, parent.join(dir_name))
        .map_err(|e| MigrateError::archive(format!("cannot add {dir_name}: {e}")))?;
    archive
        .into_inner()
        .and_then(GzEncoder::finish)
        .map_err(|e| MigrateError::archive(format!("finalization failed: {e}")))?;

    Ok(())
}

/// Extract an archive into `dest`. `.tar` is read uncompressed, anything else as gzip.
///
/// # Errors
///
/// Returns `Archive` if the archive is unreadable or an entry cannot be written.
pub fn unpack(archive_path: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive_path).map_err(|e| {
        MigrateError::archive(format!("cannot open {}: {e}", archive_path.display()))
    })?;
    let reader = BufReader::new(file);
    let plain_tar = archive_path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("tar"));

    let result = if plain_tar {
        tar::Archive::new(reader).unpack(dest)
    } else {
        tar::Archive::new(GzDecoder::new(reader)).unpack(dest)
    };
    result.map_err(|e| MigrateError::archive(format!("extraction failed: {e}")))
}

/// Locate the directory holding `data.json` inside an extraction root.
///
/// A root holding exactly one directory is descended into; otherwise the
/// manifest must sit directly in the root.
///
/// # Errors
///
/// Returns `ManifestNotFound` if there is no manifest at the resolved location.
pub fn resolve_import_root(extracted: &Path) -> Result<PathBuf> {
    let children: Vec<PathBuf> = fs::read_dir(extracted)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;

    let root = match children.as_slice() {
        [only] if only.is_dir() => only.clone(),
        _ => extracted.to_path_buf(),
    };

    if root.join(MANIFEST_FILE).is_file() {
        Ok(root)
    } else {
        Err(MigrateError::ManifestNotFound(root))
    }
}
