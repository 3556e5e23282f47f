//! Download of remote import archives.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use cms_migrate_lib::archive::is_archive;
use tempfile::TempDir;
use tracing::info;

const DEFAULT_FILE_NAME: &str = "import.tar.gz";

/// Whether an import argument names a remote archive.
#[must_use]
pub fn is_remote(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// File name for a downloaded archive: the last URL path segment, or
/// `import.tar.gz` when the path has none. Names without an archive
/// extension get `.tar.gz` appended so the download opens as an archive.
#[must_use]
pub fn file_name_for(url: &str) -> String {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = without_scheme.split(['?', '#']).next().unwrap_or_default();
    let name = path
        .split_once('/')
        .and_then(|(_, path)| path.rsplit('/').next())
        .filter(|name| !name.is_empty());

    match name {
        Some(name) if is_archive(Path::new(name)) => name.to_string(),
        Some(name) => format!("{name}.tar.gz"),
        None => DEFAULT_FILE_NAME.to_string(),
    }
}

/// A downloaded archive and the temporary directory holding it.
#[derive(Debug)]
pub struct Download {
    pub path: PathBuf,
    _dir: TempDir,
}

/// Download `url` into a fresh temporary directory.
///
/// # Errors
///
/// Returns an error on network failure, a non-success status, or if the
/// file cannot be written.
pub fn download(url: &str) -> Result<Download> {
    let dir = tempfile::Builder::new()
        .prefix("cms-migrate-download-")
        .tempdir()
        .context("creating download directory")?;
    let path = dir.path().join(file_name_for(url));

    info!("Downloading {url}...");
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("cms-migrate/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let resp = client
        .get(url)
        .send()
        .with_context(|| format!("fetching {url}"))?;

    if !resp.status().is_success() {
        bail!("HTTP {} for {url}", resp.status());
    }

    let bytes = resp.bytes()?;
    fs::write(&path, &bytes).with_context(|| format!("writing {}", path.display()))?;
    info!("Downloaded {} bytes to {}", bytes.len(), path.display());

    Ok(Download { path, _dir: dir })
}
