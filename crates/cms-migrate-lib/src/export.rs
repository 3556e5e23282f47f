//! Export: content entries and referenced media into a portable archive.
//!
//! The run is:
//! 1. select content types ([`TypeSelector`])
//! 2. fetch entries per type and index the media they reference
//! 3. copy media files (and best-effort format variants) into a staging dir
//! 4. write `data.json`, pack `export-<stamp>.tar.gz`, remove the staging dir

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use regex::Regex;
use tracing::{debug, error, info, warn};

use crate::archive::{self, MANIFEST_FILE, UPLOADS_DIR};
use crate::backend::ContentBackend;
use crate::error::{MigrateError, Result};
use crate::media::MediaIndex;
use crate::model::{ComponentDescriptor, Manifest, MediaRecord, TypeDescriptor};
use crate::util::{export_stamp, sha256_file};

pub const DEFAULT_API_PREFIX: &str = "api::";

/// Which content types an export covers.
#[derive(Debug, Clone)]
pub enum TypeSelector {
    /// Every type under the api prefix (nothing was requested).
    Discover,
    /// Exactly these uids.
    Explicit(Vec<String>),
    /// Every type under the api prefix (`--all`).
    All,
    /// Api types whose collection name matches.
    ApiPattern(Regex),
    /// Api types using a component whose collection name matches.
    ComponentPattern(Regex),
}

impl TypeSelector {
    /// Build a selector from the export command's flags.
    ///
    /// # Errors
    ///
    /// Returns `ConflictingSelectors` when more than one selector is given,
    /// or `InvalidPattern` for a bad regex.
    pub fn from_flags(
        types: Vec<String>,
        all: bool,
        filter_api: Option<&str>,
        filter_components: Option<&str>,
    ) -> Result<Self> {
        let given: Vec<String> = [
            (!types.is_empty()).then_some("types"),
            all.then_some("--all"),
            filter_api.map(|_| "--filter-api"),
            filter_components.map(|_| "--filter-components"),
        ]
        .into_iter()
        .flatten()
        .map(str::to_string)
        .collect();

        if given.len() > 1 {
            return Err(MigrateError::ConflictingSelectors { selectors: given });
        }

        if !types.is_empty() {
            Ok(Self::Explicit(types))
        } else if all {
            Ok(Self::All)
        } else if let Some(pattern) = filter_api {
            Ok(Self::ApiPattern(compile(pattern)?))
        } else if let Some(pattern) = filter_components {
            Ok(Self::ComponentPattern(compile(pattern)?))
        } else {
            Ok(Self::Discover)
        }
    }

    /// Resolve the selector against the backend's registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be read.
    pub fn select<B>(&self, backend: &B, api_prefix: &str) -> Result<Vec<String>>
    where
        B: ContentBackend + ?Sized,
    {
        let selected = match self {
            Self::Explicit(uids) => return Ok(uids.clone()),
            Self::Discover | Self::All => api_types(backend, api_prefix)?,
            Self::ApiPattern(pattern) => api_types(backend, api_prefix)?
                .into_iter()
                .filter(|t| pattern.is_match(&t.collection_name))
                .collect(),
            Self::ComponentPattern(pattern) => {
                let components = backend.components()?;
                api_types(backend, api_prefix)?
                    .into_iter()
                    .filter(|t| uses_matching_component(t, &components, pattern))
                    .collect()
            }
        };

        Ok(selected.into_iter().map(|t| t.uid).collect())
    }
}

fn api_types<B>(backend: &B, api_prefix: &str) -> Result<Vec<TypeDescriptor>>
where
    B: ContentBackend + ?Sized,
{
    Ok(backend
        .content_types()?
        .into_iter()
        .filter(|t| t.uid.starts_with(api_prefix))
        .collect())
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| MigrateError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Whether a type embeds, at any depth, a component whose collection name matches.
fn uses_matching_component(
    descriptor: &TypeDescriptor,
    components: &[ComponentDescriptor],
    pattern: &Regex,
) -> bool {
    let mut pending: Vec<&str> = descriptor
        .attributes
        .values()
        .filter_map(|a| a.component_uid())
        .collect();
    let mut visited = HashSet::new();

    while let Some(uid) = pending.pop() {
        if !visited.insert(uid) {
            continue;
        }
        let Some(component) = components.iter().find(|c| c.uid == uid) else {
            continue;
        };
        if pattern.is_match(&component.collection_name) {
            return true;
        }
        pending.extend(component.attributes.values().filter_map(|a| a.component_uid()));
    }
    false
}

/// Options for one export run.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Directory receiving the archive.
    pub output_dir: PathBuf,
    /// Prefix of application content types.
    pub api_prefix: String,
    /// Report only; write nothing.
    pub dry_run: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("export-data"),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            dry_run: false,
        }
    }
}

/// Outcome of an export run.
#[derive(Debug, Clone, Default)]
pub struct ExportReport {
    pub archive: Option<PathBuf>,
    pub checksum: Option<String>,
    pub types: Vec<(String, usize)>,
    pub media: usize,
    pub files_copied: usize,
    pub dry_run: bool,
}

/// Fetch every requested type and index the media referenced by its entries.
///
/// Unknown types and fetch failures are logged and skipped.
pub fn build_manifest<B>(backend: &B, uids: &[String]) -> Manifest
where
    B: ContentBackend + ?Sized,
{
    let mut manifest = Manifest::new(Utc::now());
    let mut index = MediaIndex::new();

    for uid in uids {
        info!("Exporting {uid}...");
        match backend.content_type(uid) {
            Ok(Some(_)) => {}
            Ok(None) => {
                warn!("Content type {uid} not found. Skipping.");
                continue;
            }
            Err(e) => {
                error!("Error exporting {uid}: {e}");
                continue;
            }
        }

        match backend.find_entries(uid) {
            Ok(entries) => {
                info!("  Found {} entries for {uid}", entries.len());
                let entries = entries.into_iter().map(|entry| index.scan(entry)).collect();
                manifest.types.insert(uid.clone(), entries);
            }
            Err(e) => error!("Error exporting {uid}: {e}"),
        }
    }

    info!("Found {} unique media files.", index.len());
    manifest.media = index.into_records();
    manifest
}

/// Copy each record's file and format variants from `upload_dir` into `dest`.
///
/// Returns the number of original files copied. Missing originals are
/// skipped with a warning; format variants are best effort.
pub fn copy_media_files(media: &[MediaRecord], upload_dir: &Path, dest: &Path) -> usize {
    let mut copied = 0;
    for record in media {
        let file_name = record.file_name();
        let source = upload_dir.join(file_name);
        if source.is_file() {
            match fs::copy(&source, dest.join(file_name)) {
                Ok(_) => copied += 1,
                Err(e) => error!("  Error copying file {file_name}: {e}"),
            }
        } else {
            warn!("  Media file missing: {}", source.display());
        }

        for format_name in record.format_file_names() {
            let format_source = upload_dir.join(format_name);
            if !format_source.is_file() {
                continue;
            }
            if let Err(e) = fs::copy(&format_source, dest.join(format_name)) {
                debug!("  Could not copy format {format_name}: {e}");
            }
        }
    }
    copied
}

/// Run a complete export.
///
/// # Errors
///
/// Returns an error if the registry cannot be read, the staging directory
/// cannot be created, the manifest cannot be written, or packing fails.
/// Per-type and per-file problems are logged, not returned.
pub fn run_export<B>(backend: &B, selector: &TypeSelector, options: &ExportOptions) -> Result<ExportReport>
where
    B: ContentBackend + ?Sized,
{
    let uids = selector.select(backend, &options.api_prefix)?;
    let mut report = ExportReport {
        dry_run: options.dry_run,
        ..ExportReport::default()
    };

    if uids.is_empty() {
        info!("No content types selected. Nothing to export.");
        return Ok(report);
    }
    info!("Starting export for types: {}", uids.join(", "));

    let manifest = build_manifest(backend, &uids);
    report.types = manifest
        .types
        .iter()
        .map(|(uid, entries)| (uid.to_string(), entries.len()))
        .collect();
    report.media = manifest.media.len();

    if options.dry_run {
        info!("Dry run: no files written.");
        return Ok(report);
    }

    let dir_name = format!("export-{}", export_stamp(manifest.created_at.unwrap_or_else(Utc::now)));
    let staging = options.output_dir.join(&dir_name);
    let archive_path = options.output_dir.join(format!("{dir_name}.tar.gz"));

    let packed = stage(&manifest, backend.upload_dir(), &staging).and_then(|copied| {
        info!("Export data gathered in {}", staging.display());
        info!("Creating archive {}...", archive_path.display());
        archive::pack_directory(&options.output_dir, &dir_name, &archive_path)?;
        Ok(copied)
    });
    remove_staging(&staging);
    report.files_copied = packed?;

    report.checksum = Some(sha256_file(&archive_path)?);
    info!("Archive created: {}", archive_path.display());
    report.archive = Some(archive_path);
    Ok(report)
}

fn stage(manifest: &Manifest, upload_dir: &Path, staging: &Path) -> Result<usize> {
    let uploads = staging.join(UPLOADS_DIR);
    fs::create_dir_all(&uploads)?;

    let copied = copy_media_files(&manifest.media, upload_dir, &uploads);
    info!("Copied {copied} media files.");

    fs::write(staging.join(MANIFEST_FILE), serde_json::to_string_pretty(manifest)?)?;
    Ok(copied)
}

fn remove_staging(staging: &Path) {
    if !staging.exists() {
        return;
    }
    match fs::remove_dir_all(staging) {
        Ok(()) => debug!("Cleaned up staging directory."),
        Err(e) => warn!("Could not clean up {}: {e}", staging.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Registry;
    use crate::store::LocalBackend;
    use serde_json::json;

    fn backend(dir: &Path) -> LocalBackend {
        let registry: Registry = serde_json::from_value(json!({
            "contentTypes": [
                {"uid": "api::post.post", "collectionName": "posts",
                 "attributes": {"body": {"type": "component", "component": "blocks.rich"}}},
                {"uid": "api::page.page", "collectionName": "pages"},
                {"uid": "plugin::users.user", "collectionName": "up_users"}
            ],
            "components": [
                {"uid": "blocks.rich", "collectionName": "components_blocks_rich",
                 "attributes": {"inner": {"type": "component", "component": "shared.seo"}}},
                {"uid": "shared.seo", "collectionName": "components_shared_seos"}
            ]
        }))
        .unwrap();
        LocalBackend::create(dir, &registry).unwrap()
    }

    #[test]
    fn test_selectors_are_exclusive() {
        let err = TypeSelector::from_flags(vec!["api::a.a".into()], true, Some("x"), None).unwrap_err();
        match err {
            MigrateError::ConflictingSelectors { selectors } => {
                assert_eq!(selectors, vec!["types", "--all", "--filter-api"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_pattern() {
        let err = TypeSelector::from_flags(vec![], false, Some("("), None).unwrap_err();
        assert!(matches!(err, MigrateError::InvalidPattern { .. }));
    }

    #[test]
    fn test_select_by_prefix_and_patterns() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(dir.path());

        let all = TypeSelector::from_flags(vec![], false, None, None).unwrap();
        assert_eq!(
            all.select(&backend, DEFAULT_API_PREFIX).unwrap(),
            vec!["api::post.post", "api::page.page"]
        );

        let api = TypeSelector::from_flags(vec![], false, Some("^pag"), None).unwrap();
        assert_eq!(api.select(&backend, DEFAULT_API_PREFIX).unwrap(), vec!["api::page.page"]);

        let nested = TypeSelector::from_flags(vec![], false, None, Some("seos$")).unwrap();
        assert_eq!(
            nested.select(&backend, DEFAULT_API_PREFIX).unwrap(),
            vec!["api::post.post"]
        );
    }

    #[test]
    fn test_explicit_selection_is_passed_through() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(dir.path());

        let explicit = TypeSelector::from_flags(
            vec!["plugin::users.user".into(), "api::missing.missing".into()],
            false,
            None,
            None,
        )
        .unwrap();
        assert_eq!(
            explicit.select(&backend, DEFAULT_API_PREFIX).unwrap(),
            vec!["plugin::users.user", "api::missing.missing"]
        );
    }

    #[test]
    fn test_build_manifest_skips_unknown_types() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = backend(dir.path());
        backend.create_entry("api::page.page", json!({"title": "a"})).unwrap();

        let manifest = build_manifest(&backend, &["api::missing.missing".to_string(), "api::page.page".to_string()]);
        assert_eq!(manifest.types.len(), 1);
        assert_eq!(manifest.types.get("api::page.page").unwrap().len(), 1);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(dir.path());
        let out = dir.path().join("out");
        let options = ExportOptions {
            output_dir: out.clone(),
            dry_run: true,
            ..ExportOptions::default()
        };

        let report = run_export(&backend, &TypeSelector::All, &options).unwrap();
        assert!(report.dry_run);
        assert!(report.archive.is_none());
        assert_eq!(report.types.len(), 2);
        assert!(!out.exists());
    }
}
