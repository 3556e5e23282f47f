//! Import: reconcile an export archive into a destination backend.
//!
//! Media is imported first so that every source media id has a
//! destination id; entries are then rewritten through that [`IdMap`] and
//! written per content type in manifest order.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::TempDir;
use tracing::{debug, error, info, warn};

use crate::archive::{self, MANIFEST_FILE, UPLOADS_DIR};
use crate::backend::ContentBackend;
use crate::error::{MigrateError, Result};
use crate::media::IdMap;
use crate::model::{Manifest, MediaRecord, RecordId};
use crate::util::{ENTRY_INSTANCE_FIELDS, MEDIA_INSTANCE_FIELDS, strip_fields};

// ============================================================================
// Source
// ============================================================================

/// An opened import source: the directory holding `data.json` and `uploads/`.
///
/// Archives are extracted into a temporary directory owned by the source and
/// removed when it is closed or dropped.
#[derive(Debug)]
pub struct ImportSource {
    root: PathBuf,
    temp: Option<TempDir>,
}

impl ImportSource {
    /// Open an archive (`.tar`, `.tar.gz`, `.tgz`) or an extracted export folder.
    ///
    /// # Errors
    ///
    /// Returns `InputNotFound` for a missing path, `Archive` when extraction
    /// fails, or `ManifestNotFound` when no `data.json` can be located.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MigrateError::InputNotFound(path.to_path_buf()));
        }

        if archive::is_archive(path) {
            let temp = tempfile::Builder::new().prefix("cms-migrate-import-").tempdir()?;
            info!("Extracting {} to {}...", path.display(), temp.path().display());
            archive::unpack(path, temp.path())?;
            let root = archive::resolve_import_root(temp.path())?;
            return Ok(Self {
                root,
                temp: Some(temp),
            });
        }

        if path.join(MANIFEST_FILE).is_file() {
            Ok(Self {
                root: path.to_path_buf(),
                temp: None,
            })
        } else {
            Err(MigrateError::ManifestNotFound(path.to_path_buf()))
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join(UPLOADS_DIR)
    }

    /// Read and parse `data.json`.
    ///
    /// # Errors
    ///
    /// Returns `Io` or `Json` if the manifest cannot be read or parsed.
    pub fn load_manifest(&self) -> Result<Manifest> {
        let raw = fs::read_to_string(self.root.join(MANIFEST_FILE))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Remove the extraction directory, if any.
    pub fn close(self) {
        if let Some(temp) = self.temp {
            let path = temp.path().to_path_buf();
            match temp.close() {
                Ok(()) => debug!("Cleaned up temporary files in {}", path.display()),
                Err(e) => warn!("Could not clean up {}: {e}", path.display()),
            }
        }
    }
}

// ============================================================================
// Options and reports
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// Only map media already present in the destination (by hash).
    pub skip_media: bool,
    /// Report what would happen; write nothing.
    pub dry_run: bool,
}

/// Counters of one import run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub media_created: usize,
    pub media_reused: usize,
    pub media_skipped: usize,
    pub media_failed: usize,
    pub entries_created: usize,
    pub entries_updated: usize,
    pub entries_failed: usize,
    pub types_skipped: Vec<String>,
    pub dry_run: bool,
}

/// Counters of one clean run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub entries_deleted: usize,
    pub media_deleted: usize,
    pub files_removed: usize,
    pub failures: usize,
    pub dry_run: bool,
}

// ============================================================================
// Importer
// ============================================================================

/// Writes one manifest into a destination backend.
pub struct Importer<'a, B: ContentBackend + ?Sized> {
    backend: &'a mut B,
    options: ImportOptions,
}

impl<'a, B: ContentBackend + ?Sized> Importer<'a, B> {
    pub fn new(backend: &'a mut B, options: ImportOptions) -> Self {
        Self { backend, options }
    }

    /// Import media, then entries.
    pub fn run(&mut self, manifest: &Manifest, uploads: &Path) -> ImportReport {
        let mut report = ImportReport {
            dry_run: self.options.dry_run,
            ..ImportReport::default()
        };

        info!("Importing {} media records...", manifest.media.len());
        let ids = self.import_media(&manifest.media, uploads, &mut report);
        info!("Media id map holds {} entries.", ids.len());

        info!("Importing {} content types...", manifest.types.len());
        self.import_entries(manifest, &ids, &mut report);

        report
    }

    /// Reuse or create a destination record for every manifest media record.
    pub fn import_media(
        &mut self,
        media: &[MediaRecord],
        uploads: &Path,
        report: &mut ImportReport,
    ) -> IdMap {
        let mut ids = IdMap::new();

        for record in media {
            match self.backend.find_media_by_hash(&record.hash) {
                Ok(Some(existing)) => {
                    info!("  Media {} exists (id {}), reusing.", record.label(), existing.id);
                    ids.insert(record.id.clone(), existing.id);
                    report.media_reused += 1;
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    error!("  Lookup failed for media {}: {e}", record.label());
                    report.media_failed += 1;
                    continue;
                }
            }

            if self.options.skip_media {
                debug!("  Media {} not in destination, skipped.", record.label());
                report.media_skipped += 1;
                continue;
            }

            let source = uploads.join(record.file_name());
            if !source.is_file() {
                warn!("  File not found in export: {}", source.display());
                report.media_skipped += 1;
                continue;
            }

            if self.options.dry_run {
                info!("  Would create media {}", record.label());
                report.media_created += 1;
                continue;
            }

            match self.create_media(record, &source, uploads) {
                Ok(created) => {
                    info!("  Created media {} (id {} -> {})", record.label(), record.id, created.id);
                    ids.insert(record.id.clone(), created.id);
                    report.media_created += 1;
                }
                Err(e) => {
                    error!("  Failed to import media {}: {e}", record.label());
                    report.media_failed += 1;
                }
            }
        }

        ids
    }

    fn create_media(&mut self, record: &MediaRecord, source: &Path, uploads: &Path) -> Result<MediaRecord> {
        let upload_dir = self.backend.upload_dir().to_path_buf();
        fs::create_dir_all(&upload_dir)?;

        let target = upload_dir.join(record.file_name());
        if !target.exists() {
            fs::copy(source, &target)?;
        }
        for format_name in record.format_file_names() {
            let format_source = uploads.join(format_name);
            let format_target = upload_dir.join(format_name);
            if format_source.is_file() && !format_target.exists() {
                if let Err(e) = fs::copy(&format_source, &format_target) {
                    debug!("  Could not copy format {format_name}: {e}");
                }
            }
        }

        let mut data = record.to_map();
        strip_fields(&mut data, MEDIA_INSTANCE_FIELDS);
        self.backend.create_media(data)
    }

    /// Write every manifest type's entries, rewriting media references through `ids`.
    pub fn import_entries(&mut self, manifest: &Manifest, ids: &IdMap, report: &mut ImportReport) {
        for (uid, entries) in manifest.types.iter() {
            let descriptor = match self.backend.content_type(uid) {
                Ok(Some(descriptor)) => descriptor,
                Ok(None) => {
                    warn!("Content type {uid} not found in destination. Skipping.");
                    report.types_skipped.push(uid.to_string());
                    continue;
                }
                Err(e) => {
                    error!("Error reading model {uid}: {e}");
                    report.types_skipped.push(uid.to_string());
                    continue;
                }
            };

            info!("Importing {} entries for {uid}...", entries.len());
            if descriptor.is_single() {
                for entry in entries {
                    self.import_single(uid, prepare_entry(entry.clone(), ids), report);
                }
            } else {
                for entry in entries {
                    self.create(uid, prepare_entry(entry.clone(), ids), report);
                }
            }
        }
    }

    fn import_single(&mut self, uid: &str, data: Value, report: &mut ImportReport) {
        let existing = match self.backend.find_entries(uid) {
            Ok(entries) => entries
                .first()
                .and_then(|e| e.get("id"))
                .and_then(RecordId::from_value),
            Err(e) => {
                error!("  Failed to import {uid}: {e}");
                report.entries_failed += 1;
                return;
            }
        };

        match existing {
            Some(id) if self.options.dry_run => {
                info!("  Would update single type {uid} (id {id})");
                report.entries_updated += 1;
            }
            Some(id) => match self.backend.update_entry(uid, &id, data) {
                Ok(_) => {
                    info!("  Updated single type {uid}");
                    report.entries_updated += 1;
                }
                Err(e) => {
                    error!("  Failed to import {uid}: {e}");
                    report.entries_failed += 1;
                }
            },
            None => self.create(uid, data, report),
        }
    }

    fn create(&mut self, uid: &str, data: Value, report: &mut ImportReport) {
        if self.options.dry_run {
            info!("  Would create entry in {uid}");
            report.entries_created += 1;
            return;
        }
        match self.backend.create_entry(uid, data) {
            Ok(created) => {
                match created.get("id").and_then(RecordId::from_value) {
                    Some(id) => info!("  Created entry for {uid} (new id {id})"),
                    None => info!("  Created entry for {uid}"),
                }
                report.entries_created += 1;
            }
            Err(e) => {
                error!("  Failed to import entry for {uid}: {e}");
                report.entries_failed += 1;
            }
        }
    }

    /// Delete the manifest's content from the destination instead of importing it.
    ///
    /// Every entry of each manifest type is removed, as is every media record
    /// whose hash appears in the manifest, together with its files unless
    /// media handling is skipped.
    pub fn clean(&mut self, manifest: &Manifest) -> CleanReport {
        let mut report = CleanReport {
            dry_run: self.options.dry_run,
            ..CleanReport::default()
        };

        for uid in manifest.types.uids() {
            match self.backend.content_type(uid) {
                Ok(Some(_)) => {}
                Ok(None) => {
                    warn!("Content type {uid} not found in destination. Skipping.");
                    continue;
                }
                Err(e) => {
                    error!("Error reading model {uid}: {e}");
                    report.failures += 1;
                    continue;
                }
            }

            let entries = match self.backend.find_entries(uid) {
                Ok(entries) => entries,
                Err(e) => {
                    error!("Failed to list {uid}: {e}");
                    report.failures += 1;
                    continue;
                }
            };
            info!("Deleting {} entries of {uid}...", entries.len());

            for id in entries.iter().filter_map(|e| e.get("id").and_then(RecordId::from_value)) {
                if self.options.dry_run {
                    report.entries_deleted += 1;
                    continue;
                }
                match self.backend.delete_entry(uid, &id) {
                    Ok(()) => report.entries_deleted += 1,
                    Err(e) => {
                        error!("  Failed to delete {uid} #{id}: {e}");
                        report.failures += 1;
                    }
                }
            }
        }

        for record in &manifest.media {
            let existing = match self.backend.find_media_by_hash(&record.hash) {
                Ok(Some(existing)) => existing,
                Ok(None) => continue,
                Err(e) => {
                    error!("  Lookup failed for media {}: {e}", record.label());
                    report.failures += 1;
                    continue;
                }
            };

            if self.options.dry_run {
                info!("  Would delete media {} (id {})", existing.label(), existing.id);
                report.media_deleted += 1;
                continue;
            }

            if let Err(e) = self.backend.delete_media(&existing.id) {
                error!("  Failed to delete media {}: {e}", existing.label());
                report.failures += 1;
                continue;
            }
            report.media_deleted += 1;

            if !self.options.skip_media {
                report.files_removed += self.remove_media_files(&existing);
            }
        }

        report
    }

    fn remove_media_files(&self, record: &MediaRecord) -> usize {
        let upload_dir = self.backend.upload_dir();
        std::iter::once(record.file_name())
            .chain(record.format_file_names())
            .map(|name| upload_dir.join(name))
            .filter(|path| path.is_file())
            .filter(|path| match fs::remove_file(path) {
                Ok(()) => true,
                Err(e) => {
                    warn!("  Could not remove {}: {e}", path.display());
                    false
                }
            })
            .count()
    }
}

/// Strip instance fields and rewrite media references of one manifest entry.
#[must_use]
pub fn prepare_entry(entry: Value, ids: &IdMap) -> Value {
    let entry = match entry {
        Value::Object(mut map) => {
            strip_fields(&mut map, ENTRY_INSTANCE_FIELDS);
            Value::Object(map)
        }
        other => other,
    };
    ids.rewrite_references(entry)
}
