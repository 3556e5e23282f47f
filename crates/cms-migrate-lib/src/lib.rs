//! `cms-migrate-lib` - Export and import of CMS content between instances.
//!
//! Exports gather the entries of selected content types plus every media
//! file they reference into a portable `.tar.gz`. Imports deduplicate media
//! by content hash, remap media ids and write entries honoring single vs
//! collection semantics.
//!
//! # Quick Start
//!
//! ```no_run
//! use cms_migrate_lib::{ImportOptions, ImportSource, Importer, LocalBackend};
//! use cms_migrate_lib::{ExportOptions, TypeSelector, run_export};
//! use std::path::Path;
//!
//! // Export every api:: type
//! let source = LocalBackend::open("path/to/source-project").unwrap();
//! let report = run_export(&source, &TypeSelector::All, &ExportOptions::default()).unwrap();
//!
//! // Import the archive elsewhere
//! let mut dest = LocalBackend::open("path/to/dest-project").unwrap();
//! let archive = report.archive.unwrap();
//! let input = ImportSource::open(Path::new(&archive)).unwrap();
//! let manifest = input.load_manifest().unwrap();
//! Importer::new(&mut dest, ImportOptions::default()).run(&manifest, &input.uploads_dir());
//! input.close();
//! ```

pub mod archive;
pub mod backend;
pub mod error;
pub mod export;
pub mod import;
pub mod jsonl;
pub mod media;
pub mod model;
pub mod store;
pub mod tree;
pub mod util;

pub use backend::ContentBackend;
pub use error::{MigrateError, Result};
pub use export::{ExportOptions, ExportReport, TypeSelector, run_export};
pub use import::{CleanReport, ImportOptions, ImportReport, ImportSource, Importer};
pub use media::{IdMap, MediaIndex, MediaShape, resolve_media};
pub use model::{Manifest, MediaRecord, RecordId};
pub use store::LocalBackend;
