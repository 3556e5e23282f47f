//! Import command implementation.

use anyhow::{Context, Result};
use cms_migrate_lib::{
    CleanReport, ImportOptions, ImportReport, ImportSource, Importer, LocalBackend,
};
use std::path::PathBuf;
use tracing::info;

use crate::cli::ImportArgs;
use crate::config::Config;
use crate::fetch;

/// Execute the import command.
///
/// # Errors
///
/// Returns an error if the input cannot be found, downloaded or extracted,
/// has no manifest, or the backend cannot be loaded. Per-item failures are
/// logged and counted in the report instead.
pub fn execute(args: &ImportArgs, config: &Config) -> Result<()> {
    let download = if fetch::is_remote(&args.input) {
        Some(fetch::download(&args.input).context("Download failed")?)
    } else {
        None
    };
    let input_path = download
        .as_ref()
        .map_or_else(|| PathBuf::from(&args.input), |d| d.path.clone());

    let source = ImportSource::open(&input_path)?;
    let result = import_from(&source, args, config);
    source.close();
    result
}

fn import_from(source: &ImportSource, args: &ImportArgs, config: &Config) -> Result<()> {
    let manifest = source.load_manifest().context("Failed to read data.json")?;
    let mut backend = LocalBackend::open_with_uploads(&config.project, &config.uploads_dir)
        .context("Backend cannot be loaded")?;

    if args.skip_schema {
        info!("Skipping schema files (--skip-schema).");
    }

    let options = ImportOptions {
        skip_media: args.skip_media,
        dry_run: args.dry_run,
    };
    let mut importer = Importer::new(&mut backend, options);

    if args.clean {
        info!("Clean mode: removing imported content from {}", config.project.display());
        print_clean_report(&importer.clean(&manifest));
    } else {
        print_import_report(&importer.run(&manifest, &source.uploads_dir()));
    }
    Ok(())
}

fn print_import_report(report: &ImportReport) {
    if report.dry_run {
        println!("Dry run, nothing written.");
    }
    println!(
        "Media: {} created, {} reused, {} skipped, {} failed",
        report.media_created, report.media_reused, report.media_skipped, report.media_failed
    );
    println!(
        "Entries: {} created, {} updated, {} failed",
        report.entries_created, report.entries_updated, report.entries_failed
    );
    if !report.types_skipped.is_empty() {
        println!("Skipped types: {}", report.types_skipped.join(", "));
    }
    println!("Import completed.");
}

fn print_clean_report(report: &CleanReport) {
    if report.dry_run {
        println!("Dry run, nothing deleted.");
    }
    println!(
        "Deleted {} entries, {} media records, {} files ({} failures)",
        report.entries_deleted, report.media_deleted, report.files_removed, report.failures
    );
    println!("Clean completed.");
}
