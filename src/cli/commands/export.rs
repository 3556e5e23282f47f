//! Export command implementation.

use anyhow::{Context, Result};
use cms_migrate_lib::{ExportOptions, ExportReport, LocalBackend, TypeSelector, run_export};

use crate::cli::ExportArgs;
use crate::config::Config;

/// Execute the export command.
///
/// # Errors
///
/// Returns an error if selectors conflict, a pattern is invalid, the
/// backend cannot be loaded, or the archive cannot be written.
pub fn execute(args: &ExportArgs, config: &Config) -> Result<()> {
    let selector = TypeSelector::from_flags(
        args.types.clone(),
        args.all,
        args.filter_api.as_deref(),
        args.filter_components.as_deref(),
    )?;

    let backend = LocalBackend::open_with_uploads(&config.project, &config.uploads_dir)
        .context("Backend cannot be loaded")?;

    let options = ExportOptions {
        output_dir: args.output.clone().unwrap_or_else(|| config.export_dir.clone()),
        api_prefix: config.api_prefix.clone(),
        dry_run: args.dry_run,
    };

    let report = run_export(&backend, &selector, &options)?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &ExportReport) {
    if report.types.is_empty() && report.archive.is_none() {
        println!("Nothing to export.");
        return;
    }

    let heading = if report.dry_run { "Would export" } else { "Exported" };
    println!("{heading}:");
    for (uid, count) in &report.types {
        println!("  {uid}: {count} entries");
    }
    println!("  media: {} records", report.media);

    if let Some(archive) = &report.archive {
        println!("Copied {} media files.", report.files_copied);
        println!("Archive: {}", archive.display());
    }
    if let Some(checksum) = &report.checksum {
        println!("SHA-256: {checksum}");
    }
}
