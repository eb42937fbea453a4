//! CLI `ingest` and `ingest-image` commands.

use anyhow::{Context, Result};
use std::path::Path;

use whereabouts::config::WhereaboutsConfig;
use whereabouts::memory::pipeline::IngestReport;

/// Ingest a chat log file for `owner`. `source_ref` defaults to the file stem.
pub async fn ingest_chat(
    config: &WhereaboutsConfig,
    path: &Path,
    owner: &str,
    source_ref: Option<&str>,
) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read chat log {}", path.display()))?;
    let source_ref = match source_ref {
        Some(r) => r.to_string(),
        None => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .context("cannot derive a source ref from the file name, pass --source-ref")?,
    };

    let pipeline = crate::server::build_pipeline(config)?;
    let report = pipeline
        .ingest_chat(&content, owner, &source_ref)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "chat ingestion failed");
            anyhow::anyhow!("processing failed")
        })?;

    print_report(&report);
    Ok(())
}

/// Index detector labels for one image.
pub async fn ingest_image(
    config: &WhereaboutsConfig,
    owner: &str,
    image_ref: &str,
    labels: &[String],
    filename: Option<&str>,
) -> Result<()> {
    let pipeline = crate::server::build_pipeline(config)?;
    let report = pipeline
        .ingest_image(labels, owner, image_ref, filename)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "image ingestion failed");
            anyhow::anyhow!("processing failed")
        })?;

    print_report(&report);
    Ok(())
}

fn print_report(report: &IngestReport) {
    if report.stored() == 0 {
        println!("No items found in {}.", report.source_ref);
        return;
    }

    println!("Indexed {} item(s) from {}\n", report.stored(), report.source_ref);
    for (id, record) in report.ids.iter().zip(&report.records) {
        println!("  [{}] {} @ {}", id, record.item, record.context);
        println!("     {}", record.source_message);
    }
    if report.dropped_groups > 0 {
        println!("\n  ({} incomplete entry dropped)", report.dropped_groups);
    }
}
