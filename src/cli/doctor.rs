//! CLI `doctor` command: run index diagnostics and print a health report.

use anyhow::{Context, Result};

use whereabouts::config::WhereaboutsConfig;
use whereabouts::db;

/// Run index diagnostics and print a health report.
pub fn doctor(config: &WhereaboutsConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Index: not found at {}", db_path.display());
        println!("Run `whereabouts ingest` or `whereabouts serve` to initialize.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    let conn = db::open_database(&db_path).context("failed to open index (may be corrupt)")?;
    let report = db::check_database_health(&conn).context("failed to run health check")?;

    println!("whereabouts Health Report");
    println!("=========================");
    println!();
    println!("Index:             {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!("sqlite-vec:        {}", report.sqlite_vec_version);
    println!();
    println!("Embedding model:");
    println!("  Stored:          {}", report.embedding_model.as_deref().unwrap_or("(not set)"));
    println!("  Configured:      {}", config.embedding.model);
    if let Some(ref stored) = report.embedding_model {
        if stored != &config.embedding.model {
            println!("  WARNING: model mismatch! Run `whereabouts reset` and re-ingest.");
        } else {
            println!("  Status:          OK (match)");
        }
    }
    println!();
    println!("Generation:");
    println!("  Endpoint:        {}", config.generation.base_url);
    println!(
        "  API key:         {}",
        if config.api_key().is_some() { "set" } else { "MISSING" }
    );
    println!();
    println!("Entries:");
    println!("  Messages:        {}", report.message_count);
    println!("  Images:          {}", report.image_count);
    println!("  Owners:          {}", report.owner_count);
    println!();
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
