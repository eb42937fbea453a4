//! CLI `reset` command: clear the whole index after operator confirmation.

use anyhow::{bail, Result};
use std::io::Write;

use whereabouts::config::WhereaboutsConfig;
use whereabouts::memory::index::VectorIndex;

/// Delete every index entry for every owner after the operator types YES.
pub fn reset(config: &WhereaboutsConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    println!("WARNING: This will permanently delete ALL indexed items for ALL owners.");
    println!("Index: {}", db_path.display());
    print!("\nType YES to confirm: ");
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;

    if input.trim() != "YES" {
        bail!("reset cancelled");
    }

    let index = crate::server::open_index(config)?;
    let removed = index.clear_all()?;

    println!("{removed} entries deleted. Index reset complete.");
    Ok(())
}
