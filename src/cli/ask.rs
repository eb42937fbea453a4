use anyhow::Result;

use whereabouts::config::WhereaboutsConfig;
use whereabouts::memory::types::EvidenceResult;

/// Ask a question from the terminal and print the answer with its evidence.
pub async fn ask(
    config: &WhereaboutsConfig,
    prompt: &str,
    owner: &str,
    want_chat: bool,
    want_image: bool,
) -> Result<()> {
    let pipeline = crate::server::build_pipeline(config)?;

    let response = pipeline
        .ask(prompt, owner, &[], want_chat, want_image)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "query failed");
            anyhow::anyhow!("no results")
        })?;

    println!("{}\n", response.text.trim());

    if let Some(chat) = &response.chat_evidence {
        print_evidence("Messages", chat);
    }
    if let Some(image) = &response.image_evidence {
        print_evidence("Photos", image);
    }

    Ok(())
}

fn print_evidence(title: &str, evidence: &EvidenceResult) {
    if evidence.is_empty() {
        return;
    }
    println!("{title}:");
    for (i, m) in evidence.matches.iter().enumerate() {
        println!(
            "  {}. {} @ {} (score: {:.4}, ref: {})",
            i + 1,
            m.metadata.item,
            m.metadata.context,
            m.score,
            m.metadata.source_ref,
        );
        println!("     {}", m.metadata.source_message);
    }
    println!();
}
