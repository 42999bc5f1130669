//! One-shot commands over the configured store

use super::helpers::open_service;
use feedback_core::FeedbackConfig;
use tracing::debug;

/// Score every eligible feedback and report the outcome
pub async fn analyze_all(config: FeedbackConfig) -> anyhow::Result<()> {
    let service = open_service(&config).await?;

    let result = service.analyze_all().await;
    service.close().await?;
    let report = result?;

    println!("✓ Updated {} feedback(s)", report.updated_count);
    if !report.skipped.is_empty() {
        println!("  Skipped {}:", report.skipped.len());
        for skipped in &report.skipped {
            println!(
                "  - {}: {}",
                skipped.native_id.as_deref().unwrap_or("<unknown>"),
                skipped.reason
            );
        }
    }
    Ok(())
}

/// Print the average score
pub async fn average_score(config: FeedbackConfig) -> anyhow::Result<()> {
    let service = open_service(&config).await?;

    let result = service.average_score().await;
    service.close().await?;
    let average = result?;

    debug!("Average over {} scored feedback(s)", average.scored_count);
    if average.scored_count == 0 {
        println!("No scored feedback yet (average_score: 0)");
    } else {
        println!(
            "Average score: {:.4} over {} feedback(s)",
            average.average_score, average.scored_count
        );
    }
    Ok(())
}
