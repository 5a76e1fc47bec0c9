use dotenv::dotenv;
use pnl_normalizer::llm::{generate_llm_insights, LlmInsightGenerator};
use pnl_normalizer::{analyze_profit_loss, calculate_metrics, InsightOutcome};
use std::error::Error;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    let path = PathBuf::from(
        std::env::args()
            .nth(1)
            .ok_or("usage: llm_insights <pnl.csv|pnl.xlsx>")?,
    );

    println!("📄 Parsing {}...", path.display());
    let report = analyze_profit_loss(&path)?;
    let metrics = calculate_metrics(&report);
    println!(
        "✅ {} ({}): net profit {:.2} {}\n",
        report.company_name,
        report.period,
        report.net_profit(),
        report.metadata.currency
    );

    let generator = LlmInsightGenerator::from_env()?;
    println!("🤖 Asking the model for an analysis...\n");

    match generate_llm_insights(&generator, &report, &metrics).await {
        InsightOutcome::Available(analysis) => {
            println!("{}\n", analysis.summary);
            for insight in &analysis.insights {
                println!("[{:?} / {:?}] {}", insight.kind, insight.impact, insight.title);
                println!("    {}", insight.description);
            }
            println!("\nRecommendations:");
            for recommendation in &analysis.recommendations {
                println!(
                    "- {} ({:?}, {}): {}",
                    recommendation.title,
                    recommendation.difficulty,
                    recommendation.timeframe,
                    recommendation.description
                );
            }
        }
        InsightOutcome::Unavailable { reason } => {
            eprintln!("❌ Insights unavailable: {}", reason);
        }
    }

    Ok(())
}
