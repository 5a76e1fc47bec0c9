use pnl_normalizer::{
    analyze_profit_loss_with, calculate_metrics, category_totals, generate_insights, ParseOptions,
    ParserConfig, RuleBasedInsights, Section,
};
use std::error::Error;
use std::path::PathBuf;

/// Usage: analyze_report <pnl.csv|pnl.xlsx> [parser-config.json]
fn main() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let path = PathBuf::from(
        args.next()
            .ok_or("usage: analyze_report <pnl.csv|pnl.xlsx> [parser-config.json]")?,
    );
    let config = match args.next() {
        Some(config_path) => ParserConfig::from_json_file(&PathBuf::from(config_path))?,
        None => ParserConfig::default(),
    };

    println!("📄 Parsing {}...\n", path.display());
    let report = analyze_profit_loss_with(&path, &config, &ParseOptions::default())?;

    println!(
        "{} | {} | {:?} basis | {:?}",
        report.company_name, report.period, report.basis_type, report.report_type
    );
    println!("------------------------------------------------------------------");
    for (section, result) in report.sections.iter() {
        println!(
            "{:<22} {:>14.2}  ({:?}, {} accounts)",
            section.label(),
            result.total,
            result.total_source,
            result.accounts.len()
        );
    }
    println!(
        "{:<22} {:>14.2}  ({:?})",
        "Gross Profit",
        report.gross_profit(),
        report.profit_sources.gross_profit
    );
    println!(
        "{:<22} {:>14.2}  ({:?})",
        "Net Profit",
        report.net_profit(),
        report.profit_sources.net_profit
    );

    if !report.warnings.is_empty() {
        println!("\n⚠️  {} warning(s):", report.warnings.len());
        for warning in &report.warnings {
            println!("  - {}", warning);
        }
    }

    let metrics = calculate_metrics(&report);
    println!("\n📊 Metrics");
    println!("  Gross profit margin:     {}", metrics.gross_profit_margin);
    println!("  Net profit margin:       {}", metrics.net_profit_margin);
    println!("  Operating expense ratio: {}", metrics.operating_expense_ratio);
    println!("  Cost of sales:           {}", metrics.cost_of_sales_pct);

    println!("\n🗂️  Operating expenses by category");
    for (category, total) in category_totals(&report, Some(Section::OperatingExpenses)) {
        println!("  {:<24} {:>12.2}", category, total);
    }

    let outcome = generate_insights(&RuleBasedInsights::default(), &report, &metrics);
    match outcome.report() {
        Some(analysis) => {
            println!("\n💡 {}", analysis.summary);
            for insight in &analysis.insights {
                println!("  [{:?}] {}: {}", insight.kind, insight.title, insight.description);
            }
            for recommendation in &analysis.recommendations {
                println!("  → {} ({:?})", recommendation.title, recommendation.difficulty);
            }
        }
        None => println!("\n💡 Insights unavailable"),
    }

    let json_path = path.with_extension("normalized.json");
    std::fs::write(&json_path, report.to_json()?)?;
    println!("\n✅ Canonical record written to {}", json_path.display());

    Ok(())
}
