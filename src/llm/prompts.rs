use crate::metrics::{top_accounts, FinancialMetrics};
use crate::schema::{FinancialReport, Section};

pub const SYSTEM_PROMPT_ANALYST: &str = r#"
You are a financial analyst specializing in profit and loss analysis for small businesses.

## RULES
- Base every statement on the figures provided. Do not invent accounts or amounts.
- Percentages are already calculated; quote them rather than recomputing.
- A metric reported as "undefined" could not be calculated (no trading income). Say so instead of guessing.
- If parsing warnings are listed, mention any that affect the reliability of your conclusions.
- Respond with a single JSON object and nothing else.
"#;

/// Builds the user prompt: headline figures, ratios, the five largest
/// operating expenses and any parsing warnings, followed by the response schema.
pub fn build_insight_prompt(
    report: &FinancialReport,
    metrics: &FinancialMetrics,
    response_schema: &str,
) -> String {
    let currency = &report.metadata.currency;
    let mut prompt = format!(
        "Analyze the profit and loss report of {} for the period {}.\n\n## FIGURES ({})\n",
        report.company_name, report.period, currency
    );

    for (section, result) in report.sections.iter() {
        prompt.push_str(&format!("- {}: {:.2}\n", section, result.total));
    }
    prompt.push_str(&format!("- Gross Profit: {:.2}\n", report.gross_profit()));
    prompt.push_str(&format!("- Net Profit: {:.2}\n", report.net_profit()));

    prompt.push_str("\n## METRICS\n");
    prompt.push_str(&format!("- Gross profit margin: {}\n", metrics.gross_profit_margin));
    prompt.push_str(&format!("- Net profit margin: {}\n", metrics.net_profit_margin));
    prompt.push_str(&format!("- Operating expense ratio: {}\n", metrics.operating_expense_ratio));
    prompt.push_str(&format!("- Cost of sales: {}\n", metrics.cost_of_sales_pct));
    prompt.push_str(&format!("- Operating profit margin: {}\n", metrics.operating_profit_margin));

    let top = top_accounts(report, Section::OperatingExpenses, 5);
    if !top.is_empty() {
        let expenses_total = report
            .section(Section::OperatingExpenses)
            .map(|s| s.total)
            .unwrap_or(0.0);
        prompt.push_str("\n## TOP EXPENSES\n");
        for account in top {
            let share = if expenses_total != 0.0 {
                format!("{:.1}% of total expenses", account.value.abs() * 100.0 / expenses_total)
            } else {
                "share unavailable".to_string()
            };
            prompt.push_str(&format!(
                "- {}: {:.2} ({})\n",
                account.name,
                account.value.abs(),
                share
            ));
        }
    }

    if !report.warnings.is_empty() {
        prompt.push_str("\n## PARSING WARNINGS\n");
        for warning in &report.warnings {
            prompt.push_str(&format!("- {}\n", warning));
        }
    }

    prompt.push_str(
        "\n## TASK\n\
         Provide 3-5 insights (type strength, warning or opportunity; impact low, medium or high), \
         3-4 actionable recommendations (difficulty easy, medium or hard; timeframe short-term, \
         medium-term or long-term) and a 2-3 sentence executive summary.\n\n\
         ## RESPONSE SCHEMA\n",
    );
    prompt.push_str(response_schema);
    prompt.push('\n');
    prompt
}
