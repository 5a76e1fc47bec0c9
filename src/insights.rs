//! Narrative insights over a finalized report and its metrics.
//!
//! Generators only read the report. Their failures never reach the caller of
//! [`generate_insights`]; they become [`InsightOutcome::Unavailable`].

use crate::categorization::{category_totals, UNCATEGORIZED};
use crate::error::{PnlError, Result};
use crate::metrics::{top_accounts, FinancialMetrics, Ratio};
use crate::schema::{FinancialReport, Section};
use log::{info, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    Strength,
    Warning,
    Opportunity,
    #[serde(other)]
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Insight {
    #[serde(rename = "type")]
    pub kind: InsightKind,
    pub title: String,
    pub description: String,

    #[serde(default)]
    #[schemars(description = "Names of the metrics this insight refers to")]
    pub metrics: Vec<String>,

    #[serde(default)]
    pub impact: Impact,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub title: String,
    pub description: String,

    #[serde(default, alias = "expected_impact")]
    pub expected_impact: Impact,

    #[serde(default, alias = "implementation_difficulty")]
    pub difficulty: Difficulty,

    #[serde(default = "default_timeframe")]
    #[schemars(description = "short-term, medium-term or long-term")]
    pub timeframe: String,
}

fn default_timeframe() -> String {
    "medium-term".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InsightReport {
    #[serde(default)]
    pub insights: Vec<Insight>,

    #[serde(default)]
    pub recommendations: Vec<Recommendation>,

    pub summary: String,

    #[serde(default)]
    #[schemars(description = "Filled in by the generator; leave empty")]
    pub generated_by: String,
}

impl InsightReport {
    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&schemars::schema_for!(InsightReport))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum InsightOutcome {
    Available(InsightReport),
    Unavailable { reason: String },
}

impl InsightOutcome {
    pub fn report(&self) -> Option<&InsightReport> {
        match self {
            InsightOutcome::Available(report) => Some(report),
            InsightOutcome::Unavailable { .. } => None,
        }
    }

    pub fn from_result(generator: &str, result: Result<InsightReport>) -> Self {
        match result {
            Ok(report) => {
                info!(
                    "{} produced {} insights and {} recommendations",
                    generator,
                    report.insights.len(),
                    report.recommendations.len()
                );
                InsightOutcome::Available(report)
            }
            Err(e) => {
                warn!("Insights unavailable ({}): {}", generator, e);
                InsightOutcome::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }
}

pub trait InsightGenerator: Send + Sync {
    fn name(&self) -> &str;

    fn generate(&self, report: &FinancialReport, metrics: &FinancialMetrics)
        -> Result<InsightReport>;
}

pub fn generate_insights(
    generator: &dyn InsightGenerator,
    report: &FinancialReport,
    metrics: &FinancialMetrics,
) -> InsightOutcome {
    InsightOutcome::from_result(generator.name(), generator.generate(report, metrics))
}

/// Percent thresholds for [`RuleBasedInsights`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct InsightThresholds {
    pub healthy_gross_margin: f64,
    pub thin_gross_margin: f64,
    pub healthy_net_margin: f64,
    pub high_expense_ratio: f64,
    /// Share of operating expenses above which one category is called out.
    pub dominant_category_share: f64,
}

impl Default for InsightThresholds {
    fn default() -> Self {
        Self {
            healthy_gross_margin: 40.0,
            thin_gross_margin: 20.0,
            healthy_net_margin: 10.0,
            high_expense_ratio: 50.0,
            dominant_category_share: 40.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuleBasedInsights {
    pub thresholds: InsightThresholds,
}

impl RuleBasedInsights {
    pub fn new(thresholds: InsightThresholds) -> Self {
        Self { thresholds }
    }

    fn margin_insights(
        &self,
        report: &FinancialReport,
        metrics: &FinancialMetrics,
    ) -> Vec<Insight> {
        let t = &self.thresholds;
        let mut insights = Vec::new();

        if let Some(gross) = metrics.gross_profit_margin.value() {
            if gross >= t.healthy_gross_margin {
                insights.push(insight(
                    InsightKind::Strength,
                    "Healthy gross margin",
                    format!("Gross profit is {:.1}% of income.", gross),
                    &["grossProfitMargin"],
                    Impact::Medium,
                ));
            } else if gross < t.thin_gross_margin {
                insights.push(insight(
                    InsightKind::Warning,
                    "Thin gross margin",
                    format!(
                        "Gross profit is only {:.1}% of income; cost of sales takes {}.",
                        gross, metrics.cost_of_sales_pct
                    ),
                    &["grossProfitMargin", "costOfSalesPct"],
                    Impact::High,
                ));
            }
        }

        if report.net_profit() < 0.0 {
            insights.push(insight(
                InsightKind::Warning,
                "Operating at a loss",
                format!(
                    "The period closed with a net loss of {:.2} {}.",
                    report.net_profit().abs(),
                    report.metadata.currency
                ),
                &["netProfitMargin"],
                Impact::High,
            ));
        } else if let Some(net) = metrics.net_profit_margin.value() {
            if net >= t.healthy_net_margin {
                insights.push(insight(
                    InsightKind::Strength,
                    "Solid net margin",
                    format!("{:.1}% of income was kept as net profit.", net),
                    &["netProfitMargin"],
                    Impact::Medium,
                ));
            }
        }

        if let Ratio::Value(ratio) = metrics.operating_expense_ratio {
            if ratio > t.high_expense_ratio {
                insights.push(insight(
                    InsightKind::Warning,
                    "High operating expenses",
                    format!("Operating expenses absorb {:.1}% of income.", ratio),
                    &["operatingExpenseRatio"],
                    Impact::High,
                ));
            }
        }

        if !metrics.gross_profit_margin.is_defined() {
            insights.push(insight(
                InsightKind::Info,
                "Margins unavailable",
                "The report has no trading income, so margins cannot be calculated.".to_string(),
                &[],
                Impact::Low,
            ));
        }

        insights
    }

    fn expense_insights(&self, report: &FinancialReport) -> (Vec<Insight>, Vec<Recommendation>) {
        let mut insights = Vec::new();
        let mut recommendations = Vec::new();

        let expenses = match report.section(Section::OperatingExpenses) {
            Some(section) if section.total > 0.0 => section.total,
            _ => return (insights, recommendations),
        };

        let dominant = category_totals(report, Some(Section::OperatingExpenses))
            .into_iter()
            .filter(|(label, _)| label != UNCATEGORIZED)
            .max_by(|a, b| a.1.total_cmp(&b.1));

        if let Some((label, amount)) = dominant {
            let share = amount * 100.0 / expenses;
            if share > self.thresholds.dominant_category_share {
                insights.push(insight(
                    InsightKind::Opportunity,
                    &format!("{} dominates overheads", label),
                    format!("{} accounts for {:.1}% of operating expenses.", label, share),
                    &["operatingExpenseRatio"],
                    Impact::Medium,
                ));
                recommendations.push(Recommendation {
                    title: format!("Review {} spending", label.to_lowercase()),
                    description: format!(
                        "{} is the largest expense group; small percentage savings here move net profit the most.",
                        label
                    ),
                    expected_impact: Impact::Medium,
                    difficulty: Difficulty::Medium,
                    timeframe: "short-term".to_string(),
                });
            }
        }

        if let Some(largest) = top_accounts(report, Section::OperatingExpenses, 1).first() {
            insights.push(insight(
                InsightKind::Info,
                "Largest expense",
                format!(
                    "{} is the largest single expense at {:.2} {}.",
                    largest.name, largest.value, report.metadata.currency
                ),
                &[],
                Impact::Low,
            ));
        }

        (insights, recommendations)
    }

    fn data_quality_insights(&self, report: &FinancialReport) -> Vec<Insight> {
        let mut insights = Vec::new();
        if report.has_inconsistencies() {
            insights.push(insight(
                InsightKind::Warning,
                "Totals do not reconcile",
                "At least one printed total disagrees with its accounts; check the source report before relying on these figures."
                    .to_string(),
                &[],
                Impact::High,
            ));
        } else if !report.warnings.is_empty() {
            insights.push(insight(
                InsightKind::Info,
                "Parsing warnings",
                format!(
                    "{} warning(s) were raised while reading the report.",
                    report.warnings.len()
                ),
                &[],
                Impact::Low,
            ));
        }
        insights
    }
}

impl InsightGenerator for RuleBasedInsights {
    fn name(&self) -> &str {
        "rules"
    }

    fn generate(
        &self,
        report: &FinancialReport,
        metrics: &FinancialMetrics,
    ) -> Result<InsightReport> {
        if !report.net_profit().is_finite() {
            return Err(PnlError::InsightGeneration(
                "net profit is not a finite number".to_string(),
            ));
        }

        let mut insights = self.margin_insights(report, metrics);
        let (expense_insights, mut recommendations) = self.expense_insights(report);
        insights.extend(expense_insights);
        insights.extend(self.data_quality_insights(report));

        if let Ratio::Value(ratio) = metrics.operating_expense_ratio {
            if ratio > self.thresholds.high_expense_ratio {
                recommendations.push(Recommendation {
                    title: "Reduce fixed overheads".to_string(),
                    description: "Renegotiate recurring costs such as rent and subscriptions to bring the expense ratio down."
                        .to_string(),
                    expected_impact: Impact::High,
                    difficulty: Difficulty::Hard,
                    timeframe: "medium-term".to_string(),
                });
            }
        }

        let summary = format!(
            "{} recorded net profit of {:.2} {} on total income of {:.2} for {}.",
            report.company_name,
            report.net_profit(),
            report.metadata.currency,
            metrics.total_income,
            report.period
        );

        Ok(InsightReport {
            insights,
            recommendations,
            summary,
            generated_by: self.name().to_string(),
        })
    }
}

fn insight(
    kind: InsightKind,
    title: &str,
    description: String,
    metrics: &[&str],
    impact: Impact,
) -> Insight {
    Insight {
        kind,
        title: title.to_string(),
        description,
        metrics: metrics.iter().map(|m| m.to_string()).collect(),
        impact,
    }
}
