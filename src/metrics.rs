pub use crate::categorization::category_totals;
use crate::schema::{AccountLine, FinancialReport, Section};
use serde::{Serialize, Serializer};
use std::fmt;

/// A percentage that is undefined when there is no income to divide by.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ratio {
    Value(f64),
    Undefined,
}

impl Ratio {
    pub fn percent_of(numerator: f64, denominator: f64) -> Self {
        if denominator == 0.0 || !denominator.is_finite() || !numerator.is_finite() {
            Ratio::Undefined
        } else {
            Ratio::Value(numerator * 100.0 / denominator)
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Ratio::Value(v) => Some(v),
            Ratio::Undefined => None,
        }
    }

    pub fn is_defined(self) -> bool {
        matches!(self, Ratio::Value(_))
    }
}

impl Serialize for Ratio {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Ratio::Value(v) => serializer.serialize_f64(*v),
            Ratio::Undefined => serializer.serialize_str("undefined"),
        }
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ratio::Value(v) => write!(f, "{:.1}%", v),
            Ratio::Undefined => f.write_str("undefined"),
        }
    }
}

/// Headline ratios over the section totals, in percent of total income.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialMetrics {
    pub total_income: f64,
    pub operating_profit: f64,
    pub gross_profit_margin: Ratio,
    pub net_profit_margin: Ratio,
    pub operating_expense_ratio: Ratio,
    pub cost_of_sales_pct: Ratio,
    pub operating_profit_margin: Ratio,
}

impl FinancialMetrics {
    pub fn from_report(report: &FinancialReport) -> Self {
        let total = |section: Section| report.section(section).map(|s| s.total).unwrap_or(0.0);

        let total_income = total(Section::TradingIncome);
        let cost_of_sales = total(Section::CostOfSales);
        let operating_expenses = total(Section::OperatingExpenses);
        let operating_profit = report.gross_profit() - operating_expenses;

        Self {
            total_income,
            operating_profit,
            gross_profit_margin: Ratio::percent_of(report.gross_profit(), total_income),
            net_profit_margin: Ratio::percent_of(report.net_profit(), total_income),
            operating_expense_ratio: Ratio::percent_of(operating_expenses, total_income),
            cost_of_sales_pct: Ratio::percent_of(cost_of_sales, total_income),
            operating_profit_margin: Ratio::percent_of(operating_profit, total_income),
        }
    }
}

pub fn calculate_metrics(report: &FinancialReport) -> FinancialMetrics {
    FinancialMetrics::from_report(report)
}

/// Largest accounts of a section by absolute value, ties kept in sheet order.
pub fn top_accounts(report: &FinancialReport, section: Section, n: usize) -> Vec<&AccountLine> {
    let mut accounts: Vec<_> = report
        .section(section)
        .map(|s| s.accounts.iter().collect())
        .unwrap_or_default();
    accounts.sort_by(|a, b| b.value.abs().total_cmp(&a.value.abs()));
    accounts.truncate(n);
    accounts
}
