//! Turns the assembled sections into a finalized [`FinancialReport`].
//!
//! Fatal problems are collected into a single [`PnlError::Validation`] so the
//! caller sees every violated condition at once. Everything else becomes a
//! warning on the report.

use crate::config::Tolerance;
use crate::error::{PnlError, Result, Violation};
use crate::reconciler::TotalReconciler;
use crate::schema::{
    AccountLine, BasisType, FinancialReport, ProfitSources, ReportMetadata, ReportType, Section,
    SectionResult, Sections, TotalSource, ValidationWarning,
};
use log::{info, warn};
use std::collections::HashMap;

/// Sections and title block as assembled by the pipeline, before any
/// cross-section checks.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftReport {
    pub company_name: Option<String>,
    pub period: Option<String>,
    pub basis_type: Option<BasisType>,
    pub trading_income: Option<SectionResult>,
    pub cost_of_sales: Option<SectionResult>,
    pub operating_expenses: Option<SectionResult>,
    /// Amount on the Gross Profit row, when the sheet has one.
    pub gross_profit_row: Option<f64>,
    pub net_profit_row: Option<f64>,
    pub metadata: ReportMetadata,
    pub warnings: Vec<ValidationWarning>,
}

impl DraftReport {
    fn sections_mut(&mut self) -> impl Iterator<Item = (Section, &mut SectionResult)> {
        [
            (Section::TradingIncome, self.trading_income.as_mut()),
            (Section::CostOfSales, self.cost_of_sales.as_mut()),
            (Section::OperatingExpenses, self.operating_expenses.as_mut()),
        ]
        .into_iter()
        .filter_map(|(section, result)| result.map(|r| (section, r)))
    }

    fn sections(&self) -> impl Iterator<Item = (Section, &SectionResult)> {
        [
            (Section::TradingIncome, self.trading_income.as_ref()),
            (Section::CostOfSales, self.cost_of_sales.as_ref()),
            (Section::OperatingExpenses, self.operating_expenses.as_ref()),
        ]
        .into_iter()
        .filter_map(|(section, result)| result.map(|r| (section, r)))
    }
}

pub struct RecordValidator {
    tolerance: Tolerance,
}

impl RecordValidator {
    pub fn new(tolerance: Tolerance) -> Self {
        Self { tolerance }
    }

    pub fn finalize(&self, mut draft: DraftReport) -> Result<FinancialReport> {
        let company_name = required_text(draft.company_name.take());
        let period = required_text(draft.period.take());

        let mut violations = Vec::new();
        if company_name.is_none() {
            violations.push(Violation::MissingCompanyName);
        }
        if period.is_none() {
            violations.push(Violation::MissingPeriod);
        }
        violations.extend(self.value_violations(&draft));

        let (Some(company_name), Some(period), true) = (company_name, period, violations.is_empty())
        else {
            return Err(PnlError::Validation { violations });
        };

        let mut warnings = std::mem::take(&mut draft.warnings);
        let inherited = warnings.len();

        let basis_type = match draft.basis_type {
            Some(basis) => basis,
            None => {
                warnings.push(ValidationWarning::BasisTypeUndetected);
                BasisType::Accrual
            }
        };

        let reconciler = TotalReconciler::new(self.tolerance);
        for (section, result) in draft.sections_mut() {
            let merged = merge_duplicate_accounts(section, &mut result.accounts);
            if !merged.is_empty() {
                reconciler.refresh(result);
                warnings.extend(merged);
            }
        }

        let (gross_profit, gross_source) = self.resolve_gross_profit(&draft, &mut warnings);
        let (net_profit, net_source) = self.resolve_net_profit(&draft, gross_profit, &mut warnings);

        let report_type = if draft.trading_income.is_some() && draft.cost_of_sales.is_some() {
            ReportType::Complete
        } else {
            ReportType::Partial
        };
        warnings.extend(report_type_ambiguities(report_type, &draft));

        for warning in &warnings[inherited..] {
            warn!("{}", warning);
        }
        info!(
            "Finalized {:?} report for '{}' ({}) with {} warnings",
            report_type,
            company_name,
            period,
            warnings.len()
        );

        Ok(FinancialReport {
            company_name,
            period,
            basis_type,
            report_type,
            sections: Sections {
                trading_income: draft.trading_income,
                cost_of_sales: draft.cost_of_sales,
                gross_profit,
                operating_expenses: draft.operating_expenses,
                net_profit,
            },
            profit_sources: ProfitSources {
                gross_profit: gross_source,
                net_profit: net_source,
            },
            metadata: draft.metadata,
            warnings,
        })
    }

    fn value_violations(&self, draft: &DraftReport) -> Vec<Violation> {
        let mut violations = Vec::new();

        for (section, result) in draft.sections() {
            for account in &result.accounts {
                if !account.value.is_finite() {
                    violations.push(Violation::NonFiniteValue {
                        section: section.label().to_string(),
                        account: account.name.clone(),
                        value: account.value,
                    });
                }
            }
            if !result.total.is_finite() {
                violations.push(Violation::NonFiniteValue {
                    section: section.label().to_string(),
                    account: "total".to_string(),
                    value: result.total,
                });
            }
        }
        for (line, value) in [
            (Section::GrossProfit, draft.gross_profit_row),
            (Section::NetProfit, draft.net_profit_row),
        ] {
            if let Some(value) = value.filter(|v| !v.is_finite()) {
                violations.push(Violation::NonFiniteValue {
                    section: line.label().to_string(),
                    account: line.label().to_string(),
                    value,
                });
            }
        }

        if let Some(income) = &draft.trading_income {
            if income.total < 0.0 {
                violations.push(Violation::NegativeIncome {
                    total: income.total,
                });
            }
        }

        violations
    }

    fn resolve_gross_profit(
        &self,
        draft: &DraftReport,
        warnings: &mut Vec<ValidationWarning>,
    ) -> (f64, TotalSource) {
        match (&draft.trading_income, &draft.cost_of_sales, draft.gross_profit_row) {
            (Some(income), Some(costs), stated) => {
                let computed = income.total - costs.total;
                self.check_stated(Section::GrossProfit, stated, computed, warnings)
            }
            (_, _, Some(stated)) => (stated, TotalSource::Explicit),
            (Some(income), None, None) => {
                warnings.push(ValidationWarning::ProfitDerived {
                    line: Section::GrossProfit,
                    detail: "no Cost of Sales section or Gross Profit row; taken as Trading Income"
                        .to_string(),
                });
                (income.total, TotalSource::Computed)
            }
            (None, Some(costs), None) => {
                warnings.push(ValidationWarning::ProfitDerived {
                    line: Section::GrossProfit,
                    detail: "no Trading Income section or Gross Profit row; taken as negative Cost of Sales"
                        .to_string(),
                });
                (-costs.total, TotalSource::Computed)
            }
            (None, None, None) => {
                warnings.push(ValidationWarning::ProfitDerived {
                    line: Section::GrossProfit,
                    detail: "no income, cost or Gross Profit figures; assumed zero".to_string(),
                });
                (0.0, TotalSource::Computed)
            }
        }
    }

    fn resolve_net_profit(
        &self,
        draft: &DraftReport,
        gross_profit: f64,
        warnings: &mut Vec<ValidationWarning>,
    ) -> (f64, TotalSource) {
        match (&draft.operating_expenses, draft.net_profit_row) {
            (Some(expenses), stated) => {
                let computed = gross_profit - expenses.total;
                self.check_stated(Section::NetProfit, stated, computed, warnings)
            }
            (None, Some(stated)) => (stated, TotalSource::Explicit),
            (None, None) => {
                warnings.push(ValidationWarning::ProfitDerived {
                    line: Section::NetProfit,
                    detail: "no Operating Expenses section or Net Profit row; taken as Gross Profit"
                        .to_string(),
                });
                (gross_profit, TotalSource::Computed)
            }
        }
    }

    /// The sections always decide the figure; a disagreeing printed row
    /// only marks it inconsistent.
    fn check_stated(
        &self,
        line: Section,
        stated: Option<f64>,
        computed: f64,
        warnings: &mut Vec<ValidationWarning>,
    ) -> (f64, TotalSource) {
        match stated {
            Some(stated) if !self.tolerance.agrees(stated, computed) => {
                warnings.push(ValidationWarning::ProfitMismatch {
                    line,
                    stated,
                    computed,
                });
                (computed, TotalSource::Inconsistent)
            }
            _ => (computed, TotalSource::Computed),
        }
    }
}

fn required_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Folds accounts sharing a `(code, name)` pair into the first occurrence.
/// Names compare case-insensitively.
pub fn merge_duplicate_accounts(
    section: Section,
    accounts: &mut Vec<AccountLine>,
) -> Vec<ValidationWarning> {
    let mut first_seen: HashMap<(Option<String>, String), usize> = HashMap::new();
    let mut occurrences: Vec<usize> = Vec::new();
    let mut merged: Vec<AccountLine> = Vec::with_capacity(accounts.len());

    for account in accounts.drain(..) {
        let key = (
            account.code.clone(),
            account.name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase(),
        );
        match first_seen.get(&key) {
            Some(&idx) => {
                merged[idx].value += account.value;
                occurrences[idx] += 1;
            }
            None => {
                first_seen.insert(key, merged.len());
                occurrences.push(1);
                merged.push(account);
            }
        }
    }

    let warnings = merged
        .iter()
        .zip(&occurrences)
        .filter(|(_, count)| **count > 1)
        .map(|(account, count)| ValidationWarning::MergedDuplicateAccount {
            section,
            code: account.code.clone(),
            name: account.name.clone(),
            occurrences: *count,
        })
        .collect();

    *accounts = merged;
    warnings
}

fn report_type_ambiguities(report_type: ReportType, draft: &DraftReport) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    match report_type {
        ReportType::Partial => {
            if draft.gross_profit_row.is_none() {
                warnings.push(ValidationWarning::ReportTypeAmbiguity {
                    detail: "partial report without a Gross Profit row; revenue or cost detail may have been missed"
                        .to_string(),
                });
            }
        }
        ReportType::Complete => {
            for (section, result) in [
                (Section::TradingIncome, &draft.trading_income),
                (Section::CostOfSales, &draft.cost_of_sales),
            ] {
                if result.as_ref().is_some_and(|r| r.is_empty()) {
                    warnings.push(ValidationWarning::ReportTypeAmbiguity {
                        detail: format!(
                            "report treated as complete but the {} section lists no accounts",
                            section
                        ),
                    });
                }
            }
        }
    }
    warnings
}
