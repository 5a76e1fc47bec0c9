//! # P&L Normalizer
//!
//! A library for turning semi-structured profit and loss spreadsheet exports
//! (CSV or Excel, as produced by small-business accounting platforms) into a
//! canonical, validated financial record.
//!
//! ## Core Concepts
//!
//! - **Cell Grid**: The first worksheet as ordered rows of typed cells
//! - **Sections**: Trading Income, Cost of Sales and Operating Expenses are
//!   row ranges under a recognized header; Gross Profit and Net Profit are
//!   single marker rows
//! - **Total Provenance**: Every section total and profit line records
//!   whether it was printed on the sheet, computed from its accounts, or
//!   printed but contradicted by them
//! - **Warnings, not failures**: Only a missing company name or period, a
//!   negative income total, non-numeric values, or a sheet with no
//!   recognizable sections stop a parse; everything else is reported as a
//!   warning on the record
//!
//! ## Example
//!
//! ```rust,ignore
//! use pnl_normalizer::*;
//! use std::path::Path;
//!
//! let report = analyze_profit_loss(Path::new("pnl.xlsx")).unwrap();
//! let metrics = calculate_metrics(&report);
//! println!("{} net profit: {:.2} ({})", report.company_name, report.net_profit(), metrics.net_profit_margin);
//!
//! let insights = generate_insights(&RuleBasedInsights::default(), &report, &metrics);
//! if let Some(analysis) = insights.report() {
//!     println!("{}", analysis.summary);
//! }
//! ```

pub mod categorization;
pub mod config;
pub mod error;
pub mod export;
pub mod extractor;
pub mod grid;
pub mod insights;
pub mod metadata;
pub mod metrics;
pub mod reconciler;
pub mod schema;
pub mod sections;
pub mod utils;
pub mod validation;

#[cfg(feature = "llm")]
pub mod llm;

pub use categorization::{category_totals, CategoryClassifier, UNCATEGORIZED};
pub use config::{
    CategoryMatcher, CategoryRule, ParseOptions, ParserConfig, SectionHeaderRule, Tolerance,
};
pub use error::{PnlError, Result, Violation};
pub use extractor::{extract_accounts, AccountLineExtractor, ExtractedSection, TotalCandidate};
pub use grid::{parse_amount, CellGrid, CellValue};
pub use insights::{
    generate_insights, Difficulty, Impact, Insight, InsightGenerator, InsightKind,
    InsightOutcome, InsightReport, InsightThresholds, Recommendation, RuleBasedInsights,
};
pub use metadata::{detect_title_block, TitleBlock, TitleBlockDetector};
pub use metrics::{calculate_metrics, top_accounts, FinancialMetrics, Ratio};
pub use reconciler::{reconcile_section, TotalReconciler};
pub use schema::*;
pub use sections::{
    detect_sections, DetectionConfidence, ProfitMarker, SectionDetector, SectionLayout,
    SectionSpan,
};
pub use validation::{merge_duplicate_accounts, DraftReport, RecordValidator};

use chrono::Local;
use log::{debug, info, warn};
use std::path::Path;

/// The full pipeline with every rule table compiled once. Holds no mutable
/// state, so one parser can serve any number of threads.
pub struct ProfitLossParser {
    config: ParserConfig,
    detector: SectionDetector,
    extractor: AccountLineExtractor,
    title_detector: TitleBlockDetector,
    reconciler: TotalReconciler,
    classifier: CategoryClassifier,
    validator: RecordValidator,
}

impl ProfitLossParser {
    pub fn new(config: ParserConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            detector: SectionDetector::new(&config),
            extractor: AccountLineExtractor::new(&config)?,
            title_detector: TitleBlockDetector::new(&config)?,
            reconciler: TotalReconciler::new(config.tolerance),
            classifier: CategoryClassifier::from_config(&config),
            validator: RecordValidator::new(config.tolerance),
            config,
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(ParserConfig::default())
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Loads the spreadsheet and parses it. The file name becomes
    /// `metadata.source` unless `options` supplies one.
    pub fn parse_file(&self, path: &Path, options: &ParseOptions) -> Result<FinancialReport> {
        info!("Parsing profit and loss report: {}", path.display());
        let grid = CellGrid::load(path)?;

        let mut options = options.clone();
        if options.source.is_none() {
            options.source = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned());
        }
        self.parse_grid(&grid, &options)
    }

    pub fn parse_grid(&self, grid: &CellGrid, options: &ParseOptions) -> Result<FinancialReport> {
        if grid.is_empty() {
            return Err(PnlError::MalformedReport("sheet contains no rows".to_string()));
        }

        let mut warnings = grid.diagnose();
        for warning in &warnings {
            warn!("{}", warning);
        }

        let layout = self.detector.detect(grid)?;
        warnings.extend(layout.warnings.iter().cloned());

        let title = self.title_detector.detect(grid, layout.first_boundary());
        debug!("Title block: {:?}", title);

        let mut draft = DraftReport {
            company_name: override_or(&options.company_name, title.company_name),
            period: override_or(&options.period, title.period),
            basis_type: title.basis_type,
            trading_income: None,
            cost_of_sales: None,
            operating_expenses: None,
            gross_profit_row: layout.marker_value(Section::GrossProfit),
            net_profit_row: layout.marker_value(Section::NetProfit),
            metadata: ReportMetadata {
                upload_date: options
                    .upload_date
                    .unwrap_or_else(|| Local::now().date_naive()),
                source: options
                    .source
                    .clone()
                    .unwrap_or_else(|| "spreadsheet".to_string()),
                currency: override_or(&options.currency, None)
                    .unwrap_or_else(|| self.config.default_currency.clone()),
            },
            warnings: Vec::new(),
        };

        for span in &layout.spans {
            let extracted = self.extractor.extract(grid, span);
            debug!(
                "{}: {} accounts, explicit total {:?}",
                span.section,
                extracted.accounts.len(),
                extracted.explicit_total.as_ref().map(|t| t.value)
            );

            let (mut result, warning) = self.reconciler.reconcile(
                span.section,
                extracted.accounts,
                extracted.explicit_total.map(|t| t.value),
            );
            self.classifier.apply(&mut result.accounts);
            warnings.extend(warning);

            match span.section {
                Section::TradingIncome => draft.trading_income = Some(result),
                Section::CostOfSales => draft.cost_of_sales = Some(result),
                Section::OperatingExpenses => draft.operating_expenses = Some(result),
                Section::GrossProfit | Section::NetProfit => {}
            }
        }

        draft.warnings = warnings;
        self.validator.finalize(draft)
    }
}

fn override_or(value: &Option<String>, detected: Option<String>) -> Option<String> {
    value
        .as_ref()
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .or(detected)
}

pub fn analyze_profit_loss(path: &Path) -> Result<FinancialReport> {
    ProfitLossParser::with_defaults()?.parse_file(path, &ParseOptions::default())
}

pub fn analyze_profit_loss_with(
    path: &Path,
    config: &ParserConfig,
    options: &ParseOptions,
) -> Result<FinancialReport> {
    ProfitLossParser::new(config.clone())?.parse_file(path, options)
}

pub fn parse_profit_loss_grid(grid: &CellGrid, options: &ParseOptions) -> Result<FinancialReport> {
    ProfitLossParser::with_defaults()?.parse_grid(grid, options)
}
