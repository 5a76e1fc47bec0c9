use crate::config::ParserConfig;
use crate::error::Result;
use crate::grid::CellGrid;
use crate::schema::BasisType;
use crate::utils::{normalize_label, title_case};
use log::debug;
use regex::Regex;

const MONTH: &str = r"(?:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\.?";

/// Company, period and basis as printed above the figures.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TitleBlock {
    pub company_name: Option<String>,
    pub period: Option<String>,
    pub basis_type: Option<BasisType>,
}

pub struct TitleBlockDetector {
    period: Regex,
    report_titles: Vec<String>,
    metadata_scan_rows: usize,
    basis_scan_rows: usize,
}

impl TitleBlockDetector {
    pub fn new(config: &ParserConfig) -> Result<Self> {
        let pattern = format!(
            r"(?i)\b(?:for\s+the\s+[\w\s]*?ended\s+[\w\s,]*?\d{{4}}|year\s+to\s+date\s+[\w\s,]*?\d{{4}}|\d{{1,2}}\s+{m}\s+\d{{4}}\s+(?:to|-|–)\s+\d{{1,2}}\s+{m}\s+\d{{4}}|{m}\s+\d{{4}})\b",
            m = MONTH
        );

        Ok(Self {
            period: Regex::new(&pattern)?,
            report_titles: config
                .report_titles
                .iter()
                .map(|t| normalize_label(t))
                .filter(|t| !t.is_empty())
                .collect(),
            metadata_scan_rows: config.metadata_scan_rows,
            basis_scan_rows: config.basis_scan_rows,
        })
    }

    /// Scans the leading rows, stopping at `body_start` (the first section
    /// header) so account rows are never taken for a company name.
    pub fn detect(&self, grid: &CellGrid, body_start: Option<usize>) -> TitleBlock {
        let limit = body_start
            .unwrap_or(usize::MAX)
            .min(self.metadata_scan_rows)
            .min(grid.row_count());

        let mut block = TitleBlock::default();

        for idx in 0..limit {
            let text = grid.row_text(idx);
            if text.trim().is_empty() {
                continue;
            }

            if let Some(found) = self.find_period(&text) {
                if block.period.is_none() {
                    debug!("Row {}: period '{}'", idx, found);
                    block.period = Some(found);
                }
                continue;
            }

            if block.company_name.is_none() && self.is_company_candidate(&text) {
                let name = text.split_whitespace().collect::<Vec<_>>().join(" ");
                debug!("Row {}: company '{}'", idx, name);
                block.company_name = Some(name);
            }
        }

        block.basis_type = self.detect_basis(grid);
        block
    }

    pub fn find_period(&self, text: &str) -> Option<String> {
        self.period
            .find(text)
            .map(|m| title_case(m.as_str().trim_end_matches(',')))
    }

    fn is_company_candidate(&self, text: &str) -> bool {
        let normalized = normalize_label(text);
        if normalized.is_empty() || normalized.contains("basis") {
            return false;
        }
        if !normalized.chars().any(|c| c.is_alphabetic()) {
            return false;
        }
        !self
            .report_titles
            .iter()
            .any(|title| normalized == *title || normalized.starts_with(&format!("{} ", title)))
    }

    fn detect_basis(&self, grid: &CellGrid) -> Option<BasisType> {
        let limit = self.basis_scan_rows.min(grid.row_count());
        (0..limit).find_map(|idx| {
            let normalized = normalize_label(&grid.row_text(idx));
            if normalized.contains("accrual basis") || normalized.contains("accruals basis") {
                Some(BasisType::Accrual)
            } else if normalized.contains("cash basis") {
                Some(BasisType::Cash)
            } else {
                None
            }
        })
    }
}

pub fn detect_title_block(
    grid: &CellGrid,
    body_start: Option<usize>,
    config: &ParserConfig,
) -> Result<TitleBlock> {
    Ok(TitleBlockDetector::new(config)?.detect(grid, body_start))
}
