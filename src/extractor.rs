use crate::config::ParserConfig;
use crate::error::Result;
use crate::grid::{CellGrid, CellValue};
use crate::schema::AccountLine;
use crate::sections::{SectionDetector, SectionSpan};
use crate::utils::label_tokens;
use log::debug;
use regex::Regex;

/// A labelled total row found inside a span.
#[derive(Debug, Clone, PartialEq)]
pub struct TotalCandidate {
    pub row: usize,
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedSection {
    pub accounts: Vec<AccountLine>,
    pub explicit_total: Option<TotalCandidate>,
}

enum RowKind {
    Account(AccountLine),
    Total(TotalCandidate),
}

pub struct AccountLineExtractor {
    detector: SectionDetector,
    total_prefixes: Vec<Vec<String>>,
    code_token: Regex,
    code_prefix: Regex,
}

impl AccountLineExtractor {
    pub fn new(config: &ParserConfig) -> Result<Self> {
        Ok(Self {
            detector: SectionDetector::new(config),
            total_prefixes: config
                .total_prefixes
                .iter()
                .map(|p| label_tokens(p))
                .filter(|t| !t.is_empty())
                .collect(),
            code_token: Regex::new(r"^[A-Za-z0-9][A-Za-z0-9.\-/]*$")?,
            code_prefix: Regex::new(r"^(\d{3,}(?:[.\-/]\d+)*)(?:\s*[-–:|]\s*|\s+)(\S.*)$")?,
        })
    }

    pub fn extract(&self, grid: &CellGrid, span: &SectionSpan) -> ExtractedSection {
        let mut accounts = Vec::new();
        let mut totals: Vec<TotalCandidate> = Vec::new();
        let mut last_account_row = None;

        for row in span.rows() {
            let Some(cells) = grid.row(row) else {
                continue;
            };
            match self.classify_row(row, cells, span) {
                Some(RowKind::Account(line)) => {
                    debug!("Row {}: account '{}' = {}", row, line.name, line.value);
                    accounts.push(line);
                    last_account_row = Some(row);
                }
                Some(RowKind::Total(candidate)) => {
                    debug!("Row {}: total '{}' = {}", row, candidate.label, candidate.value);
                    totals.push(candidate);
                }
                None => debug!("Row {}: skipped", row),
            }
        }

        let explicit_total = self.choose_total(span, totals, last_account_row);
        ExtractedSection {
            accounts,
            explicit_total,
        }
    }

    /// Prefers a total that names the section. Otherwise the last total is
    /// used only when no account follows it, so group subtotals in the
    /// middle of a section are never mistaken for the section total.
    fn choose_total(
        &self,
        span: &SectionSpan,
        totals: Vec<TotalCandidate>,
        last_account_row: Option<usize>,
    ) -> Option<TotalCandidate> {
        let naming = totals
            .iter()
            .rposition(|t| self.total_names_section(&t.label, span));
        if let Some(idx) = naming {
            return totals.into_iter().nth(idx);
        }

        let last = totals.into_iter().last()?;
        match last_account_row {
            Some(row) if row > last.row => {
                debug!(
                    "Ignoring subtotal '{}' at row {}; accounts follow it",
                    last.label, last.row
                );
                None
            }
            _ => Some(last),
        }
    }

    fn total_names_section(&self, label: &str, span: &SectionSpan) -> bool {
        let tokens = label_tokens(label);
        let remainder = self
            .total_prefixes
            .iter()
            .find(|p| tokens.starts_with(p))
            .map(|p| tokens[p.len()..].join(" "))
            .unwrap_or_else(|| tokens.join(" "));

        remainder == label_tokens(&span.header_text).join(" ")
            || self.detector.names_section(&remainder, span.section)
    }

    /// Total-style prefixes, the header text repeated, or the canonical
    /// section name repeated under a differently worded header.
    fn is_total_label(&self, label: &str, span: &SectionSpan) -> bool {
        let tokens = label_tokens(label);
        self.total_prefixes.iter().any(|p| tokens.starts_with(p))
            || tokens == label_tokens(&span.header_text)
            || tokens == label_tokens(span.section.label())
    }

    fn classify_row(&self, row: usize, cells: &[CellValue], span: &SectionSpan) -> Option<RowKind> {
        let value_idx = cells.iter().rposition(|c| c.as_number().is_some())?;
        let value = cells[value_idx].as_number()?;

        let texts: Vec<(usize, &str)> = cells[..value_idx]
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.as_text().map(|t| (i, t.trim())))
            .filter(|(_, t)| !t.is_empty())
            .collect();
        let &(name_idx, first_text) = texts.first()?;

        if self.is_total_label(first_text, span) {
            return Some(RowKind::Total(TotalCandidate {
                row,
                label: first_text.to_string(),
                value,
            }));
        }

        // Code in its own column: a number before the name, or a code-like
        // token followed by a second text cell.
        let numeric_code = cells[..name_idx]
            .iter()
            .find_map(|c| c.as_number())
            .filter(|n| n.is_finite() && *n >= 0.0)
            .map(format_code);

        let (code, name) = match (numeric_code, texts.get(1)) {
            (Some(code), _) => (Some(code), first_text.to_string()),
            (None, Some(&(_, second)))
                if self.code_token.is_match(first_text)
                    && first_text.chars().any(|c| c.is_ascii_digit()) =>
            {
                (Some(first_text.to_string()), second.to_string())
            }
            _ => self.split_code_prefix(first_text),
        };

        if name.is_empty() {
            return None;
        }
        if self.is_total_label(&name, span) {
            return Some(RowKind::Total(TotalCandidate {
                row,
                label: name,
                value,
            }));
        }

        Some(RowKind::Account(AccountLine::new(code, name, value)))
    }

    /// Splits "4000 - Consulting Fees" into its code and name.
    fn split_code_prefix(&self, text: &str) -> (Option<String>, String) {
        match self.code_prefix.captures(text) {
            Some(caps) => (
                caps.get(1).map(|m| m.as_str().to_string()),
                caps.get(2).map(|m| m.as_str().trim().to_string()).unwrap_or_default(),
            ),
            None => (None, text.to_string()),
        }
    }
}

/// "4000" for whole numbers, "4000.1" when the code cell carried a fraction.
fn format_code(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as u64)
    } else {
        n.to_string()
    }
}

pub fn extract_accounts(
    grid: &CellGrid,
    span: &SectionSpan,
    config: &ParserConfig,
) -> Result<ExtractedSection> {
    Ok(AccountLineExtractor::new(config)?.extract(grid, span))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Section;
    use crate::sections::DetectionConfidence;

    fn span(section: Section, header: &str, end: usize) -> SectionSpan {
        SectionSpan {
            section,
            header_row: 0,
            start: 1,
            end,
            header_text: header.to_string(),
            confidence: DetectionConfidence::Exact,
        }
    }

    fn extractor() -> AccountLineExtractor {
        AccountLineExtractor::new(&ParserConfig::default()).unwrap()
    }

    #[test]
    fn test_extracts_accounts_and_explicit_total() {
        let grid = CellGrid::from_text_rows(vec![
            vec!["Trading Income", "", ""],
            vec!["Consulting Fees", "", "10,000.00"],
            vec!["", "", ""],
            vec!["Product Sales", "", "5,000.00"],
            vec!["Total Trading Income", "", "15,000.00"],
        ]);

        let extracted =
            extractor().extract(&grid, &span(Section::TradingIncome, "Trading Income", 5));

        assert_eq!(extracted.accounts.len(), 2);
        assert_eq!(extracted.accounts[0].name, "Consulting Fees");
        assert_eq!(extracted.accounts[1].value, 5000.0);
        assert_eq!(extracted.explicit_total.unwrap().value, 15000.0);
    }

    #[test]
    fn test_trailing_column_is_the_value() {
        let grid = CellGrid::from_text_rows(vec![
            vec!["Operating Expenses", "Budget", "Actual"],
            vec!["Rent", "1,800.00", "2,000.00"],
        ]);

        let extracted =
            extractor().extract(&grid, &span(Section::OperatingExpenses, "Operating Expenses", 2));
        assert_eq!(extracted.accounts[0].value, 2000.0);
    }

    #[test]
    fn test_account_codes() {
        let grid = CellGrid::new(vec![
            vec![CellValue::from("Trading Income")],
            vec![
                CellValue::Number(4000.0),
                CellValue::from("Consulting Fees"),
                CellValue::Number(100.0),
            ],
            vec![CellValue::from("4100 - Product Sales"), CellValue::Number(50.0)],
            vec![
                CellValue::from("REV-02"),
                CellValue::from("Licensing"),
                CellValue::Number(25.0),
            ],
            vec![CellValue::from("Grants"), CellValue::Number(5.0)],
        ]);

        let extracted =
            extractor().extract(&grid, &span(Section::TradingIncome, "Trading Income", 5));
        let codes: Vec<Option<&str>> =
            extracted.accounts.iter().map(|a| a.code.as_deref()).collect();
        let names: Vec<&str> = extracted.accounts.iter().map(|a| a.name.as_str()).collect();

        assert_eq!(codes, vec![Some("4000"), Some("4100"), Some("REV-02"), None]);
        assert_eq!(names, vec!["Consulting Fees", "Product Sales", "Licensing", "Grants"]);
    }

    #[test]
    fn test_digits_inside_a_name_are_not_a_code() {
        let (code, name) = extractor().split_code_prefix("401k Contributions");
        assert_eq!(code, None);
        assert_eq!(name, "401k Contributions");
    }

    #[test]
    fn test_skips_rows_without_name_or_amount() {
        let grid = CellGrid::from_text_rows(vec![
            vec!["Operating Expenses", ""],
            vec!["Wages", ""],
            vec!["", "300"],
            vec!["Rent", "-"],
            vec!["Advertising", "120"],
        ]);

        let extracted =
            extractor().extract(&grid, &span(Section::OperatingExpenses, "Operating Expenses", 5));
        assert_eq!(extracted.accounts.len(), 1);
        assert_eq!(extracted.accounts[0].name, "Advertising");
        assert!(extracted.explicit_total.is_none());
    }

    #[test]
    fn test_group_subtotal_is_not_the_section_total() {
        let grid = CellGrid::from_text_rows(vec![
            vec!["Operating Expenses", ""],
            vec!["Wages", "300"],
            vec!["Superannuation", "30"],
            vec!["Total Employment Costs", "330"],
            vec!["Rent", "200"],
        ]);

        let extracted =
            extractor().extract(&grid, &span(Section::OperatingExpenses, "Operating Expenses", 5));
        assert_eq!(extracted.accounts.len(), 3);
        assert!(extracted.explicit_total.is_none());
    }

    #[test]
    fn test_total_naming_the_section_wins_over_later_subtotal() {
        let grid = CellGrid::from_text_rows(vec![
            vec!["Operating Expenses", ""],
            vec!["Rent", "200"],
            vec!["Total Operating Expenses", "200"],
            vec!["Subtotal", "999"],
        ]);

        let extracted =
            extractor().extract(&grid, &span(Section::OperatingExpenses, "Operating Expenses", 4));
        let total = extracted.explicit_total.unwrap();
        assert_eq!(total.row, 2);
        assert_eq!(total.value, 200.0);
    }

    #[test]
    fn test_repeated_header_counts_as_total() {
        let grid = CellGrid::from_text_rows(vec![
            vec!["Cost of Sales", ""],
            vec!["Purchases", "40"],
            vec!["Cost of Sales", "40"],
        ]);

        let extracted = extractor().extract(&grid, &span(Section::CostOfSales, "Cost of Sales", 3));
        assert_eq!(extracted.accounts.len(), 1);
        assert_eq!(extracted.explicit_total.unwrap().value, 40.0);
    }

    #[test]
    fn test_section_name_repeated_under_prefixed_header_is_a_total() {
        let grid = CellGrid::from_text_rows(vec![
            vec!["Less Cost of Sales", ""],
            vec!["Purchases", "40"],
            vec!["Cost of Sales", "40"],
        ]);

        let extracted =
            extractor().extract(&grid, &span(Section::CostOfSales, "Less Cost of Sales", 3));
        assert_eq!(extracted.accounts.len(), 1);
        assert_eq!(extracted.accounts[0].name, "Purchases");
        assert_eq!(extracted.explicit_total.unwrap().value, 40.0);
    }

    #[test]
    fn test_account_named_after_a_header_phrase_stays_an_account() {
        let grid = CellGrid::from_text_rows(vec![
            vec!["Income", ""],
            vec!["Sales", "100"],
            vec!["Total Income", "100"],
        ]);

        let extracted = extractor().extract(&grid, &span(Section::TradingIncome, "Income", 3));
        assert_eq!(extracted.accounts.len(), 1);
        assert_eq!(extracted.accounts[0].name, "Sales");
        assert_eq!(extracted.explicit_total.unwrap().row, 2);
    }

    #[test]
    fn test_fractional_code_cell_is_kept() {
        let grid = CellGrid::from_text_rows(vec![
            vec!["Operating Expenses", "", ""],
            vec!["6100.10", "Office Rent", "250"],
        ]);

        let extracted =
            extractor().extract(&grid, &span(Section::OperatingExpenses, "Operating Expenses", 2));
        assert_eq!(extracted.accounts[0].code.as_deref(), Some("6100.1"));
        assert_eq!(extracted.accounts[0].name, "Office Rent");
    }
}
