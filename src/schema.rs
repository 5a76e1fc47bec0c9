use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub enum Section {
    #[schemars(description = "Revenue from the sale of goods or services")]
    TradingIncome,

    #[schemars(description = "Direct costs attributable to the goods or services sold")]
    CostOfSales,

    #[schemars(description = "Single-value marker: trading income less cost of sales")]
    GrossProfit,

    #[schemars(description = "Overheads such as wages, rent, marketing and administration")]
    OperatingExpenses,

    #[schemars(description = "Single-value marker: gross profit less operating expenses")]
    NetProfit,
}

impl Section {
    pub const ALL: [Section; 5] = [
        Section::TradingIncome,
        Section::CostOfSales,
        Section::GrossProfit,
        Section::OperatingExpenses,
        Section::NetProfit,
    ];

    /// Gross Profit and Net Profit are labelled single-value rows rather than
    /// spans of accounts.
    pub fn is_marker(self) -> bool {
        matches!(self, Section::GrossProfit | Section::NetProfit)
    }

    pub fn key(self) -> &'static str {
        match self {
            Section::TradingIncome => "tradingIncome",
            Section::CostOfSales => "costOfSales",
            Section::GrossProfit => "grossProfit",
            Section::OperatingExpenses => "operatingExpenses",
            Section::NetProfit => "netProfit",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Section::TradingIncome => "Trading Income",
            Section::CostOfSales => "Cost of Sales",
            Section::GrossProfit => "Gross Profit",
            Section::OperatingExpenses => "Operating Expenses",
            Section::NetProfit => "Net Profit",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Closed account taxonomy. Which keywords and code ranges lead to each
/// category is configuration; the set of categories is not.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "PascalCase")]
pub enum Category {
    Sales,
    OtherIncome,
    DirectCosts,
    Payroll,
    Marketing,
    Administrative,
    Occupancy,
    Utilities,
    ProfessionalServices,
    Travel,
    Insurance,
    Depreciation,
    Finance,
    Other,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::Sales => "Sales",
            Category::OtherIncome => "Other Income",
            Category::DirectCosts => "Direct Costs",
            Category::Payroll => "Payroll",
            Category::Marketing => "Marketing",
            Category::Administrative => "Administrative",
            Category::Occupancy => "Occupancy",
            Category::Utilities => "Utilities",
            Category::ProfessionalServices => "Professional Services",
            Category::Travel => "Travel",
            Category::Insurance => "Insurance",
            Category::Depreciation => "Depreciation",
            Category::Finance => "Finance",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AccountLine {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Account number when the export includes one (e.g. '4000')")]
    pub code: Option<String>,

    #[schemars(description = "Account name as it appears in the report")]
    pub name: String,

    #[schemars(description = "Amount from the trailing value column. May be negative for contra accounts.")]
    pub value: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
}

impl AccountLine {
    pub fn new(code: Option<String>, name: impl Into<String>, value: f64) -> Self {
        Self {
            code,
            name: name.into(),
            value,
            category: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum TotalSource {
    #[schemars(description = "Taken from a labelled total row that agrees with the accounts")]
    Explicit,

    #[schemars(description = "Summed from the extracted accounts because no total row was present")]
    Computed,

    #[schemars(description = "Taken from a labelled total row that disagrees with the accounts beyond tolerance")]
    Inconsistent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SectionResult {
    pub accounts: Vec<AccountLine>,
    pub total: f64,
    pub total_source: TotalSource,
}

impl SectionResult {
    pub fn accounts_sum(&self) -> f64 {
        self.accounts.iter().map(|a| a.value).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum BasisType {
    #[default]
    Accrual,
    Cash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum ReportType {
    #[schemars(description = "Both Trading Income and Cost of Sales sections are present")]
    Complete,

    #[schemars(description = "Revenue or cost detail is missing; the report may start at Gross Profit")]
    Partial,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Sections {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trading_income: Option<SectionResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_of_sales: Option<SectionResult>,

    pub gross_profit: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operating_expenses: Option<SectionResult>,

    pub net_profit: f64,
}

impl Sections {
    pub fn get(&self, section: Section) -> Option<&SectionResult> {
        match section {
            Section::TradingIncome => self.trading_income.as_ref(),
            Section::CostOfSales => self.cost_of_sales.as_ref(),
            Section::OperatingExpenses => self.operating_expenses.as_ref(),
            Section::GrossProfit | Section::NetProfit => None,
        }
    }

    /// Account-bearing sections in statement order.
    pub fn iter(&self) -> impl Iterator<Item = (Section, &SectionResult)> {
        [
            (Section::TradingIncome, self.trading_income.as_ref()),
            (Section::CostOfSales, self.cost_of_sales.as_ref()),
            (Section::OperatingExpenses, self.operating_expenses.as_ref()),
        ]
        .into_iter()
        .filter_map(|(section, result)| result.map(|r| (section, r)))
    }
}

/// How the headline profit figures were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfitSources {
    pub gross_profit: TotalSource,
    pub net_profit: TotalSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    pub upload_date: NaiveDate,

    #[schemars(description = "File name or caller supplied label of the parsed spreadsheet")]
    pub source: String,

    pub currency: String,
}

/// Non-fatal finding attached to a finalized report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ValidationWarning {
    InconsistentTotal {
        section: Section,
        stated: f64,
        computed: f64,
    },
    DuplicateSectionHeader {
        section: Section,
        discarded: usize,
        kept: usize,
    },
    FuzzyHeaderMatch {
        section: Section,
        row: usize,
        text: String,
    },
    MarkerWithoutValue {
        section: Section,
        row: usize,
    },
    MissingSection {
        section: Section,
    },
    UnassignedRow {
        row: usize,
        text: String,
    },
    MergedDuplicateAccount {
        section: Section,
        code: Option<String>,
        name: String,
        occurrences: usize,
    },
    BasisTypeUndetected,
    ReportTypeAmbiguity {
        detail: String,
    },
    ProfitMismatch {
        line: Section,
        stated: f64,
        computed: f64,
    },
    ProfitDerived {
        line: Section,
        detail: String,
    },
    GridStructure {
        detail: String,
    },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationWarning::InconsistentTotal {
                section,
                stated,
                computed,
            } => write!(
                f,
                "{} total row states {:.2} but its accounts sum to {:.2}",
                section, stated, computed
            ),
            ValidationWarning::DuplicateSectionHeader {
                section,
                discarded,
                kept,
            } => write!(
                f,
                "{} header appears more than once; row {} kept, row {} ignored",
                section,
                kept + 1,
                discarded + 1
            ),
            ValidationWarning::FuzzyHeaderMatch { section, row, text } => write!(
                f,
                "row {} ('{}') treated as the {} header by approximate match",
                row + 1,
                text,
                section
            ),
            ValidationWarning::MarkerWithoutValue { section, row } => {
                write!(f, "{} row {} carries no amount", section, row + 1)
            }
            ValidationWarning::MissingSection { section } => {
                write!(f, "{} section not found", section)
            }
            ValidationWarning::UnassignedRow { row, text } => write!(
                f,
                "row {} ('{}') carries an amount but lies outside every section",
                row + 1,
                text
            ),
            ValidationWarning::MergedDuplicateAccount {
                section,
                code,
                name,
                occurrences,
            } => match code {
                Some(code) => write!(
                    f,
                    "{} account {} '{}' appeared {} times; values summed",
                    section, code, name, occurrences
                ),
                None => write!(
                    f,
                    "{} account '{}' appeared {} times; values summed",
                    section, name, occurrences
                ),
            },
            ValidationWarning::BasisTypeUndetected => {
                f.write_str("accounting basis not stated; assuming Accrual")
            }
            ValidationWarning::ReportTypeAmbiguity { detail } => f.write_str(detail),
            ValidationWarning::ProfitMismatch {
                line,
                stated,
                computed,
            } => write!(
                f,
                "{} row states {:.2} but the sections give {:.2}",
                line, stated, computed
            ),
            ValidationWarning::ProfitDerived { line, detail } => {
                write!(f, "{}: {}", line, detail)
            }
            ValidationWarning::GridStructure { detail } => f.write_str(detail),
        }
    }
}

/// Canonical output of one parse. Built once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinancialReport {
    pub company_name: String,
    pub period: String,
    pub basis_type: BasisType,
    pub report_type: ReportType,
    pub sections: Sections,
    pub profit_sources: ProfitSources,
    pub metadata: ReportMetadata,

    #[serde(default)]
    #[schemars(description = "Non-fatal findings. Consumers must display these alongside the figures.")]
    pub warnings: Vec<ValidationWarning>,
}

impl FinancialReport {
    pub fn gross_profit(&self) -> f64 {
        self.sections.gross_profit
    }

    pub fn net_profit(&self) -> f64 {
        self.sections.net_profit
    }

    pub fn section(&self, section: Section) -> Option<&SectionResult> {
        self.sections.get(section)
    }

    /// True when any section total or profit line was flagged inconsistent.
    pub fn has_inconsistencies(&self) -> bool {
        self.sections
            .iter()
            .any(|(_, s)| s.total_source == TotalSource::Inconsistent)
            || self.profit_sources.gross_profit == TotalSource::Inconsistent
            || self.profit_sources.net_profit == TotalSource::Inconsistent
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(FinancialReport)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> FinancialReport {
        FinancialReport {
            company_name: "Tasman Agri Pty Ltd".to_string(),
            period: "March 2024".to_string(),
            basis_type: BasisType::Accrual,
            report_type: ReportType::Partial,
            sections: Sections {
                trading_income: None,
                cost_of_sales: None,
                gross_profit: 8000.0,
                operating_expenses: Some(SectionResult {
                    accounts: vec![AccountLine {
                        code: None,
                        name: "Rent".to_string(),
                        value: 3000.0,
                        category: Some(Category::Occupancy),
                    }],
                    total: 3000.0,
                    total_source: TotalSource::Computed,
                }),
                net_profit: 5000.0,
            },
            profit_sources: ProfitSources {
                gross_profit: TotalSource::Explicit,
                net_profit: TotalSource::Computed,
            },
            metadata: ReportMetadata {
                upload_date: NaiveDate::from_ymd_opt(2024, 4, 2).unwrap(),
                source: "tasman.xlsx".to_string(),
                currency: "USD".to_string(),
            },
            warnings: vec![ValidationWarning::MissingSection {
                section: Section::TradingIncome,
            }],
        }
    }

    #[test]
    fn test_schema_generation() {
        let schema_json = FinancialReport::schema_as_json().unwrap();
        assert!(schema_json.contains("companyName"));
        assert!(schema_json.contains("basisType"));
        assert!(schema_json.contains("totalSource"));
    }

    #[test]
    fn test_serialization_uses_canonical_field_names() {
        let json = serde_json::to_string_pretty(&sample_report()).unwrap();

        assert!(json.contains("\"companyName\": \"Tasman Agri Pty Ltd\""));
        assert!(json.contains("\"basisType\": \"Accrual\""));
        assert!(json.contains("\"reportType\": \"Partial\""));
        assert!(json.contains("\"grossProfit\": 8000.0"));
        assert!(json.contains("\"uploadDate\": \"2024-04-02\""));
        assert!(json.contains("\"kind\": \"missingSection\""));
        assert!(!json.contains("tradingIncome\": {"));

        let deserialized: FinancialReport = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, sample_report());
    }

    #[test]
    fn test_sections_iterate_in_statement_order() {
        let report = sample_report();
        let order: Vec<Section> = report.sections.iter().map(|(s, _)| s).collect();
        assert_eq!(order, vec![Section::OperatingExpenses]);
        assert!(report.section(Section::GrossProfit).is_none());
    }

    #[test]
    fn test_warning_display_is_one_based() {
        let warning = ValidationWarning::DuplicateSectionHeader {
            section: Section::OperatingExpenses,
            discarded: 4,
            kept: 9,
        };
        assert_eq!(
            warning.to_string(),
            "Operating Expenses header appears more than once; row 10 kept, row 5 ignored"
        );
    }
}
