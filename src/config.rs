//! Business-specific tables the engine is driven by: accepted section headers,
//! category rules and the reconciliation tolerance. The defaults suit exports
//! from common small-business accounting platforms; callers with a different
//! chart of accounts load their own tables from JSON.

use crate::error::{PnlError, Result};
use crate::schema::{Category, Section};
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Tolerance {
    #[schemars(description = "Smallest mismatch, in currency units, treated as material")]
    pub absolute: f64,

    #[schemars(description = "Mismatch as a fraction of the stated figure treated as material (0.005 = 0.5%)")]
    pub relative: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            absolute: 0.01,
            relative: 0.005,
        }
    }
}

impl Tolerance {
    pub fn allowed(&self, stated: f64) -> f64 {
        self.absolute.max(self.relative * stated.abs())
    }

    pub fn agrees(&self, stated: f64, computed: f64) -> bool {
        (stated - computed).abs() <= self.allowed(stated)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SectionHeaderRule {
    pub section: Section,
    pub phrases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "match", rename_all = "snake_case")]
pub enum CategoryMatcher {
    /// Any keyword phrase present as whole words in the account name.
    Keywords { keywords: Vec<String> },
    /// Numeric account code within an inclusive range.
    CodeRange { start: u64, end: u64 },
    /// Account code starting with the given characters.
    CodePrefix { prefix: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CategoryRule {
    pub category: Category,
    #[serde(flatten)]
    pub matcher: CategoryMatcher,
}

impl CategoryRule {
    pub fn keywords(category: Category, keywords: &[&str]) -> Self {
        Self {
            category,
            matcher: CategoryMatcher::Keywords {
                keywords: keywords.iter().map(|k| k.to_string()).collect(),
            },
        }
    }

    pub fn code_range(category: Category, start: u64, end: u64) -> Self {
        Self {
            category,
            matcher: CategoryMatcher::CodeRange { start, end },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ParserConfig {
    pub tolerance: Tolerance,

    #[schemars(description = "Accepted header phrases per canonical section, compared case-insensitively")]
    pub sections: Vec<SectionHeaderRule>,

    #[schemars(description = "Leading words ignored by the approximate header match (e.g. 'Less')")]
    pub ignored_header_prefixes: Vec<String>,

    #[schemars(description = "Leading words marking a total or subtotal row")]
    pub total_prefixes: Vec<String>,

    #[schemars(description = "Category rules in priority order; the first matching rule wins")]
    pub categories: Vec<CategoryRule>,

    #[schemars(description = "Report titles never mistaken for a company name")]
    pub report_titles: Vec<String>,

    pub metadata_scan_rows: usize,
    pub basis_scan_rows: usize,
    pub default_currency: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::default(),
            sections: default_section_rules(),
            ignored_header_prefixes: strings(&["less", "plus", "add"]),
            total_prefixes: strings(&["total", "subtotal", "sub total"]),
            categories: default_category_rules(),
            report_titles: strings(&[
                "profit and loss",
                "profit & loss",
                "profit and loss statement",
                "p&l",
                "income statement",
                "statement of financial performance",
                "statement of profit or loss",
            ]),
            metadata_scan_rows: 10,
            basis_scan_rows: 15,
            default_currency: "USD".to_string(),
        }
    }
}

impl ParserConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ParserConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.tolerance.absolute.is_finite()
            || !self.tolerance.relative.is_finite()
            || self.tolerance.absolute < 0.0
            || self.tolerance.relative < 0.0
        {
            return Err(PnlError::InvalidConfig(format!(
                "tolerance must be finite and non-negative, got {:?}",
                self.tolerance
            )));
        }

        if self.sections.iter().all(|r| r.phrases.is_empty()) {
            return Err(PnlError::InvalidConfig(
                "at least one section header phrase is required".to_string(),
            ));
        }

        for rule in &self.sections {
            if rule.phrases.iter().any(|p| p.trim().is_empty()) {
                return Err(PnlError::InvalidConfig(format!(
                    "empty header phrase for {}",
                    rule.section
                )));
            }
        }

        for (idx, rule) in self.categories.iter().enumerate() {
            match &rule.matcher {
                CategoryMatcher::Keywords { keywords } => {
                    if keywords.is_empty() || keywords.iter().any(|k| k.trim().is_empty()) {
                        return Err(PnlError::InvalidConfig(format!(
                            "category rule #{} ({}) has an empty keyword list or keyword",
                            idx, rule.category
                        )));
                    }
                }
                CategoryMatcher::CodeRange { start, end } => {
                    if start > end {
                        return Err(PnlError::InvalidConfig(format!(
                            "category rule #{} ({}) has range {}..={} with start after end",
                            idx, rule.category, start, end
                        )));
                    }
                }
                CategoryMatcher::CodePrefix { prefix } => {
                    if prefix.trim().is_empty() {
                        return Err(PnlError::InvalidConfig(format!(
                            "category rule #{} ({}) has an empty code prefix",
                            idx, rule.category
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    pub fn phrases_for(&self, section: Section) -> impl Iterator<Item = &String> {
        self.sections
            .iter()
            .filter(move |r| r.section == section)
            .flat_map(|r| r.phrases.iter())
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&schemars::schema_for!(ParserConfig))
    }
}

/// Per-call overrides. A non-empty override always beats what the title
/// block detection finds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParseOptions {
    pub company_name: Option<String>,
    pub period: Option<String>,
    /// Label stored as `metadata.source`. Defaults to the file name.
    pub source: Option<String>,
    /// Defaults to the local date at parse time.
    pub upload_date: Option<NaiveDate>,
    pub currency: Option<String>,
}

impl ParseOptions {
    pub fn with_company_name(mut self, company_name: impl Into<String>) -> Self {
        self.company_name = Some(company_name.into());
        self
    }

    pub fn with_period(mut self, period: impl Into<String>) -> Self {
        self.period = Some(period.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_upload_date(mut self, upload_date: NaiveDate) -> Self {
        self.upload_date = Some(upload_date);
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_section_rules() -> Vec<SectionHeaderRule> {
    vec![
        SectionHeaderRule {
            section: Section::TradingIncome,
            phrases: strings(&[
                "Trading Income",
                "Income",
                "Revenue",
                "Sales",
                "Operating Revenue",
                "Turnover",
            ]),
        },
        SectionHeaderRule {
            section: Section::CostOfSales,
            phrases: strings(&[
                "Cost of Sales",
                "Less Cost of Sales",
                "Cost of Goods Sold",
                "COGS",
                "Direct Costs",
                "Cost of Revenue",
            ]),
        },
        SectionHeaderRule {
            section: Section::GrossProfit,
            phrases: strings(&[
                "Gross Profit",
                "Gross Profit (Loss)",
                "Gross Income",
                "Gross Margin",
            ]),
        },
        SectionHeaderRule {
            section: Section::OperatingExpenses,
            phrases: strings(&[
                "Operating Expenses",
                "Less Operating Expenses",
                "Expenses",
                "Overheads",
                "Operating Costs",
                "Indirect Costs",
                "Administrative Expenses",
            ]),
        },
        SectionHeaderRule {
            section: Section::NetProfit,
            phrases: strings(&[
                "Net Profit",
                "Net Profit (Loss)",
                "Net Loss",
                "Net Income",
                "Profit for the Period",
                "Net Earnings",
                "Net Operating Profit",
            ]),
        },
    ]
}

/// Priority order matters where keywords overlap: commission is checked
/// before sales, interest income before interest, and every keyword rule
/// before the code ranges.
fn default_category_rules() -> Vec<CategoryRule> {
    use Category::*;

    vec![
        CategoryRule::keywords(
            Marketing,
            &["commission", "advertising", "marketing", "promotion", "sponsorship"],
        ),
        CategoryRule::keywords(
            Payroll,
            &[
                "salary",
                "salaries",
                "wage",
                "payroll",
                "superannuation",
                "pension",
                "kiwisaver",
                "staff",
                "employee",
                "bonus",
                "benefit",
            ],
        ),
        CategoryRule::keywords(
            Administrative,
            &[
                "bank",
                "office",
                "stationery",
                "postage",
                "printing",
                "subscription",
                "software",
                "telephone",
                "phone",
                "internet",
                "general",
                "admin",
                "administration",
                "dues",
            ],
        ),
        CategoryRule::keywords(Occupancy, &["rent", "lease", "premises", "rates", "cleaning"]),
        CategoryRule::keywords(
            Utilities,
            &["electricity", "power", "water", "gas", "utility", "utilities", "light"],
        ),
        CategoryRule::keywords(
            Travel,
            &[
                "travel",
                "accommodation",
                "airfare",
                "meal",
                "entertainment",
                "mileage",
                "motor vehicle",
                "vehicle",
                "fuel",
            ],
        ),
        CategoryRule::keywords(Insurance, &["insurance"]),
        CategoryRule::keywords(Depreciation, &["depreciation", "amortisation", "amortization"]),
        CategoryRule::keywords(
            ProfessionalServices,
            &[
                "consulting",
                "consultancy",
                "legal",
                "accounting",
                "accountancy",
                "audit",
                "professional",
            ],
        ),
        CategoryRule::keywords(
            DirectCosts,
            &[
                "purchases",
                "cost of goods",
                "materials",
                "freight",
                "shipping",
                "inventory",
                "stock",
                "subcontractor",
                "direct",
            ],
        ),
        CategoryRule::keywords(
            OtherIncome,
            &[
                "interest income",
                "interest received",
                "dividend",
                "grant",
                "other income",
                "rebate",
            ],
        ),
        CategoryRule::keywords(Finance, &["interest", "loan", "finance charge"]),
        CategoryRule::keywords(Sales, &["sales", "revenue", "turnover"]),
        CategoryRule::keywords(Other, &["other", "miscellaneous", "sundry"]),
        CategoryRule::code_range(Sales, 4000, 4999),
        CategoryRule::code_range(DirectCosts, 5000, 5999),
    ]
}
