//! Maps account lines onto the closed category taxonomy.
//!
//! Rules are evaluated strictly in the configured order and the first match
//! wins, so overlapping keywords ("Sales Commission") resolve the same way
//! every time. A name matches a keyword only on whole words, after the same
//! normalization used for headers.

use crate::config::{CategoryMatcher, CategoryRule, ParserConfig};
use crate::schema::{AccountLine, Category, FinancialReport, Section};
use crate::utils::{contains_phrase, label_tokens};
use log::debug;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
enum CompiledMatcher {
    Keywords(Vec<Vec<String>>),
    CodeRange { start: u64, end: u64 },
    CodePrefix(String),
}

#[derive(Debug, Clone)]
pub struct CategoryClassifier {
    rules: Vec<(Category, CompiledMatcher)>,
}

impl CategoryClassifier {
    pub fn new(rules: &[CategoryRule]) -> Self {
        let rules = rules
            .iter()
            .map(|rule| {
                let matcher = match &rule.matcher {
                    CategoryMatcher::Keywords { keywords } => CompiledMatcher::Keywords(
                        keywords
                            .iter()
                            .map(|k| label_tokens(k))
                            .filter(|t| !t.is_empty())
                            .collect(),
                    ),
                    CategoryMatcher::CodeRange { start, end } => CompiledMatcher::CodeRange {
                        start: *start,
                        end: *end,
                    },
                    CategoryMatcher::CodePrefix { prefix } => {
                        CompiledMatcher::CodePrefix(prefix.trim().to_string())
                    }
                };
                (rule.category, matcher)
            })
            .collect();

        Self { rules }
    }

    pub fn from_config(config: &ParserConfig) -> Self {
        Self::new(&config.categories)
    }

    /// Category for a name and optional code, or `None` when no rule applies.
    pub fn classify(&self, name: &str, code: Option<&str>) -> Option<Category> {
        let tokens = label_tokens(name);
        let code = code.map(str::trim).filter(|c| !c.is_empty());

        let hit = self
            .rules
            .iter()
            .find(|(_, matcher)| match matcher {
                CompiledMatcher::Keywords(keywords) => {
                    keywords.iter().any(|k| contains_phrase(&tokens, k))
                }
                CompiledMatcher::CodeRange { start, end } => code
                    .and_then(numeric_code)
                    .is_some_and(|n| (*start..=*end).contains(&n)),
                CompiledMatcher::CodePrefix(prefix) => {
                    code.is_some_and(|c| c.starts_with(prefix.as_str()))
                }
            })
            .map(|(category, _)| *category);

        debug!("Classified '{}' ({:?}) as {:?}", name, code, hit);
        hit
    }

    pub fn classify_account(&self, account: &AccountLine) -> Option<Category> {
        self.classify(&account.name, account.code.as_deref())
    }

    pub fn apply(&self, accounts: &mut [AccountLine]) {
        for account in accounts.iter_mut() {
            account.category = self.classify_account(account);
        }
    }
}

/// Leading digits of an account code ("4000", "4000.10" and "4000-A" all give 4000).
fn numeric_code(code: &str) -> Option<u64> {
    let digits: String = code.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

pub const UNCATEGORIZED: &str = "Uncategorized";

/// Sums account values by category label, optionally within one section.
/// Accounts without a category are grouped under [`UNCATEGORIZED`].
pub fn category_totals(
    report: &FinancialReport,
    section: Option<Section>,
) -> BTreeMap<String, f64> {
    let mut totals = BTreeMap::new();
    for (s, result) in report.sections.iter() {
        if section.is_some_and(|wanted| wanted != s) {
            continue;
        }
        for account in &result.accounts {
            let label = account
                .category
                .map(|c| c.label().to_string())
                .unwrap_or_else(|| UNCATEGORIZED.to_string());
            *totals.entry(label).or_insert(0.0) += account.value;
        }
    }
    totals
}
