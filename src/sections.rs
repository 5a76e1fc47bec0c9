//! Locates the canonical P&L sections in a cell grid.
//!
//! Trading Income, Cost of Sales and Operating Expenses are spans of account
//! rows introduced by a header row. Gross Profit and Net Profit are single
//! labelled rows carrying one amount. Every header or marker row closes the
//! span above it, so spans never overlap regardless of the order in which
//! sections appear.

use crate::config::ParserConfig;
use crate::error::{PnlError, Result};
use crate::grid::{CellGrid, CellValue};
use crate::schema::{Section, ValidationWarning};
use crate::utils::{exact_key, fuzzy_key};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectionConfidence {
    /// Header text equals an accepted phrase, ignoring case.
    Exact,
    /// Header text only matched after punctuation, plurals and filler words
    /// were normalized away.
    Fuzzy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionSpan {
    pub section: Section,
    pub header_row: usize,
    /// First row after the header.
    pub start: usize,
    /// Exclusive.
    pub end: usize,
    pub header_text: String,
    pub confidence: DetectionConfidence,
}

impl SectionSpan {
    pub fn rows(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }

    pub fn contains(&self, row: usize) -> bool {
        self.rows().contains(&row)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitMarker {
    pub section: Section,
    pub row: usize,
    pub value: Option<f64>,
    pub confidence: DetectionConfidence,
}

/// Everything the detector found, in row order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionLayout {
    pub spans: Vec<SectionSpan>,
    pub markers: Vec<ProfitMarker>,
    pub warnings: Vec<ValidationWarning>,
}

impl SectionLayout {
    pub fn span(&self, section: Section) -> Option<&SectionSpan> {
        self.spans.iter().find(|s| s.section == section)
    }

    pub fn marker(&self, section: Section) -> Option<&ProfitMarker> {
        self.markers.iter().find(|m| m.section == section)
    }

    pub fn marker_value(&self, section: Section) -> Option<f64> {
        self.marker(section).and_then(|m| m.value)
    }

    /// Row index of the first header or marker, if any.
    pub fn first_boundary(&self) -> Option<usize> {
        let first_span = self.spans.iter().map(|s| s.header_row).min();
        let first_marker = self.markers.iter().map(|m| m.row).min();
        match (first_span, first_marker) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

#[derive(Debug, Clone)]
struct HeaderPhrase {
    section: Section,
    exact: String,
    fuzzy: String,
}

#[derive(Debug, Clone, PartialEq)]
struct HeaderHit {
    section: Section,
    row: usize,
    text: String,
    confidence: DetectionConfidence,
    value: Option<f64>,
}

/// Ordered header rule table compiled from [`ParserConfig::sections`].
#[derive(Debug, Clone)]
pub struct SectionDetector {
    phrases: Vec<HeaderPhrase>,
    ignored_prefixes: Vec<String>,
}

impl SectionDetector {
    pub fn new(config: &ParserConfig) -> Self {
        let ignored_prefixes = config.ignored_header_prefixes.clone();
        let phrases = config
            .sections
            .iter()
            .flat_map(|rule| {
                let ignored = &ignored_prefixes;
                rule.phrases.iter().map(move |p| HeaderPhrase {
                    section: rule.section,
                    exact: exact_key(p),
                    fuzzy: fuzzy_key(p, ignored),
                })
            })
            .collect();

        Self {
            phrases,
            ignored_prefixes,
        }
    }

    /// Which section, if any, a label names. Exact phrases are tried for
    /// every section before any approximate comparison is made.
    pub fn match_label(&self, label: &str) -> Option<(Section, DetectionConfidence)> {
        let exact = exact_key(label);
        if exact.is_empty() {
            return None;
        }
        if let Some(p) = self.phrases.iter().find(|p| p.exact == exact) {
            return Some((p.section, DetectionConfidence::Exact));
        }

        let fuzzy = fuzzy_key(label, &self.ignored_prefixes);
        if fuzzy.is_empty() {
            return None;
        }
        self.phrases
            .iter()
            .find(|p| p.fuzzy == fuzzy)
            .map(|p| (p.section, DetectionConfidence::Fuzzy))
    }

    /// True when the label names `section` exactly or approximately.
    pub fn names_section(&self, label: &str, section: Section) -> bool {
        let exact = exact_key(label);
        let fuzzy = fuzzy_key(label, &self.ignored_prefixes);
        self.phrases
            .iter()
            .filter(|p| p.section == section)
            .any(|p| p.exact == exact || p.fuzzy == fuzzy)
    }

    fn classify_row(&self, row: usize, cells: &[CellValue]) -> Option<HeaderHit> {
        let text = leading_text(cells)?;
        let (section, confidence) = self.match_label(text)?;
        let value = last_number(cells);

        // An account called "Sales" carries an amount; a section header does not.
        if !section.is_marker() && value.is_some() {
            debug!(
                "Row {} '{}' names {} but carries an amount; not a header",
                row, text, section
            );
            return None;
        }

        Some(HeaderHit {
            section,
            row,
            text: text.to_string(),
            confidence,
            value,
        })
    }

    pub fn detect(&self, grid: &CellGrid) -> Result<SectionLayout> {
        let hits = drop_group_headings(
            grid.rows()
                .iter()
                .enumerate()
                .filter_map(|(idx, cells)| self.classify_row(idx, cells))
                .collect(),
        );

        if hits.is_empty() {
            return Err(PnlError::MalformedReport(
                "no recognizable section headers found".to_string(),
            ));
        }

        let mut warnings = Vec::new();
        let boundaries: Vec<usize> = hits.iter().map(|h| h.row).collect();

        // Last occurrence of each section wins.
        let mut chosen: BTreeMap<Section, &HeaderHit> = BTreeMap::new();
        for hit in &hits {
            if hit.confidence == DetectionConfidence::Fuzzy {
                warnings.push(ValidationWarning::FuzzyHeaderMatch {
                    section: hit.section,
                    row: hit.row,
                    text: hit.text.clone(),
                });
            }
            if let Some(previous) = chosen.insert(hit.section, hit) {
                warnings.push(ValidationWarning::DuplicateSectionHeader {
                    section: hit.section,
                    discarded: previous.row,
                    kept: hit.row,
                });
            }
        }

        let mut spans = Vec::new();
        let mut markers = Vec::new();
        for hit in chosen.values() {
            if hit.section.is_marker() {
                if hit.value.is_none() {
                    warnings.push(ValidationWarning::MarkerWithoutValue {
                        section: hit.section,
                        row: hit.row,
                    });
                }
                markers.push(ProfitMarker {
                    section: hit.section,
                    row: hit.row,
                    value: hit.value,
                    confidence: hit.confidence,
                });
            } else {
                let end = boundaries
                    .iter()
                    .copied()
                    .find(|&b| b > hit.row)
                    .unwrap_or_else(|| grid.row_count());
                spans.push(SectionSpan {
                    section: hit.section,
                    header_row: hit.row,
                    start: hit.row + 1,
                    end,
                    header_text: hit.text.clone(),
                    confidence: hit.confidence,
                });
            }
        }
        spans.sort_by_key(|s| s.start);
        markers.sort_by_key(|m| m.row);

        let has = |section: Section| chosen.contains_key(&section);
        let gross_profit_value = markers
            .iter()
            .any(|m| m.section == Section::GrossProfit && m.value.is_some());
        if !has(Section::TradingIncome) && !has(Section::CostOfSales) && !gross_profit_value {
            return Err(PnlError::MalformedReport(
                "neither Trading Income, Cost of Sales nor a Gross Profit figure was found"
                    .to_string(),
            ));
        }

        for section in [
            Section::TradingIncome,
            Section::CostOfSales,
            Section::OperatingExpenses,
        ] {
            if !has(section) {
                warnings.push(ValidationWarning::MissingSection { section });
            }
        }

        let first_boundary = boundaries.first().copied().unwrap_or(0);
        for (idx, cells) in grid.rows().iter().enumerate().skip(first_boundary) {
            if boundaries.contains(&idx) || spans.iter().any(|s| s.contains(idx)) {
                continue;
            }
            if let (Some(text), Some(_)) = (leading_text(cells), last_number(cells)) {
                warnings.push(ValidationWarning::UnassignedRow {
                    row: idx,
                    text: text.to_string(),
                });
            }
        }

        for warning in &warnings {
            warn!("{}", warning);
        }
        info!(
            "Detected {} section spans and {} profit markers",
            spans.len(),
            markers.len()
        );

        Ok(SectionLayout {
            spans,
            markers,
            warnings,
        })
    }
}

/// A header naming the section that is already open ("Sales" under
/// "Income") starts a group inside that section, not a new span.
fn drop_group_headings(hits: Vec<HeaderHit>) -> Vec<HeaderHit> {
    let mut kept: Vec<HeaderHit> = Vec::with_capacity(hits.len());
    for hit in hits {
        let open = kept.last().map(|h| h.section);
        if !hit.section.is_marker() && open == Some(hit.section) {
            debug!(
                "Row {} '{}' is a group heading inside {}",
                hit.row, hit.text, hit.section
            );
            continue;
        }
        kept.push(hit);
    }
    kept
}

/// First text cell of a row.
pub(crate) fn leading_text(cells: &[CellValue]) -> Option<&str> {
    cells.iter().find_map(|c| c.as_text()).filter(|t| !t.is_empty())
}

/// Trailing amount of a row; the last column is the current-period figure.
pub(crate) fn last_number(cells: &[CellValue]) -> Option<f64> {
    cells.iter().rev().find_map(|c| c.as_number())
}

pub fn detect_sections(grid: &CellGrid, config: &ParserConfig) -> Result<SectionLayout> {
    SectionDetector::new(config).detect(grid)
}
