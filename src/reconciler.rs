use crate::config::Tolerance;
use crate::schema::{AccountLine, Section, SectionResult, TotalSource, ValidationWarning};
use log::{debug, warn};

pub struct TotalReconciler {
    tolerance: Tolerance,
}

impl TotalReconciler {
    pub fn new(tolerance: Tolerance) -> Self {
        Self { tolerance }
    }

    /// Settles a section total. A stated total is kept when it agrees with
    /// the accounts; a disagreeing one is kept too but marked inconsistent,
    /// and the accounts are left as extracted.
    pub fn reconcile(
        &self,
        section: Section,
        accounts: Vec<AccountLine>,
        explicit_total: Option<f64>,
    ) -> (SectionResult, Option<ValidationWarning>) {
        let computed: f64 = accounts.iter().map(|a| a.value).sum();

        let Some(stated) = explicit_total else {
            debug!("{}: no total row, using account sum {}", section, computed);
            return (
                SectionResult {
                    accounts,
                    total: computed,
                    total_source: TotalSource::Computed,
                },
                None,
            );
        };

        if self.tolerance.agrees(stated, computed) {
            return (
                SectionResult {
                    accounts,
                    total: stated,
                    total_source: TotalSource::Explicit,
                },
                None,
            );
        }

        let difference = (stated - computed).abs();
        warn!(
            "{}: stated total {} differs from account sum {} by {} (allowed {})",
            section,
            stated,
            computed,
            difference,
            self.tolerance.allowed(stated)
        );
        (
            SectionResult {
                accounts,
                total: stated,
                total_source: TotalSource::Inconsistent,
            },
            Some(ValidationWarning::InconsistentTotal {
                section,
                stated,
                computed,
            }),
        )
    }

    /// Re-derives a computed total after the account list changed.
    pub fn refresh(&self, result: &mut SectionResult) {
        if result.total_source == TotalSource::Computed {
            result.total = result.accounts_sum();
        }
    }
}

pub fn reconcile_section(
    section: Section,
    accounts: Vec<AccountLine>,
    explicit_total: Option<f64>,
    tolerance: Tolerance,
) -> (SectionResult, Option<ValidationWarning>) {
    TotalReconciler::new(tolerance).reconcile(section, accounts, explicit_total)
}
