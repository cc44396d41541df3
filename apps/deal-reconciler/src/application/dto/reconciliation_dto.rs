//! Reconciliation DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::ports::DateRange;
use crate::domain::deal::DealRecord;
use crate::domain::mapping::{AccountPair, SymbolMapper};
use crate::domain::reconciliation::{DrillDown, ReconciliationRow, ReportTotals, drill_down};
use crate::domain::view::{Page, ViewError, ViewRequest, to_csv};

/// Input of a reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileRequest {
    /// Manager and terminal accounts to compare.
    pub accounts: AccountPair,
    /// Time window both sides are fetched for.
    pub range: DateRange,
}

/// Output of a reconciliation run.
///
/// Keeps the fetched deals and the mapping snapshot it used so rows can be
/// drilled into without refetching.
#[derive(Debug, Clone)]
pub struct ReconciliationReport {
    /// Run identifier, also recorded on the run's tracing span.
    pub run_id: Uuid,
    /// Accounts compared.
    pub accounts: AccountPair,
    /// Time window.
    pub range: DateRange,
    /// One row per instrument, mapped rows first.
    pub rows: Vec<ReconciliationRow>,
    /// Sums across rows.
    pub totals: ReportTotals,
    /// False when the mapping store could not be read and every row is
    /// unmapped for that reason.
    pub mapping_available: bool,
    /// Manager deals, volumes in lots.
    pub manager_deals: Vec<DealRecord>,
    /// Terminal deals.
    pub terminal_deals: Vec<DealRecord>,
    /// Mapping snapshot used by the run.
    pub mapper: SymbolMapper,
}

impl ReconciliationReport {
    /// Deals behind the row keyed by `symbol`.
    #[must_use]
    pub fn drill_down(&self, symbol: &str) -> DrillDown {
        drill_down(&self.manager_deals, &self.terminal_deals, &self.mapper, symbol)
    }

    /// Filter, sort and paginate the rows.
    pub fn view(&self, request: &ViewRequest) -> Result<Page<ReconciliationRow>, ViewError> {
        request.apply(&self.rows)
    }

    /// Export rows as CSV.
    pub fn to_csv(&self, fields: &[&str]) -> Result<String, ViewError> {
        to_csv(&self.rows, fields)
    }
}
