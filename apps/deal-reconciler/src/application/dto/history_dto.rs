//! Deal History and Mapping DTOs

use serde::{Deserialize, Serialize};

use crate::application::ports::DealQuery;
use crate::domain::aggregation::{Group, Totals};
use crate::domain::deal::{DealField, DealRecord, DealSource};
use crate::domain::view::{Page, ViewError, ViewRequest, to_csv};

/// Input of a deal history lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    /// Account to read.
    pub account_id: String,
    /// Deal query.
    pub query: DealQuery,
    /// Fields the summary groups by.
    pub group_by: Vec<DealField>,
    /// Summary row whose deals fill the detail table, by key label. `None`
    /// or a label with no deals selects the first row.
    pub selected: Option<String>,
    /// Filter, sort and page applied to the detail table.
    pub view: ViewRequest,
}

impl HistoryRequest {
    /// Per-symbol summary with an unfiltered first page.
    #[must_use]
    pub fn by_symbol(account_id: impl Into<String>, query: DealQuery) -> Self {
        Self {
            account_id: account_id.into(),
            query,
            group_by: vec![DealField::Symbol],
            selected: None,
            view: ViewRequest::default(),
        }
    }

    /// Show the detail table of `label`.
    #[must_use]
    pub fn select(mut self, label: impl Into<String>) -> Self {
        self.selected = Some(label.into());
        self
    }
}

/// Output of a deal history lookup.
#[derive(Debug, Clone)]
pub struct HistoryPage {
    /// Feed the deals came from.
    pub source: DealSource,
    /// Groups over every fetched deal, in first-seen order.
    pub summary: Vec<Group>,
    /// Sum of every summary row.
    pub grand_totals: Totals,
    /// Key label of the row the detail table shows; `None` when there
    /// are no deals.
    pub selected: Option<String>,
    /// The requested page of the selected row's deals.
    pub deals: Page<DealRecord>,
}

impl HistoryPage {
    /// Export the current page as CSV.
    pub fn to_csv(&self, fields: &[&str]) -> Result<String, ViewError> {
        to_csv(&self.deals.items, fields)
    }

    /// File name offered for [`Self::to_csv`].
    #[must_use]
    pub fn csv_file_name(&self) -> String {
        format!("deals_{}.csv", self.selected.as_deref().unwrap_or("all"))
    }
}

/// Symbols offered when editing a mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolChoices {
    /// Manager-side symbols, sorted.
    pub manager: Vec<String>,
    /// Terminal-side symbols, sorted.
    pub terminal: Vec<String>,
}
