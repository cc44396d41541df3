//! Data Transfer Objects (DTOs)
//!
//! DTOs are used for use case inputs and outputs.

mod history_dto;
mod reconciliation_dto;

pub use history_dto::{HistoryPage, HistoryRequest, SymbolChoices};
pub use reconciliation_dto::{ReconcileRequest, ReconciliationReport};
