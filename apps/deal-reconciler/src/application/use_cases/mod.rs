//! Application Use Cases
//!
//! Use cases orchestrate domain logic to fulfill application requirements.

mod deal_history;
mod manage_mapping;
mod reconcile;

pub use deal_history::{DealHistoryUseCase, HistoryError};
pub use manage_mapping::{ManageMappingError, ManageMappingUseCase};
pub use reconcile::{ReconcileError, ReconcileUseCase};
