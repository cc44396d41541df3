// Allow unwrap/expect in tests - tests should panic on unexpected errors
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_collect,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Deal Reconciler - Rust Core Library
//!
//! Compares the deals a trade server's manager interface reports with the
//! deals a trading terminal reports for the same activity, per instrument,
//! through a user maintained symbol mapping.
//!
//! # Architecture (Hexagonal)
//!
//! ## Layers (inside → outside)
//!
//! - **Domain**: Pure logic over deal records
//!   - `deal`: Canonical record, payload normalizer, live window
//!   - `aggregation`: Multi-key grouping with totals
//!   - `mapping`: Many-to-many symbol mapper
//!   - `reconciliation`: Per-symbol manager vs terminal comparison
//!   - `view`: Filter, multi-key sort, pagination, CSV export
//!
//! - **Application**: Use cases and orchestration
//!   - `ports`: Interfaces for deal sources, live feeds, the mapping store
//!   - `use_cases`: `DealHistory`, `Reconcile`, `ManageMapping`
//!   - `services`: Live stream client with bounded reconnects
//!
//! - **Infrastructure**: Adapters
//!   - `http`: REST adapters for the platform bridge
//!   - `websocket`: Live deal feed
//!   - `config`, `telemetry`, `metrics`

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Clean Architecture Layers
// =============================================================================

/// Domain layer - Core logic with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain re-exports
pub use domain::aggregation::{Group, Totals, group};
pub use domain::deal::{DealAction, DealField, DealRecord, DealSource, StreamWindow};
pub use domain::mapping::{AccountPair, SymbolMapper, SymbolPair};
pub use domain::reconciliation::{ReconciliationRow, reconcile};
pub use domain::view::{SortChain, SortKey, ViewRequest};

// Application re-exports
pub use application::dto::{HistoryRequest, ReconcileRequest, ReconciliationReport};
pub use application::ports::{DateRange, DealQuery, FetchError};
pub use application::services::{StreamClient, StreamRegistry, StreamState};
pub use application::use_cases::{DealHistoryUseCase, ManageMappingUseCase, ReconcileUseCase};

// Infrastructure re-exports
pub use infrastructure::config::{Config, load_config};
pub use infrastructure::http::{
    ApiClient, DirectoryApi, HttpMappingStore, ManagerDealsApi, TerminalDealsApi,
};
pub use infrastructure::websocket::WsDealFeed;
