//! Domain Layer
//!
//! Pure, synchronous business logic with no infrastructure dependencies.
//! Every operation here is a function of its inputs; nothing holds a lock
//! or performs I/O.
//!
//! # Bounded Contexts
//!
//! - [`deal`]: Canonical deal records, payload normalization, the live window
//! - [`fields`]: Field registry that drives generic filter/sort/CSV logic
//! - [`aggregation`]: Multi-key grouping with running totals
//! - [`mapping`]: Manager/terminal symbol cross-reference
//! - [`reconciliation`]: Per-symbol comparison of the two deal populations
//! - [`view`]: Filtering, multi-field sorting, pagination and CSV export

pub mod aggregation;
pub mod deal;
pub mod fields;
pub mod mapping;
pub mod reconciliation;
pub mod view;
