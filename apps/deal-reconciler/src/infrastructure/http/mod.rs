//! REST adapters for the trading platform bridge.

mod client;
mod deals;
mod directory;
mod mappings;

pub use client::{ApiClient, DEFAULT_REQUEST_TIMEOUT};
pub use deals::{ManagerDealsApi, TerminalDealsApi};
pub use directory::DirectoryApi;
pub use mappings::HttpMappingStore;
