//! Application Ports (Driven)
//!
//! Interfaces for every external collaborator the core consumes:
//! historical deal sources, the live feed, symbol lists, the mapping store
//! and the connection directory.

mod connection_directory_port;
mod deal_source_port;
mod live_feed_port;
mod mapping_store_port;
mod symbol_list_port;

pub use connection_directory_port::{Account, ConnectionDirectoryPort};
pub use deal_source_port::{
    DatePreset, DateRange, DealFilterMode, DealQuery, DealSourcePort, FetchError,
};
pub use live_feed_port::{FeedError, LiveDealFeedPort, RawMessageStream};
pub use mapping_store_port::{InMemoryMappingStore, MappingStoreError, MappingStorePort};
pub use symbol_list_port::SymbolListPort;

#[cfg(test)]
pub use connection_directory_port::MockConnectionDirectoryPort;
#[cfg(test)]
pub use deal_source_port::MockDealSourcePort;
#[cfg(test)]
pub use live_feed_port::MockLiveDealFeedPort;
#[cfg(test)]
pub use mapping_store_port::MockMappingStorePort;
#[cfg(test)]
pub use symbol_list_port::MockSymbolListPort;
