//! Infrastructure Layer
//!
//! Adapters for the ports defined in the application layer, plus the
//! process-wide concerns the binary wires up at startup.
//!
//! - **Driven Adapters (Outbound)**
//!   - `http/`: REST adapters for deals, accounts, symbols and mappings
//!   - `websocket/`: Live deal feed
//!
//! - **Cross-cutting**
//!   - `config/`: YAML configuration
//!   - `telemetry/`: Tracing subscriber and OTLP export
//!   - `metrics/`: Prometheus metrics

pub mod config;
pub mod http;
pub mod metrics;
pub mod telemetry;
pub mod websocket;

pub use http::{ApiClient, DirectoryApi, HttpMappingStore, ManagerDealsApi, TerminalDealsApi};
pub use websocket::WsDealFeed;
