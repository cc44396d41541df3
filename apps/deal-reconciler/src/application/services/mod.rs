//! Application Services
//!
//! Long-running services that sit between the live feed port and callers.

pub mod retry;
pub mod stream_client;
pub mod stream_registry;

pub use retry::{RetryConfig, RetryPolicy};
pub use stream_client::{
    DEFAULT_EVENT_CAPACITY, StreamClient, StreamClientConfig, StreamEvent, StreamState,
};
pub use stream_registry::StreamRegistry;
