//! Live Deal Feed Port (Driven Port)
//!
//! A subscription to one account's deal feed. Each item is one raw text
//! message; the stream ending means the connection closed.

use async_trait::async_trait;
use futures::stream::BoxStream;

/// Live feed error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    /// The connection could not be opened or dropped mid-stream.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// The remote side closed the subscription.
    #[error("feed closed by remote")]
    Closed,
}

/// Raw messages from an open subscription.
pub type RawMessageStream = BoxStream<'static, Result<String, FeedError>>;

/// Port for live deal subscriptions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LiveDealFeedPort: Send + Sync {
    /// Open a subscription for `account_id`. Resolves once the connection is
    /// open; the returned stream yields messages until it closes.
    async fn subscribe(&self, account_id: &str) -> Result<RawMessageStream, FeedError>;
}
