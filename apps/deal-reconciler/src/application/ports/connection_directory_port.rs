//! Connection Directory Port (Driven Port)
//!
//! Lists the manager and terminal accounts known to the platform bridge.
//! Connection lifecycle lives outside this crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::FetchError;

/// One connected (or known) account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Identifier used by every other port.
    pub identifier: String,
    /// Trade server address.
    pub server: String,
    /// Account login.
    pub login: u64,
    /// Whether the bridge currently holds a live connection.
    pub connected: bool,
}

/// Port for account discovery.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConnectionDirectoryPort: Send + Sync {
    /// Manager-side accounts.
    async fn list_manager_accounts(&self) -> Result<Vec<Account>, FetchError>;

    /// Terminal-side accounts.
    async fn list_terminal_accounts(&self) -> Result<Vec<Account>, FetchError>;
}
