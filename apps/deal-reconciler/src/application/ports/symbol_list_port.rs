//! Symbol List Port (Driven Port)

use async_trait::async_trait;

use super::FetchError;

/// Port for the instruments each side of an account pair can trade.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SymbolListPort: Send + Sync {
    /// Symbols known to a manager account.
    async fn list_manager_symbols(&self, account_id: &str) -> Result<Vec<String>, FetchError>;

    /// Symbols known to a terminal account.
    async fn list_terminal_symbols(&self, account_id: &str) -> Result<Vec<String>, FetchError>;
}
