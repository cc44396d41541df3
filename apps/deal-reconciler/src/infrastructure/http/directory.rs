//! Account directory and symbol list adapters.

use async_trait::async_trait;
use serde::Deserialize;

use super::ApiClient;
use crate::application::ports::{Account, ConnectionDirectoryPort, FetchError, SymbolListPort};

#[derive(Deserialize)]
struct ManagerAccounts {
    #[serde(default)]
    active_managers: Vec<Account>,
}

#[derive(Deserialize)]
struct TerminalAccounts {
    #[serde(default)]
    active_services: Vec<Account>,
}

#[derive(Deserialize)]
struct ManagerSymbols {
    #[serde(default)]
    symbols: Vec<ManagerSymbol>,
}

#[derive(Deserialize)]
struct ManagerSymbol {
    #[serde(rename = "Symbol")]
    symbol: String,
}

#[derive(Deserialize)]
struct TerminalSymbols {
    #[serde(default)]
    symbols: Vec<TerminalSymbol>,
}

#[derive(Deserialize)]
struct TerminalSymbol {
    name: String,
}

/// REST adapter for account discovery and symbol lists.
#[derive(Debug, Clone)]
pub struct DirectoryApi {
    client: ApiClient,
}

impl DirectoryApi {
    /// Create an adapter over `client`.
    #[must_use]
    pub const fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ConnectionDirectoryPort for DirectoryApi {
    async fn list_manager_accounts(&self) -> Result<Vec<Account>, FetchError> {
        let body: ManagerAccounts = self
            .client
            .get_json("/api/v1/mt5-manager/accounts", &[])
            .await?;
        Ok(body.active_managers)
    }

    async fn list_terminal_accounts(&self) -> Result<Vec<Account>, FetchError> {
        let body: TerminalAccounts = self.client.get_json("/api/v1/metatrader5/active", &[]).await?;
        Ok(body.active_services)
    }
}

#[async_trait]
impl SymbolListPort for DirectoryApi {
    async fn list_manager_symbols(&self, account_id: &str) -> Result<Vec<String>, FetchError> {
        let path = format!("/api/v1/mt5-manager/symbols/{account_id}");
        let body: ManagerSymbols = self.client.get_json(&path, &[]).await?;
        Ok(body.symbols.into_iter().map(|s| s.symbol).collect())
    }

    async fn list_terminal_symbols(&self, account_id: &str) -> Result<Vec<String>, FetchError> {
        let path = format!("/api/v1/metatrader5/{account_id}/symbols");
        let body: TerminalSymbols = self.client.get_json(&path, &[]).await?;
        Ok(body.symbols.into_iter().map(|s| s.name).collect())
    }
}
