//! Symbol mapping store backed by the bridge's mapping endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ApiClient;
use crate::application::ports::{FetchError, MappingStoreError, MappingStorePort};
use crate::domain::mapping::{AccountPair, MappingTuple, SymbolPair};

const MAPPINGS_PATH: &str = "/api/v1/mappings/symbols";

#[derive(Deserialize)]
struct StoredPair {
    manager_symbol: String,
    terminal_symbol: String,
}

#[derive(Serialize)]
struct ReplaceBody<'a> {
    #[serde(rename = "managerId")]
    manager_id: &'a str,
    #[serde(rename = "terminalId")]
    terminal_id: &'a str,
    symbol_map: Vec<MapEntry<'a>>,
}

#[derive(Serialize)]
struct MapEntry<'a> {
    manager: &'a str,
    terminal: &'a str,
}

/// REST-backed mapping store. The remote side replaces the whole set for a
/// pair in one request.
#[derive(Debug, Clone)]
pub struct HttpMappingStore {
    client: ApiClient,
}

impl HttpMappingStore {
    /// Create a store over `client`.
    #[must_use]
    pub const fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MappingStorePort for HttpMappingStore {
    async fn get_mapping(&self, pair: &AccountPair) -> Result<Vec<MappingTuple>, MappingStoreError> {
        let params = [
            ("manager_id", pair.manager.clone()),
            ("terminal_id", pair.terminal.clone()),
        ];
        match self.client.get_json::<Vec<StoredPair>>(MAPPINGS_PATH, &params).await {
            Ok(stored) => Ok(stored
                .into_iter()
                .map(|s| MappingTuple::scoped(pair, &SymbolPair::new(s.manager_symbol, s.terminal_symbol)))
                .collect()),
            // No mapping saved yet for this pair.
            Err(FetchError::Status { status: 404, .. }) => Ok(Vec::new()),
            Err(e) => Err(MappingStoreError::Unavailable(e.to_string())),
        }
    }

    async fn replace_mapping(
        &self,
        pair: &AccountPair,
        tuples: Vec<MappingTuple>,
    ) -> Result<(), MappingStoreError> {
        let body = ReplaceBody {
            manager_id: &pair.manager,
            terminal_id: &pair.terminal,
            symbol_map: tuples
                .iter()
                .map(|t| MapEntry {
                    manager: &t.manager_symbol,
                    terminal: &t.terminal_symbol,
                })
                .collect(),
        };

        self.client
            .post_json(MAPPINGS_PATH, &body)
            .await
            .map_err(|e| match e {
                FetchError::Status { status, .. } if (400..500).contains(&status) => {
                    MappingStoreError::Rejected(e.to_string())
                }
                other => MappingStoreError::Unavailable(other.to_string()),
            })
    }
}
