//! Stream Registry
//!
//! Owns one [`StreamClient`] per account so repeated requests for the same
//! account share a single subscription.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::stream_client::{StreamClient, StreamClientConfig};
use crate::application::ports::LiveDealFeedPort;

/// Account-keyed set of live stream clients.
pub struct StreamRegistry<F: LiveDealFeedPort + 'static> {
    feed: Arc<F>,
    config: StreamClientConfig,
    clients: RwLock<HashMap<String, Arc<StreamClient<F>>>>,
}

impl<F: LiveDealFeedPort + 'static> StreamRegistry<F> {
    /// Create an empty registry; every client uses `config`.
    #[must_use]
    pub fn new(feed: Arc<F>, config: StreamClientConfig) -> Self {
        Self {
            feed,
            config,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Client for `account_id`, created and started on first use.
    pub fn get_or_start(&self, account_id: &str) -> Arc<StreamClient<F>> {
        if let Some(client) = self.clients.read().get(account_id) {
            return Arc::clone(client);
        }

        let mut clients = self.clients.write();
        let client = clients.entry(account_id.to_string()).or_insert_with(|| {
            tracing::info!(account = %account_id, "Registering deal stream");
            Arc::new(StreamClient::new(
                account_id,
                Arc::clone(&self.feed),
                self.config.clone(),
            ))
        });
        client.start();
        Arc::clone(client)
    }

    /// Existing client for `account_id`.
    #[must_use]
    pub fn get(&self, account_id: &str) -> Option<Arc<StreamClient<F>>> {
        self.clients.read().get(account_id).cloned()
    }

    /// Registered account ids, sorted.
    #[must_use]
    pub fn accounts(&self) -> Vec<String> {
        let mut accounts: Vec<String> = self.clients.read().keys().cloned().collect();
        accounts.sort();
        accounts
    }

    /// Stop every client and clear the registry.
    pub async fn stop_all(&self) {
        let clients: Vec<Arc<StreamClient<F>>> =
            self.clients.write().drain().map(|(_, c)| c).collect();
        for client in clients {
            client.stop().await;
        }
    }
}
