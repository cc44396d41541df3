//! Historical deal adapters.
//!
//! The manager bridge narrows server-side and exposes one endpoint per
//! filter mode. The terminal bridge only narrows by date (and optionally by
//! group mask), so the remaining criteria are applied after normalizing.
//! Terminal deals carry no account number, so login queries are refused.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};

use super::ApiClient;
use crate::application::ports::{DealFilterMode, DealQuery, DealSourcePort, FetchError};
use crate::domain::deal::normalizer::parse_deal_message;
use crate::domain::deal::{DealRecord, DealSource, normalize_batch};
use crate::infrastructure::metrics;

fn iso(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn decode(endpoint: &str, text: &str, source: DealSource) -> Result<Vec<DealRecord>, FetchError> {
    let raws = parse_deal_message(text).map_err(|e| FetchError::Decode {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })?;
    let batch = normalize_batch(&raws, source);
    if batch.dropped > 0 {
        tracing::warn!(
            endpoint,
            dropped = batch.dropped,
            kept = batch.records.len(),
            "Dropped malformed deal records"
        );
    }
    metrics::record_malformed(source, batch.dropped as u64);
    metrics::record_deals_received(source, batch.records.len() as u64);
    Ok(batch.records)
}

// =============================================================================
// Manager
// =============================================================================

/// Manager-side deal history.
#[derive(Debug, Clone)]
pub struct ManagerDealsApi {
    client: ApiClient,
}

impl ManagerDealsApi {
    /// Create an adapter over `client`.
    #[must_use]
    pub const fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Endpoint path and query parameters for `query`.
    #[must_use]
    pub fn request_for(account_id: &str, query: &DealQuery) -> (String, Vec<(&'static str, String)>) {
        let mut params = vec![
            ("date_from", iso(query.range.from())),
            ("date_to", iso(query.range.to())),
        ];
        let endpoint = match query.mode() {
            DealFilterMode::Tickets(tickets) => {
                params.push(("tickets", join(&tickets)));
                "by-tickets"
            }
            DealFilterMode::LoginsWithSymbols { logins, symbols } => {
                params.push(("logins", join(&logins)));
                params.push(("symbols", symbols.join(",")));
                "by-logins-symbol"
            }
            DealFilterMode::Logins(logins) => {
                params.push(("logins", join(&logins)));
                "by-logins"
            }
            DealFilterMode::GroupsWithSymbols { groups, symbols } => {
                params.extend(groups.into_iter().map(|g| ("groups", g)));
                params.extend(symbols.into_iter().map(|s| ("symbol", s)));
                "by-group-symbol"
            }
            DealFilterMode::Groups(groups) => {
                params.push(("groups", groups.join(",")));
                "by-group"
            }
        };
        (
            format!("/api/v1/mt5-manager/deals/{account_id}/{endpoint}"),
            params,
        )
    }
}

#[async_trait]
impl DealSourcePort for ManagerDealsApi {
    async fn fetch_deals(
        &self,
        account_id: &str,
        query: &DealQuery,
    ) -> Result<Vec<DealRecord>, FetchError> {
        let (path, params) = Self::request_for(account_id, query);
        let text = self.client.get_text(&path, &params).await?;
        let deals = decode(&path, &text, DealSource::Manager)?;
        tracing::debug!(account = account_id, deals = deals.len(), "Manager deals fetched");
        Ok(deals)
    }
}

// =============================================================================
// Terminal
// =============================================================================

/// Terminal-side deal history.
#[derive(Debug, Clone)]
pub struct TerminalDealsApi {
    client: ApiClient,
}

impl TerminalDealsApi {
    /// Create an adapter over `client`.
    #[must_use]
    pub const fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DealSourcePort for TerminalDealsApi {
    async fn fetch_deals(
        &self,
        account_id: &str,
        query: &DealQuery,
    ) -> Result<Vec<DealRecord>, FetchError> {
        if matches!(
            query.mode(),
            DealFilterMode::Logins(_) | DealFilterMode::LoginsWithSymbols { .. }
        ) {
            return Err(FetchError::InvalidQuery(
                "terminal history carries no account numbers; narrow by tickets, groups or symbols"
                    .to_string(),
            ));
        }

        let path = format!("/api/v1/metatrader5/{account_id}/history");
        let mut params = vec![
            ("from_date", iso(query.range.from())),
            ("to_date", iso(query.range.to())),
        ];
        if !query.groups.is_empty() {
            params.push(("group_filter", query.groups.join(",")));
        }

        let text = self.client.get_text(&path, &params).await?;
        let mut deals = decode(&path, &text, DealSource::Terminal)?;
        let fetched = deals.len();
        deals.retain(|deal| query.matches(deal));
        tracing::debug!(
            account = account_id,
            fetched,
            kept = deals.len(),
            "Terminal deals fetched"
        );
        Ok(deals)
    }
}
