//! Integration tests for the REST adapters against a mock bridge.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use deal_reconciler::application::ports::{
    ConnectionDirectoryPort, DateRange, DealQuery, DealSourcePort, FetchError, MappingStoreError,
    MappingStorePort, SymbolListPort,
};
use deal_reconciler::domain::deal::DealAction;
use deal_reconciler::domain::mapping::{AccountPair, MappingTuple, SymbolPair};
use deal_reconciler::infrastructure::http::{
    ApiClient, DirectoryApi, HttpMappingStore, ManagerDealsApi, TerminalDealsApi,
};
use rust_decimal_macros::dec;
use serde_json::json;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> ApiClient {
    ApiClient::new(server.uri(), Duration::from_secs(5)).unwrap()
}

fn january() -> DealQuery {
    DealQuery::all(
        DateRange::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap(),
        )
        .unwrap(),
    )
}

fn pair() -> AccountPair {
    AccountPair::new("mgr-1", "term-1")
}

// =============================================================================
// Deals
// =============================================================================

#[tokio::test]
async fn manager_deals_are_normalized_and_malformed_dropped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/mt5-manager/deals/mgr-1/by-logins"))
        .and(query_param("logins", "5001"))
        .and(query_param("date_from", "2024-01-01T00:00:00.000Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "deals": [
                {
                    "ticket": 11, "order": 21, "login": 5001, "action": 1,
                    "symbol": "EURUSD.a", "volume": 30000, "profit": "12.50",
                    "commission": -1.5, "storage": 0.25, "time_msc": 1_704_100_000_000_i64
                },
                { "ticket": 12, "symbol": "EURUSD.a" }
            ]
        })))
        .mount(&server)
        .await;

    let mut query = january();
    query.logins = vec![5001];
    let deals = ManagerDealsApi::new(client(&server))
        .fetch_deals("mgr-1", &query)
        .await
        .unwrap();

    assert_eq!(deals.len(), 1);
    let deal = &deals[0];
    assert_eq!(deal.ticket, 11);
    assert_eq!(deal.action, DealAction::Sell);
    assert_eq!(deal.volume, dec!(30000));
    assert_eq!(deal.profit, dec!(12.50));
    assert_eq!(deal.swap, dec!(0.25));
}

#[tokio::test]
async fn manager_server_error_is_a_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let result = ManagerDealsApi::new(client(&server))
        .fetch_deals("mgr-1", &january())
        .await;

    assert!(matches!(result, Err(FetchError::Status { status: 503, .. })));
}

#[tokio::test]
async fn undecodable_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let result = ManagerDealsApi::new(client(&server))
        .fetch_deals("mgr-1", &january())
        .await;

    assert!(matches!(result, Err(FetchError::Decode { .. })));
}

#[tokio::test]
async fn terminal_deals_are_narrowed_client_side() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/metatrader5/term-1/history"))
        .and(query_param("from_date", "2024-01-01T00:00:00.000Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "deals": [
                { "ticket": 1, "type": 0, "symbol": "EURUSD", "volume": 1.5, "profit": 4, "time": 1_704_100_000 },
                { "ticket": 2, "type": 1, "symbol": "XAUUSD", "volume": 0.1, "profit": -2, "time": 1_704_100_001 },
                { "ticket": 3, "type": 0, "symbol": "EURUSD", "volume": 2, "profit": 1, "time": "2024-01-15T10:00:00" }
            ]
        })))
        .mount(&server)
        .await;

    let mut query = january();
    query.symbols = vec!["EURUSD".into()];
    let deals = TerminalDealsApi::new(client(&server))
        .fetch_deals("term-1", &query)
        .await
        .unwrap();

    let tickets: Vec<u64> = deals.iter().map(|d| d.ticket).collect();
    assert_eq!(tickets, vec![1, 3]);
    assert!(deals.iter().all(|d| d.login == 0));
}

#[tokio::test]
async fn terminal_login_query_is_refused() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "deals": [] })))
        .expect(0)
        .mount(&server)
        .await;

    let mut query = january();
    query.logins = vec![5001];
    query.symbols = vec!["EURUSD".into()];
    let result = TerminalDealsApi::new(client(&server))
        .fetch_deals("term-1", &query)
        .await;

    let error = assert_err!(result);
    assert!(matches!(error, FetchError::InvalidQuery(_)));
}

#[tokio::test]
async fn terminal_ticket_query_ignores_logins() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/metatrader5/term-1/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "deals": [
                { "ticket": 7, "type": 0, "symbol": "EURUSD", "volume": 1, "profit": 2, "time": 1_704_100_000 }
            ]
        })))
        .mount(&server)
        .await;

    let mut query = january();
    query.tickets = vec![7];
    query.logins = vec![5001];
    let deals = TerminalDealsApi::new(client(&server))
        .fetch_deals("term-1", &query)
        .await
        .unwrap();

    assert_eq!(deals.len(), 1);
}

// =============================================================================
// Directory and Symbols
// =============================================================================

#[tokio::test]
async fn lists_accounts_from_both_sides() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/mt5-manager/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "active_managers": [
                { "identifier": "mgr-1", "server": "srv:443", "login": 1001, "connected": true },
                { "identifier": "mgr-2", "server": "srv:443", "login": 1002, "connected": false }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/metatrader5/active"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "active_services": [
                { "identifier": "term-1", "server": "srv:443", "login": 2001, "connected": true }
            ]
        })))
        .mount(&server)
        .await;

    let directory = DirectoryApi::new(client(&server));
    let managers = directory.list_manager_accounts().await.unwrap();
    let terminals = directory.list_terminal_accounts().await.unwrap();

    assert_eq!(managers.len(), 2);
    assert!(!managers[1].connected);
    assert_eq!(terminals[0].identifier, "term-1");
}

#[tokio::test]
async fn lists_symbols_from_both_sides() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/mt5-manager/symbols/mgr-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "symbols": [{ "Symbol": "EURUSD.a" }, { "Symbol": "XAUUSD.a" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/metatrader5/term-1/symbols"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "symbols": [{ "name": "EURUSD" }]
        })))
        .mount(&server)
        .await;

    let directory = DirectoryApi::new(client(&server));

    assert_eq!(
        directory.list_manager_symbols("mgr-1").await.unwrap(),
        vec!["EURUSD.a", "XAUUSD.a"]
    );
    assert_eq!(directory.list_terminal_symbols("term-1").await.unwrap(), vec!["EURUSD"]);
}

// =============================================================================
// Mappings
// =============================================================================

#[tokio::test]
async fn reads_scoped_mapping() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/mappings/symbols"))
        .and(query_param("manager_id", "mgr-1"))
        .and(query_param("terminal_id", "term-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "manager_symbol": "EURUSD.a", "terminal_symbol": "EURUSD" },
            { "manager_symbol": "EURUSD.b", "terminal_symbol": "EURUSD" }
        ])))
        .mount(&server)
        .await;

    let tuples = HttpMappingStore::new(client(&server))
        .get_mapping(&pair())
        .await
        .unwrap();

    assert_eq!(
        tuples,
        vec![
            MappingTuple::scoped(&pair(), &SymbolPair::new("EURUSD.a", "EURUSD")),
            MappingTuple::scoped(&pair(), &SymbolPair::new("EURUSD.b", "EURUSD")),
        ]
    );
}

#[tokio::test]
async fn missing_mapping_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let tuples = HttpMappingStore::new(client(&server))
        .get_mapping(&pair())
        .await
        .unwrap();

    assert!(tuples.is_empty());
}

#[tokio::test]
async fn failing_mapping_store_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = HttpMappingStore::new(client(&server)).get_mapping(&pair()).await;

    assert!(matches!(result, Err(MappingStoreError::Unavailable(_))));
}

#[tokio::test]
async fn replace_posts_whole_set() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/mappings/symbols"))
        .and(body_json(json!({
            "managerId": "mgr-1",
            "terminalId": "term-1",
            "symbol_map": [{ "manager": "EURUSD.a", "terminal": "EURUSD" }]
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let result = HttpMappingStore::new(client(&server))
        .replace_mapping(
            &pair(),
            vec![MappingTuple::scoped(&pair(), &SymbolPair::new("EURUSD.a", "EURUSD"))],
        )
        .await;

    assert_ok!(result);
}

#[tokio::test]
async fn rejected_replace_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(422))
        .mount(&server)
        .await;

    let result = HttpMappingStore::new(client(&server))
        .replace_mapping(&pair(), Vec::new())
        .await;

    let error = assert_err!(result);
    assert!(matches!(error, MappingStoreError::Rejected(_)));
}
