//! Manage Mapping Use Case

use std::sync::Arc;

use crate::application::dto::SymbolChoices;
use crate::application::ports::{FetchError, MappingStoreError, MappingStorePort, SymbolListPort};
use crate::domain::mapping::{AccountPair, MappingError, SymbolMapper, SymbolPair, prepare_replacement};

/// Mapping management error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManageMappingError {
    /// An entry is invalid; nothing was saved.
    #[error(transparent)]
    Invalid(#[from] MappingError),

    /// The store failed; the previous mapping is still in place.
    #[error(transparent)]
    Store(#[from] MappingStoreError),

    /// A symbol list could not be fetched.
    #[error(transparent)]
    FetchFailed(#[from] FetchError),
}

/// Use case for viewing and replacing the symbol mapping of an account pair.
pub struct ManageMappingUseCase<S, L>
where
    S: MappingStorePort,
    L: SymbolListPort,
{
    store: Arc<S>,
    symbols: Arc<L>,
}

impl<S, L> ManageMappingUseCase<S, L>
where
    S: MappingStorePort,
    L: SymbolListPort,
{
    /// Create a new ManageMappingUseCase.
    pub fn new(store: Arc<S>, symbols: Arc<L>) -> Self {
        Self { store, symbols }
    }

    /// Current symbol pairs for `accounts`, sorted. An unreachable store
    /// shows as an empty mapping.
    pub async fn load(&self, accounts: &AccountPair) -> Vec<SymbolPair> {
        match self.store.get_mapping(accounts).await {
            Ok(tuples) => SymbolMapper::resolve(&tuples, accounts).pairs(),
            Err(e) => {
                tracing::warn!(accounts = %accounts, error = %e, "Mapping unavailable, showing none");
                Vec::new()
            }
        }
    }

    /// Replace the whole mapping for `accounts`. Returns the number of
    /// distinct pairs saved; an empty list clears the mapping.
    pub async fn save(
        &self,
        accounts: &AccountPair,
        pairs: &[SymbolPair],
    ) -> Result<usize, ManageMappingError> {
        let tuples = prepare_replacement(accounts, pairs)?;
        let saved = tuples.len();
        self.store.replace_mapping(accounts, tuples).await?;
        tracing::info!(accounts = %accounts, pairs = saved, "Symbol mapping replaced");
        Ok(saved)
    }

    /// Manager and terminal symbol lists, fetched together.
    pub async fn symbol_choices(
        &self,
        accounts: &AccountPair,
    ) -> Result<SymbolChoices, ManageMappingError> {
        let (mut manager, mut terminal) = tokio::try_join!(
            self.symbols.list_manager_symbols(&accounts.manager),
            self.symbols.list_terminal_symbols(&accounts.terminal),
        )?;
        manager.sort();
        manager.dedup();
        terminal.sort();
        terminal.dedup();
        Ok(SymbolChoices { manager, terminal })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{InMemoryMappingStore, MockMappingStorePort, MockSymbolListPort};

    fn accounts() -> AccountPair {
        AccountPair::new("mgr-1", "term-1")
    }

    fn no_symbols() -> Arc<MockSymbolListPort> {
        Arc::new(MockSymbolListPort::new())
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let use_case = ManageMappingUseCase::new(Arc::new(InMemoryMappingStore::new()), no_symbols());
        let pairs = vec![
            SymbolPair::new("EURUSD.b", "EURUSD"),
            SymbolPair::new("EURUSD.a", "EURUSD"),
            SymbolPair::new("EURUSD.a", "EURUSD"),
        ];

        let saved = use_case.save(&accounts(), &pairs).await.unwrap();

        assert_eq!(saved, 2);
        assert_eq!(
            use_case.load(&accounts()).await,
            vec![
                SymbolPair::new("EURUSD.a", "EURUSD"),
                SymbolPair::new("EURUSD.b", "EURUSD"),
            ]
        );
    }

    #[tokio::test]
    async fn test_save_replaces_not_merges() {
        let use_case = ManageMappingUseCase::new(Arc::new(InMemoryMappingStore::new()), no_symbols());
        use_case
            .save(&accounts(), &[SymbolPair::new("EURUSD.a", "EURUSD")])
            .await
            .unwrap();
        use_case
            .save(&accounts(), &[SymbolPair::new("XAUUSD.a", "XAUUSD")])
            .await
            .unwrap();

        assert_eq!(
            use_case.load(&accounts()).await,
            vec![SymbolPair::new("XAUUSD.a", "XAUUSD")]
        );

        use_case.save(&accounts(), &[]).await.unwrap();
        assert!(use_case.load(&accounts()).await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_entry_saves_nothing() {
        let mut store = MockMappingStorePort::new();
        store.expect_replace_mapping().never();
        let use_case = ManageMappingUseCase::new(Arc::new(store), no_symbols());

        let result = use_case
            .save(&accounts(), &[SymbolPair::new("EURUSD.a", " ")])
            .await;

        assert!(matches!(result, Err(ManageMappingError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_unavailable_store_loads_empty() {
        let mut store = MockMappingStorePort::new();
        store
            .expect_get_mapping()
            .returning(|_| Err(MappingStoreError::Unavailable("timeout".into())));
        let use_case = ManageMappingUseCase::new(Arc::new(store), no_symbols());

        assert!(use_case.load(&accounts()).await.is_empty());
    }

    #[tokio::test]
    async fn test_symbol_choices_are_sorted() {
        let mut symbols = MockSymbolListPort::new();
        symbols
            .expect_list_manager_symbols()
            .returning(|_| Ok(vec!["XAUUSD.a".into(), "EURUSD.a".into(), "EURUSD.a".into()]));
        symbols
            .expect_list_terminal_symbols()
            .returning(|_| Ok(vec!["XAUUSD".into(), "EURUSD".into()]));
        let use_case = ManageMappingUseCase::new(Arc::new(InMemoryMappingStore::new()), Arc::new(symbols));

        let choices = use_case.symbol_choices(&accounts()).await.unwrap();

        assert_eq!(choices.manager, vec!["EURUSD.a", "XAUUSD.a"]);
        assert_eq!(choices.terminal, vec!["EURUSD", "XAUUSD"]);
    }

    #[tokio::test]
    async fn test_symbol_choices_fail_together() {
        let mut symbols = MockSymbolListPort::new();
        symbols
            .expect_list_manager_symbols()
            .returning(|_| Ok(vec!["EURUSD.a".into()]));
        symbols.expect_list_terminal_symbols().returning(|_| {
            Err(FetchError::Status {
                endpoint: "/symbols".into(),
                status: 500,
            })
        });
        let use_case = ManageMappingUseCase::new(Arc::new(InMemoryMappingStore::new()), Arc::new(symbols));

        assert!(matches!(
            use_case.symbol_choices(&accounts()).await,
            Err(ManageMappingError::FetchFailed(_))
        ));
    }
}
