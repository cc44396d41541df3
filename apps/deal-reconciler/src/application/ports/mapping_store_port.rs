//! Mapping Store Port (Driven Port)
//!
//! Get/replace contract for the symbol mapping of one account pair. A
//! replace is all-or-nothing; readers see either the old or the new set.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::mapping::{AccountPair, MappingTuple};

/// Mapping store error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingStoreError {
    /// The store could not be reached or answered with an error.
    #[error("mapping store unavailable: {0}")]
    Unavailable(String),

    /// The store refused the write.
    #[error("mapping store rejected the update: {0}")]
    Rejected(String),
}

/// Port for symbol mapping persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MappingStorePort: Send + Sync {
    /// All tuples stored for `pair`.
    async fn get_mapping(&self, pair: &AccountPair) -> Result<Vec<MappingTuple>, MappingStoreError>;

    /// Replace every tuple stored for `pair`.
    async fn replace_mapping(
        &self,
        pair: &AccountPair,
        tuples: Vec<MappingTuple>,
    ) -> Result<(), MappingStoreError>;
}

/// In-memory implementation; one lock makes each replace atomic.
#[derive(Debug, Default)]
pub struct InMemoryMappingStore {
    mappings: RwLock<HashMap<AccountPair, Vec<MappingTuple>>>,
}

impl InMemoryMappingStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MappingStorePort for InMemoryMappingStore {
    async fn get_mapping(&self, pair: &AccountPair) -> Result<Vec<MappingTuple>, MappingStoreError> {
        let mappings = self
            .mappings
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(mappings.get(pair).cloned().unwrap_or_default())
    }

    async fn replace_mapping(
        &self,
        pair: &AccountPair,
        tuples: Vec<MappingTuple>,
    ) -> Result<(), MappingStoreError> {
        let mut mappings = self
            .mappings
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        mappings.insert(pair.clone(), tuples);
        drop(mappings);
        Ok(())
    }
}
