//! Symbol Mapper
//!
//! Users declare which manager-side symbol names correspond to which
//! terminal-side names for one (manager account, terminal account) pair. The
//! relation is many-to-many: hedged sub-accounts often book one instrument
//! under several manager symbols that all reconcile against a single terminal
//! symbol.
//!
//! A [`SymbolMapper`] is built once per reconciliation run from a full
//! mapping snapshot and answers lookups in O(1).

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Value Objects
// =============================================================================

/// The (manager account, terminal account) pair a mapping is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountPair {
    /// Manager connection identifier.
    pub manager: String,
    /// Terminal connection identifier.
    pub terminal: String,
}

impl AccountPair {
    /// Create a pair.
    #[must_use]
    pub fn new(manager: impl Into<String>, terminal: impl Into<String>) -> Self {
        Self {
            manager: manager.into(),
            terminal: terminal.into(),
        }
    }

    /// The same pair seen from the other side.
    #[must_use]
    pub fn swapped(&self) -> Self {
        Self::new(self.terminal.clone(), self.manager.clone())
    }
}

impl fmt::Display for AccountPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.manager, self.terminal)
    }
}

/// One manager symbol / terminal symbol correspondence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolPair {
    /// Manager-side symbol name.
    pub manager: String,
    /// Terminal-side symbol name.
    pub terminal: String,
}

impl SymbolPair {
    /// Create a pair.
    #[must_use]
    pub fn new(manager: impl Into<String>, terminal: impl Into<String>) -> Self {
        Self {
            manager: manager.into(),
            terminal: terminal.into(),
        }
    }
}

/// A stored mapping entry, carrying the account scope it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MappingTuple {
    /// Manager-side symbol name.
    pub manager_symbol: String,
    /// Terminal-side symbol name.
    pub terminal_symbol: String,
    /// Manager connection identifier.
    pub manager_account: String,
    /// Terminal connection identifier.
    pub terminal_account: String,
}

impl MappingTuple {
    /// Scope a symbol pair to an account pair.
    #[must_use]
    pub fn scoped(scope: &AccountPair, pair: &SymbolPair) -> Self {
        Self {
            manager_symbol: pair.manager.clone(),
            terminal_symbol: pair.terminal.clone(),
            manager_account: scope.manager.clone(),
            terminal_account: scope.terminal.clone(),
        }
    }

    /// Whether this entry belongs to `scope`.
    #[must_use]
    pub fn in_scope(&self, scope: &AccountPair) -> bool {
        self.manager_account == scope.manager && self.terminal_account == scope.terminal
    }

    /// The symbol pair without its scope.
    #[must_use]
    pub fn symbols(&self) -> SymbolPair {
        SymbolPair::new(self.manager_symbol.clone(), self.terminal_symbol.clone())
    }
}

/// Invalid mapping entries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    /// An entry has a blank manager or terminal symbol.
    #[error("mapping entry {index} has an empty {side} symbol")]
    EmptySymbol {
        /// Position of the entry in the submitted list.
        index: usize,
        /// `"manager"` or `"terminal"`.
        side: &'static str,
    },
}

/// Validate a full replacement set for `scope`.
///
/// Symbols are trimmed, blank symbols are rejected, and exact duplicates are
/// collapsed keeping the first occurrence. An empty input is valid and clears
/// the scope when stored.
pub fn prepare_replacement(
    scope: &AccountPair,
    pairs: &[SymbolPair],
) -> Result<Vec<MappingTuple>, MappingError> {
    let mut seen = HashSet::new();
    let mut tuples = Vec::with_capacity(pairs.len());

    for (index, pair) in pairs.iter().enumerate() {
        let manager = pair.manager.trim();
        let terminal = pair.terminal.trim();
        if manager.is_empty() {
            return Err(MappingError::EmptySymbol {
                index,
                side: "manager",
            });
        }
        if terminal.is_empty() {
            return Err(MappingError::EmptySymbol {
                index,
                side: "terminal",
            });
        }
        let pair = SymbolPair::new(manager, terminal);
        if seen.insert(pair.clone()) {
            tuples.push(MappingTuple::scoped(scope, &pair));
        }
    }

    Ok(tuples)
}

// =============================================================================
// Mapper
// =============================================================================

/// Bidirectional lookup over one scoped mapping snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolMapper {
    terminal_to_manager: HashMap<String, BTreeSet<String>>,
    manager_to_terminal: HashMap<String, BTreeSet<String>>,
}

impl SymbolMapper {
    /// Build from the entries of `tuples` that belong to `scope`.
    #[must_use]
    pub fn resolve(tuples: &[MappingTuple], scope: &AccountPair) -> Self {
        let pairs: Vec<SymbolPair> = tuples
            .iter()
            .filter(|t| t.in_scope(scope))
            .map(MappingTuple::symbols)
            .collect();
        Self::from_pairs(&pairs)
    }

    /// Build from unscoped symbol pairs.
    #[must_use]
    pub fn from_pairs(pairs: &[SymbolPair]) -> Self {
        let mut mapper = Self::default();
        for pair in pairs {
            mapper
                .terminal_to_manager
                .entry(pair.terminal.clone())
                .or_default()
                .insert(pair.manager.clone());
            mapper
                .manager_to_terminal
                .entry(pair.manager.clone())
                .or_default()
                .insert(pair.terminal.clone());
        }
        mapper
    }

    /// A mapper with no entries.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Terminal symbol to the set of manager symbols it aggregates.
    #[must_use]
    pub const fn terminal_map(&self) -> &HashMap<String, BTreeSet<String>> {
        &self.terminal_to_manager
    }

    /// Manager symbols mapped onto `terminal_symbol`.
    #[must_use]
    pub fn manager_symbols_for(&self, terminal_symbol: &str) -> Option<&BTreeSet<String>> {
        self.terminal_to_manager.get(terminal_symbol)
    }

    /// Terminal symbols `manager_symbol` is mapped onto.
    #[must_use]
    pub fn terminal_symbols_for(&self, manager_symbol: &str) -> Option<&BTreeSet<String>> {
        self.manager_to_terminal.get(manager_symbol)
    }

    /// Whether `symbol` appears as a manager symbol in any entry.
    #[must_use]
    pub fn is_manager_symbol_mapped(&self, symbol: &str) -> bool {
        self.manager_to_terminal.contains_key(symbol)
    }

    /// Whether `symbol` is a terminal symbol with at least one manager symbol.
    #[must_use]
    pub fn is_terminal_symbol_mapped(&self, symbol: &str) -> bool {
        self.terminal_to_manager
            .get(symbol)
            .is_some_and(|managers| !managers.is_empty())
    }

    /// The mapping seen from the other side: manager symbols become the keys.
    #[must_use]
    pub fn inverted(&self) -> Self {
        Self {
            terminal_to_manager: self.manager_to_terminal.clone(),
            manager_to_terminal: self.terminal_to_manager.clone(),
        }
    }

    /// Every symbol pair, sorted by terminal then manager symbol.
    #[must_use]
    pub fn pairs(&self) -> Vec<SymbolPair> {
        let mut pairs: Vec<SymbolPair> = self
            .terminal_to_manager
            .iter()
            .flat_map(|(terminal, managers)| {
                managers
                    .iter()
                    .map(move |manager| SymbolPair::new(manager.clone(), terminal.clone()))
            })
            .collect();
        pairs.sort_by(|a, b| (&a.terminal, &a.manager).cmp(&(&b.terminal, &b.manager)));
        pairs
    }

    /// Number of distinct symbol pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.terminal_to_manager.values().map(BTreeSet::len).sum()
    }

    /// Whether there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terminal_to_manager.is_empty()
    }
}
