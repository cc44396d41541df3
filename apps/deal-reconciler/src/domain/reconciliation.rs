//! Reconciler
//!
//! Joins manager-side and terminal-side deals through a [`SymbolMapper`] and
//! produces one [`ReconciliationRow`] per instrument.
//!
//! # Algorithm
//!
//! 1. Sum manager deals by raw symbol.
//! 2. Sum terminal deals by raw symbol.
//! 3. For every terminal symbol with at least one mapped manager symbol, sum
//!    the raw manager totals of those symbols under the terminal symbol.
//! 4. Rows are the union of those mapped keys, every raw terminal symbol, and
//!    every manager symbol that appears in no mapping entry.
//! 5. Mapped rows come first, then unmapped rows, each sorted by symbol.
//!
//! With an empty mapping every row is unmapped and keyed by raw symbol.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::aggregation::{Totals, totals_by_symbol};
use crate::domain::deal::DealRecord;
use crate::domain::fields::{FieldDescriptor, FieldKind, FieldValue, Record};
use crate::domain::mapping::SymbolMapper;

// =============================================================================
// Row
// =============================================================================

/// Comparison of both sides for one instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationRow {
    symbol: String,
    manager: Totals,
    terminal: Totals,
    diff: Decimal,
    is_mapped: bool,
    manager_symbols: Vec<String>,
}

impl ReconciliationRow {
    /// Build a row; `diff` is derived from the two profit totals.
    #[must_use]
    pub fn new(
        symbol: impl Into<String>,
        manager: Totals,
        terminal: Totals,
        is_mapped: bool,
        manager_symbols: Vec<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            diff: manager.profit - terminal.profit,
            manager,
            terminal,
            is_mapped,
            manager_symbols,
        }
    }

    /// Terminal symbol, or raw symbol for unmapped rows.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Manager-side profit.
    #[must_use]
    pub const fn manager_total(&self) -> Decimal {
        self.manager.profit
    }

    /// Terminal-side profit.
    #[must_use]
    pub const fn terminal_total(&self) -> Decimal {
        self.terminal.profit
    }

    /// `manager_total - terminal_total`.
    #[must_use]
    pub const fn diff(&self) -> Decimal {
        self.diff
    }

    /// Combined volume of both sides.
    #[must_use]
    pub fn volume(&self) -> Decimal {
        self.manager.volume + self.terminal.volume
    }

    /// Combined commission of both sides.
    #[must_use]
    pub fn commission(&self) -> Decimal {
        self.manager.commission + self.terminal.commission
    }

    /// Combined swap of both sides.
    #[must_use]
    pub fn swap(&self) -> Decimal {
        self.manager.swap + self.terminal.swap
    }

    /// Whether the symbol had at least one mapped manager symbol.
    #[must_use]
    pub const fn is_mapped(&self) -> bool {
        self.is_mapped
    }

    /// Manager-side totals.
    #[must_use]
    pub const fn manager_totals(&self) -> &Totals {
        &self.manager
    }

    /// Terminal-side totals.
    #[must_use]
    pub const fn terminal_totals(&self) -> &Totals {
        &self.terminal
    }

    /// Manager symbols folded into this row.
    #[must_use]
    pub fn manager_symbols(&self) -> &[String] {
        &self.manager_symbols
    }
}

static ROW_FIELDS: [FieldDescriptor; 8] = [
    FieldDescriptor::new("symbol", "Symbol", FieldKind::Text),
    FieldDescriptor::new("manager", "Manager P&L", FieldKind::Numeric),
    FieldDescriptor::new("terminal", "Terminal P&L", FieldKind::Numeric),
    FieldDescriptor::new("diff", "Diff", FieldKind::Numeric),
    FieldDescriptor::new("volume", "Volume", FieldKind::Numeric),
    FieldDescriptor::new("commission", "Commission", FieldKind::Numeric),
    FieldDescriptor::new("swap", "Swap", FieldKind::Numeric),
    FieldDescriptor::new("is_mapped", "Mapped", FieldKind::Flag),
];

impl Record for ReconciliationRow {
    fn fields() -> &'static [FieldDescriptor] {
        &ROW_FIELDS
    }

    fn value(&self, field: &str) -> Option<FieldValue> {
        Some(match field {
            "symbol" => FieldValue::Text(self.symbol.clone()),
            "manager" => FieldValue::Numeric(self.manager_total()),
            "terminal" => FieldValue::Numeric(self.terminal_total()),
            "diff" => FieldValue::Numeric(self.diff),
            "volume" => FieldValue::Numeric(self.volume()),
            "commission" => FieldValue::Numeric(self.commission()),
            "swap" => FieldValue::Numeric(self.swap()),
            "is_mapped" => FieldValue::Flag(self.is_mapped),
            _ => return None,
        })
    }
}

// =============================================================================
// Reconcile
// =============================================================================

/// Compare manager and terminal deals per instrument.
///
/// Mapped rows come first, then unmapped rows; each section is ordered by
/// symbol so the same inputs always render the same table whatever order
/// the deals or mapping entries arrived in. Manager volumes must already be
/// in lots.
#[must_use]
pub fn reconcile(
    manager: &[DealRecord],
    terminal: &[DealRecord],
    mapper: &SymbolMapper,
) -> Vec<ReconciliationRow> {
    let manager_raw: HashMap<String, Totals> = totals_by_symbol(manager).into_iter().collect();
    let terminal_raw: HashMap<String, Totals> = totals_by_symbol(terminal).into_iter().collect();

    let mut mapped: BTreeMap<String, (Totals, Vec<String>)> = BTreeMap::new();
    for (terminal_symbol, manager_symbols) in mapper.terminal_map() {
        if manager_symbols.is_empty() {
            continue;
        }
        let totals = manager_symbols
            .iter()
            .filter_map(|symbol| manager_raw.get(symbol))
            .fold(Totals::ZERO, |acc, t| acc + *t);
        mapped.insert(
            terminal_symbol.clone(),
            (totals, manager_symbols.iter().cloned().collect()),
        );
    }

    let mut unmapped: BTreeMap<String, (Totals, Vec<String>)> = BTreeMap::new();
    for (symbol, totals) in &manager_raw {
        if mapper.is_manager_symbol_mapped(symbol) {
            continue;
        }
        if mapped.contains_key(symbol) {
            tracing::warn!(
                symbol = %symbol,
                profit = %totals.profit,
                "Unmapped manager symbol shadows a mapped terminal symbol; excluded from reconciliation"
            );
            continue;
        }
        unmapped.insert(symbol.clone(), (*totals, vec![symbol.clone()]));
    }
    for symbol in terminal_raw.keys() {
        if !mapped.contains_key(symbol) {
            unmapped
                .entry(symbol.clone())
                .or_insert_with(|| (Totals::ZERO, Vec::new()));
        }
    }

    let terminal_side = |symbol: &str| terminal_raw.get(symbol).copied().unwrap_or_default();

    let mapped_rows = mapped.into_iter().map(|(symbol, (totals, managers))| {
        let term = terminal_side(&symbol);
        ReconciliationRow::new(symbol, totals, term, true, managers)
    });
    let unmapped_rows = unmapped.into_iter().map(|(symbol, (totals, managers))| {
        let term = terminal_side(&symbol);
        ReconciliationRow::new(symbol, totals, term, false, managers)
    });

    mapped_rows.chain(unmapped_rows).collect()
}

// =============================================================================
// Summary and Drill-down
// =============================================================================

/// Sums across all rows of a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportTotals {
    /// Total manager profit.
    pub manager: Decimal,
    /// Total terminal profit.
    pub terminal: Decimal,
    /// Total difference.
    pub diff: Decimal,
    /// Total combined volume.
    pub volume: Decimal,
    /// Total combined commission.
    pub commission: Decimal,
    /// Total combined swap.
    pub swap: Decimal,
}

impl ReportTotals {
    /// Sum every row.
    #[must_use]
    pub fn of(rows: &[ReconciliationRow]) -> Self {
        rows.iter().fold(Self::default(), |acc, row| Self {
            manager: acc.manager + row.manager_total(),
            terminal: acc.terminal + row.terminal_total(),
            diff: acc.diff + row.diff(),
            volume: acc.volume + row.volume(),
            commission: acc.commission + row.commission(),
            swap: acc.swap + row.swap(),
        })
    }
}

/// Deals behind one reconciliation row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrillDown {
    /// Manager deals folded into the row.
    pub manager: Vec<DealRecord>,
    /// Terminal deals with the row's symbol.
    pub terminal: Vec<DealRecord>,
}

/// Collect the deals that make up the row keyed by `symbol`.
#[must_use]
pub fn drill_down(
    manager: &[DealRecord],
    terminal: &[DealRecord],
    mapper: &SymbolMapper,
    symbol: &str,
) -> DrillDown {
    let manager = match mapper.manager_symbols_for(symbol) {
        Some(symbols) if !symbols.is_empty() => manager
            .iter()
            .filter(|d| symbols.contains(&d.symbol))
            .cloned()
            .collect(),
        _ => manager
            .iter()
            .filter(|d| d.symbol == symbol && !mapper.is_manager_symbol_mapped(&d.symbol))
            .cloned()
            .collect(),
    };
    let terminal = terminal
        .iter()
        .filter(|d| d.symbol == symbol)
        .cloned()
        .collect();

    DrillDown { manager, terminal }
}
