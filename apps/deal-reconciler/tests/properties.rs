//! Property tests for aggregation, reconciliation and the result view.

use chrono::{TimeZone, Utc};
use deal_reconciler::domain::aggregation::{Totals, group};
use deal_reconciler::domain::deal::{DealAction, DealField, DealRecord};
use deal_reconciler::domain::mapping::{SymbolMapper, SymbolPair};
use deal_reconciler::domain::reconciliation::reconcile;
use deal_reconciler::domain::view::{SortChain, SortKey, paginate, sort, to_csv};
use proptest::prelude::*;
use rust_decimal::Decimal;

// =============================================================================
// Strategies
// =============================================================================

fn cents() -> impl Strategy<Value = Decimal> {
    (-1_000_000i64..1_000_000).prop_map(|c| Decimal::new(c, 2))
}

fn deal_with(ticket: u64, symbol: String, profit: Decimal, volume: Decimal, login: u64) -> DealRecord {
    DealRecord {
        ticket,
        order_id: ticket + 1000,
        login,
        symbol,
        action: if ticket % 2 == 0 { DealAction::Buy } else { DealAction::Sell },
        volume,
        profit,
        commission: Decimal::ZERO,
        swap: Decimal::ZERO,
        timestamp: Utc.timestamp_millis_opt(1_700_000_000_000 + ticket as i64).unwrap(),
    }
}

/// Deals over `symbols`, tickets assigned in input order.
fn deals(symbols: &'static [&'static str], max: usize) -> impl Strategy<Value = Vec<DealRecord>> {
    prop::collection::vec(
        (prop::sample::select(symbols), cents(), (1i64..500_000), 5000u64..5004),
        0..max,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (symbol, profit, volume, login))| {
                deal_with(i as u64 + 1, symbol.to_string(), profit, Decimal::new(volume, 2), login)
            })
            .collect()
    })
}

const MANAGER_SYMBOLS: &[&str] = &["M0", "M1", "M2", "M3", "M4"];
const TERMINAL_SYMBOLS: &[&str] = &["T0", "T1", "T2", "T3", "T4"];

/// One-to-one mapping `Mi -> Ti` over a random subset of indices.
fn one_to_one() -> impl Strategy<Value = Vec<SymbolPair>> {
    prop::collection::btree_set(0usize..5, 0..=5).prop_map(|indices| {
        indices
            .into_iter()
            .map(|i| SymbolPair::new(MANAGER_SYMBOLS[i], TERMINAL_SYMBOLS[i]))
            .collect()
    })
}

// =============================================================================
// Aggregation
// =============================================================================

proptest! {
    #[test]
    fn group_totals_equal_member_sums(input in deals(MANAGER_SYMBOLS, 60)) {
        let groups = group(&input, &[DealField::Symbol, DealField::Login]);

        let mut seen = 0;
        for g in &groups {
            prop_assert_eq!(*g.totals(), Totals::of(g.members()));
            prop_assert_eq!(g.count(), g.members().len());
            seen += g.count();
        }
        prop_assert_eq!(seen, input.len());
        prop_assert_eq!(
            groups.iter().fold(Totals::ZERO, |acc, g| acc + *g.totals()),
            Totals::of(&input)
        );
    }

    #[test]
    fn empty_key_is_one_group(input in deals(MANAGER_SYMBOLS, 30)) {
        let groups = group(&input, &[]);

        if input.is_empty() {
            prop_assert!(groups.is_empty());
        } else {
            prop_assert_eq!(groups.len(), 1);
            prop_assert_eq!(groups[0].count(), input.len());
        }
    }
}

// =============================================================================
// Reconciliation
// =============================================================================

proptest! {
    #[test]
    fn diff_is_manager_minus_terminal(
        manager in deals(MANAGER_SYMBOLS, 40),
        terminal in deals(TERMINAL_SYMBOLS, 40),
        pairs in one_to_one(),
    ) {
        let mapper = SymbolMapper::from_pairs(&pairs);

        for row in reconcile(&manager, &terminal, &mapper) {
            prop_assert_eq!(row.diff(), row.manager_total() - row.terminal_total());
        }
    }

    #[test]
    fn is_mapped_matches_mapping_keys(
        manager in deals(MANAGER_SYMBOLS, 40),
        terminal in deals(TERMINAL_SYMBOLS, 40),
        pairs in one_to_one(),
    ) {
        let mapper = SymbolMapper::from_pairs(&pairs);

        for row in reconcile(&manager, &terminal, &mapper) {
            prop_assert_eq!(row.is_mapped(), mapper.terminal_map().contains_key(row.symbol()));
        }
    }

    #[test]
    fn no_profit_is_lost(
        manager in deals(MANAGER_SYMBOLS, 40),
        terminal in deals(TERMINAL_SYMBOLS, 40),
        pairs in one_to_one(),
    ) {
        let rows = reconcile(&manager, &terminal, &SymbolMapper::from_pairs(&pairs));

        let manager_sum: Decimal = rows.iter().map(|r| r.manager_total()).sum();
        let terminal_sum: Decimal = rows.iter().map(|r| r.terminal_total()).sum();
        prop_assert_eq!(manager_sum, Totals::of(&manager).profit);
        prop_assert_eq!(terminal_sum, Totals::of(&terminal).profit);
    }

    #[test]
    fn swapping_sides_negates_mapped_diffs(
        manager in deals(MANAGER_SYMBOLS, 40),
        terminal in deals(TERMINAL_SYMBOLS, 40),
        pairs in one_to_one(),
    ) {
        let mapper = SymbolMapper::from_pairs(&pairs);
        let forward = reconcile(&manager, &terminal, &mapper);
        let backward = reconcile(&terminal, &manager, &mapper.inverted());

        for pair in &pairs {
            let there = forward.iter().find(|r| r.symbol() == pair.terminal);
            let back = backward.iter().find(|r| r.symbol() == pair.manager);
            match (there, back) {
                (Some(there), Some(back)) => prop_assert_eq!(there.diff(), -back.diff()),
                (there, back) => prop_assert!(false, "missing mapped row: {:?} / {:?}", there, back),
            }
        }
    }
}

// =============================================================================
// View
// =============================================================================

proptest! {
    #[test]
    fn sort_is_stable(input in deals(MANAGER_SYMBOLS, 60)) {
        let sorted = sort(&input, &SortChain::from_keys(vec![SortKey::asc("symbol")])).unwrap();

        prop_assert_eq!(sorted.len(), input.len());
        for pair in sorted.windows(2) {
            prop_assert!(pair[0].symbol <= pair[1].symbol);
            if pair[0].symbol == pair[1].symbol {
                prop_assert!(pair[0].ticket < pair[1].ticket);
            }
        }
    }

    #[test]
    fn pages_reconstruct_input(input in deals(MANAGER_SYMBOLS, 80), page_size in 1usize..25) {
        let first = paginate(&input, page_size, 1).unwrap();
        let mut rebuilt = first.items.clone();
        for page in 2..=first.total_pages {
            let next = paginate(&input, page_size, page).unwrap();
            prop_assert!(next.items.len() <= page_size);
            rebuilt.extend(next.items);
        }

        prop_assert_eq!(first.total_items, input.len());
        prop_assert_eq!(rebuilt, input);
    }

    #[test]
    fn csv_rows_have_header_width(input in deals(MANAGER_SYMBOLS, 30)) {
        let fields = ["ticket", "login", "symbol", "action", "volume", "profit", "timestamp"];
        let text = to_csv(&input, &fields).unwrap();

        let mut reader = csv::ReaderBuilder::new().from_reader(text.as_bytes());
        let header = reader.headers().unwrap().clone();
        prop_assert_eq!(header.len(), fields.len());

        let mut rows = 0;
        for record in reader.records() {
            let record = record.unwrap();
            prop_assert_eq!(record.len(), fields.len());
            prop_assert!(!record[0].contains('.'));
            prop_assert!(record[0].parse::<u64>().is_ok());
            rows += 1;
        }
        prop_assert_eq!(rows, input.len());
    }
}
