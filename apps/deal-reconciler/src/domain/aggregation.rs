//! Aggregator
//!
//! Groups deals by an ordered tuple of field values and keeps running totals
//! per group. Groups appear in the order their key was first seen, and totals
//! accumulate in input order, so results are deterministic for a given input.
//!
//! The aggregator is agnostic to volume scale; callers that compare manager
//! and terminal volumes divide manager volumes first.

use std::collections::HashMap;
use std::ops::{Add, AddAssign, Sub};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::deal::{DealField, DealRecord, UnknownDealField};
use crate::domain::fields::{FieldDescriptor, FieldKind, FieldValue, Record};

// =============================================================================
// Totals
// =============================================================================

/// Running sums over a set of deals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    /// Summed volume.
    pub volume: Decimal,
    /// Summed profit.
    pub profit: Decimal,
    /// Summed commission.
    pub commission: Decimal,
    /// Summed swap.
    pub swap: Decimal,
}

impl Totals {
    /// All-zero totals.
    pub const ZERO: Self = Self {
        volume: Decimal::ZERO,
        profit: Decimal::ZERO,
        commission: Decimal::ZERO,
        swap: Decimal::ZERO,
    };

    /// Add one deal's amounts.
    pub fn add_deal(&mut self, deal: &DealRecord) {
        self.volume += deal.volume;
        self.profit += deal.profit;
        self.commission += deal.commission;
        self.swap += deal.swap;
    }

    /// Totals of a deal slice, summed in order.
    #[must_use]
    pub fn of<'a>(deals: impl IntoIterator<Item = &'a DealRecord>) -> Self {
        deals.into_iter().fold(Self::ZERO, |mut acc, deal| {
            acc.add_deal(deal);
            acc
        })
    }
}

impl Add for Totals {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            volume: self.volume + rhs.volume,
            profit: self.profit + rhs.profit,
            commission: self.commission + rhs.commission,
            swap: self.swap + rhs.swap,
        }
    }
}

impl AddAssign for Totals {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Totals {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            volume: self.volume - rhs.volume,
            profit: self.profit - rhs.profit,
            commission: self.commission - rhs.commission,
            swap: self.swap - rhs.swap,
        }
    }
}

// =============================================================================
// Group
// =============================================================================

/// A bucket of deals sharing the same key tuple.
///
/// Totals are always the arithmetic sum of `members`; the only way to build a
/// group is from its members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    key: Vec<FieldValue>,
    totals: Totals,
    members: Vec<DealRecord>,
}

impl Group {
    /// Build a group from its members, computing totals in member order.
    #[must_use]
    pub fn from_members(key: Vec<FieldValue>, members: Vec<DealRecord>) -> Self {
        let totals = Totals::of(&members);
        Self {
            key,
            totals,
            members,
        }
    }

    fn push(&mut self, deal: DealRecord) {
        self.totals.add_deal(&deal);
        self.members.push(deal);
    }

    /// Key tuple, one value per grouping field.
    #[must_use]
    pub fn key(&self) -> &[FieldValue] {
        &self.key
    }

    /// Key rendered for display, values joined with `" | "`.
    #[must_use]
    pub fn key_label(&self) -> String {
        self.key
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" | ")
    }

    /// Number of member deals.
    #[must_use]
    pub fn count(&self) -> usize {
        self.members.len()
    }

    /// Running totals.
    #[must_use]
    pub const fn totals(&self) -> &Totals {
        &self.totals
    }

    /// Member deals in input order.
    #[must_use]
    pub fn members(&self) -> &[DealRecord] {
        &self.members
    }

    /// Take the member deals.
    #[must_use]
    pub fn into_members(self) -> Vec<DealRecord> {
        self.members
    }
}

static GROUP_FIELDS: [FieldDescriptor; 6] = [
    FieldDescriptor::new("key", "Group", FieldKind::Text),
    FieldDescriptor::new("count", "Deals", FieldKind::Integer),
    FieldDescriptor::new("volume", "Volume", FieldKind::Numeric),
    FieldDescriptor::new("profit", "Profit", FieldKind::Numeric),
    FieldDescriptor::new("commission", "Commission", FieldKind::Numeric),
    FieldDescriptor::new("swap", "Swap", FieldKind::Numeric),
];

impl Record for Group {
    fn fields() -> &'static [FieldDescriptor] {
        &GROUP_FIELDS
    }

    fn value(&self, field: &str) -> Option<FieldValue> {
        Some(match field {
            "key" => FieldValue::Text(self.key_label()),
            "count" => FieldValue::Integer(self.count() as u64),
            "volume" => FieldValue::Numeric(self.totals.volume),
            "profit" => FieldValue::Numeric(self.totals.profit),
            "commission" => FieldValue::Numeric(self.totals.commission),
            "swap" => FieldValue::Numeric(self.totals.swap),
            _ => return None,
        })
    }
}

// =============================================================================
// Grouping
// =============================================================================

/// Group deals by the ordered tuple of `key_fields` values.
///
/// An empty field list yields a single group holding every deal; empty input
/// yields no groups.
#[must_use]
pub fn group(deals: &[DealRecord], key_fields: &[DealField]) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();
    let mut index: HashMap<Vec<FieldValue>, usize> = HashMap::new();

    for deal in deals {
        let key: Vec<FieldValue> = key_fields.iter().map(|f| f.value(deal)).collect();
        if let Some(&slot) = index.get(&key) {
            groups[slot].push(deal.clone());
        } else {
            index.insert(key.clone(), groups.len());
            groups.push(Group::from_members(key, vec![deal.clone()]));
        }
    }

    groups
}

/// [`group`] with field names, as received from a caller.
pub fn group_by_names<S: AsRef<str>>(
    deals: &[DealRecord],
    key_fields: &[S],
) -> Result<Vec<Group>, UnknownDealField> {
    let fields = key_fields
        .iter()
        .map(|name| name.as_ref().parse::<DealField>())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(group(deals, &fields))
}

/// Totals per raw symbol, in first-seen order.
#[must_use]
pub fn totals_by_symbol(deals: &[DealRecord]) -> Vec<(String, Totals)> {
    group(deals, &[DealField::Symbol])
        .into_iter()
        .map(|g| {
            let symbol = g.members.first().map(|d| d.symbol.clone()).unwrap_or_default();
            (symbol, g.totals)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::domain::deal::fixtures::deal;

    #[test]
    fn groups_by_symbol_with_totals() {
        let deals = vec![
            deal(1, "EURUSD", dec!(10), dec!(20000)),
            deal(2, "EURUSD", dec!(-3), dec!(5000)),
        ];

        let groups = group(&deals, &[DealField::Symbol]);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].key(), &[FieldValue::Text("EURUSD".into())]);
        assert_eq!(groups[0].count(), 2);
        assert_eq!(groups[0].totals().profit, dec!(7));
        assert_eq!(groups[0].totals().volume, dec!(25000));
    }

    #[test]
    fn groups_keep_first_seen_order() {
        let deals = vec![
            deal(1, "XAUUSD", dec!(1), dec!(1)),
            deal(2, "EURUSD", dec!(1), dec!(1)),
            deal(3, "XAUUSD", dec!(1), dec!(1)),
            deal(4, "GBPUSD", dec!(1), dec!(1)),
        ];

        let labels: Vec<String> = group(&deals, &[DealField::Symbol])
            .iter()
            .map(Group::key_label)
            .collect();

        assert_eq!(labels, vec!["XAUUSD", "EURUSD", "GBPUSD"]);
    }

    #[test]
    fn multi_key_grouping() {
        let mut a = deal(1, "EURUSD", dec!(1), dec!(1));
        a.login = 10;
        let mut b = deal(2, "EURUSD", dec!(2), dec!(1));
        b.login = 11;
        let mut c = deal(3, "EURUSD", dec!(4), dec!(1));
        c.login = 10;

        let groups = group(&[a, b, c], &[DealField::Login, DealField::Symbol]);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key_label(), "10 | EURUSD");
        assert_eq!(groups[0].totals().profit, dec!(5));
        assert_eq!(groups[1].totals().profit, dec!(2));
    }

    #[test]
    fn empty_key_yields_single_group() {
        let deals = vec![
            deal(1, "EURUSD", dec!(1), dec!(1)),
            deal(2, "GBPUSD", dec!(2), dec!(1)),
        ];

        let groups = group(&deals, &[]);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].count(), 2);
        assert!(groups[0].key().is_empty());
    }

    #[test]
    fn empty_input_yields_no_groups() {
        assert!(group(&[], &[DealField::Symbol]).is_empty());
        assert!(group(&[], &[]).is_empty());
    }

    #[test]
    fn symbols_compare_case_sensitively() {
        let deals = vec![
            deal(1, "eurusd", dec!(1), dec!(1)),
            deal(2, "EURUSD", dec!(1), dec!(1)),
        ];
        assert_eq!(group(&deals, &[DealField::Symbol]).len(), 2);
    }

    #[test]
    fn numeric_keys_compare_numerically() {
        let a = deal(1, "EURUSD", dec!(1.0), dec!(1));
        let b = deal(2, "EURUSD", dec!(1.00), dec!(1));
        assert_eq!(group(&[a, b], &[DealField::Profit]).len(), 1);
    }

    #[test]
    fn group_by_names_rejects_unknown_field() {
        let deals = vec![deal(1, "EURUSD", dec!(1), dec!(1))];
        assert!(group_by_names(&deals, &["symbol", "price"]).is_err());
        assert_eq!(group_by_names(&deals, &["login"]).unwrap().len(), 1);
    }

    #[test]
    fn group_exposes_record_fields() {
        let groups = group(&[deal(1, "EURUSD", dec!(2.5), dec!(1))], &[DealField::Symbol]);
        assert_eq!(groups[0].value("count"), Some(FieldValue::Integer(1)));
        assert_eq!(groups[0].value("profit"), Some(FieldValue::Numeric(dec!(2.5))));
        assert_eq!(groups[0].value("key"), Some(FieldValue::Text("EURUSD".into())));
    }

    #[test]
    fn totals_by_symbol_sums_raw_symbols() {
        let deals = vec![
            deal(1, "EURUSD.a", dec!(5), dec!(1)),
            deal(2, "EURUSD.b", dec!(3), dec!(1)),
            deal(3, "EURUSD.a", dec!(1), dec!(1)),
        ];
        let totals = totals_by_symbol(&deals);
        assert_eq!(totals[0].0, "EURUSD.a");
        assert_eq!(totals[0].1.profit, dec!(6));
        assert_eq!(totals[1].1.profit, dec!(3));
    }
}
