//! Result View
//!
//! Filtering, multi-field sorting, pagination and CSV export over any
//! collection of [`Record`]s: raw deals, groups, or reconciliation rows.

mod export;

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::fields::{FieldValue, Record};

pub use export::to_csv;

/// Page size used for deal tables.
pub const DEAL_PAGE_SIZE: usize = 100;

/// View errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewError {
    /// A field name is not in the record's registry.
    #[error("unknown field: {0}")]
    UnknownField(String),

    /// Pages must hold at least one record.
    #[error("page size must be greater than zero")]
    ZeroPageSize,

    /// CSV writer failure.
    #[error("CSV export failed: {0}")]
    Csv(String),
}

fn ensure_field<R: Record>(field: &str) -> Result<(), ViewError> {
    R::descriptor(field)
        .map(|_| ())
        .ok_or_else(|| ViewError::UnknownField(field.to_string()))
}

// =============================================================================
// Filter
// =============================================================================

/// Field name to substring predicate.
pub type FieldPredicates = BTreeMap<String, String>;

/// Keep records whose every predicated field contains its predicate,
/// compared case-insensitively. Empty predicates pass everything.
pub fn filter<R: Record + Clone>(
    records: &[R],
    predicates: &FieldPredicates,
) -> Result<Vec<R>, ViewError> {
    let mut active = Vec::new();
    for (field, needle) in predicates {
        ensure_field::<R>(field)?;
        if !needle.is_empty() {
            active.push((field.as_str(), needle.to_lowercase()));
        }
    }

    if active.is_empty() {
        return Ok(records.to_vec());
    }

    Ok(records
        .iter()
        .filter(|record| {
            active.iter().all(|(field, needle)| {
                record
                    .value(field)
                    .is_some_and(|value| value.to_string().to_lowercase().contains(needle))
            })
        })
        .cloned()
        .collect())
}

// =============================================================================
// Sort
// =============================================================================

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// One entry of a sort chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    /// Field name.
    pub field: String,
    /// Direction.
    pub direction: SortDirection,
}

impl SortKey {
    /// Ascending key.
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    /// Descending key.
    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// Ordered list of sort keys; the first key with unequal values decides.
///
/// Header clicks cycle a field through ascending, descending, and cleared.
/// A plain click replaces the chain; a modifier click edits the chain in
/// place, moving the toggled field to the end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortChain(Vec<SortKey>);

impl SortChain {
    /// Empty chain.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Chain from explicit keys.
    #[must_use]
    pub const fn from_keys(keys: Vec<SortKey>) -> Self {
        Self(keys)
    }

    /// Current keys in priority order.
    #[must_use]
    pub fn keys(&self) -> &[SortKey] {
        &self.0
    }

    /// Whether no key is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn next_direction(&self, field: &str) -> Option<SortDirection> {
        match self.0.iter().find(|k| k.field == field).map(|k| k.direction) {
            None => Some(SortDirection::Ascending),
            Some(SortDirection::Ascending) => Some(SortDirection::Descending),
            Some(SortDirection::Descending) => None,
        }
    }

    /// Plain header click: the chain becomes this field alone, toggled.
    pub fn click(&mut self, field: &str) {
        let next = self.next_direction(field);
        self.0.clear();
        if let Some(direction) = next {
            self.0.push(SortKey {
                field: field.to_string(),
                direction,
            });
        }
    }

    /// Modifier click: toggle this field, keeping the other keys.
    pub fn modifier_click(&mut self, field: &str) {
        let next = self.next_direction(field);
        self.0.retain(|k| k.field != field);
        if let Some(direction) = next {
            self.0.push(SortKey {
                field: field.to_string(),
                direction,
            });
        }
    }
}

/// Stable multi-key sort.
pub fn sort<R: Record + Clone>(records: &[R], chain: &SortChain) -> Result<Vec<R>, ViewError> {
    for key in chain.keys() {
        ensure_field::<R>(&key.field)?;
    }
    if chain.is_empty() {
        return Ok(records.to_vec());
    }

    let mut keyed: Vec<(Vec<Option<FieldValue>>, &R)> = records
        .iter()
        .map(|record| {
            let values = chain.keys().iter().map(|k| record.value(&k.field)).collect();
            (values, record)
        })
        .collect();

    keyed.sort_by(|(a, _), (b, _)| {
        chain
            .keys()
            .iter()
            .zip(a.iter().zip(b.iter()))
            .map(|(key, (left, right))| match key.direction {
                SortDirection::Ascending => left.cmp(right),
                SortDirection::Descending => right.cmp(left),
            })
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });

    Ok(keyed.into_iter().map(|(_, record)| record.clone()).collect())
}

// =============================================================================
// Paginate
// =============================================================================

/// One page of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<R> {
    /// Records on this page.
    pub items: Vec<R>,
    /// 1-based page number actually served.
    pub page: usize,
    /// Page size used.
    pub page_size: usize,
    /// Number of pages, at least one.
    pub total_pages: usize,
    /// Number of records across all pages.
    pub total_items: usize,
}

/// Number of pages for `count` records, at least one.
#[must_use]
pub const fn total_pages(count: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 1;
    }
    let pages = count.div_ceil(page_size);
    if pages == 0 { 1 } else { pages }
}

/// Slice out one page; `page_number` is clamped into range.
pub fn paginate<R: Clone>(
    records: &[R],
    page_size: usize,
    page_number: usize,
) -> Result<Page<R>, ViewError> {
    if page_size == 0 {
        return Err(ViewError::ZeroPageSize);
    }
    let total_pages = total_pages(records.len(), page_size);
    let page = page_number.clamp(1, total_pages);
    let start = (page - 1) * page_size;
    let end = (start + page_size).min(records.len());
    let items = records.get(start..end).map(<[R]>::to_vec).unwrap_or_default();

    Ok(Page {
        items,
        page,
        page_size,
        total_pages,
        total_items: records.len(),
    })
}

/// Everything a table view applies, in order: filter, sort, paginate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewRequest {
    /// Column filters.
    pub predicates: FieldPredicates,
    /// Sort chain.
    pub sort: SortChain,
    /// Requested page, 1-based.
    pub page: usize,
    /// Page size.
    pub page_size: usize,
}

impl Default for ViewRequest {
    fn default() -> Self {
        Self {
            predicates: FieldPredicates::new(),
            sort: SortChain::new(),
            page: 1,
            page_size: DEAL_PAGE_SIZE,
        }
    }
}

impl ViewRequest {
    /// Filter, sort and paginate `records`.
    pub fn apply<R: Record + Clone>(&self, records: &[R]) -> Result<Page<R>, ViewError> {
        let filtered = filter(records, &self.predicates)?;
        let sorted = sort(&filtered, &self.sort)?;
        paginate(&sorted, self.page_size, self.page)
    }
}
