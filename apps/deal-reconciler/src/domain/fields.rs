//! Field Registry
//!
//! Records expose their fields by name through the [`Record`] trait. Each
//! field has a static [`FieldDescriptor`] and yields a typed [`FieldValue`],
//! so filtering, sorting, grouping and CSV export stay generic without
//! inspecting untyped data.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;

// =============================================================================
// Kinds and Values
// =============================================================================

/// How a field is compared and rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Integer identifiers and counts, rendered without decimals.
    Integer,
    /// Decimal amounts, rendered with two decimals in CSV.
    Numeric,
    /// Free text.
    Text,
    /// One of a fixed set of names.
    Enum,
    /// Instant in time.
    Timestamp,
    /// Boolean marker.
    Flag,
}

/// Typed value of one field on one record.
///
/// Ordering compares values of the same variant naturally: numbers
/// numerically, text case-sensitively, timestamps chronologically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldValue {
    /// Integer value.
    Integer(u64),
    /// Decimal value.
    Numeric(Decimal),
    /// Text value.
    Text(String),
    /// Enum name.
    Enum(&'static str),
    /// Timestamp value.
    Timestamp(DateTime<Utc>),
    /// Flag value.
    Flag(bool),
}

impl FieldValue {
    /// The kind this value belongs to.
    #[must_use]
    pub const fn kind(&self) -> FieldKind {
        match self {
            Self::Integer(_) => FieldKind::Integer,
            Self::Numeric(_) => FieldKind::Numeric,
            Self::Text(_) => FieldKind::Text,
            Self::Enum(_) => FieldKind::Enum,
            Self::Timestamp(_) => FieldKind::Timestamp,
            Self::Flag(_) => FieldKind::Flag,
        }
    }
}

/// String representation used for substring filtering and display.
impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::Numeric(v) => write!(f, "{}", v.normalize()),
            Self::Text(v) => f.write_str(v),
            Self::Enum(v) => f.write_str(v),
            Self::Timestamp(v) => f.write_str(&v.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Self::Flag(v) => write!(f, "{v}"),
        }
    }
}

// =============================================================================
// Descriptors
// =============================================================================

/// Static description of a named field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Machine name used in requests.
    pub name: &'static str,
    /// Human label used in CSV headers.
    pub label: &'static str,
    /// Value kind.
    pub kind: FieldKind,
}

impl FieldDescriptor {
    /// Create a descriptor.
    #[must_use]
    pub const fn new(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self { name, label, kind }
    }
}

/// A record whose fields can be read by name.
pub trait Record {
    /// Every field this record type exposes, in display order.
    fn fields() -> &'static [FieldDescriptor];

    /// Value of the named field, `None` when the name is unknown.
    fn value(&self, field: &str) -> Option<FieldValue>;

    /// Descriptor for the named field.
    fn descriptor(field: &str) -> Option<&'static FieldDescriptor> {
        Self::fields().iter().find(|d| d.name == field)
    }
}

impl<R: Record> Record for &R {
    fn fields() -> &'static [FieldDescriptor] {
        R::fields()
    }

    fn value(&self, field: &str) -> Option<FieldValue> {
        (**self).value(field)
    }
}
