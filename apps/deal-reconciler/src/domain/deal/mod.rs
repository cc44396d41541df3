//! Deal records.
//!
//! A [`DealRecord`] is the canonical, immutable form of one executed trade
//! event, whichever feed reported it. Raw payloads are turned into records
//! by the [`normalizer`]; live records are kept in a [`StreamWindow`].

mod field;
pub mod normalizer;
mod window;

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

pub use field::{DealField, UnknownDealField};
pub use normalizer::{NormalizeError, NormalizedBatch, normalize, normalize_batch};
pub use window::{STREAM_WINDOW_CAPACITY, StreamWindow};

/// Divisor that converts manager-feed volume units into lots.
pub const MANAGER_VOLUME_DIVISOR: Decimal = dec!(10000);

// =============================================================================
// Source
// =============================================================================

/// Which feed a raw payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DealSource {
    /// Trade-server manager administration feed.
    Manager,
    /// End-user trading terminal feed.
    Terminal,
}

impl DealSource {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manager => "manager",
            Self::Terminal => "terminal",
        }
    }
}

impl fmt::Display for DealSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Action
// =============================================================================

/// Kind of trade event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DealAction {
    /// Buy deal.
    Buy,
    /// Sell deal.
    Sell,
    /// Balance operation (deposit, withdrawal, correction).
    Balance,
    /// Anything the platforms report that is not one of the above.
    Other,
}

impl DealAction {
    /// Map a platform numeric deal type.
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Buy,
            1 => Self::Sell,
            2 => Self::Balance,
            _ => Self::Other,
        }
    }

    /// Lenient parse: names are case-insensitive, numeric strings are treated
    /// as codes, everything else is [`DealAction::Other`].
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if let Ok(code) = trimmed.parse::<i64>() {
            return Self::from_code(code);
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "buy" => Self::Buy,
            "sell" => Self::Sell,
            "balance" => Self::Balance,
            _ => Self::Other,
        }
    }

    /// Display name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "Buy",
            Self::Sell => "Sell",
            Self::Balance => "Balance",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for DealAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Record
// =============================================================================

/// One executed trade event.
///
/// `ticket` is unique per source and account only. `volume` is in the
/// source's native unit; manager volumes must be divided by
/// [`MANAGER_VOLUME_DIVISOR`] before they are compared with terminal volumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealRecord {
    /// Deal ticket.
    pub ticket: u64,
    /// Order that produced the deal.
    pub order_id: u64,
    /// Trading account number.
    pub login: u64,
    /// Source-native instrument name.
    pub symbol: String,
    /// Deal kind.
    pub action: DealAction,
    /// Volume in source-native units.
    pub volume: Decimal,
    /// Realized profit.
    pub profit: Decimal,
    /// Commission charged.
    pub commission: Decimal,
    /// Swap (storage) charged.
    pub swap: Decimal,
    /// Execution time.
    pub timestamp: DateTime<Utc>,
}

impl DealRecord {
    /// Copy of this record with its volume divided by `divisor`.
    ///
    /// A zero divisor leaves the volume untouched.
    #[must_use]
    pub fn with_volume_scaled(&self, divisor: Decimal) -> Self {
        let mut scaled = self.clone();
        if !divisor.is_zero() {
            scaled.volume = self.volume / divisor;
        }
        scaled
    }
}

/// Divide the volume of every record by `divisor`.
#[must_use]
pub fn scale_volumes(deals: &[DealRecord], divisor: Decimal) -> Vec<DealRecord> {
    deals
        .iter()
        .map(|deal| deal.with_volume_scaled(divisor))
        .collect()
}
