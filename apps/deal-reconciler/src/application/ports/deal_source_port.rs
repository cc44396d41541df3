//! Historical Deal Source Port (Driven Port)
//!
//! Interface for fetching a batch of executed deals for one account.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::deal::DealRecord;

// =============================================================================
// Date Range
// =============================================================================

/// Inclusive time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedRange")]
pub struct DateRange {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

/// Wire shape of [`DateRange`] before the bounds check.
#[derive(Deserialize)]
struct UncheckedRange {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

impl TryFrom<UncheckedRange> for DateRange {
    type Error = FetchError;

    fn try_from(raw: UncheckedRange) -> Result<Self, Self::Error> {
        Self::new(raw.from, raw.to)
    }
}

impl DateRange {
    /// Create a range, rejecting `from > to`.
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self, FetchError> {
        if from > to {
            return Err(FetchError::InvalidQuery(format!(
                "date range starts after it ends: {from} > {to}"
            )));
        }
        Ok(Self { from, to })
    }

    /// Start of the window.
    #[must_use]
    pub const fn from(&self) -> DateTime<Utc> {
        self.from
    }

    /// End of the window.
    #[must_use]
    pub const fn to(&self) -> DateTime<Utc> {
        self.to
    }

    /// Whether `at` falls inside the window.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from <= at && at <= self.to
    }
}

/// Named date windows offered next to a custom range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePreset {
    /// The last 24 hours.
    Last24h,
    /// The last 7 days.
    Last7d,
    /// The last 30 days.
    Last30d,
    /// Since the first day of the current month.
    ThisMonth,
    /// The whole previous calendar month.
    LastMonth,
}

impl DatePreset {
    /// Resolve against a reference instant.
    #[must_use]
    pub fn resolve(self, now: DateTime<Utc>) -> DateRange {
        let (from, to) = match self {
            Self::Last24h => (now - Duration::hours(24), now),
            Self::Last7d => (now - Duration::days(7), now),
            Self::Last30d => (now - Duration::days(30), now),
            Self::ThisMonth => (month_start(now.year(), now.month()), now),
            Self::LastMonth => {
                let this_month = month_start(now.year(), now.month());
                let (year, month) = if now.month() == 1 {
                    (now.year() - 1, 12)
                } else {
                    (now.year(), now.month() - 1)
                };
                (month_start(year, month), this_month - Duration::seconds(1))
            }
        };
        DateRange { from, to }
    }
}

fn month_start(year: i32, month: u32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map_or(DateTime::<Utc>::MIN_UTC, |naive| Utc.from_utc_datetime(&naive))
}

// =============================================================================
// Query
// =============================================================================

/// Which narrowing a deal query applies; exactly one per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DealFilterMode {
    /// Specific deal tickets.
    Tickets(Vec<u64>),
    /// Accounts restricted to symbols.
    LoginsWithSymbols {
        /// Account numbers.
        logins: Vec<u64>,
        /// Symbols.
        symbols: Vec<String>,
    },
    /// Whole accounts.
    Logins(Vec<u64>),
    /// Groups restricted to symbols.
    GroupsWithSymbols {
        /// Group masks.
        groups: Vec<String>,
        /// Symbols.
        symbols: Vec<String>,
    },
    /// Whole groups; `*` is every group.
    Groups(Vec<String>),
}

/// Historical deal request for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealQuery {
    /// Deal tickets.
    #[serde(default)]
    pub tickets: Vec<u64>,
    /// Account numbers.
    #[serde(default)]
    pub logins: Vec<u64>,
    /// Group masks.
    #[serde(default)]
    pub groups: Vec<String>,
    /// Symbols.
    #[serde(default)]
    pub symbols: Vec<String>,
    /// Time window.
    pub range: DateRange,
}

impl DealQuery {
    /// Every deal of every group in `range`.
    #[must_use]
    pub const fn all(range: DateRange) -> Self {
        Self {
            tickets: Vec::new(),
            logins: Vec::new(),
            groups: Vec::new(),
            symbols: Vec::new(),
            range,
        }
    }

    /// Active filter mode: tickets, then logins (with or without symbols),
    /// then groups (with or without symbols).
    #[must_use]
    pub fn mode(&self) -> DealFilterMode {
        if !self.tickets.is_empty() {
            return DealFilterMode::Tickets(self.tickets.clone());
        }
        if !self.logins.is_empty() {
            if self.symbols.is_empty() {
                return DealFilterMode::Logins(self.logins.clone());
            }
            return DealFilterMode::LoginsWithSymbols {
                logins: self.logins.clone(),
                symbols: self.symbols.clone(),
            };
        }
        let groups = if self.groups.is_empty() {
            vec!["*".to_string()]
        } else {
            self.groups.clone()
        };
        if self.symbols.is_empty() {
            DealFilterMode::Groups(groups)
        } else {
            DealFilterMode::GroupsWithSymbols {
                groups,
                symbols: self.symbols.clone(),
            }
        }
    }

    /// Whether `deal` satisfies the active mode and the date range.
    ///
    /// Used by sources whose remote side only narrows by date. Group
    /// membership cannot be checked locally and always passes.
    #[must_use]
    pub fn matches(&self, deal: &DealRecord) -> bool {
        if !self.range.contains(deal.timestamp) {
            return false;
        }
        let symbol_ok = |symbols: &[String]| symbols.iter().any(|s| *s == deal.symbol);
        match self.mode() {
            DealFilterMode::Tickets(tickets) => tickets.contains(&deal.ticket),
            DealFilterMode::LoginsWithSymbols { logins, symbols } => {
                logins.contains(&deal.login) && symbol_ok(&symbols)
            }
            DealFilterMode::Logins(logins) => logins.contains(&deal.login),
            DealFilterMode::GroupsWithSymbols { symbols, .. } => symbol_ok(&symbols),
            DealFilterMode::Groups(_) => true,
        }
    }
}

// =============================================================================
// Port
// =============================================================================

/// Deal source error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The request never produced a response.
    #[error("request to {endpoint} failed: {message}")]
    Transport {
        /// Endpoint requested.
        endpoint: String,
        /// Error details.
        message: String,
    },

    /// Non-success HTTP status.
    #[error("{endpoint} returned status {status}")]
    Status {
        /// Endpoint requested.
        endpoint: String,
        /// HTTP status code.
        status: u16,
    },

    /// The response body could not be decoded.
    #[error("could not decode response from {endpoint}: {message}")]
    Decode {
        /// Endpoint requested.
        endpoint: String,
        /// Error details.
        message: String,
    },

    /// The request itself is invalid.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

/// Port for historical deal batches.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DealSourcePort: Send + Sync {
    /// Fetch normalized deals for `account_id`. Malformed records are dropped
    /// by the adapter, never surfaced as an error.
    async fn fetch_deals(
        &self,
        account_id: &str,
        query: &DealQuery,
    ) -> Result<Vec<DealRecord>, FetchError>;
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::domain::deal::fixtures::deal;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    fn range() -> DateRange {
        DateRange::new(at(2000, 1, 1, 0, 0, 0), at(2100, 1, 1, 0, 0, 0)).unwrap()
    }

    #[test]
    fn test_range_rejects_inverted_bounds() {
        let result = DateRange::new(at(2024, 2, 1, 0, 0, 0), at(2024, 1, 1, 0, 0, 0));
        assert!(matches!(result, Err(FetchError::InvalidQuery(_))));
    }

    #[test]
    fn test_deserialized_range_is_checked() {
        let ok: DateRange = serde_json::from_str(
            r#"{"from":"2024-01-01T00:00:00Z","to":"2024-02-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(ok.to(), at(2024, 2, 1, 0, 0, 0));

        let inverted = serde_json::from_str::<DateRange>(
            r#"{"from":"2024-02-01T00:00:00Z","to":"2024-01-01T00:00:00Z"}"#,
        );
        assert!(inverted.unwrap_err().to_string().contains("starts after it ends"));
    }

    #[test]
    fn test_last_month_covers_whole_previous_month() {
        let range = DatePreset::LastMonth.resolve(at(2024, 3, 15, 10, 30, 0));
        assert_eq!(range.from(), at(2024, 2, 1, 0, 0, 0));
        assert_eq!(range.to(), at(2024, 2, 29, 23, 59, 59));
    }

    #[test]
    fn test_last_month_wraps_year() {
        let range = DatePreset::LastMonth.resolve(at(2024, 1, 5, 0, 0, 0));
        assert_eq!(range.from(), at(2023, 12, 1, 0, 0, 0));
        assert_eq!(range.to(), at(2023, 12, 31, 23, 59, 59));
    }

    #[test]
    fn test_rolling_presets_end_now() {
        let now = at(2024, 3, 15, 10, 30, 0);
        assert_eq!(DatePreset::Last24h.resolve(now).from(), at(2024, 3, 14, 10, 30, 0));
        assert_eq!(DatePreset::Last7d.resolve(now).from(), at(2024, 3, 8, 10, 30, 0));
        assert_eq!(DatePreset::Last30d.resolve(now).to(), now);
        assert_eq!(DatePreset::ThisMonth.resolve(now).from(), at(2024, 3, 1, 0, 0, 0));
    }

    #[test]
    fn test_mode_priority() {
        let mut query = DealQuery::all(range());
        assert_eq!(query.mode(), DealFilterMode::Groups(vec!["*".into()]));

        query.symbols = vec!["EURUSD".into()];
        query.groups = vec!["real\\*".into()];
        assert!(matches!(query.mode(), DealFilterMode::GroupsWithSymbols { .. }));

        query.logins = vec![5001];
        assert!(matches!(query.mode(), DealFilterMode::LoginsWithSymbols { .. }));

        query.symbols.clear();
        assert_eq!(query.mode(), DealFilterMode::Logins(vec![5001]));

        query.tickets = vec![7];
        assert_eq!(query.mode(), DealFilterMode::Tickets(vec![7]));
    }

    #[test]
    fn test_matches_applies_active_mode_only() {
        let d = deal(7, "EURUSD", dec!(1), dec!(1));

        let mut query = DealQuery::all(range());
        query.tickets = vec![7];
        query.symbols = vec!["GBPUSD".into()];
        assert!(query.matches(&d));

        query.tickets.clear();
        assert!(!query.matches(&d));

        query.symbols.clear();
        query.logins = vec![5001];
        assert!(query.matches(&d));
    }

    #[test]
    fn test_matches_checks_range() {
        let d = deal(7, "EURUSD", dec!(1), dec!(1));
        let query = DealQuery::all(
            DateRange::new(at(2024, 1, 1, 0, 0, 0), at(2024, 1, 2, 0, 0, 0)).unwrap(),
        );
        assert!(!query.matches(&d));
    }
}
