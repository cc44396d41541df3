//! Payload normalizer.
//!
//! Converts raw JSON deal payloads from either feed into [`DealRecord`]s.
//!
//! # Field Layout
//!
//! | Record field | Manager payload     | Terminal payload    |
//! |--------------|---------------------|---------------------|
//! | `ticket`     | `ticket`            | `ticket`            |
//! | `order_id`   | `order`             | `order`             |
//! | `login`      | `login` (required)  | `login` (optional)  |
//! | `action`     | `action`            | `type`              |
//! | `swap`       | `storage` / `swap`  | `swap` / `storage`  |
//! | `timestamp`  | `time_msc` / `time` | `time_msc` / `time` |
//!
//! `ticket`, `symbol`, `volume`, `profit` and one of the time fields are
//! required. Numbers may arrive as JSON numbers or numeric strings; decimal
//! amounts are parsed from their textual form so no binary float rounding
//! leaks into the totals. An unknown action never fails a record.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde_json::{Map, Value};

use super::{DealAction, DealRecord, DealSource};

const MILLIS_PER_SECOND: Decimal = dec!(1000);

/// Normalization failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    /// A required field is missing or has the wrong type.
    #[error("malformed {feed} deal record: {reason}")]
    MalformedRecord {
        /// Feed the payload came from.
        feed: DealSource,
        /// What was wrong with it.
        reason: String,
    },

    /// A feed message is not a deal batch.
    #[error("malformed deal message: {0}")]
    MalformedMessage(String),
}

/// Result of normalizing a batch of raw payloads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedBatch {
    /// Records that normalized cleanly, in input order.
    pub records: Vec<DealRecord>,
    /// Number of payloads dropped as malformed.
    pub dropped: usize,
}

struct Layout {
    action: &'static str,
    swap: [&'static str; 2],
    login_required: bool,
}

const fn layout(source: DealSource) -> Layout {
    match source {
        DealSource::Manager => Layout {
            action: "action",
            swap: ["storage", "swap"],
            login_required: true,
        },
        DealSource::Terminal => Layout {
            action: "type",
            swap: ["swap", "storage"],
            login_required: false,
        },
    }
}

/// Normalize one raw payload.
pub fn normalize(raw: &Value, source: DealSource) -> Result<DealRecord, NormalizeError> {
    let malformed = |reason: String| NormalizeError::MalformedRecord {
        feed: source,
        reason,
    };
    let obj = raw
        .as_object()
        .ok_or_else(|| malformed("payload is not a JSON object".to_string()))?;
    let layout = layout(source);

    let ticket = required(obj, "ticket", coerce_u64).map_err(malformed)?;
    let order_id = optional(obj, "order", coerce_u64).map_err(malformed)?;
    let login = if layout.login_required {
        required(obj, "login", coerce_u64).map_err(malformed)?
    } else {
        optional(obj, "login", coerce_u64).map_err(malformed)?
    };
    let symbol = required(obj, "symbol", coerce_string).map_err(malformed)?;
    let volume = required(obj, "volume", coerce_decimal).map_err(malformed)?;
    let profit = required(obj, "profit", coerce_decimal).map_err(malformed)?;
    let commission = optional(obj, "commission", coerce_decimal).map_err(malformed)?;
    let swap = match layout.swap.iter().find(|key| present(obj, key).is_some()) {
        Some(key) => optional(obj, key, coerce_decimal).map_err(malformed)?,
        None => Decimal::ZERO,
    };
    let action = present(obj, layout.action).map_or(DealAction::Other, coerce_action);
    let timestamp = resolve_timestamp(obj).map_err(malformed)?;

    Ok(DealRecord {
        ticket,
        order_id,
        login,
        symbol,
        action,
        volume,
        profit,
        commission,
        swap,
        timestamp,
    })
}

/// Normalize every payload, dropping (and logging) the malformed ones.
pub fn normalize_batch(raws: &[Value], source: DealSource) -> NormalizedBatch {
    let mut batch = NormalizedBatch {
        records: Vec::with_capacity(raws.len()),
        dropped: 0,
    };
    for raw in raws {
        match normalize(raw, source) {
            Ok(record) => batch.records.push(record),
            Err(e) => {
                tracing::warn!(error = %e, feed = %source, "Dropping malformed deal record");
                batch.dropped += 1;
            }
        }
    }
    batch
}

/// Extract the raw deal payloads from a feed message.
///
/// Accepts `{"deals": [...]}` envelopes and bare arrays. An envelope without
/// a `deals` key is an empty batch.
pub fn parse_deal_message(text: &str) -> Result<Vec<Value>, NormalizeError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| NormalizeError::MalformedMessage(e.to_string()))?;
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut obj) => match obj.remove("deals") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items),
            Some(_) => Err(NormalizeError::MalformedMessage(
                "`deals` is not an array".to_string(),
            )),
        },
        _ => Err(NormalizeError::MalformedMessage(
            "expected an object or an array".to_string(),
        )),
    }
}

// =============================================================================
// Field Coercion
// =============================================================================

fn present<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| !v.is_null())
}

fn required<T>(
    obj: &Map<String, Value>,
    key: &str,
    coerce: fn(&Value) -> Option<T>,
) -> Result<T, String> {
    let value = present(obj, key).ok_or_else(|| format!("missing `{key}`"))?;
    coerce(value).ok_or_else(|| format!("`{key}` has an invalid value: {value}"))
}

fn optional<T: Default>(
    obj: &Map<String, Value>,
    key: &str,
    coerce: fn(&Value) -> Option<T>,
) -> Result<T, String> {
    present(obj, key).map_or_else(
        || Ok(T::default()),
        |value| coerce(value).ok_or_else(|| format!("`{key}` has an invalid value: {value}")),
    )
}

fn coerce_decimal(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

fn coerce_u64(value: &Value) -> Option<u64> {
    if let Value::Number(n) = value
        && let Some(v) = n.as_u64()
    {
        return Some(v);
    }
    let decimal = coerce_decimal(value)?;
    if decimal.fract().is_zero() {
        decimal.to_u64()
    } else {
        None
    }
}

fn coerce_string(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn coerce_action(value: &Value) -> DealAction {
    match value {
        Value::Number(n) => n.as_i64().map_or(DealAction::Other, DealAction::from_code),
        Value::String(s) => DealAction::parse(s),
        _ => DealAction::Other,
    }
}

fn resolve_timestamp(obj: &Map<String, Value>) -> Result<DateTime<Utc>, String> {
    if let Some(value) = present(obj, "time_msc") {
        let millis = coerce_decimal(value)
            .and_then(|d| d.trunc().to_i64())
            .ok_or_else(|| format!("`time_msc` has an invalid value: {value}"))?;
        return DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| format!("`time_msc` is out of range: {millis}"));
    }

    let value = present(obj, "time").ok_or_else(|| "missing `time_msc` and `time`".to_string())?;
    if let Some(seconds) = coerce_decimal(value) {
        let millis = seconds
            .checked_mul(MILLIS_PER_SECOND)
            .and_then(|ms| ms.trunc().to_i64())
            .ok_or_else(|| format!("`time` is out of range: {value}"))?;
        return DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| format!("`time` is out of range: {value}"));
    }
    value
        .as_str()
        .and_then(parse_datetime)
        .ok_or_else(|| format!("`time` has an invalid value: {value}"))
}

/// Parse RFC 3339, or a naive ISO-8601 timestamp taken as UTC.
fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|naive| naive.and_utc())
        })
}
