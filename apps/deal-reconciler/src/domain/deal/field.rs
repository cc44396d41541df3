//! Named fields of a [`DealRecord`].

use std::fmt;
use std::str::FromStr;

use super::DealRecord;
use crate::domain::fields::{FieldDescriptor, FieldKind, FieldValue, Record};

/// Fields a deal can be grouped, filtered or sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DealField {
    /// `ticket`
    Ticket,
    /// `order_id`
    OrderId,
    /// `login`
    Login,
    /// `symbol`
    Symbol,
    /// `action`
    Action,
    /// `volume`
    Volume,
    /// `profit`
    Profit,
    /// `commission`
    Commission,
    /// `swap`
    Swap,
    /// `timestamp`
    Timestamp,
}

static DEAL_FIELDS: [FieldDescriptor; 10] = [
    FieldDescriptor::new("ticket", "Ticket", FieldKind::Integer),
    FieldDescriptor::new("order_id", "Order", FieldKind::Integer),
    FieldDescriptor::new("login", "Login", FieldKind::Integer),
    FieldDescriptor::new("symbol", "Symbol", FieldKind::Text),
    FieldDescriptor::new("action", "Action", FieldKind::Enum),
    FieldDescriptor::new("volume", "Volume", FieldKind::Numeric),
    FieldDescriptor::new("profit", "Profit", FieldKind::Numeric),
    FieldDescriptor::new("commission", "Commission", FieldKind::Numeric),
    FieldDescriptor::new("swap", "Swap", FieldKind::Numeric),
    FieldDescriptor::new("timestamp", "Time", FieldKind::Timestamp),
];

impl DealField {
    /// Every field, in display order.
    pub const ALL: [Self; 10] = [
        Self::Ticket,
        Self::OrderId,
        Self::Login,
        Self::Symbol,
        Self::Action,
        Self::Volume,
        Self::Profit,
        Self::Commission,
        Self::Swap,
        Self::Timestamp,
    ];

    /// Machine name.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    /// Registry entry.
    #[must_use]
    pub fn descriptor(self) -> &'static FieldDescriptor {
        &DEAL_FIELDS[self as usize]
    }

    /// Read this field from a deal.
    #[must_use]
    pub fn value(self, deal: &DealRecord) -> FieldValue {
        match self {
            Self::Ticket => FieldValue::Integer(deal.ticket),
            Self::OrderId => FieldValue::Integer(deal.order_id),
            Self::Login => FieldValue::Integer(deal.login),
            Self::Symbol => FieldValue::Text(deal.symbol.clone()),
            Self::Action => FieldValue::Enum(deal.action.as_str()),
            Self::Volume => FieldValue::Numeric(deal.volume),
            Self::Profit => FieldValue::Numeric(deal.profit),
            Self::Commission => FieldValue::Numeric(deal.commission),
            Self::Swap => FieldValue::Numeric(deal.swap),
            Self::Timestamp => FieldValue::Timestamp(deal.timestamp),
        }
    }
}

impl fmt::Display for DealField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unknown field name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown deal field: {0}")]
pub struct UnknownDealField(pub String);

impl FromStr for DealField {
    type Err = UnknownDealField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "order" | "orderId" => Ok(Self::OrderId),
            "time" => Ok(Self::Timestamp),
            _ => Self::ALL
                .into_iter()
                .find(|field| field.name() == s)
                .ok_or_else(|| UnknownDealField(s.to_string())),
        }
    }
}

impl Record for DealRecord {
    fn fields() -> &'static [FieldDescriptor] {
        &DEAL_FIELDS
    }

    fn value(&self, field: &str) -> Option<FieldValue> {
        field.parse::<DealField>().ok().map(|f| f.value(self))
    }
}
