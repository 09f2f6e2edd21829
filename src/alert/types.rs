//! Alert types

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Kind of alert raised by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    PriceDrop,
}

/// A price-drop alert derived from a tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub symbol: String,
    pub price: Decimal,
    pub change_percent: Decimal,
    pub timestamp_ms: i64,
    /// Human-readable summary, e.g. "Alert: AAPL dropped -6.20%"
    pub message: String,
}

/// Round to two decimals for display; `{:.2}` on a Decimal truncates
pub(crate) fn two_places(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

impl Alert {
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp_ms).single()
    }
}
