//! Price feed types

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single decoded quote from the upstream streamer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Instrument identifier (e.g., "AAPL", "BTC-USD")
    pub symbol: String,
    /// Last traded price
    pub price: Decimal,
    /// Day volume, zero when the venue does not report one
    pub volume: u64,
    /// Signed percentage change versus previous close
    pub change_percent: Decimal,
    /// Quote time in epoch milliseconds
    pub timestamp_ms: i64,
}

impl Tick {
    /// Quote time as a UTC datetime
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp_ms).single()
    }
}

/// Connection state of the feed client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Subscribed,
    ErrorBackoff,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Subscribed => "subscribed",
            ConnectionState::ErrorBackoff => "error-backoff",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_tick_timestamp() {
        let tick = Tick {
            symbol: "NVDA".to_string(),
            price: dec!(179.99),
            volume: 0,
            change_percent: dec!(-2.06),
            timestamp_ms: 1_765_438_790_000,
        };
        let ts = tick.timestamp().unwrap();
        assert_eq!(ts.timestamp_millis(), 1_765_438_790_000);
    }

    #[test]
    fn test_tick_serializes_snake_case() {
        let tick = Tick {
            symbol: "AAPL".to_string(),
            price: dec!(190.5),
            volume: 10,
            change_percent: dec!(1.25),
            timestamp_ms: 1,
        };
        let json = serde_json::to_value(&tick).unwrap();
        assert_eq!(json["symbol"], "AAPL");
        assert_eq!(json["change_percent"], "1.25");
        assert_eq!(json["timestamp_ms"], 1);
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::ErrorBackoff.to_string(), "error-backoff");
        assert_eq!(ConnectionState::Subscribed.to_string(), "subscribed");
    }
}
