//! Wire decoder for streamer frames
//!
//! Each upstream frame is a base64 string wrapping a protobuf `PricingData`
//! message. Decoding is pure and never panics on malformed input.

use super::Tick;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use prost::Message;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;

/// Streamer pricing message (subset of the fields we consume)
#[derive(Clone, PartialEq, Message)]
pub struct PricingData {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(float, tag = "2")]
    pub price: f32,
    /// Epoch milliseconds
    #[prost(sint64, tag = "3")]
    pub time: i64,
    #[prost(string, tag = "4")]
    pub currency: String,
    #[prost(string, tag = "5")]
    pub exchange: String,
    #[prost(int32, tag = "6")]
    pub quote_type: i32,
    #[prost(int32, tag = "7")]
    pub market_hours: i32,
    #[prost(float, tag = "8")]
    pub change_percent: f32,
    #[prost(sint64, tag = "9")]
    pub day_volume: i64,
    #[prost(float, tag = "12")]
    pub change: f32,
    /// Number of significant decimals for `price`
    #[prost(sint64, tag = "27")]
    pub price_hint: i64,
}

/// Frame decoding failures
#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("invalid base64 payload: {0}")]
    Base64(String),
    #[error("invalid protobuf payload: {0}")]
    Protobuf(String),
    #[error("frame has no symbol")]
    MissingSymbol,
    #[error("invalid price for {symbol}: {value}")]
    InvalidPrice { symbol: String, value: f32 },
}

/// Decode one text frame into a [`Tick`]
pub fn decode_frame(frame: &str) -> Result<Tick, DecodeError> {
    let bytes = STANDARD
        .decode(frame.trim())
        .map_err(|e| DecodeError::Base64(e.to_string()))?;
    let data = PricingData::decode(bytes.as_slice())
        .map_err(|e| DecodeError::Protobuf(e.to_string()))?;
    to_tick(data)
}

/// Encode a pricing message the way the streamer does
pub fn encode_frame(data: &PricingData) -> String {
    STANDARD.encode(data.encode_to_vec())
}

fn to_tick(data: PricingData) -> Result<Tick, DecodeError> {
    if data.id.is_empty() {
        return Err(DecodeError::MissingSymbol);
    }

    let price = match Decimal::from_f32(data.price) {
        Some(p) if !p.is_sign_negative() => p,
        _ => {
            return Err(DecodeError::InvalidPrice {
                symbol: data.id,
                value: data.price,
            })
        }
    };
    let price = if data.price_hint > 0 {
        price.round_dp(data.price_hint.min(28) as u32)
    } else {
        price
    };

    // Non-finite change is treated as "no change reported"
    let change_percent = Decimal::from_f32(data.change_percent).unwrap_or(Decimal::ZERO);

    let timestamp_ms = if data.time > 0 {
        data.time
    } else {
        Utc::now().timestamp_millis()
    };

    Ok(Tick {
        symbol: data.id,
        price,
        volume: data.day_volume.max(0) as u64,
        change_percent,
        timestamp_ms,
    })
}
