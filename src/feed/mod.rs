//! Price feed module
//!
//! Decodes streamer frames into ticks and keeps the upstream subscription
//! alive

mod client;
mod decoder;
mod types;

pub use client::{BackoffPolicy, FeedClient, FeedClientConfig};
pub use decoder::{decode_frame, encode_frame, DecodeError, PricingData};
pub use types::{ConnectionState, Tick};
