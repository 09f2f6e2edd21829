//! Live fan-out to subscribers
//!
//! Raw ticks and alerts are serialized once and pushed to every connected
//! WebSocket client through per-subscriber bounded buffers.

mod hub;
mod server;

pub use hub::{FanoutHub, Subscription, DEFAULT_SUBSCRIBER_BUFFER};
pub use server::{router, serve, HealthResponse, ServerState};

use crate::alert::Alert;
use crate::feed::Tick;
use serde::Serialize;

/// Event shapes pushed to subscribers:
/// `{"type":"price_update","data":{..}}` and `{"type":"alert","data":{..}}`
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum FeedEvent {
    PriceUpdate(Tick),
    Alert(Alert),
}
