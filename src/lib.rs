//! breadboard: real-time market tick ingestion
//!
//! This library provides the core components for:
//! - Decoding streamer frames (base64 protobuf) into ticks
//! - A reconnecting upstream feed client
//! - A bounded ingestion queue that drops on overload
//! - Batched persistence with size and time flush triggers
//! - Price-drop alerts with typed listeners
//! - Live fan-out of ticks and alerts over WebSocket
//! - Scheduled historical OHLCV fetches
//! - Parquet storage and a structured logging / metrics stack

pub mod alert;
pub mod cli;
pub mod config;
pub mod data;
pub mod fanout;
pub mod feed;
pub mod history;
pub mod pipeline;
pub mod telemetry;
pub mod ws;
