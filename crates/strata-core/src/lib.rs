//! Strata Core - Shared timing types
//!
//! This crate provides the per-tick timing payload consumed by the ECS and
//! the ticker that produces it.

pub mod time;

pub use time::{TickInfo, Ticker, TickerConfig};
