//! Commodity price service: a cached, always-available snapshot of nine
//! commodity quotes served over HTTP.

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod fallback;
pub mod price_simulator;
pub mod types;
