//! Market Simulator
//!
//! Primary generator for the commodity snapshot. There is no upstream price
//! feed yet, so quotes are synthesized around each commodity's base price with
//! a random swing whose size depends on which trading sessions are open.
//!
//! # Architecture
//! ```text
//! UTC hour → session table → volatility (0.5x .. 1.2x)
//!                                ↓
//! RNG → uniform[-max, +max] × volatility → base + delta → CommodityQuote
//! ```
//!
//! A future real data source plugs in by implementing [`SnapshotGenerator`].

use crate::{
    error::Result,
    types::{Snapshot, SnapshotSource},
};
use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use rand::{Rng, RngCore, SeedableRng, rngs::StdRng};
use std::ops::RangeInclusive;
use tokio::sync::Mutex;
use tracing::debug;

/// Anything that can produce a full snapshot for a given instant.
#[async_trait]
pub trait SnapshotGenerator: Send + Sync {
    async fn generate(&self, now: DateTime<Utc>) -> Result<Snapshot>;
}

/// Volatility when no session window matches
pub const BASE_VOLATILITY: f64 = 0.5;

/// A trading session window in UTC hours (inclusive)
#[derive(Debug)]
pub struct TradingSession {
    pub name: &'static str,
    pub hours: RangeInclusive<u32>,
    pub volatility: f64,
}

/// Session windows in evaluation order.
///
/// Windows overlap. The last matching entry wins, so hour 8 is European
/// (not Asian) and hours 14-16 are American (not European).
pub static SESSIONS: [TradingSession; 3] = [
    TradingSession {
        name: "asia",
        hours: 0..=8,
        volatility: 0.8,
    },
    TradingSession {
        name: "europe",
        hours: 8..=16,
        volatility: 1.0,
    },
    TradingSession {
        name: "america",
        hours: 14..=21,
        volatility: 1.2,
    },
];

/// Volatility multiplier for a UTC hour
///
/// # Example
/// ```text
/// hour 3  → asia             → 0.8
/// hour 8  → asia, europe     → 1.0 (europe checked later)
/// hour 15 → europe, america  → 1.2
/// hour 23 → none             → 0.5
/// ```
pub fn volatility_for_hour(hour: u32) -> f64 {
    session_for_hour(hour)
        .map(|session| session.volatility)
        .unwrap_or(BASE_VOLATILITY)
}

/// Session that sets the volatility for `hour`, if any
pub fn session_for_hour(hour: u32) -> Option<&'static TradingSession> {
    SESSIONS
        .iter()
        .rev()
        .find(|session| session.hours.contains(&hour))
}

/// Volatility-aware random price model
pub struct MarketSimulator<R = StdRng> {
    rng: Mutex<R>,
}

impl MarketSimulator<StdRng> {
    /// Simulator backed by OS entropy
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Reproducible simulator, same seed gives the same price sequence
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: RngCore + Send> MarketSimulator<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng: Mutex::new(rng),
        }
    }
}

#[async_trait]
impl<R: RngCore + Send> SnapshotGenerator for MarketSimulator<R> {
    /// Generate a snapshot for `now`
    ///
    /// # Algorithm
    /// 1. Pick the volatility multiplier from `now`'s UTC hour
    /// 2. For each commodity draw `uniform[-max_change, +max_change]`
    /// 3. Scale it by the volatility and add it to the base price
    /// 4. Stamp every quote and the snapshot with `now`
    async fn generate(&self, now: DateTime<Utc>) -> Result<Snapshot> {
        let volatility = volatility_for_hour(now.hour());
        let source = SnapshotSource::Simulation { volatility };
        let label = source.to_string();

        let mut rng = self.rng.lock().await;
        let snapshot = Snapshot::build(now, source, &label, |key| {
            let max = key.spec().max_change;
            rng.gen_range(-max..=max) * volatility
        })?;

        debug!(
            "Simulated snapshot at {} ({}, session: {})",
            now,
            label,
            session_for_hour(now.hour()).map_or("off-hours", |s| s.name)
        );
        Ok(snapshot)
    }
}
