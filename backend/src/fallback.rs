//! Deterministic fallback prices, served when the simulator fails.

use crate::{
    error::{CommodityError, Result},
    price_simulator::SnapshotGenerator,
    types::{Snapshot, SnapshotSource},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

const VARIATION_PERIOD_MS: f64 = 3_600_000.0;
const VARIATION_AMPLITUDE: f64 = 2.0;

/// Tag stamped on every fallback quote
pub const FALLBACK_QUOTE_SOURCE: &str = "fallback";

/// Shared oscillation applied to all commodities at `now`.
///
/// `sin(now_ms / 3_600_000) × 2`, so it stays in `[-2, 2]`.
pub fn fallback_variation(now: DateTime<Utc>) -> f64 {
    (now.timestamp_millis() as f64 / VARIATION_PERIOD_MS).sin() * VARIATION_AMPLITUDE
}

/// Sine-based price model with no randomness and no I/O
#[derive(Debug, Default, Clone, Copy)]
pub struct FallbackModel;

impl FallbackModel {
    pub fn snapshot(&self, now: DateTime<Utc>) -> Result<Snapshot> {
        let variation = fallback_variation(now);

        Snapshot::build(now, SnapshotSource::Fallback, FALLBACK_QUOTE_SOURCE, |key| {
            variation * key.spec().fallback_multiplier
        })
        .map_err(|e| CommodityError::Fallback(e.to_string()))
    }
}

#[async_trait]
impl SnapshotGenerator for FallbackModel {
    async fn generate(&self, now: DateTime<Utc>) -> Result<Snapshot> {
        self.snapshot(now)
    }
}
