use crate::error::{CommodityError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// The nine commodities served by the endpoint.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CommodityKey {
    Gold,
    Silver,
    Platinum,
    Copper,
    OilBrent,
    OilWti,
    Cotton,
    Coffee,
    Cocoa,
}

/// Quotation unit as shown to readers
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum Unit {
    #[serde(rename = "once troy")]
    TroyOunce,
    #[serde(rename = "USD/livre")]
    UsdPerPound,
    #[serde(rename = "USD/baril")]
    UsdPerBarrel,
    #[serde(rename = "cents/livre")]
    CentsPerPound,
    #[serde(rename = "USD/tonne")]
    UsdPerTonne,
}

impl Unit {
    /// Decimal places used for `price` and `change`.
    pub fn decimals(self) -> u32 {
        match self {
            Unit::UsdPerPound => 3,
            _ => 2,
        }
    }
}

/// Static reference data for one commodity
#[derive(Debug)]
pub struct CommoditySpec {
    pub name: &'static str,
    pub symbol: &'static str,
    pub unit: Unit,
    pub description: &'static str,
    /// Reference price both generators move around
    pub base_price: f64,
    /// Largest absolute move the simulator draws before volatility scaling
    pub max_change: f64,
    /// Scale applied to the shared fallback variation
    pub fallback_multiplier: f64,
}

const GOLD: CommoditySpec = CommoditySpec {
    name: "Or",
    symbol: "XAU/USD",
    unit: Unit::TroyOunce,
    description: "Prix de l'once d'or sur le marché international",
    base_price: 2650.0,
    max_change: 25.0,
    fallback_multiplier: 10.0,
};

const SILVER: CommoditySpec = CommoditySpec {
    name: "Argent",
    symbol: "XAG/USD",
    unit: Unit::TroyOunce,
    description: "Prix de l'once d'argent sur le marché international",
    base_price: 31.0,
    max_change: 0.8,
    fallback_multiplier: 0.3,
};

const PLATINUM: CommoditySpec = CommoditySpec {
    name: "Platine",
    symbol: "XPT/USD",
    unit: Unit::TroyOunce,
    description: "Prix de l'once de platine sur le marché international",
    base_price: 980.0,
    max_change: 15.0,
    fallback_multiplier: 5.0,
};

const COPPER: CommoditySpec = CommoditySpec {
    name: "Cuivre",
    symbol: "HG",
    unit: Unit::UsdPerPound,
    description: "Cours du cuivre au COMEX",
    base_price: 4.35,
    max_change: 0.08,
    fallback_multiplier: 0.05,
};

const OIL_BRENT: CommoditySpec = CommoditySpec {
    name: "Pétrole Brent",
    symbol: "BRENT",
    unit: Unit::UsdPerBarrel,
    description: "Baril de Brent de la mer du Nord, référence pour le pétrole africain",
    base_price: 74.5,
    max_change: 1.5,
    fallback_multiplier: 0.8,
};

const OIL_WTI: CommoditySpec = CommoditySpec {
    name: "Pétrole WTI",
    symbol: "WTI",
    unit: Unit::UsdPerBarrel,
    description: "Baril de West Texas Intermediate",
    base_price: 71.0,
    max_change: 1.5,
    fallback_multiplier: 0.8,
};

const COTTON: CommoditySpec = CommoditySpec {
    name: "Coton",
    symbol: "CT",
    unit: Unit::CentsPerPound,
    description: "Cours du coton, culture d'exportation majeure en Afrique de l'Ouest",
    base_price: 72.0,
    max_change: 1.2,
    fallback_multiplier: 0.5,
};

const COFFEE: CommoditySpec = CommoditySpec {
    name: "Café",
    symbol: "KC",
    unit: Unit::CentsPerPound,
    description: "Cours du café arabica",
    base_price: 245.0,
    max_change: 5.0,
    fallback_multiplier: 2.0,
};

const COCOA: CommoditySpec = CommoditySpec {
    name: "Cacao",
    symbol: "CC",
    unit: Unit::UsdPerTonne,
    description: "Cours du cacao, premier produit d'exportation de la Côte d'Ivoire et du Ghana",
    base_price: 8500.0,
    max_change: 250.0,
    fallback_multiplier: 100.0,
};

impl CommodityKey {
    pub const ALL: [CommodityKey; 9] = [
        CommodityKey::Gold,
        CommodityKey::Silver,
        CommodityKey::Platinum,
        CommodityKey::Copper,
        CommodityKey::OilBrent,
        CommodityKey::OilWti,
        CommodityKey::Cotton,
        CommodityKey::Coffee,
        CommodityKey::Cocoa,
    ];

    pub fn spec(self) -> &'static CommoditySpec {
        match self {
            CommodityKey::Gold => &GOLD,
            CommodityKey::Silver => &SILVER,
            CommodityKey::Platinum => &PLATINUM,
            CommodityKey::Copper => &COPPER,
            CommodityKey::OilBrent => &OIL_BRENT,
            CommodityKey::OilWti => &OIL_WTI,
            CommodityKey::Cotton => &COTTON,
            CommodityKey::Coffee => &COFFEE,
            CommodityKey::Cocoa => &COCOA,
        }
    }
}

/// One commodity price as served to clients
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommodityQuote {
    pub name: String,
    pub symbol: String,
    pub price: Decimal,
    pub currency: String,
    pub change: Decimal,
    /// Signed percentage, e.g. "+0.42%"
    pub change_percent: String,
    pub is_positive: bool,
    pub unit: Unit,
    pub last_update: DateTime<Utc>,
    pub description: String,
    pub source: String,
}

impl CommodityQuote {
    /// Build a quote for `key` moved `delta` away from its base price.
    ///
    /// Price and change are rounded to the unit's precision. The sign of
    /// `change_percent` always follows `is_positive`, which is derived from
    /// the rounded change.
    pub fn from_delta(
        key: CommodityKey,
        delta: f64,
        now: DateTime<Utc>,
        source: &str,
    ) -> Result<Self> {
        let spec = key.spec();
        let decimals = spec.unit.decimals();

        if !delta.is_finite() {
            return Err(CommodityError::Generation(format!(
                "non-finite change {} for {}",
                delta, spec.symbol
            )));
        }

        let price = to_fixed(spec.base_price + delta, decimals, spec.symbol)?;
        let change = to_fixed(delta, decimals, spec.symbol)?;
        let is_positive = change >= Decimal::ZERO;

        let percent = (delta / spec.base_price * 100.0).abs();
        let change_percent = format!("{}{:.2}%", if is_positive { '+' } else { '-' }, percent);

        Ok(Self {
            name: spec.name.to_string(),
            symbol: spec.symbol.to_string(),
            price,
            currency: "USD".to_string(),
            change,
            change_percent,
            is_positive,
            unit: spec.unit,
            last_update: now,
            description: spec.description.to_string(),
            source: source.to_string(),
        })
    }
}

fn to_fixed(value: f64, decimals: u32, symbol: &str) -> Result<Decimal> {
    let mut fixed = Decimal::from_f64(value)
        .ok_or_else(|| {
            CommodityError::Generation(format!("{} out of range for {}", value, symbol))
        })?
        .round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    fixed.rescale(decimals);
    if fixed.is_zero() {
        fixed.set_sign_positive(true);
    }
    Ok(fixed)
}

/// Which generation path produced a snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SnapshotSource {
    Simulation { volatility: f64 },
    Fallback,
}

impl fmt::Display for SnapshotSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotSource::Simulation { volatility } => {
                write!(f, "enhanced-simulation-{:.1}x", volatility)
            }
            SnapshotSource::Fallback => f.write_str("fallback-simple"),
        }
    }
}

impl Serialize for SnapshotSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Complete set of quotes produced by one generation pass
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Snapshot {
    #[serde(flatten)]
    pub commodities: BTreeMap<CommodityKey, CommodityQuote>,
    pub timestamp: DateTime<Utc>,
    pub source: SnapshotSource,
}

impl Snapshot {
    /// Assemble a snapshot, computing each commodity's delta with `delta_for`.
    ///
    /// Fails as a whole if any single quote fails, so a snapshot never mixes
    /// generation paths.
    pub fn build<F>(
        now: DateTime<Utc>,
        source: SnapshotSource,
        quote_source: &str,
        mut delta_for: F,
    ) -> Result<Self>
    where
        F: FnMut(CommodityKey) -> f64,
    {
        let commodities = CommodityKey::ALL
            .into_iter()
            .map(|key| {
                let quote = CommodityQuote::from_delta(key, delta_for(key), now, quote_source)?;
                Ok((key, quote))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        Ok(Self {
            commodities,
            timestamp: now,
            source,
        })
    }

    pub fn get(&self, key: CommodityKey) -> Option<&CommodityQuote> {
        self.commodities.get(&key)
    }
}
