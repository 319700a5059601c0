//! Accumulators behind every cube cell
//!
//! A cell keeps two parallel accumulator sets: a [`CumulativeAccumulator`]
//! over the whole observed history and a [`WindowAccumulator`] restricted to
//! the trailing window. Both report the same four [`Measures`].

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Reference-counted multiset for exact distinct counts under expiry
pub mod counted_set;
/// Trailing-window accumulator
pub mod sliding_window;
/// All-time accumulator
pub mod cumulative;
/// Configuration types for the engine
pub mod config;

pub use config::EngineConfig;
pub use counted_set::CountedSet;
pub use cumulative::CumulativeAccumulator;
pub use sliding_window::WindowAccumulator;

use crate::error::CubeError;

/// The four statistics tracked per cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MeasureKind {
    /// Distinct users
    UserCount,
    /// Distinct products
    ProductCount,
    /// Total price
    PriceSum,
    /// Mean price per event
    PriceMean,
}

impl MeasureKind {
    /// All kinds in display order
    pub const ALL: [MeasureKind; 4] = [
        MeasureKind::UserCount,
        MeasureKind::ProductCount,
        MeasureKind::PriceSum,
        MeasureKind::PriceMean,
    ];

    fn as_str(self) -> &'static str {
        match self {
            MeasureKind::UserCount => "user_count",
            MeasureKind::ProductCount => "product_count",
            MeasureKind::PriceSum => "price_sum",
            MeasureKind::PriceMean => "price_mean",
        }
    }
}

/// Time range a measure is computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    /// Entire history of the cell
    AllTime,
    /// Trailing window ending at the engine clock
    Windowed,
}

/// A measure column: one statistic over one scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Measure {
    /// Statistic
    pub kind: MeasureKind,
    /// Time range
    pub scope: Scope,
}

impl Measure {
    /// Create a measure column
    pub const fn new(kind: MeasureKind, scope: Scope) -> Self {
        Self { kind, scope }
    }

    /// Every supported measure, all-time columns first
    pub fn all() -> Vec<Measure> {
        [Scope::AllTime, Scope::Windowed]
            .into_iter()
            .flat_map(|scope| MeasureKind::ALL.into_iter().map(move |kind| Measure::new(kind, scope)))
            .collect()
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope {
            Scope::AllTime => f.write_str(self.kind.as_str()),
            Scope::Windowed => write!(f, "{}_windowed", self.kind.as_str()),
        }
    }
}

impl Serialize for Measure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl FromStr for Measure {
    type Err = CubeError;

    /// Parse a measure name.
    ///
    /// Canonical names are `user_count`, `product_count`, `price_sum` and
    /// `price_mean`, with a `_windowed` (or `_lm`) suffix for the trailing
    /// window. The dashboard labels `user count`, `product count`, `price`
    /// and `average price`, optionally followed by ` lm`, are accepted too.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        let (base, scope) = ["_windowed", "_lm", " lm"]
            .iter()
            .find_map(|suffix| name.strip_suffix(suffix))
            .map(|base| (base, Scope::Windowed))
            .unwrap_or((name.as_str(), Scope::AllTime));

        let kind = match base.trim() {
            "user_count" | "user count" => MeasureKind::UserCount,
            "product_count" | "product count" => MeasureKind::ProductCount,
            "price_sum" | "price" => MeasureKind::PriceSum,
            "price_mean" | "average price" | "average_price" => MeasureKind::PriceMean,
            _ => {
                return Err(CubeError::Configuration(format!(
                    "unknown measure '{}'",
                    s.trim()
                )))
            }
        };
        Ok(Measure::new(kind, scope))
    }
}

/// A single measure value as reported in a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MeasureValue {
    /// Distinct count
    Count(usize),
    /// Price amount
    Amount(f64),
    /// Mean over zero events
    Undefined,
}

impl fmt::Display for MeasureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasureValue::Count(n) => write!(f, "{}", n),
            MeasureValue::Amount(v) => write!(f, "{:.2}", v),
            MeasureValue::Undefined => f.write_str("-"),
        }
    }
}

/// The four statistics of one accumulator at one instant
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Measures {
    /// Distinct users
    pub user_count: usize,
    /// Distinct products
    pub product_count: usize,
    /// Total price
    pub price_sum: f64,
    /// Mean price, `None` when no events contribute
    pub price_mean: Option<f64>,
}

impl Measures {
    pub(crate) fn from_parts(
        user_count: usize,
        product_count: usize,
        price_sum: f64,
        event_count: u64,
    ) -> Self {
        let price_mean = (event_count > 0).then(|| price_sum / event_count as f64);
        Self {
            user_count,
            product_count,
            price_sum,
            price_mean,
        }
    }

    /// Value of one statistic
    pub fn get(&self, kind: MeasureKind) -> MeasureValue {
        match kind {
            MeasureKind::UserCount => MeasureValue::Count(self.user_count),
            MeasureKind::ProductCount => MeasureValue::Count(self.product_count),
            MeasureKind::PriceSum => MeasureValue::Amount(self.price_sum),
            MeasureKind::PriceMean => self
                .price_mean
                .map(MeasureValue::Amount)
                .unwrap_or(MeasureValue::Undefined),
        }
    }
}
