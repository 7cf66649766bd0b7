//! Built-in population maps.
//!
//! Each map is written once, generically over [`Scalar`], so the same
//! expression drives both plain `f64` simulation and `Dual`-number
//! differentiation in the Lyapunov sweep.

use crate::traits::{lit, IteratedMap, Scalar};
use anyhow::{bail, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logistic map: `pop * rate * (1 - pop)`.
#[inline(always)]
pub fn logistic_map<T: Scalar>(pop: T, rate: T) -> T {
    pop * rate * (T::one() - pop)
}

/// Cubic map: `rate * pop^3 + pop * (1 - rate)`.
#[inline(always)]
pub fn cubic_map<T: Scalar>(pop: T, rate: T) -> T {
    rate * pop.powi(3) + pop * (T::one() - rate)
}

/// Singer map: `rate * (7.86 pop - 23.31 pop^2 + 28.75 pop^3 - 13.3 pop^4)`.
#[inline(always)]
pub fn singer_map<T: Scalar>(pop: T, rate: T) -> T {
    rate * (lit::<T>(7.86) * pop - lit::<T>(23.31) * pop.powi(2)
        + lit::<T>(28.75) * pop.powi(3)
        - lit::<T>(13.3) * pop.powi(4))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinMap {
    Logistic,
    Cubic,
    Singer,
}

impl BuiltinMap {
    pub const ALL: [BuiltinMap; 3] = [BuiltinMap::Logistic, BuiltinMap::Cubic, BuiltinMap::Singer];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinMap::Logistic => "logistic",
            BuiltinMap::Cubic => "cubic",
            BuiltinMap::Singer => "singer",
        }
    }
}

impl<T: Scalar> IteratedMap<T> for BuiltinMap {
    #[inline(always)]
    fn evaluate(&self, pop: T, rate: T) -> T {
        match self {
            BuiltinMap::Logistic => logistic_map(pop, rate),
            BuiltinMap::Cubic => cubic_map(pop, rate),
            BuiltinMap::Singer => singer_map(pop, rate),
        }
    }
}

impl fmt::Display for BuiltinMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BuiltinMap {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        let name = normalized.strip_suffix("_map").unwrap_or(&normalized);
        match name {
            "logistic" => Ok(BuiltinMap::Logistic),
            "cubic" => Ok(BuiltinMap::Cubic),
            "singer" => Ok(BuiltinMap::Singer),
            _ => bail!("Unknown map \"{}\". Expected logistic, cubic or singer.", s.trim()),
        }
    }
}
