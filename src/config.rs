//! Tolerances and retry bounds threaded as configuration rather than
//! literals scattered through the constraint-building code (spec §9).

use serde::{Deserialize, Serialize};

/// Lower bound of the allowed clearing-price range (money per unit).
pub const PRICE_MIN: f64 = -1000.0;
/// Upper bound of the allowed clearing-price range (money per unit).
pub const PRICE_MAX: f64 = 10_000.0;
/// Default bound on outer-loop no-good-cut retries (spec §4.5).
pub const DEFAULT_MAX_RETRIES: u32 = 50;

/// Numerical tolerances and retry bounds for one clearing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClearingConfig {
    /// Threshold for "is this order accepted at all" inside constraint
    /// generation (spec §7: `1e-12`).
    pub eps_accept: f64,
    /// Threshold for comparing surpluses/totals to zero (spec §7: `1e-9`).
    pub eps_surplus: f64,
    /// Threshold for comparing totals to unit capacities (spec §7: `1e-9`).
    pub eps_cap: f64,
    pub price_min: f64,
    pub price_max: f64,
    pub max_retries: u32,
    /// `0` hides solver output; higher values are passed through to the
    /// solver's own verbosity knob (spec §4.1).
    pub verbosity: u8,
}

impl Default for ClearingConfig {
    fn default() -> Self {
        ClearingConfig {
            eps_accept: 1e-12,
            eps_surplus: 1e-9,
            eps_cap: 1e-9,
            price_min: PRICE_MIN,
            price_max: PRICE_MAX,
            max_retries: DEFAULT_MAX_RETRIES,
            verbosity: 0,
        }
    }
}
