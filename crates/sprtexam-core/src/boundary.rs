//! SPRT decision thresholds.
//!
//! Wald's approximations: `lower = ln(beta / (1 - alpha))` and
//! `upper = ln((1 - beta) / alpha)`. They are never persisted; any holder of
//! the config can re-derive them.

use serde::{Deserialize, Serialize};

use crate::model::SprtConfig;

/// The pair of thresholds the cumulative statistic is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Boundaries {
    /// Crossing at or below this value demonstrates competence.
    pub lower: f64,
    /// Crossing at or above this value demonstrates incompetence.
    pub upper: f64,
}

/// Where a statistic value sits relative to the thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryPosition {
    AtOrBelowLower,
    AtOrAboveUpper,
    Between,
}

impl Boundaries {
    /// Derive thresholds from the type I (`alpha`) and type II (`beta`) error
    /// bounds. For `0 < alpha, beta < 1`, `lower < 0 < upper`.
    pub fn new(alpha: f64, beta: f64) -> Self {
        Self {
            lower: (beta / (1.0 - alpha)).ln(),
            upper: ((1.0 - beta) / alpha).ln(),
        }
    }

    pub fn from_config(config: &SprtConfig) -> Self {
        Self::new(config.alpha, config.beta)
    }

    /// The lower threshold is checked first, matching the decision order.
    pub fn position(&self, s_index: f64) -> BoundaryPosition {
        if s_index <= self.lower {
            BoundaryPosition::AtOrBelowLower
        } else if s_index >= self.upper {
            BoundaryPosition::AtOrAboveUpper
        } else {
            BoundaryPosition::Between
        }
    }

    /// Both thresholds rounded for display.
    pub fn rounded(&self, digits: u32) -> Self {
        Self {
            lower: crate::statistics::round_to(self.lower, digits),
            upper: crate::statistics::round_to(self.upper, digits),
        }
    }
}
