//! Spot-to-normal ratio and the expected split of a workload's pods.
//!
//! A ratio `N:M` means N spot pods for every M normal pods, so the spot
//! share is `N / (N + M)`. The normal count is rounded up, which keeps a
//! floor of stable capacity whenever the split is fractional.

use std::fmt;
use std::str::FromStr;

use tracing::warn;

use crate::error::{PolicyError, PolicyResult};

/// A validated `spot:normal` ratio. Both sides are finite and positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ratio {
    spot: f64,
    normal: f64,
}

/// Expected number of spot and normal pods for a given total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedCounts {
    pub spot: usize,
    pub normal: usize,
}

impl Ratio {
    /// The 1:1 ratio used whenever a ratio string cannot be parsed.
    pub const EVEN: Ratio = Ratio {
        spot: 1.0,
        normal: 1.0,
    };

    /// Parse `N:M`, rejecting anything but two finite positive numbers.
    pub fn parse(raw: &str) -> PolicyResult<Self> {
        let invalid = || PolicyError::InvalidRatio(raw.to_string());

        let (spot, normal) = raw.split_once(':').ok_or_else(invalid)?;
        if normal.contains(':') {
            return Err(invalid());
        }
        let spot: f64 = spot.trim().parse().map_err(|_| invalid())?;
        let normal: f64 = normal.trim().parse().map_err(|_| invalid())?;

        let valid = |v: f64| v.is_finite() && v > 0.0;
        if !valid(spot) || !valid(normal) {
            return Err(invalid());
        }
        // Huge or lopsided terms can overflow the sum or round the share to 0 or 1.
        let ratio = Self { spot, normal };
        let fraction = ratio.spot_fraction();
        if !(spot + normal).is_finite() || !(fraction > 0.0 && fraction < 1.0) {
            return Err(invalid());
        }
        Ok(ratio)
    }

    /// Parse `N:M`, degrading to 1:1 on malformed input.
    pub fn parse_or_even(raw: &str) -> Self {
        match Self::parse(raw) {
            Ok(ratio) => ratio,
            Err(e) => {
                warn!(error = %e, "falling back to 1:1 ratio");
                Self::EVEN
            }
        }
    }

    /// Share of pods that should run on spot capacity, always in (0, 1).
    pub fn spot_fraction(&self) -> f64 {
        self.spot / (self.spot + self.normal)
    }

    /// Split `total` pods into expected spot and normal counts.
    ///
    /// `normal = ceil(total * M / (N + M))`, `spot = total - normal`.
    pub fn expected_counts(&self, total: usize) -> ExpectedCounts {
        // Dividing last keeps integral ratios exact (2:1 of 3 is 1.0, not 1.0000000000000002).
        let raw = total as f64 * self.normal / (self.spot + self.normal);
        let normal = (raw.ceil() as usize).min(total);
        ExpectedCounts {
            spot: total - normal,
            normal,
        }
    }
}

impl Default for Ratio {
    fn default() -> Self {
        Self::EVEN
    }
}

impl FromStr for Ratio {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.spot, self.normal)
    }
}
