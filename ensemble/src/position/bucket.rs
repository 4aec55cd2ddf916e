//! Situational bucket keys for the contextual bandit
//!
//! A bucket is `phase | tac/quiet | low/norm`, giving 3 × 2 × 2 = 12 keys.
//! Keys render and parse as `"middlegame|quiet|norm"` so bandit tables
//! serialize with readable string keys.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::features::PositionFeatures;
use super::phase::Phase;

/// Separator between key components
pub const BUCKET_DELIMITER: char = '|';

/// Error type for bucket key parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid bucket key {key:?}: {reason}")]
pub struct BucketKeyError {
    pub key: String,
    pub reason: String,
}

/// Coarse discrete situation key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct BucketKey {
    pub phase: Phase,
    pub tactical: bool,
    pub low_mobility: bool,
}

impl BucketKey {
    pub fn new(phase: Phase, tactical: bool, low_mobility: bool) -> Self {
        Self {
            phase,
            tactical,
            low_mobility,
        }
    }

    /// Every possible key, in sort order
    pub fn all() -> Vec<BucketKey> {
        let mut keys = Vec::with_capacity(12);
        for phase in Phase::all() {
            for tactical in [false, true] {
                for low_mobility in [false, true] {
                    keys.push(Self::new(*phase, tactical, low_mobility));
                }
            }
        }
        keys.sort();
        keys
    }
}

impl std::fmt::Display for BucketKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{d}{}{d}{}",
            self.phase,
            if self.tactical { "tac" } else { "quiet" },
            if self.low_mobility { "low" } else { "norm" },
            d = BUCKET_DELIMITER
        )
    }
}

impl FromStr for BucketKey {
    type Err = BucketKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fail = |reason: &str| BucketKeyError {
            key: s.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = s.split(BUCKET_DELIMITER).collect();
        let [phase, tactical, mobility] = parts.as_slice() else {
            return Err(fail("expected three components"));
        };

        let phase: Phase = phase.parse().map_err(|e: String| fail(&e))?;
        let tactical = match *tactical {
            "tac" => true,
            "quiet" => false,
            _ => return Err(fail("tactical flag must be 'tac' or 'quiet'")),
        };
        let low_mobility = match *mobility {
            "low" => true,
            "norm" => false,
            _ => return Err(fail("mobility flag must be 'low' or 'norm'")),
        };

        Ok(Self::new(phase, tactical, low_mobility))
    }
}

impl TryFrom<String> for BucketKey {
    type Error = BucketKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BucketKey> for String {
    fn from(key: BucketKey) -> Self {
        key.to_string()
    }
}

/// Derives bucket keys from a phase and evaluator features
#[derive(Debug, Clone)]
pub struct BucketKeyBuilder {
    /// Mobility strictly below this counts as low
    low_mobility_threshold: u32,
}

impl BucketKeyBuilder {
    pub fn new(low_mobility_threshold: u32) -> Self {
        Self {
            low_mobility_threshold,
        }
    }

    pub fn build(&self, phase: Phase, features: &PositionFeatures) -> BucketKey {
        BucketKey::new(
            phase,
            features.has_tactics,
            features.mobility_count < self.low_mobility_threshold,
        )
    }
}

impl Default for BucketKeyBuilder {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_LOW_MOBILITY_THRESHOLD)
    }
}
