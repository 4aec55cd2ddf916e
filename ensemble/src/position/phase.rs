//! Game phase classification
//!
//! Maps the ply counter and remaining material onto a coarse phase. The
//! classifier is pure: the same features always yield the same phase.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::features::PositionFeatures;

/// Coarse classification of game progress
///
/// Serialized as its lowercase name so it can key TOML and JSON tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Phase {
    Opening,
    Middlegame,
    Endgame,
}

impl Phase {
    /// All phases, in game order
    pub fn all() -> &'static [Phase] {
        &[Self::Opening, Self::Middlegame, Self::Endgame]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Opening => "opening",
            Self::Middlegame => "middlegame",
            Self::Endgame => "endgame",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "opening" => Ok(Self::Opening),
            "middlegame" => Ok(Self::Middlegame),
            "endgame" => Ok(Self::Endgame),
            other => Err(format!("unknown phase: {other}")),
        }
    }
}

impl TryFrom<String> for Phase {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Phase> for String {
    fn from(phase: Phase) -> Self {
        phase.as_str().to_string()
    }
}

/// Thresholds driving [`PhaseClassifier`]
///
/// Material is counted in pawn units without kings (a full side is 39).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseThresholds {
    /// Last move number that can still count as opening
    pub opening_max_move: u32,
    /// Each side must keep strictly more material than this to stay in the opening
    pub opening_min_side_material: u32,
    /// Combined material strictly below this means endgame
    pub endgame_total_material: u32,
    /// Move numbers strictly above this mean endgame regardless of material
    pub endgame_move: u32,
}

impl Default for PhaseThresholds {
    fn default() -> Self {
        Self {
            opening_max_move: 15,
            opening_min_side_material: 30,
            endgame_total_material: 26,
            endgame_move: 40,
        }
    }
}

/// Classifies positions into opening / middlegame / endgame
#[derive(Debug, Clone, Default)]
pub struct PhaseClassifier {
    thresholds: PhaseThresholds,
}

impl PhaseClassifier {
    pub fn new(thresholds: PhaseThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &PhaseThresholds {
        &self.thresholds
    }

    /// Classify from raw ply and per-side material
    pub fn classify_raw(&self, ply: u32, white_material: u32, black_material: u32) -> Phase {
        let t = &self.thresholds;
        let move_number = ply / 2 + 1;
        let total = white_material.saturating_add(black_material);

        if total < t.endgame_total_material || move_number > t.endgame_move {
            return Phase::Endgame;
        }

        let both_sides_intact = white_material > t.opening_min_side_material
            && black_material > t.opening_min_side_material;
        if move_number <= t.opening_max_move && both_sides_intact {
            Phase::Opening
        } else {
            Phase::Middlegame
        }
    }

    /// Classify from evaluator features
    pub fn classify(&self, features: &PositionFeatures) -> Phase {
        self.classify_raw(
            features.ply_number,
            features.material_balance.white,
            features.material_balance.black,
        )
    }
}
