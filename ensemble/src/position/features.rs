//! Position features consumed from the evaluator

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::moves::Move;

/// Remaining material per side in pawn units, kings excluded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MaterialBalance {
    pub white: u32,
    pub black: u32,
}

impl MaterialBalance {
    /// Material of the starting position (8P + 2N + 2B + 2R + Q per side)
    pub const START: Self = Self {
        white: 39,
        black: 39,
    };

    pub fn new(white: u32, black: u32) -> Self {
        Self { white, black }
    }

    /// Combined material on the board
    pub fn total(&self) -> u32 {
        self.white.saturating_add(self.black)
    }

    /// White minus black
    pub fn diff(&self) -> i64 {
        i64::from(self.white) - i64::from(self.black)
    }
}

/// Scalar and categorical summary of a position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionFeatures {
    pub material_balance: MaterialBalance,
    /// Legal move count for the side to move
    pub mobility_count: u32,
    pub king_safety_score: f64,
    /// Half-moves played since the start of the game
    pub ply_number: u32,
    /// Checks or captures available above the evaluator's threshold
    pub has_tactics: bool,
}

impl Default for PositionFeatures {
    fn default() -> Self {
        Self {
            material_balance: MaterialBalance::START,
            mobility_count: 20,
            king_safety_score: 0.0,
            ply_number: 0,
            has_tactics: false,
        }
    }
}

/// Supplies [`PositionFeatures`] for the engine's position type
///
/// Only ply and material feed phase classification; only the tactics flag and
/// mobility count feed the bucket key.
pub trait PositionEvaluator<P: ?Sized>: Send + Sync {
    fn features(&self, position: &P) -> PositionFeatures;
}

impl<P: ?Sized, F> PositionEvaluator<P> for F
where
    F: Fn(&P) -> PositionFeatures + Send + Sync,
{
    fn features(&self, position: &P) -> PositionFeatures {
        self(position)
    }
}

/// Caller-owned context handed through to every agent unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedContext {
    /// Opaque game/session identifier, used only in log fields
    pub game_id: Option<String>,
    /// Moves played so far, oldest first
    pub history: Vec<Move>,
    /// Free-form hints for agents (time control, opponent style, ...)
    pub tags: BTreeMap<String, String>,
}

impl SharedContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_game_id(mut self, id: impl Into<String>) -> Self {
        self.game_id = Some(id.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}
