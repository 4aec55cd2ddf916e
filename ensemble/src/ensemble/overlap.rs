//! Structural overlap between two candidate moves
//!
//! A deliberately coarse similarity used only to detect that two agents are
//! pushing different ideas. Exact equality is handled by grouping in the
//! aggregator; this score looks at shared origin, shared destination and a
//! shared first step along the direction of travel.
//!
//! | shared parts                      | score |
//! |-----------------------------------|-------|
//! | identical move                    | 1.00  |
//! | origin + destination (promotion differs) | 0.95 |
//! | origin + first step               | 0.55  |
//! | destination only                  | 0.45  |
//! | origin only                       | 0.35  |
//! | first step only (crossing paths)  | 0.20  |
//! | nothing                           | 0.00  |

use crate::moves::Move;

const ORIGIN_WEIGHT: f64 = 0.35;
const DESTINATION_WEIGHT: f64 = 0.45;
const FIRST_STEP_WEIGHT: f64 = 0.20;
/// Ceiling for distinct moves, so only identical moves reach 1.0
const DISTINCT_CEILING: f64 = 0.95;

/// Overlap score in [0, 1]; symmetric, and 1.0 only for identical moves
pub fn overlap(a: &Move, b: &Move) -> f64 {
    if a == b {
        return 1.0;
    }

    let mut score = 0.0;
    if a.from == b.from {
        score += ORIGIN_WEIGHT;
    }
    if a.to == b.to {
        score += DESTINATION_WEIGHT;
    }
    match (a.first_step(), b.first_step()) {
        (Some(step_a), Some(step_b)) if step_a == step_b => score += FIRST_STEP_WEIGHT,
        _ => {}
    }

    score.min(DISTINCT_CEILING)
}

/// Whether two moves are different enough to earn the diversity bonus
pub fn is_low_overlap(a: &Move, b: &Move, threshold: f64) -> bool {
    overlap(a, b) <= threshold
}
