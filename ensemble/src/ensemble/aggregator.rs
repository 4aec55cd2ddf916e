//! Weighted aggregation of agent proposals
//!
//! Proposals are grouped by exact move. Each group scores
//! `Σ confidence × weight`, plus an optional diversity bonus: for every pair
//! of proposals from different agents whose moves differ and overlap at most
//! `overlap_threshold`, each side's group gains `bonus × its agent's weight`.
//!
//! The highest score wins. Ties go to the higher raw confidence sum, then to
//! the move that sorts first in UCI order. Proposals are put in canonical
//! order before any arithmetic, so the result never depends on the order in
//! which agents answered.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::agent::{AgentId, Proposal};
use super::overlap::is_low_overlap;
use crate::config::{
    EnsembleConfig, DEFAULT_DIVERSITY_BONUS, DEFAULT_OVERLAP_THRESHOLD,
};
use crate::moves::Move;

/// Scores closer than this are considered tied
pub const SCORE_EPSILON: f64 = 1e-9;

/// Error type for aggregation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AggregationError {
    #[error("No proposals to aggregate")]
    EmptyProposalSet,

    #[error("No weight resolved for agent {0}")]
    MissingWeight(AgentId),
}

/// Result type for aggregation
pub type AggregationResult<T> = Result<T, AggregationError>;

/// Diversity parameters for one aggregation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregatorSettings {
    pub diversity_enabled: bool,
    pub diversity_bonus: f64,
    pub overlap_threshold: f64,
}

impl AggregatorSettings {
    /// Plain weighted voting, no diversity bonus
    pub fn without_diversity() -> Self {
        Self {
            diversity_enabled: false,
            ..Self::default()
        }
    }

    pub fn with_diversity(bonus: f64) -> Self {
        Self {
            diversity_enabled: true,
            diversity_bonus: bonus,
            ..Self::default()
        }
    }

    pub fn from_config(config: &EnsembleConfig) -> Self {
        Self {
            diversity_enabled: config.diversity_enabled,
            diversity_bonus: config.diversity_bonus,
            overlap_threshold: config.overlap_threshold,
        }
    }
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            diversity_enabled: true,
            diversity_bonus: DEFAULT_DIVERSITY_BONUS,
            overlap_threshold: DEFAULT_OVERLAP_THRESHOLD,
        }
    }
}

/// Result of aggregating one decision's proposals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub winner: Move,
    /// Total score of the winner
    pub winning_score: f64,
    /// One entry per distinct proposed move
    pub per_action_scores: BTreeMap<Move, f64>,
    /// Unweighted confidence sum per move (first tie-break)
    pub raw_confidence: BTreeMap<Move, f64>,
    /// Low-overlap pairs that earned the bonus, each as (smaller id, larger id)
    pub diversity_pairs: Vec<(AgentId, AgentId)>,
    /// Agents whose proposal is the winning move, in id order
    pub contributing_agents: Vec<AgentId>,
}

/// Aggregate proposals under the given effective weights
///
/// Every proposing agent must have an entry in `weights`.
pub fn aggregate(
    proposals: &[Proposal],
    weights: &BTreeMap<AgentId, f64>,
    settings: &AggregatorSettings,
) -> AggregationResult<Aggregation> {
    if proposals.is_empty() {
        return Err(AggregationError::EmptyProposalSet);
    }

    let mut ordered: Vec<(&Proposal, f64)> = proposals
        .iter()
        .map(|p| {
            weights
                .get(&p.agent_id)
                .map(|w| (p, *w))
                .ok_or_else(|| AggregationError::MissingWeight(p.agent_id.clone()))
        })
        .collect::<AggregationResult<_>>()?;
    ordered.sort_by(|(a, _), (b, _)| {
        a.action
            .cmp(&b.action)
            .then_with(|| a.agent_id.cmp(&b.agent_id))
            .then_with(|| a.confidence.total_cmp(&b.confidence))
    });

    // Step 1: base scores per group
    let mut per_action_scores: BTreeMap<Move, f64> = BTreeMap::new();
    let mut raw_confidence: BTreeMap<Move, f64> = BTreeMap::new();
    for (proposal, weight) in &ordered {
        *per_action_scores.entry(proposal.action).or_insert(0.0) += proposal.confidence * weight;
        *raw_confidence.entry(proposal.action).or_insert(0.0) += proposal.confidence;
    }

    // Step 2: diversity bonus, once per qualifying pair
    let mut diversity_pairs = Vec::new();
    if settings.diversity_enabled {
        for (i, (left, left_weight)) in ordered.iter().enumerate() {
            for (right, right_weight) in &ordered[i + 1..] {
                if left.agent_id == right.agent_id || left.action == right.action {
                    continue;
                }
                if !is_low_overlap(&left.action, &right.action, settings.overlap_threshold) {
                    continue;
                }
                *per_action_scores.entry(left.action).or_insert(0.0) +=
                    settings.diversity_bonus * left_weight;
                *per_action_scores.entry(right.action).or_insert(0.0) +=
                    settings.diversity_bonus * right_weight;

                let pair = if left.agent_id <= right.agent_id {
                    (left.agent_id.clone(), right.agent_id.clone())
                } else {
                    (right.agent_id.clone(), left.agent_id.clone())
                };
                diversity_pairs.push(pair);
            }
        }
    }

    // Step 3: selection, scanning in move order so earlier moves keep ties
    let mut best: Option<(Move, f64, f64)> = None;
    for (action, score) in &per_action_scores {
        let raw = raw_confidence.get(action).copied().unwrap_or(0.0);
        best = match best {
            None => Some((*action, *score, raw)),
            Some((_, best_score, best_raw))
                if *score > best_score + SCORE_EPSILON
                    || ((*score - best_score).abs() <= SCORE_EPSILON
                        && raw > best_raw + SCORE_EPSILON) =>
            {
                Some((*action, *score, raw))
            }
            kept => kept,
        };
    }
    let (winner, winning_score, _) = best.ok_or(AggregationError::EmptyProposalSet)?;

    // Step 4: contributors
    let mut contributing_agents: Vec<AgentId> = ordered
        .iter()
        .filter(|(p, _)| p.action == winner)
        .map(|(p, _)| p.agent_id.clone())
        .collect();
    contributing_agents.sort();
    contributing_agents.dedup();

    debug!(
        winner = %winner,
        score = winning_score,
        actions = per_action_scores.len(),
        diversity_pairs = diversity_pairs.len(),
        "Proposals aggregated"
    );

    Ok(Aggregation {
        winner,
        winning_score,
        per_action_scores,
        raw_confidence,
        diversity_pairs,
        contributing_agents,
    })
}
