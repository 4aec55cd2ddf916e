//! Per-decision diagnostics
//!
//! A [`DecisionTrace`] is built fresh by every successful `decide` call and
//! handed to the caller. The engine keeps no copy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::agent::{AgentFailure, AgentId, Proposal};
use super::bandit::ClampEvent;
use crate::moves::Move;
use crate::position::{BucketKey, Phase, PositionFeatures};

/// Everything that went into one decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTrace {
    pub phase: Phase,
    pub bucket_key: BucketKey,
    /// Evaluator output the phase and bucket were derived from
    pub features: PositionFeatures,
    /// Proposals that took part in aggregation, in agent id order
    pub proposals: Vec<Proposal>,
    /// Effective weight of every aggregated agent
    pub weights: BTreeMap<AgentId, f64>,
    pub per_action_scores: BTreeMap<Move, f64>,
    pub raw_confidence: BTreeMap<Move, f64>,
    pub diversity_bonus_applied: Vec<(AgentId, AgentId)>,
    pub winning_action: Move,
    pub contributing_agents: Vec<AgentId>,
    /// Agents that were polled and declined
    #[serde(default)]
    pub abstained: Vec<AgentId>,
    #[serde(default)]
    pub agent_failures: Vec<AgentFailure>,
    /// Proposals from zero-weight agents polled for audit only
    #[serde(default)]
    pub audit_proposals: Vec<Proposal>,
    #[serde(default)]
    pub clamp_events: Vec<ClampEvent>,
}

impl DecisionTrace {
    /// Score of the winning move
    pub fn winning_score(&self) -> f64 {
        self.per_action_scores
            .get(&self.winning_action)
            .copied()
            .unwrap_or(0.0)
    }

    /// One-line human readable summary
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} [{}] -> {} ({:.3}) from {} proposals over {} moves; contributors: {}",
            self.phase,
            self.bucket_key,
            self.winning_action,
            self.winning_score(),
            self.proposals.len(),
            self.per_action_scores.len(),
            self.contributing_agents.join(", "),
        );
        if !self.diversity_bonus_applied.is_empty() {
            line.push_str(&format!(
                "; {} diversity pairs",
                self.diversity_bonus_applied.len()
            ));
        }
        if !self.agent_failures.is_empty() {
            line.push_str(&format!("; {} agent failures", self.agent_failures.len()));
        }
        if !self.clamp_events.is_empty() {
            line.push_str(&format!("; {} clamped", self.clamp_events.len()));
        }
        line
    }
}
