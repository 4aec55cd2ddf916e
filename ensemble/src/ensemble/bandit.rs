//! Contextual bandit multipliers
//!
//! Each `(bucket, agent)` pair carries a multiplier, starting at 1.0, that
//! scales the agent's weight in that situation. When a decision resolves,
//! every agent whose proposal matched the winner is reinforced by
//! `× (1 + alpha)`. Nobody else changes: there is no decay for agents that
//! lost or stayed silent. Multipliers never leave `[min, max]`; hitting a
//! bound is reported as a [`ClampEvent`], not an error.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::agent::AgentId;
use crate::config::{validate_alpha, validate_bounds, ConfigResult, EnsembleConfig};
use crate::position::BucketKey;

/// Starting multiplier for every `(bucket, agent)` pair
pub const INITIAL_MULTIPLIER: f64 = 1.0;

/// Learned multipliers, keyed by bucket then agent
///
/// Serializes verbatim as `{"middlegame|quiet|norm": {"agent": 1.15}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BanditState {
    buckets: BTreeMap<BucketKey, BTreeMap<AgentId, f64>>,
}

impl BanditState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current multiplier, or the initial value for unseen pairs
    pub fn multiplier(&self, bucket: &BucketKey, agent: &str) -> f64 {
        self.get(bucket, agent).unwrap_or(INITIAL_MULTIPLIER)
    }

    /// Stored multiplier, if the pair has been created
    pub fn get(&self, bucket: &BucketKey, agent: &str) -> Option<f64> {
        self.buckets.get(bucket)?.get(agent).copied()
    }

    /// Multipliers stored for one bucket
    pub fn bucket(&self, bucket: &BucketKey) -> Option<&BTreeMap<AgentId, f64>> {
        self.buckets.get(bucket)
    }

    /// Buckets created so far
    pub fn buckets(&self) -> impl Iterator<Item = &BucketKey> {
        self.buckets.keys()
    }

    /// Every stored `(bucket, agent, multiplier)` triple, in key order
    pub fn entries(&self) -> impl Iterator<Item = (&BucketKey, &AgentId, f64)> {
        self.buckets
            .iter()
            .flat_map(|(bucket, agents)| agents.iter().map(move |(id, m)| (bucket, id, *m)))
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Create the bucket if needed, with every listed agent at the initial value
    pub fn ensure_bucket<'a>(
        &mut self,
        bucket: BucketKey,
        agents: impl IntoIterator<Item = &'a AgentId>,
    ) -> &mut BTreeMap<AgentId, f64> {
        let table = self.buckets.entry(bucket).or_default();
        for agent in agents {
            table.entry(agent.clone()).or_insert(INITIAL_MULTIPLIER);
        }
        table
    }

    /// Pull every stored multiplier into `[min, max]`
    ///
    /// Non-finite values carry no usable signal and are reset to the initial
    /// multiplier (itself pulled into range).
    pub fn clamp_all(&mut self, min: f64, max: f64) -> Vec<ClampEvent> {
        let mut events = Vec::new();
        for (bucket, agents) in self.buckets.iter_mut() {
            for (agent, multiplier) in agents.iter_mut() {
                let clamped = if multiplier.is_finite() {
                    multiplier.clamp(min, max)
                } else {
                    INITIAL_MULTIPLIER.clamp(min, max)
                };
                if clamped.to_bits() != multiplier.to_bits() {
                    events.push(ClampEvent {
                        bucket: *bucket,
                        agent_id: agent.clone(),
                        attempted: *multiplier,
                        clamped,
                    });
                    *multiplier = clamped;
                }
            }
        }
        events
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// A multiplier update that would have left the clamp range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClampEvent {
    pub bucket: BucketKey,
    pub agent_id: AgentId,
    /// Value before clamping
    pub attempted: f64,
    /// Value actually stored
    pub clamped: f64,
}

/// One reinforced multiplier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiplierChange {
    pub agent_id: AgentId,
    pub before: f64,
    pub after: f64,
}

/// Outcome of a bandit update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BanditUpdate {
    pub changes: Vec<MultiplierChange>,
    pub clamp_events: Vec<ClampEvent>,
}

/// Applies reinforcement-only updates within fixed clamp bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BanditUpdater {
    alpha: f64,
    min: f64,
    max: f64,
}

impl BanditUpdater {
    /// Build an updater; bounds and rate follow the configuration rules
    pub fn new(alpha: f64, min: f64, max: f64) -> ConfigResult<Self> {
        validate_alpha(alpha)?;
        validate_bounds(min, max)?;
        Ok(Self { alpha, min, max })
    }

    /// Updater for an already validated configuration
    pub fn from_config(config: &EnsembleConfig) -> Self {
        Self {
            alpha: config.alpha,
            min: config.multiplier_min,
            max: config.multiplier_max,
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    /// Reinforce every contributing agent in `bucket`
    ///
    /// `registered` lists the agents to materialize when the bucket is first
    /// used; their multipliers start at 1.0 and are otherwise untouched.
    pub fn update<'a>(
        &self,
        state: &mut BanditState,
        bucket: BucketKey,
        contributing_agents: &[AgentId],
        registered: impl IntoIterator<Item = &'a AgentId>,
    ) -> BanditUpdate {
        let table = state.ensure_bucket(bucket, registered);
        let mut update = BanditUpdate::default();

        for agent in contributing_agents {
            let before = *table.entry(agent.clone()).or_insert(INITIAL_MULTIPLIER);
            let attempted = before * (1.0 + self.alpha);
            let after = attempted.clamp(self.min, self.max);

            if after != attempted {
                warn!(
                    bucket = %bucket,
                    agent = %agent,
                    attempted,
                    clamped = after,
                    "Bandit multiplier clamped"
                );
                update.clamp_events.push(ClampEvent {
                    bucket,
                    agent_id: agent.clone(),
                    attempted,
                    clamped: after,
                });
            }

            table.insert(agent.clone(), after);
            debug!(bucket = %bucket, agent = %agent, before, after, "Bandit multiplier updated");
            update.changes.push(MultiplierChange {
                agent_id: agent.clone(),
                before,
                after,
            });
        }

        update
    }
}
