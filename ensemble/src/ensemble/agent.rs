//! Strategy agent interface
//!
//! Agents are opaque: the engine only sees a name in the registry and an
//! object implementing [`Proposer`]. They may suggest one move with a
//! confidence, abstain, or fail; none of these outcomes aborts a decision.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::moves::Move;
use crate::position::{BucketKey, Phase, PositionFeatures, SharedContext};

/// Agent identifier as used in the registry and the bandit table
pub type AgentId = String;

/// Error type an agent may return instead of a proposal
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AgentError {
    #[error("Agent failed: {0}")]
    Failed(String),

    #[error("Agent unavailable: {0}")]
    Unavailable(String),
}

/// Read-only view of the decision handed to every agent
#[derive(Debug, Clone, Copy)]
pub struct AgentContext<'a> {
    /// Caller-supplied context, passed through untouched
    pub shared: &'a SharedContext,
    /// Evaluator features for this position
    pub features: &'a PositionFeatures,
    pub phase: Phase,
    pub bucket: BucketKey,
}

/// What an agent answers when it does not abstain
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub action: Move,
    /// Expected in [0, 1]; anything else is treated as an agent failure
    pub confidence: f64,
}

impl Suggestion {
    pub fn new(action: Move, confidence: f64) -> Self {
        Self { action, confidence }
    }
}

/// A strategy agent
///
/// Must behave as a pure function of its inputs from the engine's point of
/// view: no shared mutable state with the engine. Returning `Ok(None)`
/// abstains for this decision.
#[async_trait]
pub trait Proposer<P: ?Sized + Sync>: Send + Sync {
    async fn propose(
        &self,
        position: &P,
        ctx: &AgentContext<'_>,
    ) -> Result<Option<Suggestion>, AgentError>;
}

/// Shared reference to a registered agent
pub type SharedProposer<P> = Arc<dyn Proposer<P>>;

/// One agent's suggestion, tagged with who made it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub agent_id: AgentId,
    pub action: Move,
    pub confidence: f64,
}

impl Proposal {
    pub fn new(agent_id: impl Into<AgentId>, action: Move, confidence: f64) -> Self {
        Self {
            agent_id: agent_id.into(),
            action,
            confidence,
        }
    }
}

/// Why an agent produced nothing usable this decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentFailureKind {
    /// The agent returned an error
    Error { message: String },
    /// The agent did not answer inside the polling window
    Timeout { after_ms: u64 },
    /// The agent answered with a confidence outside [0, 1]
    InvalidConfidence { confidence: f64 },
}

impl std::fmt::Display for AgentFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error { message } => write!(f, "error: {}", message),
            Self::Timeout { after_ms } => write!(f, "timed out after {}ms", after_ms),
            Self::InvalidConfidence { confidence } => {
                write!(f, "invalid confidence {}", confidence)
            }
        }
    }
}

/// A recovered per-agent failure, recorded in the trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentFailure {
    pub agent_id: AgentId,
    #[serde(flatten)]
    pub kind: AgentFailureKind,
}
