//! Event types published by the engine
//!
//! Events mirror what the decision trace already records, for observers
//! that follow many decisions (dashboards, replay tools) rather than one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ensemble::agent::{AgentFailureKind, AgentId};
use crate::moves::Move;
use crate::position::BucketKey;

/// All engine events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A decision selected a move
    DecisionCompleted {
        game_id: Option<String>,
        bucket: BucketKey,
        winner: Move,
        score: f64,
        contributing_agents: Vec<AgentId>,
        timestamp: DateTime<Utc>,
    },

    /// A decision ended without a move
    DecisionFailed {
        game_id: Option<String>,
        bucket: Option<BucketKey>,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// An agent failed and was skipped
    AgentFailed {
        game_id: Option<String>,
        agent_id: AgentId,
        failure: AgentFailureKind,
        timestamp: DateTime<Utc>,
    },

    /// A bandit multiplier hit a clamp bound
    MultiplierClamped {
        bucket: BucketKey,
        agent_id: AgentId,
        attempted: f64,
        clamped: f64,
        timestamp: DateTime<Utc>,
    },

    /// A configuration setter was applied
    ConfigurationChanged {
        setting: String,
        timestamp: DateTime<Utc>,
    },
}

impl EngineEvent {
    /// Get the timestamp of this event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            EngineEvent::DecisionCompleted { timestamp, .. } => *timestamp,
            EngineEvent::DecisionFailed { timestamp, .. } => *timestamp,
            EngineEvent::AgentFailed { timestamp, .. } => *timestamp,
            EngineEvent::MultiplierClamped { timestamp, .. } => *timestamp,
            EngineEvent::ConfigurationChanged { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            EngineEvent::DecisionCompleted { .. } => "decision_completed",
            EngineEvent::DecisionFailed { .. } => "decision_failed",
            EngineEvent::AgentFailed { .. } => "agent_failed",
            EngineEvent::MultiplierClamped { .. } => "multiplier_clamped",
            EngineEvent::ConfigurationChanged { .. } => "configuration_changed",
        }
    }

    /// Get the game ID if this event is game-scoped
    pub fn game_id(&self) -> Option<&str> {
        match self {
            EngineEvent::DecisionCompleted { game_id, .. }
            | EngineEvent::DecisionFailed { game_id, .. }
            | EngineEvent::AgentFailed { game_id, .. } => game_id.as_deref(),
            _ => None,
        }
    }

    /// Get the agent ID if this event concerns a single agent
    pub fn agent_id(&self) -> Option<&str> {
        match self {
            EngineEvent::AgentFailed { agent_id, .. }
            | EngineEvent::MultiplierClamped { agent_id, .. } => Some(agent_id),
            _ => None,
        }
    }
}
