//! Move Ensemble Library
//!
//! A meta-decision engine that picks one chess move from the suggestions of
//! many independent strategy agents.
//!
//! # Features
//!
//! ## Decision pipeline
//! - `PhaseClassifier`: opening / middlegame / endgame from ply and material
//! - `BucketKeyBuilder`: coarse `phase|tac|low` situation keys (12 buckets)
//! - `WeightResolver`: base weight, phase override, bandit multiplier
//! - `overlap`: structural similarity between two moves
//! - `aggregate`: grouped weighted scoring with a diversity bonus and a
//!   deterministic tie-break
//! - `BanditUpdater`: reinforcement of agents that backed the winner
//!
//! ## Engine
//! - `EnsembleEngine::decide`: the full cycle, returning the move and a
//!   `DecisionTrace`
//! - Validated configuration setters, bandit snapshot/restore
//! - Optional `EventBus` for decision, failure and clamp events
//!
//! # Usage
//!
//! ```ignore
//! let config = EnsembleConfig::load("ensemble.toml")?;
//! let engine = EnsembleEngine::new(config, evaluator)?
//!     .with_agent("material", MaterialAgent)
//!     .with_agent("tactics", TacticsAgent);
//!
//! let (action, trace) = engine.decide(&position, &SharedContext::new()).await?;
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod config;
pub mod ensemble;
pub mod events;
pub mod moves;
pub mod position;

// Re-export configuration types
pub use config::{AgentRegistry, ConfigError, ConfigResult, EnsembleConfig, PhaseWeightTable};

// Re-export key ensemble types
pub use ensemble::{
    aggregate, overlap, AgentContext, AgentError, AgentFailure, AgentFailureKind, AgentId,
    Aggregation, AggregatorSettings, BanditState, BanditUpdater, ClampEvent, DecisionStage,
    DecisionTrace, EnsembleEngine, EnsembleError, EnsembleResult, Proposal, Proposer,
    SharedEnsembleEngine, SharedProposer, Suggestion, WeightResolver,
};

// Re-export key event types
pub use events::{EngineEvent, EventBus, EventFilter, SharedEventBus};

// Re-export move notation
pub use moves::{Move, MoveParseError, Promotion, Square};

// Re-export position types
pub use position::{
    BucketKey, BucketKeyBuilder, MaterialBalance, Phase, PhaseClassifier, PhaseThresholds,
    PositionEvaluator, PositionFeatures, SharedContext,
};
