//! Scenario replay for the move ensemble engine
//!
//! Feeds recorded positions, with scripted agent answers, through
//! [`move_ensemble::EnsembleEngine`] and collects the decision traces.

pub mod replay;
pub mod scenario;

pub use replay::{build_engine, load_bandit, run, save_bandit, ReplayOutcome, ReplayRecord};
pub use scenario::{recorded_features, Scenario, ScenarioPosition, ScriptedAnswer, ScriptedProposer};
