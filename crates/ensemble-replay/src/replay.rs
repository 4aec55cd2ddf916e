//! Running scenarios through the engine

use std::path::Path;

use anyhow::{Context, Result};
use move_ensemble::{
    BanditState, DecisionTrace, EnsembleConfig, EnsembleEngine, EnsembleError, Move,
    SharedContext,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::scenario::{recorded_features, Scenario, ScenarioPosition, ScriptedProposer};

/// Outcome of one replayed position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReplayOutcome {
    Decided {
        action: Move,
        trace: Box<DecisionTrace>,
    },
    NoProposals {
        reason: String,
    },
}

/// One output line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayRecord {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(flatten)]
    pub outcome: ReplayOutcome,
}

/// Engine wired with one scripted agent per registered agent
pub fn build_engine(
    config: EnsembleConfig,
    scenario: &Scenario,
    bandit: Option<BanditState>,
) -> Result<EnsembleEngine<ScenarioPosition>> {
    scenario.check_agents(&config.agents)?;

    let agent_ids: Vec<String> = config.agents.iter().map(|(id, _)| id.clone()).collect();
    let mut engine = EnsembleEngine::new(config, recorded_features)
        .context("Invalid ensemble configuration")?;
    for agent_id in agent_ids {
        let proposer = ScriptedProposer::new(agent_id.clone());
        engine = engine.with_agent(agent_id, proposer);
    }
    if let Some(bandit) = bandit {
        engine = engine.with_bandit(bandit);
    }
    Ok(engine)
}

/// Decide every position in order
///
/// Positions where nobody proposes are recorded and skipped; configuration
/// errors stop the replay.
pub async fn run(
    engine: &EnsembleEngine<ScenarioPosition>,
    scenario: &Scenario,
) -> Result<Vec<ReplayRecord>> {
    let mut shared = SharedContext::new();
    shared.game_id = scenario.game_id.clone();

    let mut records = Vec::with_capacity(scenario.positions.len());
    for (index, position) in scenario.positions.iter().enumerate() {
        let outcome = match engine.decide(position, &shared).await {
            Ok((action, trace)) => {
                info!(index, summary = %trace.summary(), "Position decided");
                shared.history.push(action);
                ReplayOutcome::Decided {
                    action,
                    trace: Box::new(trace),
                }
            }
            Err(e @ EnsembleError::EmptyProposalSet { .. }) => {
                warn!(index, error = %e, "No move for position");
                ReplayOutcome::NoProposals {
                    reason: e.to_string(),
                }
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Replay stopped at position {index}"))
            }
        };
        records.push(ReplayRecord {
            index,
            label: position.label.clone(),
            outcome,
        });
    }
    Ok(records)
}

/// Load a bandit table, or `None` if the file does not exist yet
pub fn load_bandit(path: &Path) -> Result<Option<BanditState>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read bandit state {}", path.display()))?;
    let state = BanditState::from_json(&text)
        .with_context(|| format!("Failed to parse bandit state {}", path.display()))?;
    Ok(Some(state))
}

pub fn save_bandit(path: &Path, state: &BanditState) -> Result<()> {
    let text = state.to_json().context("Failed to serialize bandit state")?;
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write bandit state {}", path.display()))
}
