//! Scripted replay scenarios
//!
//! A scenario is a JSON list of positions. Each position carries the
//! features an evaluator would have produced and what every agent answers
//! there, so a recorded game can be pushed through the engine without the
//! agents themselves.
//!
//! ```json
//! {
//!   "game_id": "demo",
//!   "positions": [
//!     {
//!       "label": "after 1.e4 e5",
//!       "features": { "material_balance": { "white": 39, "black": 39 },
//!                     "mobility_count": 29, "king_safety_score": 0.0,
//!                     "ply_number": 2, "has_tactics": false },
//!       "answers": {
//!         "material": { "kind": "propose", "action": "g1f3", "confidence": 0.7 },
//!         "book": { "kind": "abstain" }
//!       }
//!     }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use move_ensemble::{
    AgentContext, AgentError, AgentId, AgentRegistry, Move, PositionFeatures, Proposer,
    Suggestion,
};
use serde::{Deserialize, Serialize};

/// What one agent does at one position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScriptedAnswer {
    Propose { action: Move, confidence: f64 },
    Abstain,
    Fail { message: String },
}

/// One recorded position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioPosition {
    #[serde(default)]
    pub label: Option<String>,
    pub features: PositionFeatures,
    /// Agents missing here abstain
    #[serde(default)]
    pub answers: BTreeMap<AgentId, ScriptedAnswer>,
}

/// A sequence of positions from one game
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub game_id: Option<String>,
    pub positions: Vec<ScenarioPosition>,
}

impl Scenario {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to parse scenario")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("In {}", path.display()))
    }

    /// Every agent scripted anywhere in the scenario
    pub fn agents(&self) -> Vec<AgentId> {
        let mut agents: Vec<AgentId> = self
            .positions
            .iter()
            .flat_map(|p| p.answers.keys().cloned())
            .collect();
        agents.sort();
        agents.dedup();
        agents
    }

    /// Reject scripts for agents the registry does not know
    pub fn check_agents(&self, registry: &AgentRegistry) -> Result<()> {
        let unknown: Vec<AgentId> = self
            .agents()
            .into_iter()
            .filter(|id| !registry.contains(id))
            .collect();
        if !unknown.is_empty() {
            bail!("Scenario scripts unregistered agents: {}", unknown.join(", "));
        }
        Ok(())
    }
}

/// Agent that replays its scripted answers
#[derive(Debug, Clone)]
pub struct ScriptedProposer {
    agent_id: AgentId,
}

impl ScriptedProposer {
    pub fn new(agent_id: impl Into<AgentId>) -> Self {
        Self {
            agent_id: agent_id.into(),
        }
    }
}

#[async_trait]
impl Proposer<ScenarioPosition> for ScriptedProposer {
    async fn propose(
        &self,
        position: &ScenarioPosition,
        _ctx: &AgentContext<'_>,
    ) -> Result<Option<Suggestion>, AgentError> {
        match position.answers.get(&self.agent_id) {
            Some(ScriptedAnswer::Propose { action, confidence }) => {
                Ok(Some(Suggestion::new(*action, *confidence)))
            }
            Some(ScriptedAnswer::Abstain) | None => Ok(None),
            Some(ScriptedAnswer::Fail { message }) => Err(AgentError::Failed(message.clone())),
        }
    }
}

/// Evaluator reading the recorded features back
pub fn recorded_features(position: &ScenarioPosition) -> PositionFeatures {
    position.features.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "game_id": "demo",
        "positions": [
            {
                "features": { "material_balance": { "white": 39, "black": 39 },
                              "mobility_count": 29, "king_safety_score": 0.0,
                              "ply_number": 2, "has_tactics": false },
                "answers": {
                    "material": { "kind": "propose", "action": "g1f3", "confidence": 0.7 },
                    "book": { "kind": "abstain" },
                    "broken": { "kind": "fail", "message": "no table" }
                }
            }
        ]
    }"#;

    #[test]
    fn test_parse_scenario() {
        let scenario = Scenario::from_json(SAMPLE).unwrap();
        assert_eq!(scenario.game_id.as_deref(), Some("demo"));
        assert_eq!(scenario.agents(), vec!["book", "broken", "material"]);
        assert_eq!(
            scenario.positions[0].answers["material"],
            ScriptedAnswer::Propose {
                action: "g1f3".parse().unwrap(),
                confidence: 0.7
            }
        );
    }

    #[test]
    fn test_check_agents() {
        let scenario = Scenario::from_json(SAMPLE).unwrap();
        let partial = AgentRegistry::new().with_agent("material", 1.0);
        let err = scenario.check_agents(&partial).unwrap_err();
        assert!(err.to_string().contains("book, broken"));

        let full = partial.with_agent("book", 1.0).with_agent("broken", 1.0);
        assert!(scenario.check_agents(&full).is_ok());
    }
}
