//! Engine configuration
//!
//! Everything the engine reads at the start of a decision lives in one
//! fixed-shape [`EnsembleConfig`]: the agent registry, the optional per-phase
//! weight overrides, diversity and bandit parameters, and classifier
//! thresholds. Configurations load from TOML and are validated before an
//! engine will accept them.
//!
//! ```toml
//! alpha = 0.15
//! diversity_enabled = true
//! diversity_bonus = 0.1
//!
//! [agents]
//! material = 1.0
//! tactics = 1.5
//! book = 0.0
//!
//! [phase_weights.opening]
//! book = 2.0
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ensemble::agent::AgentId;
use crate::position::{Phase, PhaseThresholds};

/// Default bandit learning rate
pub const DEFAULT_ALPHA: f64 = 0.15;
/// Default lower multiplier clamp
pub const DEFAULT_MULTIPLIER_MIN: f64 = 0.25;
/// Default upper multiplier clamp
pub const DEFAULT_MULTIPLIER_MAX: f64 = 4.0;
/// Default additive diversity bonus factor
pub const DEFAULT_DIVERSITY_BONUS: f64 = 0.1;
/// Overlap at or below which two proposals count as genuinely different
pub const DEFAULT_OVERLAP_THRESHOLD: f64 = 0.25;
/// Legal-move counts strictly below this mark a low-mobility position
pub const DEFAULT_LOW_MOBILITY_THRESHOLD: u32 = 20;

/// Environment variable overriding [`EnsembleConfig::alpha`]
pub const ENV_ALPHA: &str = "ENSEMBLE_ALPHA";
/// Environment variable overriding [`EnsembleConfig::diversity_bonus`]
pub const ENV_DIVERSITY_BONUS: &str = "ENSEMBLE_DIVERSITY_BONUS";

/// Error type for configuration problems
///
/// Always fatal to the call that hit it; never retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Negative base weight {weight} for agent {agent}")]
    NegativeWeight { agent: String, weight: f64 },

    #[error("Negative {phase} weight override {weight} for agent {agent}")]
    NegativePhaseWeight {
        phase: Phase,
        agent: String,
        weight: f64,
    },

    #[error("Non-finite value {value} for {field}")]
    NonFinite { field: String, value: f64 },

    #[error("Learning rate alpha {0} outside [0, 1]")]
    AlphaOutOfRange(f64),

    #[error("Invalid multiplier bounds: min {min} > max {max}")]
    InvalidMultiplierBounds { min: f64, max: f64 },

    #[error("Negative multiplier bound {0}")]
    NegativeMultiplierBound(f64),

    #[error("Multiplier bounds [{min}, {max}] exclude the initial multiplier 1.0")]
    InitialMultiplierOutOfBounds { min: f64, max: f64 },

    #[error("Negative diversity bonus {0}")]
    NegativeDiversityBonus(f64),

    #[error("Overlap threshold {0} outside [0, 1]")]
    OverlapThresholdOutOfRange(f64),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Failed to read configuration: {0}")]
    Io(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Base weight per registered agent
///
/// An agent with weight 0 stays registered (audit, enable later) but never
/// contributes to aggregation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentRegistry {
    weights: BTreeMap<AgentId, f64>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration
    pub fn with_agent(mut self, agent: impl Into<AgentId>, weight: f64) -> Self {
        self.insert(agent, weight);
        self
    }

    pub fn insert(&mut self, agent: impl Into<AgentId>, weight: f64) {
        self.weights.insert(agent.into(), weight);
    }

    pub fn base_weight(&self, agent: &str) -> Option<f64> {
        self.weights.get(agent).copied()
    }

    /// Base weight, or a configuration error for an unregistered agent
    pub fn require(&self, agent: &str) -> ConfigResult<f64> {
        self.base_weight(agent)
            .ok_or_else(|| ConfigError::UnknownAgent(agent.to_string()))
    }

    pub fn contains(&self, agent: &str) -> bool {
        self.weights.contains_key(agent)
    }

    /// Agents in id order
    pub fn iter(&self) -> impl Iterator<Item = (&AgentId, f64)> {
        self.weights.iter().map(|(id, w)| (id, *w))
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

impl FromIterator<(AgentId, f64)> for AgentRegistry {
    fn from_iter<I: IntoIterator<Item = (AgentId, f64)>>(iter: I) -> Self {
        Self {
            weights: iter.into_iter().collect(),
        }
    }
}

/// Optional per-phase weight overrides
///
/// An agent not listed for a phase keeps its base weight.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhaseWeightTable {
    overrides: BTreeMap<Phase, BTreeMap<AgentId, f64>>,
}

impl PhaseWeightTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_override(mut self, phase: Phase, agent: impl Into<AgentId>, weight: f64) -> Self {
        self.set(phase, agent, weight);
        self
    }

    pub fn set(&mut self, phase: Phase, agent: impl Into<AgentId>, weight: f64) {
        self.overrides
            .entry(phase)
            .or_default()
            .insert(agent.into(), weight);
    }

    /// Whether any override exists for this phase
    pub fn covers(&self, phase: Phase) -> bool {
        self.overrides.contains_key(&phase)
    }

    pub fn override_for(&self, phase: Phase, agent: &str) -> Option<f64> {
        self.overrides.get(&phase)?.get(agent).copied()
    }

    fn entries(&self) -> impl Iterator<Item = (Phase, &AgentId, f64)> {
        self.overrides
            .iter()
            .flat_map(|(phase, table)| table.iter().map(move |(id, w)| (*phase, id, *w)))
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    /// Registered agents and their base weights
    pub agents: AgentRegistry,
    /// Per-phase overrides of the base weights
    pub phase_weights: Option<PhaseWeightTable>,
    /// Whether low-overlap proposals earn the diversity bonus
    pub diversity_enabled: bool,
    /// Bonus factor, multiplied by the proposing agent's weight
    pub diversity_bonus: f64,
    /// Overlap at or below which a pair of proposals earns the bonus
    pub overlap_threshold: f64,
    /// Bandit learning rate in [0, 1]
    pub alpha: f64,
    /// Lower clamp for bandit multipliers
    pub multiplier_min: f64,
    /// Upper clamp for bandit multipliers
    pub multiplier_max: f64,
    /// Phase classifier thresholds
    pub phase: PhaseThresholds,
    /// Mobility below this builds a "low" bucket
    pub low_mobility_threshold: u32,
    /// Per-agent answer window in milliseconds (no limit when unset)
    pub poll_timeout_ms: Option<u64>,
    /// Also poll zero-weight agents, recording but discarding their proposals
    pub audit_zero_weight: bool,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            agents: AgentRegistry::default(),
            phase_weights: None,
            diversity_enabled: true,
            diversity_bonus: DEFAULT_DIVERSITY_BONUS,
            overlap_threshold: DEFAULT_OVERLAP_THRESHOLD,
            alpha: DEFAULT_ALPHA,
            multiplier_min: DEFAULT_MULTIPLIER_MIN,
            multiplier_max: DEFAULT_MULTIPLIER_MAX,
            phase: PhaseThresholds::default(),
            low_mobility_threshold: DEFAULT_LOW_MOBILITY_THRESHOLD,
            poll_timeout_ms: None,
            audit_zero_weight: false,
        }
    }
}

impl EnsembleConfig {
    /// Default configuration with the given agents
    pub fn with_agents(agents: AgentRegistry) -> Self {
        Self {
            agents,
            ..Self::default()
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load, apply environment overrides and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        let mut config: Self =
            toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `ENSEMBLE_ALPHA` / `ENSEMBLE_DIVERSITY_BONUS` if set
    pub fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        if let Some(alpha) = env_f64(ENV_ALPHA)? {
            self.alpha = alpha;
        }
        if let Some(bonus) = env_f64(ENV_DIVERSITY_BONUS)? {
            self.diversity_bonus = bonus;
        }
        Ok(())
    }

    /// Check every numeric rule; the first violation wins
    pub fn validate(&self) -> ConfigResult<()> {
        for (agent, weight) in self.agents.iter() {
            check_finite(&format!("agents.{agent}"), weight)?;
            if weight < 0.0 {
                return Err(ConfigError::NegativeWeight {
                    agent: agent.clone(),
                    weight,
                });
            }
        }

        if let Some(table) = &self.phase_weights {
            for (phase, agent, weight) in table.entries() {
                check_finite(&format!("phase_weights.{phase}.{agent}"), weight)?;
                if weight < 0.0 {
                    return Err(ConfigError::NegativePhaseWeight {
                        phase,
                        agent: agent.clone(),
                        weight,
                    });
                }
                if !self.agents.contains(agent) {
                    return Err(ConfigError::UnknownAgent(agent.clone()));
                }
            }
        }

        validate_alpha(self.alpha)?;
        validate_bounds(self.multiplier_min, self.multiplier_max)?;

        check_finite("diversity_bonus", self.diversity_bonus)?;
        if self.diversity_bonus < 0.0 {
            return Err(ConfigError::NegativeDiversityBonus(self.diversity_bonus));
        }

        check_finite("overlap_threshold", self.overlap_threshold)?;
        if !(0.0..=1.0).contains(&self.overlap_threshold) {
            return Err(ConfigError::OverlapThresholdOutOfRange(
                self.overlap_threshold,
            ));
        }

        Ok(())
    }
}

/// Validate a bandit learning rate
pub fn validate_alpha(alpha: f64) -> ConfigResult<()> {
    check_finite("alpha", alpha)?;
    if !(0.0..=1.0).contains(&alpha) {
        return Err(ConfigError::AlphaOutOfRange(alpha));
    }
    Ok(())
}

/// Validate a multiplier clamp range
pub fn validate_bounds(min: f64, max: f64) -> ConfigResult<()> {
    check_finite("multiplier_min", min)?;
    check_finite("multiplier_max", max)?;
    if min < 0.0 {
        return Err(ConfigError::NegativeMultiplierBound(min));
    }
    if min > max {
        return Err(ConfigError::InvalidMultiplierBounds { min, max });
    }
    if min > 1.0 || max < 1.0 {
        return Err(ConfigError::InitialMultiplierOutOfBounds { min, max });
    }
    Ok(())
}

fn check_finite(field: &str, value: f64) -> ConfigResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonFinite {
            field: field.to_string(),
            value,
        })
    }
}

fn env_f64(name: &str) -> ConfigResult<Option<f64>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|e| ConfigError::Parse(format!("{name}={raw:?}: {e}"))),
        Err(_) => Ok(None),
    }
}
