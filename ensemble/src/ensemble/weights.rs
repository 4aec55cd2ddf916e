//! Effective agent weights
//!
//! `effective = (phase override, else base weight) × bandit multiplier`.
//! The fallback chain is fixed: an agent missing from a phase table falls
//! back to its base weight, never to zero, and an agent missing from the
//! registry is a configuration error.

use std::collections::BTreeMap;

use super::agent::AgentId;
use super::bandit::BanditState;
use crate::config::{AgentRegistry, ConfigResult, PhaseWeightTable};
use crate::position::{BucketKey, Phase};

/// Read-only view over the three weight sources
#[derive(Debug, Clone, Copy)]
pub struct WeightResolver<'a> {
    registry: &'a AgentRegistry,
    phase_weights: Option<&'a PhaseWeightTable>,
    bandit: &'a BanditState,
}

impl<'a> WeightResolver<'a> {
    pub fn new(
        registry: &'a AgentRegistry,
        phase_weights: Option<&'a PhaseWeightTable>,
        bandit: &'a BanditState,
    ) -> Self {
        Self {
            registry,
            phase_weights,
            bandit,
        }
    }

    /// Weight before the bandit multiplier
    pub fn phase_weight(&self, agent: &str, phase: Phase) -> ConfigResult<f64> {
        let base = self.registry.require(agent)?;
        let overridden = self
            .phase_weights
            .and_then(|table| table.override_for(phase, agent));
        Ok(overridden.unwrap_or(base))
    }

    /// Effective weight of `agent` for this phase and bucket
    pub fn resolve(&self, agent: &str, phase: Phase, bucket: &BucketKey) -> ConfigResult<f64> {
        let weight = self.phase_weight(agent, phase)?;
        Ok(weight * self.bandit.multiplier(bucket, agent))
    }

    /// Resolve a batch of agents, failing on the first unknown one
    pub fn resolve_all<'b>(
        &self,
        agents: impl IntoIterator<Item = &'b AgentId>,
        phase: Phase,
        bucket: &BucketKey,
    ) -> ConfigResult<BTreeMap<AgentId, f64>> {
        agents
            .into_iter()
            .map(|agent| Ok((agent.clone(), self.resolve(agent, phase, bucket)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::ensemble::bandit::BanditUpdater;

    fn registry() -> AgentRegistry {
        AgentRegistry::new()
            .with_agent("material", 1.0)
            .with_agent("book", 0.5)
            .with_agent("idle", 0.0)
    }

    fn bucket() -> BucketKey {
        BucketKey::new(Phase::Opening, false, false)
    }

    #[test]
    fn test_base_weight_without_table() {
        let registry = registry();
        let bandit = BanditState::new();
        let resolver = WeightResolver::new(&registry, None, &bandit);

        assert_eq!(resolver.resolve("material", Phase::Opening, &bucket()).unwrap(), 1.0);
        assert_eq!(resolver.resolve("idle", Phase::Opening, &bucket()).unwrap(), 0.0);
    }

    #[test]
    fn test_phase_override_and_fallback() {
        let registry = registry();
        let table = PhaseWeightTable::new().with_override(Phase::Opening, "book", 3.0);
        let bandit = BanditState::new();
        let resolver = WeightResolver::new(&registry, Some(&table), &bandit);

        assert_eq!(resolver.resolve("book", Phase::Opening, &bucket()).unwrap(), 3.0);
        // Not listed for the phase: base weight, not zero
        assert_eq!(resolver.resolve("material", Phase::Opening, &bucket()).unwrap(), 1.0);
        // Phase not covered at all
        let endgame = BucketKey::new(Phase::Endgame, false, false);
        assert_eq!(resolver.resolve("book", Phase::Endgame, &endgame).unwrap(), 0.5);
    }

    #[test]
    fn test_multiplier_scales_weight() {
        let registry = registry();
        let mut bandit = BanditState::new();
        let agents = vec!["material".to_string()];
        BanditUpdater::new(0.5, 0.25, 4.0)
            .unwrap()
            .update(&mut bandit, bucket(), &agents, &agents);

        let resolver = WeightResolver::new(&registry, None, &bandit);
        assert_eq!(resolver.resolve("material", Phase::Opening, &bucket()).unwrap(), 1.5);
        // Same agent in another bucket is unaffected
        let other = BucketKey::new(Phase::Opening, true, false);
        assert_eq!(resolver.resolve("material", Phase::Opening, &other).unwrap(), 1.0);
    }

    #[test]
    fn test_unknown_agent_is_an_error() {
        let registry = registry();
        let bandit = BanditState::new();
        let resolver = WeightResolver::new(&registry, None, &bandit);

        assert_eq!(
            resolver.resolve("ghost", Phase::Opening, &bucket()),
            Err(ConfigError::UnknownAgent("ghost".to_string()))
        );
        let agents = vec!["material".to_string(), "ghost".to_string()];
        assert!(resolver
            .resolve_all(&agents, Phase::Opening, &bucket())
            .is_err());
    }
}
