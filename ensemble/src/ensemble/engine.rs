//! Ensemble engine - orchestrates one move decision at a time
//!
//! A decision walks `Idle → Collecting → ResolvingWeights → Aggregating →
//! Updating → Idle`. The whole cycle runs under one async mutex, so bandit
//! reads and the update that follows them are atomic with respect to other
//! decisions and to configuration setters on the same engine. Independent
//! engines share nothing.
//!
//! Effective weights are computed on entry to `Collecting`, because they
//! choose which agents get polled. `ResolvingWeights` narrows that table to
//! the agents that actually proposed, which is what aggregation scores.
//!
//! Only `Updating`, the last stage, mutates the bandit table. A decision that
//! fails or is dropped earlier leaves no trace in engine state.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::agent::{
    AgentContext, AgentFailure, AgentFailureKind, AgentId, Proposal, Proposer, SharedProposer,
    Suggestion,
};
use super::aggregator::{aggregate, AggregationError, AggregatorSettings};
use super::bandit::{BanditState, BanditUpdater, ClampEvent};
use super::trace::DecisionTrace;
use super::weights::WeightResolver;
use crate::config::{AgentRegistry, ConfigError, EnsembleConfig, PhaseWeightTable};
use crate::events::{EngineEvent, SharedEventBus};
use crate::moves::Move;
use crate::position::{
    BucketKey, BucketKeyBuilder, PhaseClassifier, PhaseThresholds, PositionEvaluator,
    SharedContext,
};

/// Error type for engine operations
#[derive(Debug, thiserror::Error)]
pub enum EnsembleError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("No proposals: {polled} agents polled, {abstained} abstained, {failed} failed")]
    EmptyProposalSet {
        polled: usize,
        abstained: usize,
        failed: usize,
    },

    #[error("Aggregation error: {0}")]
    Aggregation(#[from] AggregationError),
}

/// Result type for engine operations
pub type EnsembleResult<T> = Result<T, EnsembleError>;

/// Shared reference to an engine
pub type SharedEnsembleEngine<P> = Arc<EnsembleEngine<P>>;

/// Where the engine is in its decision cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStage {
    Idle,
    Collecting,
    ResolvingWeights,
    Aggregating,
    Updating,
}

impl DecisionStage {
    fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Collecting => 1,
            Self::ResolvingWeights => 2,
            Self::Aggregating => 3,
            Self::Updating => 4,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Collecting,
            2 => Self::ResolvingWeights,
            3 => Self::Aggregating,
            4 => Self::Updating,
            _ => Self::Idle,
        }
    }
}

impl std::fmt::Display for DecisionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Collecting => write!(f, "collecting"),
            Self::ResolvingWeights => write!(f, "resolving_weights"),
            Self::Aggregating => write!(f, "aggregating"),
            Self::Updating => write!(f, "updating"),
        }
    }
}

/// Moves the stage marker forward and puts it back to idle when dropped
struct StageGuard<'a> {
    stage: &'a AtomicU8,
}

impl<'a> StageGuard<'a> {
    fn enter(stage: &'a AtomicU8, first: DecisionStage) -> Self {
        let guard = Self { stage };
        guard.advance(first);
        guard
    }

    fn advance(&self, next: DecisionStage) {
        debug!(stage = %next, "Decision stage");
        self.stage.store(next.as_u8(), Ordering::SeqCst);
    }
}

impl Drop for StageGuard<'_> {
    fn drop(&mut self) {
        self.stage.store(DecisionStage::Idle.as_u8(), Ordering::SeqCst);
    }
}

/// Mutable engine state, guarded as one unit
struct EngineState {
    config: EnsembleConfig,
    bandit: BanditState,
}

/// What one polled agent answered
enum PollOutcome {
    Proposed(Suggestion),
    Abstained,
    Failed(AgentFailureKind),
}

/// An agent selected for polling this decision
struct PollTarget<P: ?Sized + Sync> {
    agent_id: AgentId,
    proposer: SharedProposer<P>,
    /// Polled for the record only; never aggregated
    audit: bool,
}

/// Meta-decision engine over a pool of strategy agents
pub struct EnsembleEngine<P: ?Sized + Sync> {
    evaluator: Arc<dyn PositionEvaluator<P>>,
    agents: BTreeMap<AgentId, SharedProposer<P>>,
    state: Mutex<EngineState>,
    stage: AtomicU8,
    event_bus: Option<SharedEventBus>,
}

impl<P: ?Sized + Sync + 'static> EnsembleEngine<P> {
    /// Create an engine with a validated configuration and no agents
    pub fn new(
        config: EnsembleConfig,
        evaluator: impl PositionEvaluator<P> + 'static,
    ) -> EnsembleResult<Self> {
        config.validate()?;
        Ok(Self {
            evaluator: Arc::new(evaluator),
            agents: BTreeMap::new(),
            state: Mutex::new(EngineState {
                config,
                bandit: BanditState::new(),
            }),
            stage: AtomicU8::new(DecisionStage::Idle.as_u8()),
            event_bus: None,
        })
    }

    /// Register an agent implementation under `agent_id`
    ///
    /// The id must also appear in the registry by the time `decide` runs.
    pub fn with_agent(
        self,
        agent_id: impl Into<AgentId>,
        proposer: impl Proposer<P> + 'static,
    ) -> Self {
        self.with_shared_agent(agent_id, Arc::new(proposer))
    }

    pub fn with_shared_agent(
        mut self,
        agent_id: impl Into<AgentId>,
        proposer: SharedProposer<P>,
    ) -> Self {
        self.agents.insert(agent_id.into(), proposer);
        self
    }

    /// Publish engine events on this bus
    pub fn with_event_bus(mut self, event_bus: SharedEventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Start from a previously saved bandit table
    pub fn with_bandit(mut self, bandit: BanditState) -> Self {
        let state = self.state.get_mut();
        state.bandit = bandit;
        let (min, max) = (state.config.multiplier_min, state.config.multiplier_max);
        for event in state.bandit.clamp_all(min, max) {
            warn!(
                bucket = %event.bucket,
                agent = %event.agent_id,
                attempted = event.attempted,
                clamped = event.clamped,
                "Restored multiplier clamped"
            );
        }
        self
    }

    /// Create a shared reference to this engine
    pub fn shared(self) -> SharedEnsembleEngine<P> {
        Arc::new(self)
    }

    /// Ids of agents with an implementation attached
    pub fn agent_ids(&self) -> impl Iterator<Item = &AgentId> {
        self.agents.keys()
    }

    /// Current stage of the decision cycle
    pub fn stage(&self) -> DecisionStage {
        DecisionStage::from_u8(self.stage.load(Ordering::SeqCst))
    }

    // =========================================================================
    // Decision
    // =========================================================================

    /// Choose a move for `position`
    ///
    /// Fails only on a configuration error or when no agent produced a usable
    /// proposal; agent errors, timeouts and abstentions are recorded in the
    /// trace and otherwise ignored.
    pub async fn decide(
        &self,
        position: &P,
        shared: &SharedContext,
    ) -> EnsembleResult<(Move, DecisionTrace)> {
        let mut guard = self.state.lock().await;
        let EngineState { config, bandit } = &mut *guard;
        let stage = StageGuard::enter(&self.stage, DecisionStage::Collecting);
        let game_id = shared.game_id.clone();

        let features = self.evaluator.features(position);
        let phase = PhaseClassifier::new(config.phase.clone()).classify(&features);
        let bucket = BucketKeyBuilder::new(config.low_mobility_threshold).build(phase, &features);
        debug!(phase = %phase, bucket = %bucket, ply = features.ply_number, "Position classified");

        // Effective weights decide who is polled; the bandit cannot move
        // underneath us while the lock is held.
        let resolver = WeightResolver::new(&config.agents, config.phase_weights.as_ref(), bandit);
        let effective = resolver.resolve_all(self.agents.keys(), phase, &bucket)?;
        let mut targets = Vec::new();
        for (agent_id, proposer) in &self.agents {
            let weight = effective.get(agent_id).copied().unwrap_or(0.0);
            let audit = weight <= 0.0;
            if audit && !config.audit_zero_weight {
                debug!(agent = %agent_id, "Skipping zero-weight agent");
                continue;
            }
            targets.push(PollTarget {
                agent_id: agent_id.clone(),
                proposer: proposer.clone(),
                audit,
            });
        }
        for (agent_id, _) in config.agents.iter() {
            if !self.agents.contains_key(agent_id) {
                debug!(agent = %agent_id, "Registered agent has no implementation");
            }
        }

        let ctx = AgentContext {
            shared,
            features: &features,
            phase,
            bucket,
        };
        let window = config.poll_timeout_ms.map(Duration::from_millis);
        let outcomes = join_all(
            targets
                .iter()
                .map(|target| poll_agent(target.proposer.as_ref(), position, ctx, window)),
        )
        .await;

        let mut proposals = Vec::new();
        let mut audit_proposals = Vec::new();
        let mut abstained = Vec::new();
        let mut agent_failures = Vec::new();
        for (target, outcome) in targets.iter().zip(outcomes) {
            match outcome {
                PollOutcome::Proposed(suggestion) => {
                    debug!(
                        agent = %target.agent_id,
                        action = %suggestion.action,
                        confidence = suggestion.confidence,
                        audit = target.audit,
                        "Agent proposed"
                    );
                    let proposal = Proposal::new(
                        target.agent_id.clone(),
                        suggestion.action,
                        suggestion.confidence,
                    );
                    if target.audit {
                        audit_proposals.push(proposal);
                    } else {
                        proposals.push(proposal);
                    }
                }
                PollOutcome::Abstained => {
                    debug!(agent = %target.agent_id, "Agent abstained");
                    abstained.push(target.agent_id.clone());
                }
                PollOutcome::Failed(kind) => {
                    warn!(agent = %target.agent_id, failure = %kind, "Agent failed, skipping");
                    self.publish(EngineEvent::AgentFailed {
                        game_id: game_id.clone(),
                        agent_id: target.agent_id.clone(),
                        failure: kind.clone(),
                        timestamp: Utc::now(),
                    });
                    agent_failures.push(AgentFailure {
                        agent_id: target.agent_id.clone(),
                        kind,
                    });
                }
            }
        }

        if proposals.is_empty() {
            let error = EnsembleError::EmptyProposalSet {
                polled: targets.len(),
                abstained: abstained.len(),
                failed: agent_failures.len(),
            };
            warn!(bucket = %bucket, error = %error, "Decision failed");
            self.publish(EngineEvent::DecisionFailed {
                game_id,
                bucket: Some(bucket),
                reason: error.to_string(),
                timestamp: Utc::now(),
            });
            return Err(error);
        }

        stage.advance(DecisionStage::ResolvingWeights);
        let weights: BTreeMap<AgentId, f64> = proposals
            .iter()
            .filter_map(|p| {
                effective
                    .get(&p.agent_id)
                    .map(|w| (p.agent_id.clone(), *w))
            })
            .collect();

        stage.advance(DecisionStage::Aggregating);
        let aggregation = aggregate(
            &proposals,
            &weights,
            &AggregatorSettings::from_config(config),
        )?;

        stage.advance(DecisionStage::Updating);
        let update = BanditUpdater::from_config(config).update(
            bandit,
            bucket,
            &aggregation.contributing_agents,
            config.agents.iter().map(|(id, _)| id),
        );
        for event in &update.clamp_events {
            self.publish_clamp(event);
        }

        info!(
            bucket = %bucket,
            winner = %aggregation.winner,
            score = aggregation.winning_score,
            proposals = proposals.len(),
            contributors = aggregation.contributing_agents.len(),
            "Decision made"
        );
        self.publish(EngineEvent::DecisionCompleted {
            game_id,
            bucket,
            winner: aggregation.winner,
            score: aggregation.winning_score,
            contributing_agents: aggregation.contributing_agents.clone(),
            timestamp: Utc::now(),
        });

        let trace = DecisionTrace {
            phase,
            bucket_key: bucket,
            features,
            proposals,
            weights,
            per_action_scores: aggregation.per_action_scores,
            raw_confidence: aggregation.raw_confidence,
            diversity_bonus_applied: aggregation.diversity_pairs,
            winning_action: aggregation.winner,
            contributing_agents: aggregation.contributing_agents,
            abstained,
            agent_failures,
            audit_proposals,
            clamp_events: update.clamp_events,
        };
        Ok((aggregation.winner, trace))
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Snapshot of the current configuration
    pub async fn config(&self) -> EnsembleConfig {
        self.state.lock().await.config.clone()
    }

    /// Replace the whole configuration
    pub async fn configure(&self, config: EnsembleConfig) -> EnsembleResult<()> {
        self.reconfigure("config", |current| *current = config).await
    }

    pub async fn set_registry(&self, registry: AgentRegistry) -> EnsembleResult<()> {
        self.reconfigure("agents", |config| config.agents = registry).await
    }

    pub async fn set_phase_weights(&self, table: Option<PhaseWeightTable>) -> EnsembleResult<()> {
        self.reconfigure("phase_weights", |config| config.phase_weights = table).await
    }

    pub async fn set_diversity_enabled(&self, enabled: bool) -> EnsembleResult<()> {
        self.reconfigure("diversity_enabled", |config| {
            config.diversity_enabled = enabled
        })
        .await
    }

    pub async fn set_diversity_bonus(&self, bonus: f64) -> EnsembleResult<()> {
        self.reconfigure("diversity_bonus", |config| config.diversity_bonus = bonus).await
    }

    pub async fn set_overlap_threshold(&self, threshold: f64) -> EnsembleResult<()> {
        self.reconfigure("overlap_threshold", |config| {
            config.overlap_threshold = threshold
        })
        .await
    }

    pub async fn set_alpha(&self, alpha: f64) -> EnsembleResult<()> {
        self.reconfigure("alpha", |config| config.alpha = alpha).await
    }

    /// Change the clamp range; stored multipliers are pulled into it
    pub async fn set_multiplier_bounds(&self, min: f64, max: f64) -> EnsembleResult<()> {
        self.reconfigure("multiplier_bounds", |config| {
            config.multiplier_min = min;
            config.multiplier_max = max;
        })
        .await
    }

    pub async fn set_phase_thresholds(&self, thresholds: PhaseThresholds) -> EnsembleResult<()> {
        self.reconfigure("phase", |config| config.phase = thresholds).await
    }

    pub async fn set_low_mobility_threshold(&self, threshold: u32) -> EnsembleResult<()> {
        self.reconfigure("low_mobility_threshold", |config| {
            config.low_mobility_threshold = threshold
        })
        .await
    }

    pub async fn set_audit_zero_weight(&self, audit: bool) -> EnsembleResult<()> {
        self.reconfigure("audit_zero_weight", |config| config.audit_zero_weight = audit).await
    }

    pub async fn set_poll_timeout(&self, window: Option<Duration>) -> EnsembleResult<()> {
        let millis = window.map(|w| u64::try_from(w.as_millis()).unwrap_or(u64::MAX));
        self.reconfigure("poll_timeout_ms", |config| config.poll_timeout_ms = millis).await
    }

    /// Validate and apply a configuration change under the decision lock
    async fn reconfigure(
        &self,
        setting: &str,
        change: impl FnOnce(&mut EnsembleConfig),
    ) -> EnsembleResult<()> {
        let mut state = self.state.lock().await;
        let mut next = state.config.clone();
        change(&mut next);
        next.validate()?;

        let bounds_changed = next.multiplier_min != state.config.multiplier_min
            || next.multiplier_max != state.config.multiplier_max;
        state.config = next;
        if bounds_changed {
            let (min, max) = (state.config.multiplier_min, state.config.multiplier_max);
            for event in state.bandit.clamp_all(min, max) {
                warn!(
                    bucket = %event.bucket,
                    agent = %event.agent_id,
                    attempted = event.attempted,
                    clamped = event.clamped,
                    "Multiplier clamped to new bounds"
                );
                self.publish_clamp(&event);
            }
        }

        info!(setting, "Configuration changed");
        self.publish(EngineEvent::ConfigurationChanged {
            setting: setting.to_string(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    // =========================================================================
    // Bandit state
    // =========================================================================

    /// Copy of the learned multipliers, e.g. for persistence
    pub async fn bandit_snapshot(&self) -> BanditState {
        self.state.lock().await.bandit.clone()
    }

    /// Replace the learned multipliers, clamping them to the current bounds
    pub async fn restore_bandit(&self, bandit: BanditState) -> Vec<ClampEvent> {
        let mut state = self.state.lock().await;
        state.bandit = bandit;
        let (min, max) = (state.config.multiplier_min, state.config.multiplier_max);
        let events = state.bandit.clamp_all(min, max);
        for event in &events {
            self.publish_clamp(event);
        }
        info!(
            buckets = state.bandit.buckets().count(),
            clamped = events.len(),
            "Bandit state restored"
        );
        events
    }

    /// Current multiplier for one `(bucket, agent)` pair
    pub async fn multiplier(&self, bucket: &BucketKey, agent: &str) -> f64 {
        self.state.lock().await.bandit.multiplier(bucket, agent)
    }

    /// Forget everything learned so far
    pub async fn reset_bandit(&self) {
        self.state.lock().await.bandit = BanditState::new();
        info!("Bandit state reset");
    }

    // =========================================================================
    // Events
    // =========================================================================

    fn publish(&self, event: EngineEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }

    fn publish_clamp(&self, event: &ClampEvent) {
        self.publish(EngineEvent::MultiplierClamped {
            bucket: event.bucket,
            agent_id: event.agent_id.clone(),
            attempted: event.attempted,
            clamped: event.clamped,
            timestamp: Utc::now(),
        });
    }
}

/// Ask one agent, turning errors, timeouts and bad confidences into failures
async fn poll_agent<P: ?Sized + Sync>(
    proposer: &dyn Proposer<P>,
    position: &P,
    ctx: AgentContext<'_>,
    window: Option<Duration>,
) -> PollOutcome {
    let answer = match window {
        Some(window) => match tokio::time::timeout(window, proposer.propose(position, &ctx)).await
        {
            Ok(answer) => answer,
            Err(_) => {
                return PollOutcome::Failed(AgentFailureKind::Timeout {
                    after_ms: u64::try_from(window.as_millis()).unwrap_or(u64::MAX),
                })
            }
        },
        None => proposer.propose(position, &ctx).await,
    };

    match answer {
        Ok(Some(suggestion)) => {
            let confidence = suggestion.confidence;
            if confidence.is_finite() && (0.0..=1.0).contains(&confidence) {
                PollOutcome::Proposed(suggestion)
            } else {
                PollOutcome::Failed(AgentFailureKind::InvalidConfidence { confidence })
            }
        }
        Ok(None) => PollOutcome::Abstained,
        Err(e) => PollOutcome::Failed(AgentFailureKind::Error {
            message: e.to_string(),
        }),
    }
}
