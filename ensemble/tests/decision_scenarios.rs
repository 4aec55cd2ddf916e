//! Decision scenarios run through the full engine.
//!
//! Covers the reference scenarios (shared move, weight over confidence,
//! diversity bonus, bandit reinforcement, empty proposal set) plus the
//! engine-level behaviors around them: phase overrides, audit polling,
//! polling windows, published events and concurrent use of one engine.

use std::time::Duration;

use async_trait::async_trait;
use move_ensemble::events::{EventBus, EventFilter};
use move_ensemble::{
    overlap, AgentContext, AgentError, AgentFailureKind, AgentRegistry, BucketKey,
    DecisionStage, EngineEvent, EnsembleConfig, EnsembleEngine, EnsembleError, MaterialBalance,
    Move, Phase, PhaseWeightTable, PositionFeatures, Proposer, SharedContext, Suggestion,
};

// ── Helpers ────────────────────────────────────────────────────────

/// Agent that always gives the same answer
struct Fixed(Option<Suggestion>);

#[async_trait]
impl Proposer<PositionFeatures> for Fixed {
    async fn propose(
        &self,
        _position: &PositionFeatures,
        _ctx: &AgentContext<'_>,
    ) -> Result<Option<Suggestion>, AgentError> {
        Ok(self.0)
    }
}

/// Agent that answers only after a delay
struct Slow {
    delay: Duration,
    answer: Suggestion,
}

#[async_trait]
impl Proposer<PositionFeatures> for Slow {
    async fn propose(
        &self,
        _position: &PositionFeatures,
        _ctx: &AgentContext<'_>,
    ) -> Result<Option<Suggestion>, AgentError> {
        tokio::time::sleep(self.delay).await;
        Ok(Some(self.answer))
    }
}

fn mv(s: &str) -> Move {
    s.parse().unwrap()
}

fn says(action: &str, confidence: f64) -> Fixed {
    Fixed(Some(Suggestion::new(mv(action), confidence)))
}

fn silent() -> Fixed {
    Fixed(None)
}

fn identity(features: &PositionFeatures) -> PositionFeatures {
    features.clone()
}

/// Classifies as `middlegame|quiet|norm`
fn quiet_middlegame() -> PositionFeatures {
    PositionFeatures {
        material_balance: MaterialBalance::new(33, 32),
        mobility_count: 34,
        king_safety_score: 0.2,
        ply_number: 36,
        has_tactics: false,
    }
}

/// Classifies as `opening|quiet|norm`
fn opening() -> PositionFeatures {
    PositionFeatures {
        ply_number: 6,
        mobility_count: 27,
        ..PositionFeatures::default()
    }
}

fn config(agents: &[(&str, f64)], diversity: Option<f64>) -> EnsembleConfig {
    let registry: AgentRegistry = agents.iter().map(|(id, w)| (id.to_string(), *w)).collect();
    EnsembleConfig {
        diversity_enabled: diversity.is_some(),
        diversity_bonus: diversity.unwrap_or(0.0),
        ..EnsembleConfig::with_agents(registry)
    }
}

fn engine(config: EnsembleConfig) -> EnsembleEngine<PositionFeatures> {
    EnsembleEngine::new(config, identity).unwrap()
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

// ── Reference scenarios ────────────────────────────────────────────

#[tokio::test]
async fn test_scenario_a_shared_move() {
    let engine = engine(config(&[("a", 1.0), ("b", 1.0)], None))
        .with_agent("a", says("e2e4", 0.8))
        .with_agent("b", says("e2e4", 0.6));

    let (action, trace) = engine
        .decide(&quiet_middlegame(), &SharedContext::new())
        .await
        .unwrap();

    assert_eq!(action, mv("e2e4"));
    assert_eq!(trace.per_action_scores.len(), 1);
    assert!(approx(trace.per_action_scores[&mv("e2e4")], 1.4));
    assert_eq!(trace.contributing_agents, vec!["a", "b"]);
}

#[tokio::test]
async fn test_scenario_b_weight_beats_confidence() {
    let engine = engine(config(&[("a", 2.0), ("b", 1.0)], None))
        .with_agent("a", says("e2e4", 0.5))
        .with_agent("b", says("g1f3", 0.9));

    let (action, trace) = engine
        .decide(&quiet_middlegame(), &SharedContext::new())
        .await
        .unwrap();

    assert_eq!(action, mv("e2e4"));
    assert!(approx(trace.per_action_scores[&mv("e2e4")], 1.0));
    assert!(approx(trace.per_action_scores[&mv("g1f3")], 0.9));
    assert!(trace.diversity_bonus_applied.is_empty());
}

#[tokio::test]
async fn test_scenario_c_diversity_bonus() {
    assert_eq!(overlap(&mv("e2e4"), &mv("g1f3")), 0.0);

    let engine = engine(config(&[("a", 2.0), ("b", 1.0)], Some(0.5)))
        .with_agent("a", says("e2e4", 0.5))
        .with_agent("b", says("g1f3", 0.9));

    let (action, trace) = engine
        .decide(&quiet_middlegame(), &SharedContext::new())
        .await
        .unwrap();

    assert_eq!(action, mv("e2e4"));
    assert!(approx(trace.per_action_scores[&mv("e2e4")], 2.0));
    assert!(approx(trace.per_action_scores[&mv("g1f3")], 1.4));
    assert_eq!(trace.contributing_agents, vec!["a"]);
    assert_eq!(
        trace.diversity_bonus_applied,
        vec![("a".to_string(), "b".to_string())]
    );
}

#[tokio::test]
async fn test_scenario_d_bandit_update() {
    let engine = engine(config(&[("a", 1.0), ("b", 1.0), ("c", 1.0)], None))
        .with_agent("a", says("e2e4", 0.8))
        .with_agent("b", says("e2e4", 0.6))
        .with_agent("c", silent());

    let (_, trace) = engine
        .decide(&quiet_middlegame(), &SharedContext::new())
        .await
        .unwrap();

    let bucket: BucketKey = "middlegame|quiet|norm".parse().unwrap();
    assert_eq!(trace.bucket_key, bucket);
    assert!(approx(engine.multiplier(&bucket, "a").await, 1.15));
    assert!(approx(engine.multiplier(&bucket, "b").await, 1.15));
    assert_eq!(engine.multiplier(&bucket, "c").await, 1.0);

    // The bucket was created with every registered agent at 1.0
    let snapshot = engine.bandit_snapshot().await;
    assert_eq!(snapshot.get(&bucket, "c"), Some(1.0));
    assert_eq!(snapshot.buckets().count(), 1);
}

#[tokio::test]
async fn test_scenario_e_empty_proposal_set() {
    let engine = engine(config(&[("a", 1.0), ("b", 1.0)], Some(0.1)))
        .with_agent("a", silent())
        .with_agent("b", silent());
    let before = engine.bandit_snapshot().await;

    let result = engine
        .decide(&quiet_middlegame(), &SharedContext::new())
        .await;

    assert!(matches!(
        result,
        Err(EnsembleError::EmptyProposalSet {
            polled: 2,
            abstained: 2,
            failed: 0
        })
    ));
    assert_eq!(engine.bandit_snapshot().await, before);
    assert_eq!(engine.stage(), DecisionStage::Idle);
}

// ── Engine behaviors ───────────────────────────────────────────────

#[tokio::test]
async fn test_phase_override_changes_winner() {
    let mut cfg = config(&[("book", 0.5), ("material", 1.0)], None);
    cfg.phase_weights = Some(PhaseWeightTable::new().with_override(Phase::Opening, "book", 3.0));
    let engine = engine(cfg)
        .with_agent("book", says("c2c4", 0.6))
        .with_agent("material", says("e2e4", 0.9));

    // Opening: book 3.0 × 0.6 = 1.8 beats material 0.9
    let (action, trace) = engine.decide(&opening(), &SharedContext::new()).await.unwrap();
    assert_eq!(trace.phase, Phase::Opening);
    assert_eq!(action, mv("c2c4"));
    assert_eq!(trace.weights["book"], 3.0);

    // Middlegame falls back to base weights: 0.3 vs 0.9
    let (action, _) = engine
        .decide(&quiet_middlegame(), &SharedContext::new())
        .await
        .unwrap();
    assert_eq!(action, mv("e2e4"));
}

#[tokio::test]
async fn test_zero_weight_agents_audited_not_counted() {
    let mut cfg = config(&[("a", 1.0), ("shadow", 0.0)], None);
    cfg.audit_zero_weight = true;
    let engine = engine(cfg)
        .with_agent("a", says("e2e4", 0.4))
        .with_agent("shadow", says("d2d4", 1.0));

    let (action, trace) = engine
        .decide(&quiet_middlegame(), &SharedContext::new())
        .await
        .unwrap();

    assert_eq!(action, mv("e2e4"));
    assert_eq!(trace.audit_proposals.len(), 1);
    assert_eq!(trace.audit_proposals[0].agent_id, "shadow");
    assert!(!trace.per_action_scores.contains_key(&mv("d2d4")));
    assert_eq!(
        engine.multiplier(&trace.bucket_key, "shadow").await,
        1.0
    );
}

#[tokio::test(start_paused = true)]
async fn test_slow_agent_times_out() {
    let mut cfg = config(&[("fast", 1.0), ("slow", 5.0)], None);
    cfg.poll_timeout_ms = Some(50);
    let engine = engine(cfg)
        .with_agent("fast", says("e2e4", 0.5))
        .with_agent(
            "slow",
            Slow {
                delay: Duration::from_millis(500),
                answer: Suggestion::new(mv("d2d4"), 1.0),
            },
        );

    let (action, trace) = engine
        .decide(&quiet_middlegame(), &SharedContext::new())
        .await
        .unwrap();

    assert_eq!(action, mv("e2e4"));
    assert_eq!(trace.agent_failures.len(), 1);
    assert_eq!(trace.agent_failures[0].agent_id, "slow");
    assert_eq!(
        trace.agent_failures[0].kind,
        AgentFailureKind::Timeout { after_ms: 50 }
    );
}

#[tokio::test]
async fn test_events_published() {
    let bus = EventBus::new().shared();
    let mut decisions = bus.subscribe_filtered(
        EventFilter::new()
            .game("g-42")
            .types(vec!["decision_completed"]),
    );
    let mut failures = bus.subscribe_filtered(EventFilter::new().types(vec!["agent_failed"]));

    let engine = engine(config(&[("a", 1.0), ("b", 1.0)], None))
        .with_agent("a", says("e2e4", 0.8))
        .with_agent("b", says("e2e4", 1.7))
        .with_event_bus(bus.clone());

    engine
        .decide(&quiet_middlegame(), &SharedContext::new().with_game_id("g-42"))
        .await
        .unwrap();

    match decisions.recv().await.unwrap() {
        EngineEvent::DecisionCompleted {
            winner,
            contributing_agents,
            ..
        } => {
            assert_eq!(winner, mv("e2e4"));
            assert_eq!(contributing_agents, vec!["a"]);
        }
        other => panic!("unexpected event {other:?}"),
    }
    let failure = failures.recv().await.unwrap();
    assert_eq!(failure.agent_id(), Some("b"));
}

#[tokio::test]
async fn test_registry_setter_applies_to_next_decision() {
    let engine = engine(config(&[("a", 2.0), ("b", 1.0)], None))
        .with_agent("a", says("e2e4", 0.5))
        .with_agent("b", says("g1f3", 0.9));

    let (first, _) = engine
        .decide(&quiet_middlegame(), &SharedContext::new())
        .await
        .unwrap();
    assert_eq!(first, mv("e2e4"));

    engine
        .set_registry(AgentRegistry::new().with_agent("a", 0.5).with_agent("b", 1.0))
        .await
        .unwrap();
    engine.reset_bandit().await;

    let (second, _) = engine
        .decide(&quiet_middlegame(), &SharedContext::new())
        .await
        .unwrap();
    assert_eq!(second, mv("g1f3"));
}

// ── Concurrency and stages ─────────────────────────────────────────

#[tokio::test]
async fn test_concurrent_decisions_are_serialized() {
    let engine = engine(config(&[("a", 1.0), ("b", 1.0)], None))
        .with_agent("a", says("e2e4", 0.8))
        .with_agent("b", silent());
    let ctx = SharedContext::new();
    let position = quiet_middlegame();

    let (first, second) = tokio::join!(
        engine.decide(&position, &ctx),
        engine.decide(&position, &ctx)
    );
    let (_, first) = first.unwrap();
    let (_, second) = second.unwrap();
    assert_eq!(first.bucket_key, second.bucket_key);

    // Each decision saw the other's update: 1.15 after one, 1.15² after both
    let mut weights = [first.weights["a"], second.weights["a"]];
    weights.sort_by(f64::total_cmp);
    assert!(approx(weights[0], 1.0));
    assert!(approx(weights[1], 1.15));
    assert!(approx(
        engine.multiplier(&first.bucket_key, "a").await,
        1.15 * 1.15
    ));
    assert_eq!(engine.multiplier(&first.bucket_key, "b").await, 1.0);
}

#[tokio::test(start_paused = true)]
async fn test_stage_reported_while_collecting() {
    let engine = engine(config(&[("slow", 1.0)], None)).with_agent(
        "slow",
        Slow {
            delay: Duration::from_millis(100),
            answer: Suggestion::new(mv("e2e4"), 0.7),
        },
    );
    assert_eq!(engine.stage(), DecisionStage::Idle);

    let observer = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        engine.stage()
    };
    let position = quiet_middlegame();
    let ctx = SharedContext::new();
    let (result, seen) = tokio::join!(
        engine.decide(&position, &ctx),
        observer
    );

    assert_eq!(seen, DecisionStage::Collecting);
    assert_eq!(result.unwrap().0, mv("e2e4"));
    assert_eq!(engine.stage(), DecisionStage::Idle);
}
