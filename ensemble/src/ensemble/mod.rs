//! Ensemble move selection
//!
//! Aggregates move proposals from a pool of independent strategy agents into
//! one chosen move, using phase-dependent weights, a diversity incentive and
//! online-learned per-bucket multipliers.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                     EnsembleEngine                         │
//! │  • Classifies phase and bucket                             │
//! │  • Polls agents concurrently                               │
//! │  • Owns the bandit table                                   │
//! └─────────────────────────┬─────────────────────────────────┘
//!                           │
//!           ┌───────────────┼───────────────┐
//!           ▼               ▼               ▼
//!     ┌───────────┐   ┌───────────┐   ┌───────────┐
//!     │  Weight   │   │Aggregator │   │  Bandit   │
//!     │ Resolver  │   │ + Overlap │   │  Updater  │
//!     └───────────┘   └───────────┘   └───────────┘
//! ```
//!
//! # Workflow
//!
//! 1. The evaluator supplies position features
//! 2. Phase and bucket key are derived from them
//! 3. Every registered agent with a positive effective weight is polled
//! 4. Proposals are grouped by move and scored, diversity bonus included
//! 5. The best move wins under a deterministic tie-break
//! 6. Agents that proposed the winner are reinforced in that bucket
//!
//! # Usage
//!
//! ```ignore
//! use move_ensemble::{AgentRegistry, EnsembleConfig, EnsembleEngine, SharedContext};
//!
//! let registry = AgentRegistry::new()
//!     .with_agent("material", 1.0)
//!     .with_agent("tactics", 1.5);
//! let engine = EnsembleEngine::new(EnsembleConfig::with_agents(registry), evaluate)?
//!     .with_agent("material", MaterialAgent)
//!     .with_agent("tactics", TacticsAgent);
//!
//! let (action, trace) = engine.decide(&board, &SharedContext::new()).await?;
//! println!("{} ({})", action, trace.summary());
//! ```

pub mod agent;
pub mod aggregator;
pub mod bandit;
pub mod engine;
pub mod overlap;
pub mod trace;
pub mod weights;

pub use agent::{
    AgentContext, AgentError, AgentFailure, AgentFailureKind, AgentId, Proposal, Proposer,
    SharedProposer, Suggestion,
};
pub use aggregator::{
    aggregate, Aggregation, AggregationError, AggregationResult, AggregatorSettings,
    SCORE_EPSILON,
};
pub use bandit::{
    BanditState, BanditUpdate, BanditUpdater, ClampEvent, MultiplierChange, INITIAL_MULTIPLIER,
};
pub use engine::{
    DecisionStage, EnsembleEngine, EnsembleError, EnsembleResult, SharedEnsembleEngine,
};
pub use overlap::{is_low_overlap, overlap};
pub use trace::DecisionTrace;
pub use weights::WeightResolver;
