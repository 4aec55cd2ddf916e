//! Engine event stream
//!
//! Two parts:
//!
//! 1. **Event Types** (`types.rs`): decision outcomes, agent failures,
//!    clamp warnings and configuration changes.
//!
//! 2. **Event Bus** (`bus.rs`): Tokio broadcast-based pub/sub with
//!    filtered subscriptions.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │    Engine    │────▶│  Event Bus   │────▶│  Subscribers │
//! │  (publish)   │     │  (broadcast) │     │   (recv)     │
//! └──────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use move_ensemble::events::{EventBus, EventFilter};
//!
//! let bus = EventBus::new().shared();
//! let engine = EnsembleEngine::new(config, evaluator)?.with_event_bus(bus.clone());
//!
//! let mut failures = bus.subscribe_filtered(EventFilter::new().types(vec!["agent_failed"]));
//! let event = failures.recv().await?;
//! ```

pub mod bus;
pub mod types;

pub use bus::{
    EventBus, EventBusError, EventBusResult, EventFilter, FilteredReceiver, SharedEventBus,
};
pub use types::EngineEvent;
