//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Driver-supplied timestep only
//! - Seeded RNG only (entropy is drawn once per reset, never inside a run)
//! - Stable iteration order (spawn order)
//! - No rendering or platform dependencies

pub mod collision;
pub mod engine;
pub mod events;
pub mod ghost;
pub mod pool;
pub mod rng;
pub mod spawn;
pub mod state;
pub mod tick;

pub use engine::{ReviveError, Simulation, StartOptions};
pub use events::{EndPayload, EndReason, EventBus, SimEvent};
pub use ghost::{GhostPlayback, GhostRecorder, GhostSample};
pub use pool::{Entity, EntityPool};
pub use rng::RunRng;
pub use state::{
    BuffKind, BuffPickup, BuffTimers, CoinPack, LaneAi, Obstacle, ObstacleKind, Player, RunState,
    RunStats, SpawnTimers,
};
pub use tick::{TickInput, TickOutcome, tick};
