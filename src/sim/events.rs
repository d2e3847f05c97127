//! Simulation events and the single-subscriber bus
//!
//! Events are emitted synchronously at the point they occur. A subscriber
//! that panics is isolated: the panic is caught, logged, and the tick
//! carries on with untouched engine state.

use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};

use super::ghost::GhostSample;
use super::state::{BuffKind, BuffTimers, ObstacleKind};
use crate::meta::QueuedBuffs;

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Lives ran out
    Hit,
    /// Ended by the driver (quit, menu)
    Quit,
}

/// Final numbers of a run, handed to the economy layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndPayload {
    pub reason: EndReason,
    pub score: f64,
    pub coins: u32,
    pub seed: u32,
    pub distance: f32,
    /// Recorded trace when ghost recording is enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ghost: Option<Vec<GhostSample>>,
}

/// Everything the engine reports to its collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEvent {
    Reset,
    Start { seed: u32, run: u32 },
    End(EndPayload),
    Coin { coins: u32 },
    Buff { kind: BuffKind, active: BuffTimers, nitro_charges: u32 },
    NearMiss { combo: f32 },
    Nitro { charges: u32 },
    ShieldHit { shield: f32 },
    ShieldBreak,
    /// Unshielded collision with `obstacle`; always followed by `LifeLost`
    Hit { obstacle: u32, lives: u32 },
    LifeLost { lives: u32 },
    BonusStart { duration: f32 },
    BonusEnd,
    Revive { coins: u32 },
    MilestoneScore { score: u64 },
    GhostMode { on: bool },
    GhostFrame(GhostSample),
    SpawnObstacle { id: u32, kind: ObstacleKind, x: f32 },
    SpawnCoins { count: u32, x: f32 },
    SpawnBuff { id: u32, kind: BuffKind },
    ShopApplied { queued: QueuedBuffs },
}

impl SimEvent {
    /// Wire name of the event, matching its serialized `type` tag
    pub fn name(&self) -> &'static str {
        match self {
            SimEvent::Reset => "reset",
            SimEvent::Start { .. } => "start",
            SimEvent::End(_) => "end",
            SimEvent::Coin { .. } => "coin",
            SimEvent::Buff { .. } => "buff",
            SimEvent::NearMiss { .. } => "near_miss",
            SimEvent::Nitro { .. } => "nitro",
            SimEvent::ShieldHit { .. } => "shield_hit",
            SimEvent::ShieldBreak => "shield_break",
            SimEvent::Hit { .. } => "hit",
            SimEvent::LifeLost { .. } => "life_lost",
            SimEvent::BonusStart { .. } => "bonus_start",
            SimEvent::BonusEnd => "bonus_end",
            SimEvent::Revive { .. } => "revive",
            SimEvent::MilestoneScore { .. } => "milestone_score",
            SimEvent::GhostMode { .. } => "ghost_mode",
            SimEvent::GhostFrame(_) => "ghost_frame",
            SimEvent::SpawnObstacle { .. } => "spawn_obstacle",
            SimEvent::SpawnCoins { .. } => "spawn_coins",
            SimEvent::SpawnBuff { .. } => "spawn_buff",
            SimEvent::ShopApplied { .. } => "shop_applied",
        }
    }
}

pub type EventHandler = Box<dyn FnMut(&SimEvent)>;

/// Single optional subscriber slot
#[derive(Default)]
pub struct EventBus {
    handler: Option<EventHandler>,
    failures: u32,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribed", &self.handler.is_some())
            .field("failures", &self.failures)
            .finish()
    }
}

impl EventBus {
    /// Install `handler`, replacing any previous subscriber
    pub fn subscribe(&mut self, handler: impl FnMut(&SimEvent) + 'static) {
        self.handler = Some(Box::new(handler));
    }

    pub fn unsubscribe(&mut self) {
        self.handler = None;
    }

    pub fn is_subscribed(&self) -> bool {
        self.handler.is_some()
    }

    /// Subscriber panics swallowed so far
    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn emit(&mut self, event: SimEvent) {
        let Some(handler) = self.handler.as_mut() else {
            return;
        };
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(&event)));
        if outcome.is_err() {
            self.failures += 1;
            log::warn!("event subscriber panicked on `{}`, ignoring", event.name());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_emit_without_subscriber_is_noop() {
        let mut bus = EventBus::default();
        bus.emit(SimEvent::Reset);
        assert_eq!(bus.failures(), 0);
    }

    #[test]
    fn test_subscriber_receives_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let mut bus = EventBus::default();
        bus.subscribe(move |e| sink.borrow_mut().push(e.name()));
        bus.emit(SimEvent::Reset);
        bus.emit(SimEvent::Coin { coins: 1 });
        assert_eq!(*seen.borrow(), vec!["reset", "coin"]);
    }

    #[test]
    fn test_panicking_subscriber_is_isolated() {
        let calls = Rc::new(RefCell::new(0));
        let counter = calls.clone();
        let mut bus = EventBus::default();
        bus.subscribe(move |e| {
            *counter.borrow_mut() += 1;
            if matches!(e, SimEvent::Coin { .. }) {
                panic!("subscriber bug");
            }
        });
        bus.emit(SimEvent::Coin { coins: 3 });
        bus.emit(SimEvent::BonusEnd);
        assert_eq!(*calls.borrow(), 2);
        assert_eq!(bus.failures(), 1);
    }

    #[test]
    fn test_serialized_tag_matches_name() {
        let events = [
            SimEvent::NearMiss { combo: 1.35 },
            SimEvent::ShieldBreak,
            SimEvent::Hit { obstacle: 2, lives: 1 },
            SimEvent::GhostFrame(GhostSample { t: 1.0, x: 0.0, z: 0.0 }),
            SimEvent::SpawnBuff { id: 4, kind: BuffKind::Invis },
        ];
        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["type"], event.name());
        }
    }
}
