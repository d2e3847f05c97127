//! Procedural spawning
//!
//! All positions, kinds and speeds are drawn from the run RNG so a seed
//! reproduces the same traffic. Each spawner returns the event to emit.

use glam::Vec2;

use super::events::SimEvent;
use super::state::{BuffPickup, CoinPack, LaneAi, Obstacle, RunState};
use crate::lerp;
use crate::tuning::{Tuning, ramped};

/// Spawn one obstacle somewhere ahead of the player
pub fn spawn_obstacle(state: &mut RunState, tuning: &Tuning, ramp: f32) -> SimEvent {
    let ot = &tuning.obstacles;
    let id = state.next_entity_id();
    let rng = &mut state.rng;

    let kind = ot.kind_for_roll(rng.next_f32(), ramp);
    let size = ot.size_of(kind);

    let (x, target_x) = match tuning.lane_count() {
        Some(count) => {
            let x = tuning.lane_center(rng.index(count as usize) as u32);
            (x, x)
        }
        None => {
            let x = rng.range(-ot.spawn_span, ot.spawn_span);
            let target = tuning.settle_lateral(x + rng.spread(ot.spawn_drift / 2.0));
            (x, target)
        }
    };
    let z = ot.spawn_near - rng.next_f32() * ot.spawn_depth;
    let speed = ramped(ot.base_speed, ramp) + rng.next_f32() * ramped(ot.speed_jitter, ramp);
    let retarget_cd = rng.range(ot.first_retarget.0, ot.first_retarget.0 + ot.first_retarget.1);

    state.obstacles.push(Obstacle {
        id,
        kind,
        pos: Vec2::new(x, z),
        size,
        speed,
        target_x,
        ai: LaneAi::Holding,
        retarget_cd,
        yaw: 0.0,
        near_tagged: false,
    });
    SimEvent::SpawnObstacle { id, kind, x }
}

/// Spawn a short line of coins (longer during a bonus round)
pub fn spawn_coins(state: &mut RunState, tuning: &Tuning) -> SimEvent {
    let ct = &tuning.coins;
    let count = if state.bonus.active {
        ct.bonus_pack_size
    } else {
        ct.pack_size
    };
    let base_z = ct.spawn_near - state.rng.next_f32() * ct.spawn_depth;
    let (center_x, lateral_step) = match tuning.lane_count() {
        Some(lanes) => {
            let lane = state.rng.index(lanes as usize) as u32;
            (tuning.lane_center(lane), 0.0)
        }
        None => (lerp(-ct.spawn_span, ct.spawn_span, state.rng.next_f32()), ct.spacing.x),
    };

    let hw = tuning.track.half_width;
    let mid = (count.max(1) - 1) as f32 / 2.0;
    for i in 0..count {
        let id = state.next_entity_id();
        let x = (center_x + (i as f32 - mid) * lateral_step).clamp(-hw, hw);
        let z = base_z - i as f32 * ct.spacing.y;
        state.coin_packs.push(CoinPack {
            id,
            pos: Vec2::new(x, z),
            value: ct.value,
            alive: true,
        });
    }
    SimEvent::SpawnCoins { count, x: center_x }
}

/// Spawn one buff pickup drawn from the configured buff set
pub fn spawn_buff(state: &mut RunState, tuning: &Tuning) -> Option<SimEvent> {
    let kind = state.rng.pick(&tuning.buffs.spawnable)?;
    let ot = &tuning.obstacles;
    let x = match tuning.lane_count() {
        Some(lanes) => tuning.lane_center(state.rng.index(lanes as usize) as u32),
        None => state.rng.range(-ot.spawn_span, ot.spawn_span),
    };
    let z = tuning.buffs.spawn_near - state.rng.next_f32() * tuning.buffs.spawn_depth;
    let id = state.next_entity_id();
    state.buffs.push(BuffPickup {
        id,
        kind,
        pos: Vec2::new(x, z),
        alive: true,
    });
    Some(SimEvent::SpawnBuff { id, kind })
}
