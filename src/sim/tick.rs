//! Frame-stepped simulation tick
//!
//! Advances a run by one driver-supplied `dt`. The order of the stages is part
//! of the determinism contract: reordering them changes every recorded run.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::collision::{Aabb, is_near_miss, within_window};
use super::events::{EndReason, EventBus, SimEvent};
use super::spawn::{spawn_buff, spawn_coins, spawn_obstacle};
use super::state::{BuffKind, LaneAi, RunState};
use crate::tuning::{MovementMode, Tuning, ramped};
use crate::{clamp01, damp, lerp};

/// Player input for a single tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TickInput {
    /// Lateral steer in `[-1, 1]`
    pub move_x: f32,
    /// Forward (+1) / back (-1) in `[-1, 1]`
    pub move_y: f32,
    /// Nitro requested this tick
    pub nitro: bool,
    /// Drift direction: -1, 0 or 1
    pub drift_dir: i8,
}

impl TickInput {
    pub fn steer(move_x: f32) -> Self {
        Self {
            move_x,
            ..Default::default()
        }
    }
}

/// Result of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Tick skipped (not running or already over)
    Idle,
    Continue,
    /// Run must end this tick
    GameOver(EndReason),
}

/// Advance the run by `dt` seconds of wall time
pub fn tick(
    state: &mut RunState,
    tuning: &Tuning,
    input: &TickInput,
    dt: f32,
    events: &mut EventBus,
) -> TickOutcome {
    if !state.running || state.game_over {
        return TickOutcome::Idle;
    }

    // 1. time scale
    let dt = if state.active.is_active(BuffKind::SlowMo) {
        dt * tuning.buffs.slowmo_scale
    } else {
        dt
    };
    state.t += dt;

    // 2. difficulty
    let ramp = state.ramp(tuning.spawn.ramp_secs);
    let target_speed = ramped(tuning.player.target_speed, ramp).min(state.player.max_speed);
    state.player.speed = lerp(state.player.speed, target_speed, tuning.player.speed_blend);

    // 3. bonus round
    update_bonus(state, tuning, dt, events);

    // 4. nitro
    update_nitro(state, tuning, input, dt, events);

    // 5. drift
    update_drift(state, tuning, input, dt);

    // 6. player movement
    move_player(state, tuning, input, dt);

    // 7. timers
    state.player.invuln_t = (state.player.invuln_t - dt).max(0.0);
    state.active.tick(dt);

    // 8. spawns
    run_spawners(state, tuning, ramp, dt, events);

    // 9. world motion
    let speed_z = state.effective_speed(tuning.nitro.boost);
    state.distance += speed_z * dt;
    advance_world(state, tuning, speed_z, dt);

    // 10. obstacle lateral AI
    steer_obstacles(state, tuning, ramp, dt);

    // 11. collisions
    if let Some(reason) = resolve_collisions(state, tuning, events) {
        return TickOutcome::GameOver(reason);
    }

    // 12. score and combo
    accrue_score(state, tuning, speed_z, dt, events);

    // 13. cleanup
    let (far, near) = (tuning.track.cull_far, tuning.track.cull_near);
    state.obstacles.compact(far, near);
    state.coin_packs.compact(far, near);
    state.buffs.compact(far, near);

    TickOutcome::Continue
}

fn update_bonus(state: &mut RunState, tuning: &Tuning, dt: f32, events: &mut EventBus) {
    let bonus = &mut state.bonus;
    if !bonus.active && state.distance >= bonus.next_at {
        bonus.active = true;
        bonus.t = tuning.spawn.bonus_duration;
        bonus.next_at += tuning.spawn.bonus_spacing;
        log::debug!("bonus round at distance {:.0}", state.distance);
        events.emit(SimEvent::BonusStart { duration: bonus.t });
    }
    if bonus.active {
        bonus.t = (bonus.t - dt).max(0.0);
        if bonus.t <= 0.0 {
            bonus.active = false;
            events.emit(SimEvent::BonusEnd);
        }
    }
}

fn update_nitro(state: &mut RunState, tuning: &Tuning, input: &TickInput, dt: f32, events: &mut EventBus) {
    let nt = &tuning.nitro;
    let nitro = &mut state.player.nitro;

    if nitro.t > 0.0 {
        nitro.t = (nitro.t - dt).max(0.0);
    }

    if nitro.charges < nt.max_charges {
        nitro.recharge_t += dt;
        if nitro.recharge_t >= nt.recharge_secs {
            nitro.recharge_t = 0.0;
            nitro.charges += 1;
        }
    } else {
        nitro.recharge_t = 0.0;
    }

    if input.nitro && nitro.charges > 0 && nitro.t <= 0.0 {
        nitro.charges -= 1;
        nitro.t = nt.duration;
        events.emit(SimEvent::Nitro {
            charges: nitro.charges,
        });
    }
}

fn update_drift(state: &mut RunState, tuning: &Tuning, input: &TickInput, dt: f32) {
    let drift = &mut state.player.drift;
    let dir = input.drift_dir.signum();
    drift.on = dir != 0;
    if drift.on {
        drift.direction = dir;
        drift.amount = clamp01(drift.amount + dt * tuning.track.drift_build);
    } else {
        drift.amount = clamp01(drift.amount - dt * tuning.track.drift_decay);
    }
}

/// Set targets from input and converge toward them. Targets are held when the
/// stick is inside the deadzone; there is no auto-centering.
fn move_player(state: &mut RunState, tuning: &Tuning, input: &TickInput, dt: f32) {
    let tt = &tuning.track;
    let player = &mut state.player;
    let mx = finite_axis(input.move_x);
    let my = finite_axis(input.move_y);

    match tuning.movement {
        MovementMode::Free => {
            if mx.abs() > tt.deadzone {
                player.target.x = mx * tt.half_width;
            }
        }
        MovementMode::Lanes { count } => {
            let lane = player.lane.unwrap_or(count / 2);
            if mx.abs() > tt.lane_steer {
                if !player.steer_latched {
                    let next = if mx > 0.0 {
                        (lane + 1).min(count - 1)
                    } else {
                        lane.saturating_sub(1)
                    };
                    player.lane = Some(next);
                    player.steer_latched = true;
                }
            } else if mx.abs() <= tt.deadzone {
                player.steer_latched = false;
            }
            player.target.x = tuning.lane_center(player.lane.unwrap_or(lane));
        }
    }
    if my.abs() > tt.deadzone {
        player.target.y = lerp(tt.depth_back, tt.depth_forward, (my + 1.0) * 0.5);
    }

    let x_response = tt.lateral_response + player.drift.amount * tt.drift_response;
    player.pos.x = damp(player.pos.x, player.target.x, x_response, dt).clamp(-tt.half_width, tt.half_width);
    player.pos.y = damp(player.pos.y, player.target.y, tt.depth_response, dt)
        .clamp(tt.depth_forward, tt.depth_back);
}

fn finite_axis(v: f32) -> f32 {
    if v.is_finite() { v.clamp(-1.0, 1.0) } else { 0.0 }
}

fn run_spawners(state: &mut RunState, tuning: &Tuning, ramp: f32, dt: f32, events: &mut EventBus) {
    let st = &tuning.spawn;
    state.timers.obstacle -= dt;
    state.timers.coin -= dt;
    state.timers.buff -= dt;

    if !state.bonus.active && state.timers.obstacle <= 0.0 {
        state.timers.obstacle = ramped(st.obstacle_interval, ramp);
        events.emit(spawn_obstacle(state, tuning, ramp));
    }

    if state.timers.coin <= 0.0 {
        state.timers.coin = if state.bonus.active {
            st.bonus_coin_interval
        } else {
            ramped(st.coin_interval, ramp)
        };
        events.emit(spawn_coins(state, tuning));
    }

    if !state.bonus.active && state.timers.buff <= 0.0 {
        state.timers.buff = ramped(st.buff_interval, ramp);
        if state.rng.chance(st.buff_chance) {
            if let Some(event) = spawn_buff(state, tuning) {
                events.emit(event);
            }
        }
    }
}

/// Scroll everything toward the player; obstacles close at the speed difference
fn advance_world(state: &mut RunState, tuning: &Tuning, speed_z: f32, dt: f32) {
    for o in state.obstacles.iter_mut() {
        o.pos.y += (speed_z - o.speed) * dt;
    }

    let ct = &tuning.coins;
    let magnet = state.active.is_active(BuffKind::Magnet);
    let player_x = state.player.pos.x;
    let pull_z = state.player.pos.y - 1.2;
    for c in state.coin_packs.iter_mut() {
        c.pos.y += speed_z * dt;
        if magnet && c.alive && (c.pos.y - pull_z).abs() < ct.magnet_depth {
            c.pos.x = lerp(c.pos.x, player_x, ct.magnet_pull);
        }
    }

    for b in state.buffs.iter_mut() {
        b.pos.y += speed_z * dt;
    }
}

/// Holding -> Retargeting when the cooldown runs out; the lateral position
/// always damps toward the current target.
fn steer_obstacles(state: &mut RunState, tuning: &Tuning, ramp: f32, dt: f32) {
    let ot = &tuning.obstacles;
    let hw = tuning.track.half_width;
    let player_pos = state.player.pos;
    let hit_half = tuning.player.hitbox.x / 2.0;
    let rng = &mut state.rng;

    for o in state.obstacles.iter_mut() {
        o.retarget_cd -= dt;
        if o.ai == LaneAi::Holding && o.retarget_cd <= 0.0 {
            o.ai = LaneAi::Retargeting;
        }

        if o.ai == LaneAi::Retargeting {
            o.retarget_cd = ot.retarget_base + rng.next_f32() * ramped(ot.retarget_spread, ramp);
            let raw = if rng.chance(ot.player_bias) {
                player_pos.x + rng.spread(ot.player_bias_spread / 2.0)
            } else {
                rng.spread(hw)
            };

            // keep a close obstacle from parking right on top of the player
            let ahead = player_pos.y - o.pos.y;
            let clearance = hit_half + o.size.x / 2.0;
            let mut target = raw.clamp(-hw, hw);
            if ahead > 0.0 && ahead < ot.fair_zone && (target - player_pos.x).abs() < clearance {
                let side = if target >= player_pos.x { 1.0 } else { -1.0 };
                let pushed = (player_pos.x + side * (clearance + ot.fair_push)).clamp(-hw, hw);
                target = if (pushed - player_pos.x).abs() < clearance {
                    (player_pos.x - side * (clearance + ot.fair_push)).clamp(-hw, hw)
                } else {
                    pushed
                };
            }

            o.target_x = tuning.settle_lateral(target);
            o.ai = LaneAi::Holding;
        }

        o.pos.x = damp(o.pos.x, o.target_x, ot.lateral_response, dt).clamp(-hw, hw);
        let dx = o.target_x - o.pos.x;
        o.yaw = lerp(o.yaw, (-dx * 0.18).clamp(-ot.max_yaw, ot.max_yaw), 0.08);
    }
}

/// Near misses, hits and pickups. Hits are checked against the grace window
/// held at the start of the pass; at most one life is lost per tick.
fn resolve_collisions(state: &mut RunState, tuning: &Tuning, events: &mut EventBus) -> Option<EndReason> {
    let ct = &tuning.collision;
    let player_box = Aabb::new(state.player.pos, tuning.player.hitbox);
    let sense = state.player.pos + Vec2::new(0.0, tuning.player.sense_offset);
    let invis = state.active.is_active(BuffKind::Invis);
    let mut hits_armed = !invis && state.player.invuln_t <= 0.0;

    for o in state.obstacles.iter_mut() {
        if !o.near_tagged && is_near_miss(o.pos - sense, o.size.x, ct.near_depth, ct.near_band) {
            o.near_tagged = true;
            state.last_near_miss = state.t;
            state.combo = (state.combo + ct.near_combo).clamp(1.0, ct.combo_max);
            state.combo_t = ct.near_combo_time;
            state.stats.near_misses += 1;
            events.emit(SimEvent::NearMiss { combo: state.combo });
        }

        if !hits_armed || !player_box.overlaps(&Aabb::new(o.pos, o.size)) {
            continue;
        }

        if state.active.is_active(BuffKind::Shield) {
            let left = state.active.drain(BuffKind::Shield, tuning.buffs.shield_hit_cost);
            state.player.invuln_t = tuning.buffs.shield_grace;
            state.stats.hits_blocked += 1;
            events.emit(SimEvent::ShieldHit { shield: left });
            if left <= 0.0 {
                events.emit(SimEvent::ShieldBreak);
            }
            continue;
        }

        state.player.lives = state.player.lives.saturating_sub(1);
        state.player.invuln_t = tuning.player.hit_grace;
        state.combo = 1.0;
        state.combo_t = 0.0;
        hits_armed = false;
        events.emit(SimEvent::Hit {
            obstacle: o.id,
            lives: state.player.lives,
        });
        events.emit(SimEvent::LifeLost {
            lives: state.player.lives,
        });
        if state.player.lives == 0 {
            return Some(EndReason::Hit);
        }
    }

    for c in state.coin_packs.iter_mut() {
        if !c.alive || !within_window(c.pos, sense, ct.coin_window) {
            continue;
        }
        c.alive = false;
        state.coins = state.coins.saturating_add(c.value);
        state.stats.coins_picked += 1;
        state.combo = (state.combo + ct.coin_combo).clamp(1.0, ct.combo_max);
        state.combo_t = ct.coin_combo_time;
        events.emit(SimEvent::Coin { coins: state.coins });
    }

    for b in state.buffs.iter_mut() {
        if !b.alive || !within_window(b.pos, sense, ct.buff_window) {
            continue;
        }
        b.alive = false;
        state.stats.buffs_picked += 1;
        match tuning.buffs.pickup_duration(b.kind) {
            Some(secs) => state.active.extend(b.kind, secs),
            None => {
                let nitro = &mut state.player.nitro;
                nitro.charges = (nitro.charges + 1).min(tuning.nitro.max_charges);
            }
        }
        events.emit(SimEvent::Buff {
            kind: b.kind,
            active: state.active,
            nitro_charges: state.player.nitro.charges,
        });
    }

    None
}

fn accrue_score(state: &mut RunState, tuning: &Tuning, speed_z: f32, dt: f32, events: &mut EventBus) {
    let mult = if state.active.is_active(BuffKind::ScoreX2) { 2.0 } else { 1.0 };
    state.score += f64::from(speed_z * dt * state.combo * mult);

    while state.score >= state.next_milestone {
        let reached = state.next_milestone;
        state.next_milestone += tuning.spawn.milestone_step;
        events.emit(SimEvent::MilestoneScore { score: reached as u64 });
    }

    state.stats.max_combo = state.stats.max_combo.max(state.combo);
    state.combo_t = (state.combo_t - dt).max(0.0);
    if state.combo_t <= 0.0 {
        state.combo = lerp(state.combo, 1.0, tuning.collision.combo_decay).max(1.0);
    }
}
