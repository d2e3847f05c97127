//! Game balance and engine configuration
//!
//! Every constant the simulation reads lives here. Values are applied once at
//! construction; partial JSON documents merge onto the defaults.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lerp;
use crate::sim::{BuffKind, ObstacleKind};

/// Errors raised while loading or validating tuning
#[derive(Debug, Error)]
pub enum TuningError {
    #[error("failed to parse tuning: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid tuning value `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// How the player's lateral position is driven
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum MovementMode {
    /// Continuous lateral and depth movement
    #[default]
    Free,
    /// Lateral position locked to lane centres, one lane per steer press
    Lanes { count: u32 },
}

impl MovementMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementMode::Free => "free",
            MovementMode::Lanes { .. } => "lanes",
        }
    }
}

/// Value pair interpolated by the difficulty ramp: `(at ramp 0, at ramp 1)`
pub type Ramped = (f32, f32);

#[inline]
pub fn ramped(span: Ramped, ramp: f32) -> f32 {
    lerp(span.0, span.1, ramp)
}

/// Track geometry and player handling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackTuning {
    /// Lateral bound, player and entities stay within `[-half_width, half_width]`
    pub half_width: f32,
    /// Furthest the player may drop back (positive depth)
    pub depth_back: f32,
    /// Furthest the player may push forward (negative depth)
    pub depth_forward: f32,
    /// Input magnitude below which the current target is held
    pub deadzone: f32,
    /// Steer magnitude that moves one lane in lane mode
    pub lane_steer: f32,
    pub lateral_response: f32,
    /// Extra lateral response at full drift
    pub drift_response: f32,
    pub depth_response: f32,
    pub drift_build: f32,
    pub drift_decay: f32,
    /// Entities are culled once their depth leaves `(cull_far, cull_near)`
    pub cull_far: f32,
    pub cull_near: f32,
}

impl Default for TrackTuning {
    fn default() -> Self {
        Self {
            half_width: 5.2,
            depth_back: 2.0,
            depth_forward: -5.5,
            deadzone: 0.06,
            lane_steer: 0.5,
            lateral_response: 9.0,
            drift_response: 4.0,
            depth_response: 7.0,
            drift_build: 1.2,
            drift_decay: 1.6,
            cull_far: -180.0,
            cull_near: 30.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerTuning {
    pub start_speed: f32,
    pub max_speed: f32,
    /// Target cruising speed, interpolated by ramp
    pub target_speed: Ramped,
    /// Per-tick blend toward the target speed
    pub speed_blend: f32,
    pub lives: u32,
    /// Tight hit box (width, length)
    pub hitbox: Vec2,
    /// Depth offset of the near-miss and pickup sense point from the player centre
    pub sense_offset: f32,
    pub hit_grace: f32,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            start_speed: 12.0,
            max_speed: 36.0,
            target_speed: (14.0, 32.0),
            speed_blend: 0.04,
            lives: 2,
            hitbox: Vec2::new(0.95, 2.0),
            sense_offset: -0.6,
            hit_grace: 1.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NitroTuning {
    pub start_charges: u32,
    pub max_charges: u32,
    pub duration: f32,
    pub boost: f32,
    /// Gameplay seconds to regain one charge while below max
    pub recharge_secs: f32,
}

impl Default for NitroTuning {
    fn default() -> Self {
        Self {
            start_charges: 1,
            max_charges: 3,
            duration: 1.25,
            boost: 16.0,
            recharge_secs: 14.0,
        }
    }
}

/// Spawn cadence, bonus rounds and difficulty ramp
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnTuning {
    /// Gameplay seconds until the ramp saturates
    pub ramp_secs: f32,
    pub obstacle_interval: Ramped,
    pub coin_interval: Ramped,
    pub bonus_coin_interval: f32,
    pub buff_interval: Ramped,
    pub buff_chance: f32,
    pub bonus_first_at: f32,
    pub bonus_spacing: f32,
    pub bonus_duration: f32,
    pub milestone_step: f64,
}

impl Default for SpawnTuning {
    fn default() -> Self {
        Self {
            ramp_secs: 90.0,
            obstacle_interval: (0.78, 0.40),
            coin_interval: (0.58, 0.36),
            bonus_coin_interval: 0.22,
            buff_interval: (7.5, 5.2),
            buff_chance: 0.85,
            bonus_first_at: 520.0,
            bonus_spacing: 650.0,
            bonus_duration: 7.5,
            milestone_step: 1000.0,
        }
    }
}

/// Obstacle sizes, speeds and lateral AI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObstacleTuning {
    pub truck_chance: Ramped,
    /// Bike odds, drawn from the same roll as the truck odds
    pub bike_chance: Ramped,
    pub car_size: Vec2,
    pub truck_size: Vec2,
    pub bike_size: Vec2,
    /// Lateral spawn span, obstacles spawn within `[-spawn_span, spawn_span]`
    pub spawn_span: f32,
    /// Nearest spawn depth; spawns reach `spawn_depth` further out
    pub spawn_near: f32,
    pub spawn_depth: f32,
    /// Initial lateral drift applied to the first target
    pub spawn_drift: f32,
    pub base_speed: Ramped,
    pub speed_jitter: Ramped,
    pub first_retarget: (f32, f32),
    pub retarget_base: f32,
    pub retarget_spread: Ramped,
    /// Probability a new target is biased toward the player
    pub player_bias: f32,
    pub player_bias_spread: f32,
    pub lateral_response: f32,
    /// Depth ahead of the player inside which targets keep clear of its hit span
    pub fair_zone: f32,
    pub fair_push: f32,
    pub max_yaw: f32,
}

impl ObstacleTuning {
    pub fn size_of(&self, kind: ObstacleKind) -> Vec2 {
        match kind {
            ObstacleKind::Car => self.car_size,
            ObstacleKind::Truck => self.truck_size,
            ObstacleKind::Bike => self.bike_size,
        }
    }

    /// Map one uniform roll onto a kind at difficulty `ramp`
    pub fn kind_for_roll(&self, roll: f32, ramp: f32) -> ObstacleKind {
        let truck = ramped(self.truck_chance, ramp);
        if roll < truck {
            ObstacleKind::Truck
        } else if roll < truck + ramped(self.bike_chance, ramp) {
            ObstacleKind::Bike
        } else {
            ObstacleKind::Car
        }
    }
}

impl Default for ObstacleTuning {
    fn default() -> Self {
        Self {
            truck_chance: (0.18, 0.28),
            bike_chance: (0.10, 0.14),
            car_size: Vec2::new(1.05, 2.2),
            truck_size: Vec2::new(1.35, 2.6),
            bike_size: Vec2::new(0.75, 2.0),
            spawn_span: 4.8,
            spawn_near: -70.0,
            spawn_depth: 45.0,
            spawn_drift: 3.4,
            base_speed: (8.0, 18.0),
            speed_jitter: (6.0, 12.0),
            first_retarget: (0.3, 1.1),
            retarget_base: 0.5,
            retarget_spread: (1.4, 0.8),
            player_bias: 0.45,
            player_bias_spread: 2.4,
            lateral_response: 5.5,
            fair_zone: 14.0,
            fair_push: 1.6,
            max_yaw: 0.35,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoinTuning {
    pub pack_size: u32,
    pub bonus_pack_size: u32,
    /// Spacing between coins of one pack (lateral, depth)
    pub spacing: Vec2,
    pub value: u32,
    pub spawn_span: f32,
    pub spawn_near: f32,
    pub spawn_depth: f32,
    /// Depth window around the player where the magnet pulls coins
    pub magnet_depth: f32,
    /// Per-tick lateral blend toward the player while magnetised
    pub magnet_pull: f32,
}

impl Default for CoinTuning {
    fn default() -> Self {
        Self {
            pack_size: 4,
            bonus_pack_size: 6,
            spacing: Vec2::new(0.75, 2.2),
            value: 1,
            spawn_span: 4.6,
            spawn_near: -40.0,
            spawn_depth: 35.0,
            magnet_depth: 10.0,
            magnet_pull: 0.06,
        }
    }
}

/// Proximity windows and combo rules
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionTuning {
    pub near_depth: f32,
    /// Near-miss credit band beyond the obstacle width: `(min, max)`
    pub near_band: (f32, f32),
    pub near_combo: f32,
    pub near_combo_time: f32,
    /// Half extents of the coin pickup window (lateral, depth)
    pub coin_window: Vec2,
    pub coin_combo: f32,
    pub coin_combo_time: f32,
    pub buff_window: Vec2,
    pub combo_max: f32,
    /// Per-tick blend of combo back to 1 once its timer runs out
    pub combo_decay: f32,
}

impl Default for CollisionTuning {
    fn default() -> Self {
        Self {
            near_depth: 1.5,
            near_band: (0.10, 0.55),
            near_combo: 0.35,
            near_combo_time: 1.1,
            coin_window: Vec2::new(1.0, 1.3),
            coin_combo: 0.08,
            coin_combo_time: 0.55,
            buff_window: Vec2::new(1.1, 1.5),
            combo_max: 6.0,
            combo_decay: 0.08,
        }
    }
}

/// Buff durations for a pickup and for a pre-purchased (queued) buff
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuffTuning {
    /// Buff kinds eligible to spawn on track
    pub spawnable: Vec<BuffKind>,
    pub spawn_near: f32,
    pub spawn_depth: f32,
    pub magnet: f32,
    pub shield: f32,
    pub scorex2: f32,
    pub slowmo: f32,
    pub invis: f32,
    pub queued_magnet: f32,
    pub queued_shield: f32,
    pub queued_scorex2: f32,
    pub queued_slowmo: f32,
    pub queued_invis: f32,
    /// Time scale applied to `dt` while slow-mo runs
    pub slowmo_scale: f32,
    /// Shield seconds consumed by one absorbed hit
    pub shield_hit_cost: f32,
    pub shield_grace: f32,
}

impl Default for BuffTuning {
    fn default() -> Self {
        Self {
            spawnable: BuffKind::ALL.to_vec(),
            spawn_near: -55.0,
            spawn_depth: 50.0,
            magnet: 6.5,
            shield: 4.5,
            scorex2: 7.0,
            slowmo: 4.0,
            invis: 4.0,
            queued_magnet: 6.0,
            queued_shield: 5.0,
            queued_scorex2: 7.0,
            queued_slowmo: 4.0,
            queued_invis: 4.0,
            slowmo_scale: 0.55,
            shield_hit_cost: 1.2,
            shield_grace: 0.55,
        }
    }
}

impl BuffTuning {
    /// Seconds added by picking up `kind` on track (`None` for charge-based buffs)
    pub fn pickup_duration(&self, kind: BuffKind) -> Option<f32> {
        match kind {
            BuffKind::Magnet => Some(self.magnet),
            BuffKind::Shield => Some(self.shield),
            BuffKind::ScoreX2 => Some(self.scorex2),
            BuffKind::SlowMo => Some(self.slowmo),
            BuffKind::Invis => Some(self.invis),
            BuffKind::Nitro => None,
        }
    }

    /// Seconds added per pre-purchased unit of `kind`
    pub fn queued_duration(&self, kind: BuffKind) -> Option<f32> {
        match kind {
            BuffKind::Magnet => Some(self.queued_magnet),
            BuffKind::Shield => Some(self.queued_shield),
            BuffKind::ScoreX2 => Some(self.queued_scorex2),
            BuffKind::SlowMo => Some(self.queued_slowmo),
            BuffKind::Invis => Some(self.queued_invis),
            BuffKind::Nitro => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviveTuning {
    pub cost: u32,
    pub grace: f32,
    pub shield: f32,
}

impl Default for ReviveTuning {
    fn default() -> Self {
        Self {
            cost: 100,
            grace: 1.5,
            shield: 1.8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GhostTuning {
    pub sample_secs: f32,
    pub max_samples: usize,
}

impl Default for GhostTuning {
    fn default() -> Self {
        Self {
            sample_secs: 0.1,
            max_samples: 3000,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub movement: MovementMode,
    pub track: TrackTuning,
    pub player: PlayerTuning,
    pub nitro: NitroTuning,
    pub spawn: SpawnTuning,
    pub obstacles: ObstacleTuning,
    pub coins: CoinTuning,
    pub collision: CollisionTuning,
    pub buffs: BuffTuning,
    pub revive: ReviveTuning,
    pub ghost: GhostTuning,
}

impl Tuning {
    /// Lane-locked preset with `count` lanes
    pub fn lanes(count: u32) -> Self {
        Self {
            movement: MovementMode::Lanes { count },
            ..Default::default()
        }
    }

    /// Parse a (possibly partial) JSON document and validate it
    pub fn from_json(json: &str) -> Result<Self, TuningError> {
        let tuning: Tuning = serde_json::from_str(json)?;
        tuning.validate()?;
        Ok(tuning)
    }

    pub fn validate(&self) -> Result<(), TuningError> {
        fn check(ok: bool, field: &'static str, reason: &'static str) -> Result<(), TuningError> {
            if ok {
                Ok(())
            } else {
                Err(TuningError::Invalid { field, reason })
            }
        }

        if let MovementMode::Lanes { count } = self.movement {
            check(count >= 2, "movement.count", "need at least two lanes")?;
        }
        let t = &self.track;
        check(t.half_width > 0.0, "track.half_width", "must be positive")?;
        check(
            t.depth_forward < t.depth_back,
            "track.depth_forward",
            "must be ahead of depth_back",
        )?;
        check(t.cull_far < t.cull_near, "track.cull_far", "must be below cull_near")?;
        check(self.player.lives > 0, "player.lives", "must be at least one")?;
        check(
            self.player.start_speed <= self.player.max_speed,
            "player.start_speed",
            "must not exceed max_speed",
        )?;
        check(
            self.nitro.start_charges <= self.nitro.max_charges,
            "nitro.start_charges",
            "must not exceed max_charges",
        )?;
        check(self.spawn.ramp_secs > 0.0, "spawn.ramp_secs", "must be positive")?;
        let o = &self.obstacles;
        let odds = [o.truck_chance.0, o.truck_chance.1, o.bike_chance.0, o.bike_chance.1];
        check(
            odds.iter().all(|p| (0.0..=1.0).contains(p))
                && o.truck_chance.0 + o.bike_chance.0 <= 1.0
                && o.truck_chance.1 + o.bike_chance.1 <= 1.0,
            "obstacles.bike_chance",
            "kind odds must be probabilities summing to at most 1",
        )?;
        let s = &self.spawn;
        let intervals = [
            s.obstacle_interval.0,
            s.obstacle_interval.1,
            s.coin_interval.0,
            s.coin_interval.1,
            s.bonus_coin_interval,
            s.buff_interval.0,
            s.buff_interval.1,
        ];
        check(
            intervals.iter().all(|i| *i > 0.0),
            "spawn.interval",
            "spawn intervals must be positive",
        )?;
        check(s.milestone_step > 0.0, "spawn.milestone_step", "must be positive")?;
        check(
            self.collision.combo_max >= 1.0,
            "collision.combo_max",
            "must be at least 1",
        )?;
        check(
            self.buffs.slowmo_scale > 0.0 && self.buffs.slowmo_scale <= 1.0,
            "buffs.slowmo_scale",
            "must be in (0, 1]",
        )?;
        check(self.ghost.sample_secs > 0.0, "ghost.sample_secs", "must be positive")?;
        Ok(())
    }

    pub fn lane_count(&self) -> Option<u32> {
        match self.movement {
            MovementMode::Free => None,
            MovementMode::Lanes { count } => Some(count),
        }
    }

    /// Lateral centre of `lane` (0 is the leftmost lane)
    pub fn lane_center(&self, lane: u32) -> f32 {
        let count = self.lane_count().unwrap_or(1).max(1);
        let hw = self.track.half_width;
        lerp(-hw, hw, (lane as f32 + 0.5) / count as f32)
    }

    /// Lane containing lateral position `x`
    pub fn lane_at(&self, x: f32) -> u32 {
        let count = self.lane_count().unwrap_or(1).max(1);
        let hw = self.track.half_width;
        let frac = (x + hw) / (2.0 * hw);
        ((frac * count as f32).floor().max(0.0) as u32).min(count - 1)
    }

    /// Clamp `x` to the track, snapping to the nearest lane centre in lane mode
    pub fn settle_lateral(&self, x: f32) -> f32 {
        let hw = self.track.half_width;
        let x = x.clamp(-hw, hw);
        match self.movement {
            MovementMode::Free => x,
            MovementMode::Lanes { .. } => self.lane_center(self.lane_at(x)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Tuning::default().validate().is_ok());
        assert!(Tuning::lanes(3).validate().is_ok());
    }

    #[test]
    fn test_partial_json_merges_onto_defaults() {
        let tuning =
            Tuning::from_json(r#"{ "player": { "lives": 5 }, "revive": { "cost": 40 } }"#).unwrap();
        assert_eq!(tuning.player.lives, 5);
        assert_eq!(tuning.revive.cost, 40);
        assert_eq!(tuning.player.max_speed, 36.0);
        assert_eq!(tuning.track.half_width, 5.2);
    }

    #[test]
    fn test_lane_mode_from_json() {
        let tuning = Tuning::from_json(r#"{ "movement": { "mode": "lanes", "count": 3 } }"#).unwrap();
        assert_eq!(tuning.lane_count(), Some(3));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = Tuning::from_json(r#"{ "player": { "lives": 0 } }"#).unwrap_err();
        assert!(matches!(err, TuningError::Invalid { field: "player.lives", .. }));

        let err = Tuning::from_json(r#"{ "movement": { "mode": "lanes", "count": 1 } }"#).unwrap_err();
        assert!(matches!(err, TuningError::Invalid { .. }));

        assert!(matches!(
            Tuning::from_json("{ not json"),
            Err(TuningError::Parse(_))
        ));
    }

    #[test]
    fn test_lane_geometry() {
        let tuning = Tuning::lanes(3);
        assert!((tuning.lane_center(1)).abs() < 1e-6);
        assert!(tuning.lane_center(0) < 0.0 && tuning.lane_center(2) > 0.0);
        assert_eq!(tuning.lane_at(-5.2), 0);
        assert_eq!(tuning.lane_at(5.2), 2);
        assert_eq!(tuning.lane_at(0.3), 1);
        assert_eq!(tuning.settle_lateral(9.0), tuning.lane_center(2));
    }

    #[test]
    fn test_obstacle_kind_odds() {
        let ot = ObstacleTuning::default();
        assert_eq!(ot.kind_for_roll(0.0, 0.0), ObstacleKind::Truck);
        assert_eq!(ot.kind_for_roll(0.2, 0.0), ObstacleKind::Bike);
        assert_eq!(ot.kind_for_roll(0.2, 1.0), ObstacleKind::Truck);
        assert_eq!(ot.kind_for_roll(0.35, 1.0), ObstacleKind::Bike);
        assert_eq!(ot.kind_for_roll(0.5, 1.0), ObstacleKind::Car);
        assert_eq!(ot.size_of(ObstacleKind::Bike), ot.bike_size);
        assert!(ot.bike_size.x < ot.car_size.x);

        let err = Tuning::from_json(r#"{ "obstacles": { "bike_chance": [0.9, 0.9] } }"#).unwrap_err();
        assert!(matches!(err, TuningError::Invalid { field: "obstacles.bike_chance", .. }));
    }

    #[test]
    fn test_free_mode_settle_clamps() {
        let tuning = Tuning::default();
        assert_eq!(tuning.settle_lateral(9.0), 5.2);
        assert_eq!(tuning.settle_lateral(-1.5), -1.5);
    }
}
