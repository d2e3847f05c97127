//! Run state and core simulation types
//!
//! Everything a renderer or a determinism check needs to see lives here and
//! serializes to the same bytes for the same seed and input trace.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::pool::{Entity, EntityPool};
use super::rng::RunRng;
use crate::tuning::Tuning;

/// Timed or charge-based power-ups
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuffKind {
    Magnet,
    Shield,
    ScoreX2,
    Nitro,
    SlowMo,
    Invis,
}

impl BuffKind {
    pub const ALL: [BuffKind; 6] = [
        BuffKind::Magnet,
        BuffKind::Shield,
        BuffKind::ScoreX2,
        BuffKind::Nitro,
        BuffKind::SlowMo,
        BuffKind::Invis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BuffKind::Magnet => "magnet",
            BuffKind::Shield => "shield",
            BuffKind::ScoreX2 => "scorex2",
            BuffKind::Nitro => "nitro",
            BuffKind::SlowMo => "slowmo",
            BuffKind::Invis => "invis",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "magnet" => Some(BuffKind::Magnet),
            "shield" => Some(BuffKind::Shield),
            "scorex2" | "x2" => Some(BuffKind::ScoreX2),
            "nitro" => Some(BuffKind::Nitro),
            "slowmo" => Some(BuffKind::SlowMo),
            "invis" => Some(BuffKind::Invis),
            _ => None,
        }
    }
}

/// Remaining seconds per timed buff (zero = inactive, never negative)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BuffTimers {
    pub magnet: f32,
    pub shield: f32,
    pub scorex2: f32,
    pub slowmo: f32,
    pub invis: f32,
}

impl BuffTimers {
    /// Remaining time for `kind`; nitro is charge based and always reads zero
    pub fn get(&self, kind: BuffKind) -> f32 {
        match kind {
            BuffKind::Magnet => self.magnet,
            BuffKind::Shield => self.shield,
            BuffKind::ScoreX2 => self.scorex2,
            BuffKind::SlowMo => self.slowmo,
            BuffKind::Invis => self.invis,
            BuffKind::Nitro => 0.0,
        }
    }

    fn slot(&mut self, kind: BuffKind) -> Option<&mut f32> {
        match kind {
            BuffKind::Magnet => Some(&mut self.magnet),
            BuffKind::Shield => Some(&mut self.shield),
            BuffKind::ScoreX2 => Some(&mut self.scorex2),
            BuffKind::SlowMo => Some(&mut self.slowmo),
            BuffKind::Invis => Some(&mut self.invis),
            BuffKind::Nitro => None,
        }
    }

    pub fn is_active(&self, kind: BuffKind) -> bool {
        self.get(kind) > 0.0
    }

    /// Add `secs` on top of whatever remains
    pub fn extend(&mut self, kind: BuffKind, secs: f32) {
        if let Some(slot) = self.slot(kind) {
            *slot = slot.max(0.0) + secs.max(0.0);
        }
    }

    /// Remove up to `secs`, flooring at zero; returns what is left
    pub fn drain(&mut self, kind: BuffKind, secs: f32) -> f32 {
        match self.slot(kind) {
            Some(slot) => {
                *slot = (*slot - secs).max(0.0);
                *slot
            }
            None => 0.0,
        }
    }

    /// Count every timer down by `dt`
    pub fn tick(&mut self, dt: f32) {
        for t in [
            &mut self.magnet,
            &mut self.shield,
            &mut self.scorex2,
            &mut self.slowmo,
            &mut self.invis,
        ] {
            *t = (*t - dt).max(0.0);
        }
    }
}

/// Consumable forward boost
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Nitro {
    pub charges: u32,
    /// Remaining boost time
    pub t: f32,
    /// Progress toward the next passive charge
    pub recharge_t: f32,
}

impl Nitro {
    pub fn is_active(&self) -> bool {
        self.t > 0.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Drift {
    pub on: bool,
    /// Accumulated drift in `[0, 1]`
    pub amount: f32,
    /// -1, 0 or 1
    pub direction: i8,
}

/// The player's car
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// `x` is lateral offset, `y` is depth offset (negative = forward)
    pub pos: Vec2,
    pub target: Vec2,
    /// Current lane in lane mode
    pub lane: Option<u32>,
    /// Lane steer held since the last lane change
    pub steer_latched: bool,
    pub speed: f32,
    pub max_speed: f32,
    pub invuln_t: f32,
    pub nitro: Nitro,
    pub drift: Drift,
    pub lives: u32,
    pub revive_used: bool,
}

impl Player {
    pub fn new(tuning: &Tuning) -> Self {
        let lane = tuning.lane_count().map(|count| count / 2);
        let x = lane.map(|l| tuning.lane_center(l)).unwrap_or(0.0);
        Self {
            pos: Vec2::new(x, 0.0),
            target: Vec2::new(x, 0.0),
            lane,
            steer_latched: false,
            speed: tuning.player.start_speed,
            max_speed: tuning.player.max_speed,
            invuln_t: 0.0,
            nitro: Nitro {
                charges: tuning.nitro.start_charges,
                t: 0.0,
                recharge_t: 0.0,
            },
            drift: Drift::default(),
            lives: tuning.player.lives,
            revive_used: false,
        }
    }
}

/// Obstacle variants (size and look)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObstacleKind {
    Car,
    Truck,
    /// Narrow two-wheeler
    Bike,
}

/// Obstacle lateral AI state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LaneAi {
    /// Cruising toward the current target
    Holding,
    /// Cooldown expired, a new target is drawn this tick
    Retargeting,
}

/// Traffic the player must avoid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: u32,
    pub kind: ObstacleKind,
    pub pos: Vec2,
    /// Width and length
    pub size: Vec2,
    /// Own forward speed; closing speed is player speed minus this
    pub speed: f32,
    pub target_x: f32,
    pub ai: LaneAi,
    pub retarget_cd: f32,
    /// Cosmetic lean into lateral moves
    pub yaw: f32,
    /// Near-miss already credited for this pass
    pub near_tagged: bool,
}

impl Entity for Obstacle {
    fn id(&self) -> u32 {
        self.id
    }
    fn depth(&self) -> f32 {
        self.pos.y
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinPack {
    pub id: u32,
    pub pos: Vec2,
    pub value: u32,
    pub alive: bool,
}

impl Entity for CoinPack {
    fn id(&self) -> u32 {
        self.id
    }
    fn depth(&self) -> f32 {
        self.pos.y
    }
    fn is_alive(&self) -> bool {
        self.alive
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuffPickup {
    pub id: u32,
    pub kind: BuffKind,
    pub pos: Vec2,
    pub alive: bool,
}

impl Entity for BuffPickup {
    fn id(&self) -> u32 {
        self.id
    }
    fn depth(&self) -> f32 {
        self.pos.y
    }
    fn is_alive(&self) -> bool {
        self.alive
    }
}

/// Distance-triggered bonus window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BonusRound {
    pub active: bool,
    pub t: f32,
    /// Distance at which the next round starts
    pub next_at: f32,
}

/// Countdowns until the next spawn of each entity type
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpawnTimers {
    pub obstacle: f32,
    pub coin: f32,
    pub buff: f32,
}

impl SpawnTimers {
    /// Timers that never fire during a test or scripted scenario
    pub fn paused() -> Self {
        Self {
            obstacle: f32::MAX,
            coin: f32::MAX,
            buff: f32::MAX,
        }
    }
}

/// Per-run counters reported to the economy layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub near_misses: u32,
    pub coins_picked: u32,
    pub buffs_picked: u32,
    pub hits_blocked: u32,
    pub max_combo: f32,
}

/// Complete state of one run (deterministic, serializable)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// Run seed, fixed once the run starts
    pub seed: u32,
    pub rng: RunRng,
    pub running: bool,
    pub game_over: bool,
    /// Gameplay seconds (slow-mo scaled)
    pub t: f32,
    pub score: f64,
    pub coins: u32,
    pub combo: f32,
    pub combo_t: f32,
    pub distance: f32,
    pub player: Player,
    pub obstacles: EntityPool<Obstacle>,
    pub coin_packs: EntityPool<CoinPack>,
    pub buffs: EntityPool<BuffPickup>,
    pub active: BuffTimers,
    pub bonus: BonusRound,
    pub timers: SpawnTimers,
    pub stats: RunStats,
    /// Gameplay time of the most recent near miss
    pub last_near_miss: f32,
    pub next_milestone: f64,
    next_id: u32,
}

impl RunState {
    pub fn new(seed: u32, tuning: &Tuning) -> Self {
        Self {
            seed,
            rng: RunRng::new(seed),
            running: false,
            game_over: false,
            t: 0.0,
            score: 0.0,
            coins: 0,
            combo: 1.0,
            combo_t: 0.0,
            distance: 0.0,
            player: Player::new(tuning),
            obstacles: EntityPool::with_capacity(64),
            coin_packs: EntityPool::with_capacity(128),
            buffs: EntityPool::with_capacity(8),
            active: BuffTimers::default(),
            bonus: BonusRound {
                active: false,
                t: 0.0,
                next_at: tuning.spawn.bonus_first_at,
            },
            timers: SpawnTimers::default(),
            stats: RunStats {
                max_combo: 1.0,
                ..Default::default()
            },
            last_near_miss: 0.0,
            next_milestone: tuning.spawn.milestone_step,
            next_id: 1,
        }
    }

    /// Replace the seed and restart the RNG stream
    pub fn reseed(&mut self, seed: u32) {
        self.seed = seed;
        self.rng = RunRng::new(seed);
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Difficulty ramp in `[0, 1]`, saturating after `ramp_secs`
    pub fn ramp(&self, ramp_secs: f32) -> f32 {
        (self.t / ramp_secs).clamp(0.0, 1.0)
    }

    /// Forward speed including any nitro boost
    pub fn effective_speed(&self, nitro_boost: f32) -> f32 {
        if self.player.nitro.is_active() {
            self.player.speed + nitro_boost
        } else {
            self.player.speed
        }
    }

    /// Place an obstacle directly (scenario setup and tooling)
    pub fn place_obstacle(&mut self, kind: ObstacleKind, pos: Vec2, speed: f32, tuning: &Tuning) -> u32 {
        let id = self.next_entity_id();
        self.obstacles.push(Obstacle {
            id,
            kind,
            pos,
            size: tuning.obstacles.size_of(kind),
            speed,
            target_x: pos.x,
            ai: LaneAi::Holding,
            retarget_cd: f32::MAX,
            yaw: 0.0,
            near_tagged: false,
        });
        id
    }

    /// Place a single coin directly (scenario setup and tooling)
    pub fn place_coin(&mut self, pos: Vec2, value: u32) -> u32 {
        let id = self.next_entity_id();
        self.coin_packs.push(CoinPack {
            id,
            pos,
            value,
            alive: true,
        });
        id
    }

    pub fn place_buff(&mut self, kind: BuffKind, pos: Vec2) -> u32 {
        let id = self.next_entity_id();
        self.buffs.push(BuffPickup {
            id,
            kind,
            pos,
            alive: true,
        });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buff_timers_floor_at_zero() {
        let mut timers = BuffTimers::default();
        timers.extend(BuffKind::Magnet, 0.5);
        timers.tick(0.3);
        timers.tick(0.3);
        assert_eq!(timers.magnet, 0.0);
        assert!(!timers.is_active(BuffKind::Magnet));
    }

    #[test]
    fn test_buff_pickups_stack_additively() {
        let mut timers = BuffTimers::default();
        timers.extend(BuffKind::Shield, 4.5);
        timers.tick(1.0);
        timers.extend(BuffKind::Shield, 4.5);
        assert!((timers.shield - 8.0).abs() < 1e-6);
    }

    #[test]
    fn test_nitro_has_no_timer() {
        let mut timers = BuffTimers::default();
        timers.extend(BuffKind::Nitro, 10.0);
        assert_eq!(timers, BuffTimers::default());
        assert_eq!(timers.drain(BuffKind::Nitro, 1.0), 0.0);
    }

    #[test]
    fn test_buff_kind_names_round_trip() {
        for kind in BuffKind::ALL {
            assert_eq!(BuffKind::parse(kind.as_str()), Some(kind));
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
        assert_eq!(BuffKind::parse("warp"), None);
    }

    #[test]
    fn test_ramp_saturates() {
        let tuning = Tuning::default();
        let mut state = RunState::new(1, &tuning);
        state.t = 45.0;
        assert!((state.ramp(90.0) - 0.5).abs() < 1e-6);
        state.t = 10_000.0;
        assert_eq!(state.ramp(90.0), 1.0);
    }

    #[test]
    fn test_lane_mode_player_starts_centred() {
        let tuning = Tuning::lanes(3);
        let player = Player::new(&tuning);
        assert_eq!(player.lane, Some(1));
        assert!(player.pos.x.abs() < 1e-6);
    }
}
