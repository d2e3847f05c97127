//! Simulation engine
//!
//! Owns the run state, the event bus and the meta view, and drives the run
//! lifecycle: reset -> start -> update* -> end, with an optional revive.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::events::{EndPayload, EndReason, EventBus, SimEvent};
use super::ghost::{GhostPlayback, GhostRecorder, GhostSample};
use super::state::{BuffKind, RunState};
use super::tick::{TickInput, TickOutcome, tick};
use crate::meta::{MetaPreview, MetaState, MetaUpdate};
use crate::tuning::{Tuning, TuningError};

/// Why a revive was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReviveError {
    #[error("the run is not over")]
    NotGameOver,
    #[error("revive already used this run")]
    AlreadyUsed,
    #[error("not enough coins to revive ({have} of {need})")]
    InsufficientCoins { have: u32, need: u32 },
}

/// Options for [`Simulation::start`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StartOptions {
    /// Challenge seed; non-finite values are ignored
    pub seed: Option<f64>,
    /// Apply the queued shop buffs to the new run
    pub apply_queued: bool,
    /// Recorded trace to play back alongside the run
    pub ghost: Option<Vec<GhostSample>>,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            seed: None,
            apply_queued: true,
            ghost: None,
        }
    }
}

impl StartOptions {
    pub fn seeded(seed: u32) -> Self {
        Self {
            seed: Some(f64::from(seed)),
            ..Default::default()
        }
    }
}

/// Wrap a numeric seed onto the 32-bit seed space
fn wrap_seed(seed: f64) -> u32 {
    seed.trunc().rem_euclid(4_294_967_296.0) as u32
}

#[derive(Debug)]
pub struct Simulation {
    tuning: Tuning,
    meta: MetaState,
    state: RunState,
    events: EventBus,
    runs: u32,
    recorder: GhostRecorder,
    playback: Option<GhostPlayback>,
    ghost_frame: Option<GhostSample>,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::with_tuning(Tuning::default())
    }
}

impl Simulation {
    /// Build an engine from validated tuning
    pub fn new(tuning: Tuning) -> Result<Self, TuningError> {
        tuning.validate()?;
        Ok(Self::with_tuning(tuning))
    }

    fn with_tuning(tuning: Tuning) -> Self {
        let state = RunState::new(rand::random::<u32>(), &tuning);
        Self {
            tuning,
            meta: MetaState::default(),
            state,
            events: EventBus::default(),
            runs: 0,
            recorder: GhostRecorder::default(),
            playback: None,
            ghost_frame: None,
        }
    }

    /// Install the single event subscriber, replacing any previous one
    pub fn on_event(&mut self, handler: impl FnMut(&SimEvent) + 'static) {
        self.events.subscribe(handler);
    }

    pub fn clear_subscriber(&mut self) {
        self.events.unsubscribe();
    }

    pub fn event_failures(&self) -> u32 {
        self.events.failures()
    }

    /// Discard the current run and prepare a fresh idle one with a new seed
    pub fn reset(&mut self) {
        self.state = RunState::new(rand::random::<u32>(), &self.tuning);
        self.recorder = GhostRecorder::default();
        self.playback = None;
        self.ghost_frame = None;
        self.events.emit(SimEvent::Reset);
    }

    /// Override the seed of the idle run.
    ///
    /// Ignored (returns false) for non-finite input, while a run is live, and
    /// after a game over until the next `reset`, since a revive continues the
    /// same run.
    pub fn set_seed(&mut self, seed: f64) -> bool {
        if !seed.is_finite() {
            log::warn!("ignoring non-finite seed {seed}");
            return false;
        }
        if self.state.running || self.state.game_over {
            log::warn!("ignoring seed change for a started run");
            return false;
        }
        self.state.reseed(wrap_seed(seed));
        true
    }

    /// Begin a new run
    pub fn start(&mut self, opts: StartOptions) {
        self.reset();
        if let Some(seed) = opts.seed {
            self.set_seed(seed);
        }

        self.state.running = true;
        self.state.game_over = false;
        self.runs += 1;
        self.recorder = GhostRecorder::new(
            self.meta.ghost_enabled,
            self.tuning.ghost.sample_secs,
            self.tuning.ghost.max_samples,
        );

        if opts.apply_queued {
            self.apply_queued_to_run();
        }

        log::info!("run {} started with seed {}", self.runs, self.state.seed);
        self.events.emit(SimEvent::Start {
            seed: self.state.seed,
            run: self.runs,
        });

        self.playback = opts.ghost.as_deref().and_then(GhostPlayback::new);
        if self.playback.is_some() {
            self.events.emit(SimEvent::GhostMode { on: true });
        }
    }

    /// Advance the live run by `dt` seconds; a no-op when no run is live.
    ///
    /// `dt` is used as given. Drivers cap long frames (see
    /// [`MAX_FRAME_DT`](crate::consts::MAX_FRAME_DT)) so recorded traces replay
    /// exactly.
    pub fn update(&mut self, dt: f32, input: &TickInput) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }

        let outcome = tick(&mut self.state, &self.tuning, input, dt, &mut self.events);
        if outcome == TickOutcome::Idle {
            return;
        }

        self.recorder.record(self.state.t, self.state.player.pos);
        self.advance_ghost();

        if let TickOutcome::GameOver(reason) = outcome {
            self.end(reason);
        }
    }

    fn advance_ghost(&mut self) {
        let Some(playback) = self.playback.as_mut() else {
            return;
        };
        match playback.sample_at(self.state.t) {
            Some(frame) => {
                self.ghost_frame = Some(frame);
                self.events.emit(SimEvent::GhostFrame(frame));
            }
            None => {
                self.playback = None;
                self.ghost_frame = None;
                self.events.emit(SimEvent::GhostMode { on: false });
            }
        }
    }

    /// Spend coins to continue a finished run; returns the remaining coins
    pub fn try_revive(&mut self) -> Result<u32, ReviveError> {
        let cost = self.tuning.revive.cost;
        if !self.state.game_over {
            return Err(ReviveError::NotGameOver);
        }
        if self.state.player.revive_used {
            return Err(ReviveError::AlreadyUsed);
        }
        if self.state.coins < cost {
            return Err(ReviveError::InsufficientCoins {
                have: self.state.coins,
                need: cost,
            });
        }

        let state = &mut self.state;
        state.coins -= cost;
        state.player.revive_used = true;
        state.player.lives = state.player.lives.max(1);
        state.game_over = false;
        state.running = true;
        state.player.invuln_t = self.tuning.revive.grace;
        state.active.extend(BuffKind::Shield, self.tuning.revive.shield);

        log::info!("revived with {} coins left", state.coins);
        self.events.emit(SimEvent::Revive { coins: state.coins });
        Ok(state.coins)
    }

    pub fn revive(&mut self) -> bool {
        self.try_revive().is_ok()
    }

    /// Finish the live run. Returns the end payload, or `None` when no run
    /// was live.
    pub fn end(&mut self, reason: EndReason) -> Option<EndPayload> {
        if !self.state.running {
            return None;
        }
        self.state.running = false;
        self.state.game_over = true;

        let ghost = self
            .recorder
            .is_enabled()
            .then(|| self.recorder.samples().to_vec());
        let payload = EndPayload {
            reason,
            score: self.state.score,
            coins: self.state.coins,
            seed: self.state.seed,
            distance: self.state.distance,
            ghost,
        };
        log::info!(
            "run {} ended ({:?}): score {:.0}, coins {}",
            self.runs,
            reason,
            payload.score,
            payload.coins
        );
        self.events.emit(SimEvent::End(payload.clone()));
        Some(payload)
    }

    /// Move every queued shop buff onto the live run, then clear the queue
    pub fn apply_queued_to_run(&mut self) {
        let queued = self.meta.queued;
        if queued.is_empty() {
            return;
        }
        for (kind, count) in queued.iter() {
            match self.tuning.buffs.queued_duration(kind) {
                Some(secs) => self.state.active.extend(kind, secs * count as f32),
                None => {
                    let nitro = &mut self.state.player.nitro;
                    nitro.charges = nitro
                        .charges
                        .saturating_add(count)
                        .min(self.tuning.nitro.max_charges);
                }
            }
        }
        self.events.emit(SimEvent::ShopApplied { queued });
        self.meta.queued = Default::default();
    }

    pub fn set_meta(&mut self, update: MetaUpdate) {
        self.meta.merge(update);
    }

    pub fn queue_buff(&mut self, kind: BuffKind, count: u32) {
        self.meta.queued.add(kind, count);
    }

    pub fn clear_queued(&mut self) {
        self.meta.queued = Default::default();
    }

    pub fn preview(&self) -> MetaPreview {
        self.meta.preview()
    }

    pub fn meta(&self) -> &MetaState {
        &self.meta
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Mutable run state for scripted scenarios and tooling
    pub fn state_mut(&mut self) -> &mut RunState {
        &mut self.state
    }

    /// Owned copy of the run state for renderers and replay checks
    pub fn snapshot(&self) -> RunState {
        self.state.clone()
    }

    /// Seed of the current run, for challenge links
    pub fn seed(&self) -> u32 {
        self.state.seed
    }

    /// Runs started since construction
    pub fn runs(&self) -> u32 {
        self.runs
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    pub fn is_game_over(&self) -> bool {
        self.state.game_over
    }

    /// Current ghost position while a playback track is attached
    pub fn ghost_frame(&self) -> Option<GhostSample> {
        self.ghost_frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::FRAME_DT;
    use crate::sim::state::{ObstacleKind, SpawnTimers};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorded(sim: &mut Simulation) -> Rc<RefCell<Vec<SimEvent>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        sim.on_event(move |e| sink.borrow_mut().push(e.clone()));
        log
    }

    fn quiet_start(sim: &mut Simulation, seed: u32) {
        sim.start(StartOptions::seeded(seed));
        sim.state_mut().timers = SpawnTimers::paused();
    }

    #[test]
    fn test_new_rejects_invalid_tuning() {
        let mut tuning = Tuning::default();
        tuning.player.lives = 0;
        assert!(Simulation::new(tuning).is_err());
        assert!(Simulation::new(Tuning::lanes(3)).is_ok());
    }

    #[test]
    fn test_start_uses_explicit_seed() {
        let mut sim = Simulation::default();
        let log = recorded(&mut sim);
        sim.start(StartOptions::seeded(42));
        assert_eq!(sim.seed(), 42);
        assert!(sim.is_running());
        assert_eq!(sim.runs(), 1);
        let names: Vec<&str> = log.borrow().iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["reset", "start"]);
        assert_eq!(log.borrow()[1], SimEvent::Start { seed: 42, run: 1 });
    }

    #[test]
    fn test_invalid_seed_keeps_generated_one() {
        let mut sim = Simulation::default();
        sim.start(StartOptions {
            seed: Some(f64::NAN),
            ..Default::default()
        });
        let seed = sim.seed();
        assert_eq!(sim.state().rng.seed(), seed);
        assert_eq!(sim.state().rng.draws(), 0);
        assert!(!sim.set_seed(f64::INFINITY));
        assert!(!sim.set_seed(7.0)); // live run
        assert_eq!(sim.seed(), seed);
    }

    #[test]
    fn test_seed_wraps_to_u32() {
        assert_eq!(wrap_seed(42.9), 42);
        assert_eq!(wrap_seed(-1.0), u32::MAX);
        assert_eq!(wrap_seed(4_294_967_296.0 + 5.0), 5);
    }

    #[test]
    fn test_update_is_noop_when_idle() {
        let mut sim = Simulation::default();
        let before = serde_json::to_string(&sim.snapshot()).unwrap();
        sim.update(FRAME_DT, &TickInput::steer(1.0));
        assert_eq!(serde_json::to_string(&sim.snapshot()).unwrap(), before);
    }

    #[test]
    fn test_revive_flow() {
        let mut sim = Simulation::default();
        quiet_start(&mut sim, 9);
        sim.state_mut().coins = 150;
        assert_eq!(sim.try_revive(), Err(ReviveError::NotGameOver));

        assert!(sim.end(EndReason::Hit).is_some());
        assert!(sim.revive());
        let state = sim.state();
        assert_eq!(state.coins, 50);
        assert!(!state.game_over);
        assert!(state.running);
        assert!(state.player.invuln_t > 0.0);
        assert!(state.active.shield >= 1.8);

        sim.end(EndReason::Hit);
        assert_eq!(sim.try_revive(), Err(ReviveError::AlreadyUsed));
        assert_eq!(sim.state().coins, 50);
    }

    #[test]
    fn test_revive_needs_coins() {
        let mut sim = Simulation::default();
        quiet_start(&mut sim, 9);
        sim.state_mut().coins = 99;
        sim.end(EndReason::Quit);
        assert_eq!(
            sim.try_revive(),
            Err(ReviveError::InsufficientCoins { have: 99, need: 100 })
        );
        assert!(sim.is_game_over());
        assert!(!sim.state().player.revive_used);
    }

    #[test]
    fn test_game_over_payload_matches_state() {
        let mut sim = Simulation::default();
        let log = recorded(&mut sim);
        quiet_start(&mut sim, 3);
        sim.state_mut().player.lives = 1;
        sim.state_mut().coins = 17;
        for _ in 0..30 {
            sim.update(FRAME_DT, &TickInput::default());
        }
        let pos = sim.state().player.pos;
        sim.state_mut().place_obstacle(ObstacleKind::Truck, pos, 0.0, &Tuning::default());
        let score_before = sim.state().score;
        sim.update(FRAME_DT, &TickInput::default());

        assert!(!sim.is_running());
        assert!(sim.is_game_over());
        let end = log
            .borrow()
            .iter()
            .find_map(|e| match e {
                SimEvent::End(payload) => Some(payload.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(end.reason, EndReason::Hit);
        assert_eq!(end.score, score_before);
        assert_eq!(end.score, sim.state().score);
        assert_eq!(end.coins, 17);
        assert_eq!(end.seed, 3);
        assert!(end.ghost.is_none());

        // further updates are ignored
        sim.update(FRAME_DT, &TickInput::default());
        assert_eq!(sim.state().score, score_before);
    }

    #[test]
    fn test_end_twice_emits_once() {
        let mut sim = Simulation::default();
        let log = recorded(&mut sim);
        sim.start(StartOptions::default());
        assert!(sim.end(EndReason::Quit).is_some());
        assert!(sim.end(EndReason::Quit).is_none());
        let ends = log.borrow().iter().filter(|e| e.name() == "end").count();
        assert_eq!(ends, 1);
    }

    #[test]
    fn test_queued_buffs_applied_once() {
        let mut sim = Simulation::default();
        let log = recorded(&mut sim);
        sim.queue_buff(BuffKind::Magnet, 2);
        sim.queue_buff(BuffKind::Nitro, 5);
        sim.start(StartOptions::default());

        assert!((sim.state().active.magnet - 12.0).abs() < 1e-6);
        assert_eq!(sim.state().player.nitro.charges, 3);
        assert!(sim.meta().queued.is_empty());
        let names: Vec<&str> = log.borrow().iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["reset", "shop_applied", "start"]);

        sim.start(StartOptions::default());
        assert_eq!(sim.state().active.magnet, 0.0);
        assert_eq!(sim.runs(), 2);
    }

    #[test]
    fn test_queue_kept_when_not_applied() {
        let mut sim = Simulation::default();
        sim.queue_buff(BuffKind::Shield, 1);
        sim.start(StartOptions {
            apply_queued: false,
            ..Default::default()
        });
        assert_eq!(sim.state().active.shield, 0.0);
        assert_eq!(sim.meta().queued.shield, 1);
        sim.clear_queued();
        assert!(sim.meta().queued.is_empty());
    }

    #[test]
    fn test_meta_merge_and_preview() {
        let mut sim = Simulation::default();
        sim.set_meta(MetaUpdate {
            bank: Some(1200),
            skin_id: Some("sunset".into()),
            ..Default::default()
        });
        let preview = sim.preview();
        assert_eq!(preview.bank, 1200);
        assert_eq!(preview.best, 0);
        assert_eq!(preview.skin_id, "sunset");
    }

    #[test]
    fn test_ghost_recorded_when_enabled() {
        let mut sim = Simulation::default();
        sim.set_meta(MetaUpdate {
            ghost_enabled: Some(true),
            ..Default::default()
        });
        quiet_start(&mut sim, 5);
        for _ in 0..60 {
            sim.update(FRAME_DT, &TickInput::steer(0.5));
        }
        let payload = sim.end(EndReason::Quit).unwrap();
        let ghost = payload.ghost.unwrap();
        assert!(ghost.len() >= 9 && ghost.len() <= 11);
        assert!(ghost.windows(2).all(|w| w[0].t < w[1].t));
    }

    #[test]
    fn test_ghost_playback_frames_then_off() {
        let mut sim = Simulation::default();
        let log = recorded(&mut sim);
        let track = vec![
            GhostSample { t: 0.0, x: 0.0, z: 0.0 },
            GhostSample { t: 0.5, x: 2.0, z: -1.0 },
        ];
        sim.start(StartOptions {
            seed: Some(1.0),
            ghost: Some(track),
            ..Default::default()
        });
        sim.state_mut().timers = SpawnTimers::paused();
        assert!(log.borrow().contains(&SimEvent::GhostMode { on: true }));

        for _ in 0..15 {
            sim.update(FRAME_DT, &TickInput::default());
        }
        let frame = sim.ghost_frame().unwrap();
        assert!(frame.x > 0.0 && frame.x < 2.0);

        for _ in 0..30 {
            sim.update(FRAME_DT, &TickInput::default());
        }
        assert!(sim.ghost_frame().is_none());
        assert!(log.borrow().contains(&SimEvent::GhostMode { on: false }));
        assert_eq!(sim.state().player.pos.x, 0.0);
    }

    #[test]
    fn test_panicking_subscriber_does_not_stop_run() {
        let mut sim = Simulation::default();
        sim.on_event(|e| {
            if matches!(e, SimEvent::SpawnCoins { .. }) {
                panic!("renderer bug");
            }
        });
        sim.start(StartOptions::seeded(8));
        for _ in 0..120 {
            sim.update(FRAME_DT, &TickInput::default());
        }
        assert!(sim.event_failures() > 0);
        assert!(sim.state().t > 1.9);
    }

    #[test]
    fn test_update_uses_driver_dt_unclamped() {
        let mut sim = Simulation::default();
        quiet_start(&mut sim, 2);
        sim.update(0.05, &TickInput::default());
        assert_eq!(sim.state().t, 0.05);
        sim.update(f32::NAN, &TickInput::default());
        sim.update(-1.0, &TickInput::default());
        sim.update(0.0, &TickInput::default());
        assert_eq!(sim.state().t, 0.05);
        sim.update(0.25, &TickInput::default());
        assert!((sim.state().t - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_seed_locked_after_game_over() {
        let mut sim = Simulation::default();
        sim.start(StartOptions::seeded(42));
        for _ in 0..30 {
            sim.update(FRAME_DT, &TickInput::default());
        }
        sim.state_mut().coins = 150;
        sim.end(EndReason::Hit);
        let draws = sim.state().rng.draws();

        assert!(!sim.set_seed(7.0));
        assert_eq!(sim.seed(), 42);
        assert_eq!(sim.state().rng.seed(), 42);
        assert_eq!(sim.state().rng.draws(), draws);

        assert!(sim.revive());
        assert_eq!(sim.seed(), 42);
        assert_eq!(sim.state().rng.draws(), draws);

        sim.end(EndReason::Quit);
        sim.reset();
        assert!(sim.set_seed(7.0));
        assert_eq!(sim.seed(), 7);
    }
}
