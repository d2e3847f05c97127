//! Neon Racer headless runner
//!
//! Plays one seeded run with a simple autopilot and prints the end payload as
//! JSON. The browser build drives the engine through `platform` instead.

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::cell::RefCell;
    use std::path::PathBuf;
    use std::rc::Rc;

    use anyhow::{Context, Result};
    use clap::Parser;
    use serde::Serialize;

    use neon_racer::consts::FRAME_DT;
    use neon_racer::platform::capped_dt;
    use neon_racer::meta::MetaUpdate;
    use neon_racer::sim::{EndPayload, EndReason, RunState, RunStats, SimEvent, Simulation, StartOptions, TickInput};
    use neon_racer::{MovementMode, Tuning};

    #[derive(Parser, Debug)]
    #[command(name = "neon-racer", version, about = "Headless Neon Racer run driven by an autopilot")]
    pub struct Cli {
        /// Challenge seed (random when omitted)
        #[arg(long)]
        pub seed: Option<u32>,

        /// Maximum number of 60 Hz ticks to simulate
        #[arg(long, default_value_t = 36_000)]
        pub ticks: u32,

        /// Lock movement to this many lanes
        #[arg(long)]
        pub lanes: Option<u32>,

        /// Tuning JSON merged onto the defaults
        #[arg(long)]
        pub tuning: Option<PathBuf>,

        /// Include a ghost trace in the end payload
        #[arg(long, default_value_t = false)]
        pub ghost: bool,

        /// Spend coins on a revive when the run ends
        #[arg(long, default_value_t = false)]
        pub revive: bool,
    }

    #[derive(Serialize)]
    struct Report<'a> {
        ticks: u32,
        end: &'a EndPayload,
        stats: RunStats,
    }

    fn load_tuning(cli: &Cli) -> Result<Tuning> {
        let mut tuning = match &cli.tuning {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read tuning file {}", path.display()))?;
                Tuning::from_json(&json)?
            }
            None => Tuning::default(),
        };
        if let Some(count) = cli.lanes {
            tuning.movement = MovementMode::Lanes { count };
        }
        Ok(tuning)
    }

    /// Dodge the closest obstacle in our path, otherwise drift toward coins
    fn autopilot(state: &RunState, half_width: f32) -> TickInput {
        let player = state.player.pos;
        let threat = state
            .obstacles
            .iter()
            .filter(|o| {
                let ahead = player.y - o.pos.y;
                ahead > -1.0 && ahead < 22.0 && (o.pos.x - player.x).abs() < o.size.x + 0.9
            })
            .max_by(|a, b| a.pos.y.total_cmp(&b.pos.y));

        if let Some(o) = threat {
            let mut dir = if o.pos.x > player.x { -1.0 } else { 1.0 };
            if (player.x + dir * 1.5).abs() > half_width {
                dir = -dir;
            }
            return TickInput::steer(dir);
        }

        let coin = state
            .coin_packs
            .iter()
            .filter(|c| c.alive && c.pos.y < player.y && c.pos.y > player.y - 18.0)
            .max_by(|a, b| a.pos.y.total_cmp(&b.pos.y));
        match coin {
            Some(c) => TickInput::steer((c.pos.x / half_width).clamp(-1.0, 1.0)),
            None => TickInput::default(),
        }
    }

    pub fn run() -> Result<()> {
        env_logger::init();
        let cli = Cli::parse();

        let tuning = load_tuning(&cli)?;
        let half_width = tuning.track.half_width;
        let mut sim = Simulation::new(tuning)?;
        sim.set_meta(MetaUpdate {
            ghost_enabled: Some(cli.ghost),
            ..Default::default()
        });

        let last_end: Rc<RefCell<Option<EndPayload>>> = Rc::default();
        let sink = last_end.clone();
        sim.on_event(move |event| {
            log::debug!("event: {}", event.name());
            if let SimEvent::End(payload) = event {
                *sink.borrow_mut() = Some(payload.clone());
            }
        });

        sim.start(StartOptions {
            seed: cli.seed.map(f64::from),
            ..Default::default()
        });

        let mut ticks = 0;
        while ticks < cli.ticks {
            let input = autopilot(sim.state(), half_width);
            sim.update(capped_dt(FRAME_DT), &input);
            ticks += 1;
            if sim.is_game_over() && !(cli.revive && sim.revive()) {
                break;
            }
        }
        sim.end(EndReason::Quit);

        let end = last_end.borrow().clone().context("run produced no end payload")?;
        let report = Report {
            ticks,
            end: &end,
            stats: sim.state().stats,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    native::run()
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is platform::init, this is just to satisfy the compiler
}
