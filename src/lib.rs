//! Neon Racer - an endless neon arcade driving game
//!
//! Core modules:
//! - `sim`: Deterministic simulation (movement, spawning, collisions, scoring)
//! - `tuning`: Data-driven game balance
//! - `meta`: Persistent economy state merged in around runs
//! - `platform`: Browser bindings for the simulation

pub mod meta;
pub mod platform;
pub mod sim;
pub mod tuning;

pub use meta::{MetaState, QueuedBuffs};
pub use sim::{Simulation, SimEvent, StartOptions, TickInput};
pub use tuning::{MovementMode, Tuning, TuningError};

/// Game configuration constants
pub mod consts {
    /// Nominal frame step used by drivers and tests (60 Hz)
    pub const FRAME_DT: f32 = 1.0 / 60.0;
    /// Largest dt a driver should hand to `Simulation::update`.
    /// The engine itself never clamps; drivers apply this cap.
    pub const MAX_FRAME_DT: f32 = 0.033;
}

/// Linear interpolation between `a` and `b`
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
pub fn clamp01(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}

/// Critically damped smoothing toward `target` (frame-rate independent)
///
/// `lambda` is the response rate; larger values converge faster.
#[inline]
pub fn damp(current: f32, target: f32, lambda: f32, dt: f32) -> f32 {
    let t = 1.0 - (-lambda * dt).exp();
    current + (target - current) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_damp_converges_without_overshoot() {
        let mut x = 0.0;
        for _ in 0..600 {
            let next = damp(x, 5.0, 9.0, consts::FRAME_DT);
            assert!(next >= x && next <= 5.0);
            x = next;
        }
        assert!((x - 5.0).abs() < 0.001);
    }

    #[test]
    fn test_lerp_endpoints() {
        assert_eq!(lerp(0.78, 0.40, 0.0), 0.78);
        assert!((lerp(0.78, 0.40, 1.0) - 0.40).abs() < 1e-6);
    }
}
