//! Ghost recording and playback
//!
//! A ghost is a sparse trace of the player's position over gameplay time.
//! Recording never affects the run; playback only produces frames for a
//! renderer to draw alongside the live car.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::lerp;

/// One position sample at gameplay time `t`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GhostSample {
    pub t: f32,
    pub x: f32,
    pub z: f32,
}

impl GhostSample {
    pub fn pos(&self) -> Vec2 {
        Vec2::new(self.x, self.z)
    }
}

/// Samples the live player at a fixed gameplay interval
#[derive(Debug, Clone, Default)]
pub struct GhostRecorder {
    enabled: bool,
    interval: f32,
    max_samples: usize,
    next_at: f32,
    samples: Vec<GhostSample>,
}

impl GhostRecorder {
    pub fn new(enabled: bool, interval: f32, max_samples: usize) -> Self {
        Self {
            enabled,
            interval,
            max_samples,
            next_at: 0.0,
            samples: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record(&mut self, t: f32, pos: Vec2) {
        if !self.enabled || self.samples.len() >= self.max_samples || t < self.next_at {
            return;
        }
        self.samples.push(GhostSample {
            t,
            x: pos.x,
            z: pos.y,
        });
        self.next_at = t + self.interval;
    }

    pub fn samples(&self) -> &[GhostSample] {
        &self.samples
    }
}

/// Plays a recorded trace back against gameplay time
#[derive(Debug, Clone)]
pub struct GhostPlayback {
    track: Vec<GhostSample>,
    cursor: usize,
}

impl GhostPlayback {
    /// Build a playback track, dropping non-finite or out-of-order samples.
    /// Returns `None` when nothing usable remains.
    pub fn new(samples: &[GhostSample]) -> Option<Self> {
        let mut track: Vec<GhostSample> = Vec::with_capacity(samples.len());
        for s in samples {
            if !(s.t.is_finite() && s.x.is_finite() && s.z.is_finite()) {
                continue;
            }
            if track.last().is_some_and(|last| s.t < last.t) {
                continue;
            }
            track.push(*s);
        }
        if track.is_empty() {
            return None;
        }
        Some(Self { track, cursor: 0 })
    }

    pub fn len(&self) -> usize {
        self.track.len()
    }

    pub fn is_empty(&self) -> bool {
        self.track.is_empty()
    }

    /// Interpolated ghost position at `t`, or `None` once the track is exhausted.
    /// `t` must not decrease between calls.
    pub fn sample_at(&mut self, t: f32) -> Option<GhostSample> {
        let last = *self.track.last()?;
        if t > last.t {
            return None;
        }
        while self.cursor + 1 < self.track.len() && self.track[self.cursor + 1].t <= t {
            self.cursor += 1;
        }
        let a = self.track[self.cursor];
        let Some(b) = self.track.get(self.cursor + 1).copied() else {
            return Some(GhostSample { t, ..a });
        };
        if t <= a.t {
            return Some(GhostSample { t, ..a });
        }
        let span = b.t - a.t;
        let k = if span > 0.0 { (t - a.t) / span } else { 0.0 };
        Some(GhostSample {
            t,
            x: lerp(a.x, b.x, k),
            z: lerp(a.z, b.z, k),
        })
    }
}
