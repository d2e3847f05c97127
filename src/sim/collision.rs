//! Collision geometry
//!
//! Everything is an axis-aligned box on the track plane (`x` lateral,
//! `y` depth). Hits use the tight boxes; near misses and pickups use wider
//! windows around a sense point just ahead of the player's centre.

use glam::Vec2;

/// Axis-aligned box given by centre and full size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub center: Vec2,
    pub size: Vec2,
}

impl Aabb {
    pub fn new(center: Vec2, size: Vec2) -> Self {
        Self { center, size }
    }

    /// Strict overlap (touching edges do not count)
    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        let gap = (self.center - other.center).abs() * 2.0;
        let reach = self.size + other.size;
        gap.x < reach.x && gap.y < reach.y
    }
}

/// True if `point` lies inside the window of half extents `half` around `center`
#[inline]
pub fn within_window(point: Vec2, center: Vec2, half: Vec2) -> bool {
    let d = (point - center).abs();
    d.x < half.x && d.y < half.y
}

/// Near-miss test for an obstacle of width `width` at offset `delta` from the sense point.
///
/// The obstacle must be level with the sense point (`|dz| < depth`) and pass
/// laterally inside the credit band `(width + band.0, width + band.1)`.
#[inline]
pub fn is_near_miss(delta: Vec2, width: f32, depth: f32, band: (f32, f32)) -> bool {
    let d = delta.abs();
    d.y < depth && d.x > width + band.0 && d.x < width + band.1
}
