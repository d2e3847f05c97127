//! Dense entity storage
//!
//! Entities live in one contiguous vector in spawn order. Dead or scrolled-out
//! entries are dropped by an in-place compaction pass that keeps the backing
//! allocation, so a steady-state run does not allocate per tick.

use serde::{Deserialize, Serialize};

/// Anything stored in an [`EntityPool`]
pub trait Entity {
    fn id(&self) -> u32;
    /// Track depth (negative is ahead of the player)
    fn depth(&self) -> f32;
    fn is_alive(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityPool<T> {
    items: Vec<T>,
}

impl<T> Default for EntityPool<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Entity> EntityPool<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn get(&self, id: u32) -> Option<&T> {
        self.items.iter().find(|e| e.id() == id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut T> {
        self.items.iter_mut().find(|e| e.id() == id)
    }

    /// Count of entries still flagged alive
    pub fn live_count(&self) -> usize {
        self.items.iter().filter(|e| e.is_alive()).count()
    }

    /// Drop dead entries and those outside `(far, near)`; returns how many were removed
    pub fn compact(&mut self, far: f32, near: f32) -> usize {
        let before = self.items.len();
        self.items.retain(|e| {
            let z = e.depth();
            e.is_alive() && z > far && z < near
        });
        before - self.items.len()
    }
}

impl<'a, T> IntoIterator for &'a EntityPool<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
