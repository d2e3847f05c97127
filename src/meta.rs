//! Meta-economy state merged into the engine around runs
//!
//! The economy layer owns persistence (bank, best score, cosmetics, shop
//! purchases). Before a run it pushes its view in here; the engine only reads
//! it and applies the queued buffs to a fresh run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::sim::BuffKind;

/// Pre-purchased buffs waiting for the next run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueuedBuffs {
    pub magnet: u32,
    pub shield: u32,
    pub scorex2: u32,
    pub nitro: u32,
    pub slowmo: u32,
    pub invis: u32,
}

impl QueuedBuffs {
    pub fn get(&self, kind: BuffKind) -> u32 {
        match kind {
            BuffKind::Magnet => self.magnet,
            BuffKind::Shield => self.shield,
            BuffKind::ScoreX2 => self.scorex2,
            BuffKind::Nitro => self.nitro,
            BuffKind::SlowMo => self.slowmo,
            BuffKind::Invis => self.invis,
        }
    }

    fn slot(&mut self, kind: BuffKind) -> &mut u32 {
        match kind {
            BuffKind::Magnet => &mut self.magnet,
            BuffKind::Shield => &mut self.shield,
            BuffKind::ScoreX2 => &mut self.scorex2,
            BuffKind::Nitro => &mut self.nitro,
            BuffKind::SlowMo => &mut self.slowmo,
            BuffKind::Invis => &mut self.invis,
        }
    }

    pub fn set(&mut self, kind: BuffKind, count: u32) {
        *self.slot(kind) = count;
    }

    pub fn add(&mut self, kind: BuffKind, count: u32) {
        let slot = self.slot(kind);
        *slot = slot.saturating_add(count);
    }

    pub fn total(&self) -> u32 {
        BuffKind::ALL.iter().map(|k| self.get(*k)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Non-zero entries in a fixed order
    pub fn iter(&self) -> impl Iterator<Item = (BuffKind, u32)> + '_ {
        BuffKind::ALL
            .into_iter()
            .map(|k| (k, self.get(k)))
            .filter(|(_, n)| *n > 0)
    }
}

/// Persistent player state mirrored from the economy layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaState {
    pub bank: u64,
    pub best: u64,
    pub skin_id: String,
    pub queued: QueuedBuffs,
    /// Record a ghost trace for every run
    pub ghost_enabled: bool,
}

impl Default for MetaState {
    fn default() -> Self {
        Self {
            bank: 0,
            best: 0,
            skin_id: "cyanPink".to_string(),
            queued: QueuedBuffs::default(),
            ghost_enabled: false,
        }
    }
}

/// Partial update; unset fields keep their current value and queued entries
/// override per buff kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaUpdate {
    pub bank: Option<u64>,
    pub best: Option<u64>,
    pub skin_id: Option<String>,
    pub queued: BTreeMap<BuffKind, u32>,
    pub ghost_enabled: Option<bool>,
}

/// What the home screen shows before a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaPreview {
    pub skin_id: String,
    pub bank: u64,
    pub best: u64,
}

impl MetaState {
    pub fn merge(&mut self, update: MetaUpdate) {
        if let Some(bank) = update.bank {
            self.bank = bank;
        }
        if let Some(best) = update.best {
            self.best = best;
        }
        if let Some(skin_id) = update.skin_id {
            self.skin_id = skin_id;
        }
        for (kind, count) in update.queued {
            self.queued.set(kind, count);
        }
        if let Some(ghost) = update.ghost_enabled {
            self.ghost_enabled = ghost;
        }
    }

    pub fn preview(&self) -> MetaPreview {
        MetaPreview {
            skin_id: self.skin_id.clone(),
            bank: self.bank,
            best: self.best,
        }
    }
}
