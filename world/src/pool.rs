//! Slot arena and per-kind pools backing every enemy instance.

use std::collections::{btree_map::Entry, BTreeMap};

use glam::Vec2;
use horde_core::{EnemyId, EnemyKind, Lifecycle, WaveOverride, MAX_POOL_SIZE};
use tracing::debug;

/// Game-specific state of a pooled enemy. Left untouched on release.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Enemy {
    pub(crate) health: f32,
    pub(crate) position: Vec2,
    pub(crate) is_boss: bool,
    pub(crate) spawns_chest: bool,
    pub(crate) wave_override: Option<WaveOverride>,
}

impl Enemy {
    const BLANK: Self = Self {
        health: 0.0,
        position: Vec2::ZERO,
        is_boss: false,
        spawns_chest: false,
        wave_override: None,
    };
}

#[derive(Clone, Debug)]
pub(crate) struct Slot {
    generation: u32,
    kind: EnemyKind,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) enemy: Enemy,
}

impl Slot {
    pub(crate) fn kind(&self) -> EnemyKind {
        self.kind
    }

    fn is_occupied(&self) -> bool {
        self.lifecycle != Lifecycle::Removed
    }
}

#[derive(Clone, Debug, Default)]
struct PoolEntry {
    slots: Vec<u32>,
    free: Vec<u32>,
}

impl PoolEntry {
    fn in_use(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    fn fill(&mut self, slots: &mut Vec<Slot>, kind: EnemyKind, target: usize) {
        while self.slots.len() < target {
            let index = allocate_slot(slots, kind);
            self.slots.push(index);
            self.free.push(index);
        }
    }
}

/// Backing store of every enemy, partitioned into one free list per kind.
#[derive(Clone, Debug)]
pub(crate) struct EnemyPool {
    slots: Vec<Slot>,
    entries: BTreeMap<EnemyKind, PoolEntry>,
    default_size: u32,
    max_size: u32,
}

impl EnemyPool {
    pub(crate) fn new(default_size: u32, max_size: u32) -> Self {
        let max_size = max_size.clamp(1, MAX_POOL_SIZE);
        Self {
            slots: Vec::new(),
            entries: BTreeMap::new(),
            default_size: default_size.clamp(1, max_size),
            max_size,
        }
    }

    /// Ensures the pool for `kind` holds at least `size` slots, clamped to
    /// `[1, max_size]`. Returns the number of slots backing the kind.
    pub(crate) fn prewarm(&mut self, kind: EnemyKind, size: u32) -> usize {
        let target = size.clamp(1, self.max_size) as usize;
        let entry = self.entries.entry(kind).or_default();
        entry.fill(&mut self.slots, kind, target);
        entry.slots.len()
    }

    /// Hands out an inactive slot of `kind`, growing the pool only when every
    /// slot is in use. Unknown kinds get a pool of the default size first.
    pub(crate) fn acquire(&mut self, kind: EnemyKind) -> EnemyId {
        let entry = match self.entries.entry(kind) {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => {
                debug!(kind = kind.get(), size = self.default_size, "created pool on first request");
                let entry = vacant.insert(PoolEntry::default());
                entry.fill(&mut self.slots, kind, self.default_size as usize);
                entry
            }
        };

        let index = match entry.free.pop() {
            Some(index) => index,
            None => {
                let index = allocate_slot(&mut self.slots, kind);
                entry.slots.push(index);
                debug!(kind = kind.get(), size = entry.slots.len(), "pool grew");
                index
            }
        };

        let slot = &mut self.slots[index as usize];
        slot.lifecycle = Lifecycle::Spawned;
        EnemyId::new(index, slot.generation)
    }

    /// Returns the slot to its free list. Stale handles are ignored.
    pub(crate) fn release(&mut self, id: EnemyId) -> bool {
        let Some(slot) = self.slots.get_mut(id.slot() as usize) else {
            return false;
        };
        if slot.generation != id.generation() || !slot.is_occupied() {
            return false;
        }

        slot.generation = slot.generation.wrapping_add(1);
        slot.lifecycle = Lifecycle::Removed;
        if let Some(entry) = self.entries.get_mut(&slot.kind) {
            entry.free.push(id.slot());
        }
        true
    }

    pub(crate) fn get(&self, id: EnemyId) -> Option<&Slot> {
        self.slots
            .get(id.slot() as usize)
            .filter(|slot| slot.generation == id.generation() && slot.is_occupied())
    }

    pub(crate) fn get_mut(&mut self, id: EnemyId) -> Option<&mut Slot> {
        self.slots
            .get_mut(id.slot() as usize)
            .filter(|slot| slot.generation == id.generation() && slot.is_occupied())
    }

    pub(crate) fn is_live(&self, id: EnemyId) -> bool {
        self.get(id)
            .map_or(false, |slot| slot.lifecycle == Lifecycle::Active)
    }

    /// Number of slots backing `kind` and how many of them are in use.
    pub(crate) fn usage(&self, kind: EnemyKind) -> Option<(usize, usize)> {
        self.entries
            .get(&kind)
            .map(|entry| (entry.slots.len(), entry.in_use()))
    }

    pub(crate) fn kinds(&self) -> impl Iterator<Item = EnemyKind> + '_ {
        self.entries.keys().copied()
    }

    pub(crate) fn pool_count(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

fn allocate_slot(slots: &mut Vec<Slot>, kind: EnemyKind) -> u32 {
    // Slots only grow while the live set is below its u32 cap.
    let index = slots.len() as u32;
    slots.push(Slot {
        generation: 0,
        kind,
        lifecycle: Lifecycle::Removed,
        enemy: Enemy::BLANK,
    });
    index
}
