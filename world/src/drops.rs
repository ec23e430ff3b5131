//! Drop rolls performed when an enemy dies.

use glam::Vec2;
use horde_core::{point_in_unit_circle, DropCollaborator, DropDescriptor, DropKind};
use rand::{Rng, RngCore};

/// Rolls every descriptor of `table` and forwards the successful ones.
///
/// A roll succeeds when `roll * 100 <= chance`; the collaborator's cooldown is
/// only consulted for successful rolls. Zero-chance entries never roll.
pub(crate) fn roll_table(
    table: &[DropDescriptor],
    position: Vec2,
    scatter: f32,
    rng: &mut dyn RngCore,
    drops: &mut dyn DropCollaborator,
) -> usize {
    let mut dropped = 0;
    for descriptor in table {
        if descriptor.chance <= 0.0 {
            continue;
        }

        let roll = rng.gen::<f32>() * 100.0;
        if roll <= descriptor.chance && drops.check_cooldown(descriptor.kind) {
            drops.spawn_drop(descriptor.kind, position + point_in_unit_circle(rng) * scatter);
            dropped += 1;
        }
    }
    dropped
}

/// Guaranteed rewards of a boss: magnet and food, plus a chest when allowed.
pub(crate) fn boss_rewards(
    position: Vec2,
    spawns_chest: bool,
    scatter: f32,
    rng: &mut dyn RngCore,
    drops: &mut dyn DropCollaborator,
) {
    if spawns_chest && drops.chest_allowed() {
        drops.spawn_drop(DropKind::Chest, position + point_in_unit_circle(rng) * scatter);
    }
    drops.spawn_drop(DropKind::Magnet, position + point_in_unit_circle(rng) * scatter);
    drops.spawn_drop(DropKind::Food, position + point_in_unit_circle(rng) * scatter);
}
