//! Reference implementations of the host collaborators the registry needs.

use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    rc::Rc,
    time::Duration,
};

use glam::Vec2;
use horde_core::{
    unit_direction, DropCollaborator, DropKind, FieldValidator, KillLedger, Viewport,
};
use rand::{Rng, RngCore};

use crate::{
    scenario::{CameraSettings, DropSettings, FieldSettings, Obstacle},
    simulation::seconds,
};

/// Distance kept between border spawns and the field edge.
const BORDER_INSET: f32 = 0.5;

/// Rectangular field centered on the origin.
#[derive(Clone, Debug)]
pub struct RectField {
    half_extents: Vec2,
    obstacles: Vec<Obstacle>,
    fence_radius: Option<f32>,
}

impl RectField {
    /// Creates a field from scenario settings.
    #[must_use]
    pub fn new(settings: &FieldSettings) -> Self {
        Self {
            half_extents: settings.half_extents,
            obstacles: settings.obstacles.clone(),
            fence_radius: settings.fence_radius,
        }
    }

    /// Clamps a point into the walkable rectangle.
    #[must_use]
    pub fn clamp(&self, point: Vec2) -> Vec2 {
        point.clamp(-self.half_extents, self.half_extents)
    }
}

impl FieldValidator for RectField {
    fn validate(&self, position: Vec2, offset: Vec2, consider_fence: bool) -> bool {
        let point = position + offset;
        let local = point.abs();
        if local.x > self.half_extents.x || local.y > self.half_extents.y {
            return false;
        }
        if self.obstacles.iter().any(|obstacle| obstacle.contains(point)) {
            return false;
        }
        match self.fence_radius {
            Some(radius) if consider_fence => point.length_squared() <= radius * radius,
            _ => true,
        }
    }

    // With a fence the border is the inside of the fence circle.
    fn random_border_position(&self, rng: &mut dyn RngCore) -> Vec2 {
        let inner = (self.half_extents - Vec2::splat(BORDER_INSET)).max(Vec2::ZERO);
        if let Some(radius) = self.fence_radius {
            let reach = (radius - BORDER_INSET).max(0.0);
            return (unit_direction(rng) * reach).clamp(-inner, inner);
        }
        let horizontal = inner.x / (inner.x + inner.y).max(f32::EPSILON);
        if rng.gen::<f32>() < horizontal {
            let y = if rng.gen::<bool>() { inner.y } else { -inner.y };
            Vec2::new(rng.gen_range(-inner.x..=inner.x), y)
        } else {
            let x = if rng.gen::<bool>() { inner.x } else { -inner.x };
            Vec2::new(x, rng.gen_range(-inner.y..=inner.y))
        }
    }
}

/// Orthographic camera following a shared center.
#[derive(Clone, Debug)]
pub struct FollowCamera {
    center: Rc<Cell<Vec2>>,
    half_width: f32,
    half_height: f32,
}

impl FollowCamera {
    /// Creates a camera whose center is driven through `center`.
    #[must_use]
    pub fn new(settings: CameraSettings, center: Rc<Cell<Vec2>>) -> Self {
        Self {
            center,
            half_width: settings.half_width,
            half_height: settings.half_height,
        }
    }
}

impl Viewport for FollowCamera {
    fn half_width(&self) -> f32 {
        self.half_width
    }

    fn half_height(&self) -> f32 {
        self.half_height
    }

    // Edges are picked in proportion to their length.
    fn random_point_outside(&self, padding: f32, rng: &mut dyn RngCore) -> Vec2 {
        let center = self.center.get();
        let aspect = self.half_width / self.half_height;
        let left = center.x - self.half_width - padding;
        let right = center.x + self.half_width + padding;
        let bottom = center.y - self.half_height - padding;
        let top = center.y + self.half_height + padding;

        if rng.gen::<f32>() > aspect / (aspect + 1.0) {
            let x = if rng.gen::<bool>() { left } else { right };
            Vec2::new(x, rng.gen_range(bottom..=top))
        } else {
            let y = if rng.gen::<bool>() { top } else { bottom };
            Vec2::new(rng.gen_range(left..=right), y)
        }
    }

    fn contains(&self, point: Vec2) -> bool {
        let local = (point - self.center.get()).abs();
        local.x <= self.half_width && local.y <= self.half_height
    }
}

/// Running totals of the pickups that reached the field.
pub type DropTally = Rc<RefCell<BTreeMap<DropKind, u32>>>;

/// Drop sink enforcing per-kind cooldowns against a shared stage clock.
#[derive(Debug)]
pub struct CooldownDrops {
    clock: Rc<Cell<Duration>>,
    cooldowns: BTreeMap<DropKind, Duration>,
    last_drop: BTreeMap<DropKind, Duration>,
    chests_left: Option<u32>,
    tally: DropTally,
}

impl CooldownDrops {
    /// Creates a sink reading time from `clock` and counting into `tally`.
    #[must_use]
    pub fn new(settings: &DropSettings, clock: Rc<Cell<Duration>>, tally: DropTally) -> Self {
        let cooldowns = settings
            .cooldowns
            .iter()
            .map(|(kind, secs)| (*kind, seconds(*secs)))
            .filter(|(_, cooldown)| !cooldown.is_zero())
            .collect();
        Self {
            clock,
            cooldowns,
            last_drop: BTreeMap::new(),
            chests_left: settings.chests,
            tally,
        }
    }
}

impl DropCollaborator for CooldownDrops {
    fn check_cooldown(&mut self, kind: DropKind) -> bool {
        let Some(cooldown) = self.cooldowns.get(&kind).copied() else {
            return true;
        };
        let now = self.clock.get();
        let ready = self
            .last_drop
            .get(&kind)
            .map_or(true, |last| now.saturating_sub(*last) >= cooldown);
        if ready {
            let _ = self.last_drop.insert(kind, now);
        }
        ready
    }

    fn spawn_drop(&mut self, kind: DropKind, _position: Vec2) {
        if kind == DropKind::Chest {
            if let Some(left) = self.chests_left.as_mut() {
                *left = left.saturating_sub(1);
            }
        }
        *self.tally.borrow_mut().entry(kind).or_insert(0) += 1;
    }

    fn chest_allowed(&self) -> bool {
        self.chests_left.map_or(true, |left| left > 0)
    }
}

/// Kill counter kept in memory for the lifetime of the process.
#[derive(Clone, Debug, Default)]
pub struct MemoryLedger(Rc<Cell<u32>>);

impl MemoryLedger {
    /// Creates a ledger starting from `value`.
    #[must_use]
    pub fn starting_at(value: u32) -> Self {
        Self(Rc::new(Cell::new(value)))
    }

    /// Last persisted value.
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0.get()
    }
}

impl KillLedger for MemoryLedger {
    fn enemies_killed(&self) -> u32 {
        self.0.get()
    }

    fn set_enemies_killed(&mut self, total: u32) {
        self.0.set(total);
    }
}
