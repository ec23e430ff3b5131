#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative enemy registry for Horde.
//!
//! The [`World`] owns every enemy instance: a slot arena partitioned into
//! per-kind pools, the live set, the death listener table and the kill
//! counter. All mutations go through [`apply`]; read access goes through the
//! [`query`] module.

mod drops;
mod listeners;
mod pool;

use std::{collections::BTreeMap, fmt, mem};

use glam::Vec2;
use horde_core::{
    Command, DropCollaborator, EnemyCatalog, EnemyId, EnemyKind, Event, FieldValidator,
    KillLedger, Lifecycle, PlayerPose, SpawnShape, SpawnSite, StageWave, SubscriptionTag, Viewport,
    WaveOverride, DEFAULT_POOL_SIZE, MAX_POOL_SIZE,
};
use horde_system_placement::{PlacementConfig, PlacementStrategy};
use listeners::DeathListeners;
use pool::{Enemy, EnemyPool};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// Health given to enemies whose kind is missing from the catalog.
const FALLBACK_HEALTH: f32 = 1.0;

/// Tunables of the enemy registry.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Maximum number of enemies alive at once.
    pub enemies_cap: u32,
    /// Pool size used for kinds requested before the stage prepared them.
    pub default_pool_size: u32,
    /// Upper bound applied to pool sizes taken from the stage timeline.
    /// Values above [`MAX_POOL_SIZE`] are lowered to it.
    pub max_pool_size: u32,
    /// Radius around a corpse in which regular drops scatter.
    pub drop_scatter: f32,
    /// Radius around a boss corpse in which its rewards scatter.
    pub boss_drop_scatter: f32,
    /// Distance outside the viewport used by unvalidated single spawns.
    pub outside_viewport_padding: f32,
    /// Seed of the registry's random number generator.
    pub rng_seed: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            enemies_cap: 500,
            default_pool_size: DEFAULT_POOL_SIZE,
            max_pool_size: MAX_POOL_SIZE,
            drop_scatter: 0.2,
            boss_drop_scatter: 1.0,
            outside_viewport_padding: 2.0,
            rng_seed: 0x5eed_0f_c0ff_ee00,
        }
    }
}

/// Reasons a [`World`] cannot be assembled.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    /// No field validator was supplied.
    #[error("registry requires a field validator")]
    MissingField,
    /// No viewport was supplied.
    #[error("registry requires a viewport")]
    MissingViewport,
    /// No drop collaborator was supplied.
    #[error("registry requires a drop collaborator")]
    MissingDrops,
    /// No kill ledger was supplied.
    #[error("registry requires a kill ledger")]
    MissingLedger,
    /// The configured cap would reject every spawn.
    #[error("enemies cap must be at least one")]
    ZeroCap,
}

/// Assembles a [`World`] from its configuration and collaborators.
#[derive(Default)]
pub struct WorldBuilder {
    config: RegistryConfig,
    placement: PlacementConfig,
    catalog: EnemyCatalog,
    field: Option<Box<dyn FieldValidator>>,
    viewport: Option<Box<dyn Viewport>>,
    drops: Option<Box<dyn DropCollaborator>>,
    ledger: Option<Box<dyn KillLedger>>,
}

impl WorldBuilder {
    /// Starts a builder from the provided registry configuration.
    #[must_use]
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Sets the placement fallbacks used by wave spawns.
    #[must_use]
    pub fn placement(mut self, placement: PlacementConfig) -> Self {
        self.placement = placement;
        self
    }

    /// Sets the catalog enemy health and drop tables are read from.
    #[must_use]
    pub fn catalog(mut self, catalog: EnemyCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Sets the field validator consulted by placement.
    #[must_use]
    pub fn field(mut self, field: impl FieldValidator + 'static) -> Self {
        self.field = Some(Box::new(field));
        self
    }

    /// Sets the viewport consulted by placement and visibility queries.
    #[must_use]
    pub fn viewport(mut self, viewport: impl Viewport + 'static) -> Self {
        self.viewport = Some(Box::new(viewport));
        self
    }

    /// Sets the collaborator receiving drops.
    #[must_use]
    pub fn drops(mut self, drops: impl DropCollaborator + 'static) -> Self {
        self.drops = Some(Box::new(drops));
        self
    }

    /// Sets the ledger persisting the kill counter.
    #[must_use]
    pub fn ledger(mut self, ledger: impl KillLedger + 'static) -> Self {
        self.ledger = Some(Box::new(ledger));
        self
    }

    /// Validates the configuration and creates the world.
    pub fn build(self) -> Result<World, BuildError> {
        let field = self.field.ok_or(BuildError::MissingField)?;
        let viewport = self.viewport.ok_or(BuildError::MissingViewport)?;
        let drops = self.drops.ok_or(BuildError::MissingDrops)?;
        let ledger = self.ledger.ok_or(BuildError::MissingLedger)?;
        if self.config.enemies_cap == 0 {
            return Err(BuildError::ZeroCap);
        }

        let kill_count = ledger.enemies_killed();
        Ok(World {
            pool: EnemyPool::new(self.config.default_pool_size, self.config.max_pool_size),
            placement: PlacementStrategy::new(self.placement),
            rng: ChaCha8Rng::seed_from_u64(self.config.rng_seed),
            config: self.config,
            catalog: self.catalog,
            roster: Vec::new(),
            listeners: DeathListeners::default(),
            player: PlayerPose::default(),
            kill_count,
            tick_index: 0,
            bossfight_active: false,
            field,
            viewport,
            drops,
            ledger,
        })
    }
}

impl fmt::Debug for WorldBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldBuilder")
            .field("config", &self.config)
            .field("placement", &self.placement)
            .field("catalog", &self.catalog.len())
            .field("field", &self.field.is_some())
            .field("viewport", &self.viewport.is_some())
            .field("drops", &self.drops.is_some())
            .field("ledger", &self.ledger.is_some())
            .finish()
    }
}

/// Represents the authoritative registry of live enemies.
pub struct World {
    config: RegistryConfig,
    catalog: EnemyCatalog,
    placement: PlacementStrategy,
    pool: EnemyPool,
    roster: Vec<EnemyId>,
    listeners: DeathListeners,
    player: PlayerPose,
    kill_count: u32,
    tick_index: u64,
    bossfight_active: bool,
    rng: ChaCha8Rng,
    field: Box<dyn FieldValidator>,
    viewport: Box<dyn Viewport>,
    drops: Box<dyn DropCollaborator>,
    ledger: Box<dyn KillLedger>,
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("config", &self.config)
            .field("live", &self.roster.len())
            .field("pools", &self.pool.pool_count())
            .field("kill_count", &self.kill_count)
            .field("tick_index", &self.tick_index)
            .field("bossfight_active", &self.bossfight_active)
            .finish_non_exhaustive()
    }
}

/// How an enemy leaves the live set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Removal {
    /// Natural death: drops are rolled.
    Death,
    /// Bulk clear: no drops.
    Cleared,
}

#[derive(Clone, Copy, Debug)]
struct SpawnRequest {
    kind: EnemyKind,
    position: Vec2,
    is_boss: bool,
    spawns_chest: bool,
    wave_override: Option<WaveOverride>,
    subscription: Option<SubscriptionTag>,
}

impl World {
    fn at_capacity(&self) -> bool {
        self.roster.len() >= self.config.enemies_cap as usize
    }

    fn prepare_stage(
        &mut self,
        waves: &[StageWave],
        resume_kill_count: bool,
        out_events: &mut Vec<Event>,
    ) {
        let mut peaks: BTreeMap<EnemyKind, u32> = BTreeMap::new();
        for wave in waves {
            let peak = peaks.entry(wave.kind).or_insert(0);
            *peak = (*peak).max(wave.count);
        }

        for (kind, peak) in peaks {
            let size = self.pool.prewarm(kind, peak);
            debug!(kind = kind.get(), size, "prewarmed pool");
        }

        if resume_kill_count {
            self.kill_count = self.ledger.enemies_killed();
        } else {
            self.kill_count = 0;
            self.ledger.set_enemies_killed(0);
        }

        let pools = self.pool.pool_count();
        info!(pools, kill_count = self.kill_count, "stage prepared");
        out_events.push(Event::StagePrepared {
            pools,
            kill_count: self.kill_count,
        });
    }

    fn spawn(&mut self, request: SpawnRequest, out_events: &mut Vec<Event>) -> Option<EnemyId> {
        if self.at_capacity() {
            debug!(
                kind = request.kind.get(),
                cap = self.config.enemies_cap,
                "spawn skipped at enemies cap"
            );
            return None;
        }

        let health = match self.catalog.profile(request.kind) {
            Some(profile) => profile.health,
            None => {
                warn!(kind = request.kind.get(), "enemy kind missing from catalog");
                FALLBACK_HEALTH
            }
        };

        let id = self.pool.acquire(request.kind);
        let slot = self.pool.get_mut(id)?;
        slot.enemy = Enemy {
            health,
            position: request.position,
            is_boss: request.is_boss,
            spawns_chest: request.spawns_chest,
            wave_override: request.wave_override,
        };
        slot.lifecycle = Lifecycle::Active;

        self.listeners.subscribe(id, request.subscription);
        self.roster.push(id);
        out_events.push(Event::EnemySpawned {
            enemy: id,
            kind: request.kind,
            position: request.position,
            is_boss: request.is_boss,
        });
        Some(id)
    }

    fn spawn_wave(
        &mut self,
        kind: EnemyKind,
        wave_override: Option<WaveOverride>,
        shape: SpawnShape,
        count: u32,
        subscription: Option<SubscriptionTag>,
        out_events: &mut Vec<Event>,
    ) {
        for spawned in 0..count {
            if self.at_capacity() {
                debug!(
                    kind = kind.get(),
                    spawned,
                    requested = count,
                    "wave truncated at enemies cap"
                );
                return;
            }

            let placement = self.placement.locate(
                shape,
                self.player.position,
                self.field.as_ref(),
                self.viewport.as_ref(),
                &mut self.rng,
            );
            trace!(kind = kind.get(), tier = ?placement.tier, "wave enemy placed");
            let _ = self.spawn(
                SpawnRequest {
                    kind,
                    position: placement.position,
                    is_boss: false,
                    spawns_chest: false,
                    wave_override,
                    subscription,
                },
                out_events,
            );
        }
    }

    // Returns whether the enemy died from the hit.
    fn damage(&mut self, id: EnemyId, amount: f32, out_events: &mut Vec<Event>) -> bool {
        let Some(slot) = self.pool.get_mut(id) else {
            return false;
        };
        if slot.lifecycle != Lifecycle::Active {
            return false;
        }

        slot.enemy.health -= amount;
        let remaining = slot.enemy.health;
        if remaining > 0.0 {
            out_events.push(Event::EnemyDamaged {
                enemy: id,
                remaining,
            });
            return false;
        }

        if let Some(index) = self.roster.iter().position(|entry| *entry == id) {
            let _ = self.roster.remove(index);
        }
        if self.retire(id, Removal::Death, out_events) {
            self.record_kills(1, out_events);
        }
        true
    }

    fn deal_damage_to_all(&mut self, amount: f32, out_events: &mut Vec<Event>) {
        let roster = mem::take(&mut self.roster);
        let mut survivors = Vec::with_capacity(roster.len());
        let mut killed = 0;

        for id in roster {
            let Some(slot) = self.pool.get_mut(id) else {
                continue;
            };
            if slot.lifecycle != Lifecycle::Active {
                continue;
            }
            if slot.enemy.is_boss {
                survivors.push(id);
                continue;
            }

            if slot.enemy.health <= amount {
                if self.retire(id, Removal::Death, out_events) {
                    killed += 1;
                }
            } else {
                slot.enemy.health -= amount;
                out_events.push(Event::EnemyDamaged {
                    enemy: id,
                    remaining: slot.enemy.health,
                });
                survivors.push(id);
            }
        }

        self.roster = survivors;
        if killed > 0 {
            self.record_kills(killed, out_events);
        }
    }

    fn kill_all(&mut self, out_events: &mut Vec<Event>) {
        let roster = mem::take(&mut self.roster);
        let mut cleared = 0;
        for id in roster {
            if self.retire(id, Removal::Cleared, out_events) {
                cleared += 1;
            }
        }

        out_events.push(Event::EnemiesCleared { count: cleared });
        if cleared > 0 {
            self.record_kills(cleared, out_events);
        }
    }

    /// Runs `Dying -> Removed` for an enemy already detached from the roster.
    fn retire(&mut self, id: EnemyId, removal: Removal, out_events: &mut Vec<Event>) -> bool {
        let Some(slot) = self.pool.get_mut(id) else {
            return false;
        };
        let Some(subscription) = self.listeners.take(id) else {
            return false;
        };

        slot.lifecycle = Lifecycle::Dying;
        let kind = slot.kind();
        let enemy = slot.enemy;

        if removal == Removal::Death {
            if enemy.is_boss {
                drops::boss_rewards(
                    enemy.position,
                    enemy.spawns_chest,
                    self.config.boss_drop_scatter,
                    &mut self.rng,
                    self.drops.as_mut(),
                );
            } else if let Some(profile) = self.catalog.profile(kind) {
                let dropped = drops::roll_table(
                    &profile.drops,
                    enemy.position,
                    self.config.drop_scatter,
                    &mut self.rng,
                    self.drops.as_mut(),
                );
                trace!(kind = kind.get(), dropped, "rolled drops");
            }
        }

        out_events.push(Event::EnemyDied {
            enemy: id,
            kind,
            position: enemy.position,
            is_boss: enemy.is_boss,
            subscription: subscription.tag,
        });

        self.listeners.clear(id);
        let _ = self.pool.release(id);
        true
    }

    fn record_kills(&mut self, count: u32, out_events: &mut Vec<Event>) {
        self.kill_count = self.kill_count.saturating_add(count);
        self.ledger.set_enemies_killed(self.kill_count);
        out_events.push(Event::KillCountChanged {
            total: self.kill_count,
        });
    }

    fn prune_roster(&mut self) {
        let pool = &self.pool;
        let before = self.roster.len();
        self.roster.retain(|id| pool.is_live(*id));
        let pruned = before - self.roster.len();
        if pruned > 0 {
            debug!(pruned, "pruned stale roster entries");
        }
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::PrepareStage {
            waves,
            resume_kill_count,
        } => world.prepare_stage(&waves, resume_kill_count, out_events),
        Command::Tick { dt } => {
            world.tick_index = world.tick_index.saturating_add(1);
            world.prune_roster();
            out_events.push(Event::TimeAdvanced {
                dt,
                tick: world.tick_index,
            });
        }
        Command::UpdatePlayer { pose } => world.player = pose,
        Command::SpawnEnemy {
            kind,
            site,
            subscription,
        } => {
            let position = match site {
                SpawnSite::Fixed(position) => position,
                SpawnSite::Sampled(shape) => world.placement.sample(
                    shape,
                    world.player.position,
                    world.config.outside_viewport_padding,
                    world.viewport.as_ref(),
                    &mut world.rng,
                ),
            };
            let _ = world.spawn(
                SpawnRequest {
                    kind,
                    position,
                    is_boss: false,
                    spawns_chest: false,
                    wave_override: None,
                    subscription,
                },
                out_events,
            );
        }
        Command::SpawnWave {
            kind,
            wave_override,
            shape,
            count,
            subscription,
        } => world.spawn_wave(kind, wave_override, shape, count, subscription, out_events),
        Command::SpawnBoss {
            kind,
            position,
            spawns_chest,
            subscription,
        } => {
            let spawned = world.spawn(
                SpawnRequest {
                    kind,
                    position,
                    is_boss: true,
                    spawns_chest,
                    wave_override: None,
                    subscription,
                },
                out_events,
            );
            if spawned.is_none() {
                warn!(kind = kind.get(), "boss spawn rejected at enemies cap");
            }
        }
        Command::DamageEnemy { enemy, amount } => {
            let _ = world.damage(enemy, amount, out_events);
        }
        Command::DamageInRadius {
            center,
            radius,
            amount,
        } => {
            for enemy in query::enemies_in_radius(world, center, radius) {
                let _ = world.damage(enemy, amount, out_events);
            }
        }
        Command::DealDamageToAll { amount } => world.deal_damage_to_all(amount, out_events),
        Command::KillAll => world.kill_all(out_events),
        Command::RepositionEnemy { enemy, position } => {
            if let Some(slot) = world.pool.get_mut(enemy) {
                if slot.lifecycle == Lifecycle::Active {
                    let from = mem::replace(&mut slot.enemy.position, position);
                    out_events.push(Event::EnemyRepositioned {
                        enemy,
                        from,
                        to: position,
                    });
                }
            }
        }
        Command::SetBossfight { active } => {
            if world.bossfight_active != active {
                world.bossfight_active = active;
                out_events.push(Event::BossfightChanged { active });
            }
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use glam::Vec2;
    use horde_core::{EnemyId, EnemyKind, EnemySnapshot, PlayerPose};
    use rand::{Rng, RngCore};

    use super::World;

    /// Number of random probes before [`random_visible_enemy`] scans linearly.
    const VISIBLE_PROBES: usize = 10;

    /// Occupancy of a single per-kind pool.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PoolStats {
        /// Kind the pool serves.
        pub kind: EnemyKind,
        /// Slots allocated for the kind.
        pub capacity: usize,
        /// Slots currently handed out.
        pub in_use: usize,
    }

    /// Captures a snapshot of the enemy behind `id`, if it is still alive.
    #[must_use]
    pub fn enemy(world: &World, id: EnemyId) -> Option<EnemySnapshot> {
        if !world.pool.is_live(id) {
            return None;
        }
        world.pool.get(id).map(|slot| EnemySnapshot {
            id,
            kind: slot.kind(),
            position: slot.enemy.position,
            health: slot.enemy.health,
            is_boss: slot.enemy.is_boss,
            wave_override: slot.enemy.wave_override,
        })
    }

    /// Captures snapshots of every live enemy in live-set order.
    #[must_use]
    pub fn roster(world: &World) -> Vec<EnemySnapshot> {
        world
            .roster
            .iter()
            .filter_map(|id| enemy(world, *id))
            .collect()
    }

    /// Number of enemies currently in the live set.
    #[must_use]
    pub fn live_count(world: &World) -> usize {
        world.roster.len()
    }

    /// Maximum number of enemies alive at once.
    #[must_use]
    pub fn enemies_cap(world: &World) -> u32 {
        world.config.enemies_cap
    }

    /// Kill counter of the current stage.
    #[must_use]
    pub fn kill_count(world: &World) -> u32 {
        world.kill_count
    }

    /// Index of the most recent tick.
    #[must_use]
    pub fn tick_index(world: &World) -> u64 {
        world.tick_index
    }

    /// Latest player pose.
    #[must_use]
    pub fn player(world: &World) -> PlayerPose {
        world.player
    }

    /// Half extents of the viewport the registry was built with.
    #[must_use]
    pub fn viewport_half_extents(world: &World) -> Vec2 {
        Vec2::new(world.viewport.half_width(), world.viewport.half_height())
    }

    /// Reports whether a bossfight is in progress.
    #[must_use]
    pub fn bossfight_active(world: &World) -> bool {
        world.bossfight_active
    }

    /// Closest live enemy to `point`. Ties resolve to the earliest spawned.
    #[must_use]
    pub fn closest_enemy(world: &World, point: Vec2) -> Option<EnemyId> {
        let mut closest = None;
        let mut closest_distance = f32::MAX;
        for snapshot in world.roster.iter().filter_map(|id| enemy(world, *id)) {
            let distance = snapshot.position.distance_squared(point);
            if distance < closest_distance {
                closest = Some(snapshot.id);
                closest_distance = distance;
            }
        }
        closest
    }

    /// Live enemies within `radius` of `center`, boundary included.
    #[must_use]
    pub fn enemies_in_radius(world: &World, center: Vec2, radius: f32) -> Vec<EnemyId> {
        let radius_squared = radius * radius;
        world
            .roster
            .iter()
            .filter_map(|id| enemy(world, *id))
            .filter(|snapshot| snapshot.position.distance_squared(center) <= radius_squared)
            .map(|snapshot| snapshot.id)
            .collect()
    }

    /// Random enemy inside the viewport, or `None` when nothing is visible.
    pub fn random_visible_enemy(world: &World, rng: &mut dyn RngCore) -> Option<EnemyId> {
        let visible = |id: &EnemyId| {
            enemy(world, *id).map_or(false, |snapshot| world.viewport.contains(snapshot.position))
        };

        if world.roster.is_empty() {
            return None;
        }

        for _ in 0..VISIBLE_PROBES {
            let id = world.roster[rng.gen_range(0..world.roster.len())];
            if visible(&id) {
                return Some(id);
            }
        }

        world.roster.iter().copied().find(|id| visible(id))
    }

    /// Occupancy of the pool serving `kind`, if one exists.
    #[must_use]
    pub fn pool_stats(world: &World, kind: EnemyKind) -> Option<PoolStats> {
        world
            .pool
            .usage(kind)
            .map(|(capacity, in_use)| PoolStats {
                kind,
                capacity,
                in_use,
            })
    }

    /// Occupancy of every pool in ascending kind order.
    #[must_use]
    pub fn all_pool_stats(world: &World) -> Vec<PoolStats> {
        world
            .pool
            .kinds()
            .filter_map(|kind| pool_stats(world, kind))
            .collect()
    }

    /// Total number of slots allocated across every pool.
    #[must_use]
    pub fn arena_size(world: &World) -> usize {
        world.pool.slot_count()
    }
}
