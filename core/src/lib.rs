#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Horde engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative enemy registry, and pure systems. Adapters submit [`Command`]
//! values describing desired mutations, the registry executes those commands
//! via its `apply` entry point, and then broadcasts [`Event`] values for systems
//! to react to deterministically. Systems consume event streams, query
//! immutable snapshots, and respond exclusively with new command batches.
//!
//! Everything the registry needs from the host engine is expressed through the
//! narrow collaborator traits at the bottom of this crate.

use std::{collections::BTreeMap, f32::consts::TAU, time::Duration};

use glam::Vec2;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

/// Hard upper bound applied to every per-kind pool when it is prewarmed.
pub const MAX_POOL_SIZE: u32 = 100;

/// Pool size used when a kind is requested before any pool was prepared for it.
pub const DEFAULT_POOL_SIZE: u32 = 10;

/// Commands that express all permissible registry mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Sizes the per-kind pools for an upcoming stage and restores counters.
    PrepareStage {
        /// Enemy kinds and counts appearing on the stage timeline.
        waves: Vec<StageWave>,
        /// Continue counting kills from the persisted ledger value.
        resume_kill_count: bool,
    },
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Updates the player pose used for placement and the offscreen leash.
    UpdatePlayer {
        /// Latest position and facing of the player.
        pose: PlayerPose,
    },
    /// Requests a single enemy without running the placement fallbacks.
    SpawnEnemy {
        /// Kind of enemy to spawn.
        kind: EnemyKind,
        /// Where the enemy should appear.
        site: SpawnSite,
        /// Optional tag echoed back when the enemy dies.
        subscription: Option<SubscriptionTag>,
    },
    /// Requests a batch of enemies placed through the placement fallbacks.
    SpawnWave {
        /// Kind of enemy to spawn.
        kind: EnemyKind,
        /// Per-wave adjustments applied to each spawned enemy.
        wave_override: Option<WaveOverride>,
        /// Shape used when sampling candidate positions.
        shape: SpawnShape,
        /// Number of enemies requested.
        count: u32,
        /// Optional tag echoed back when any of the enemies dies.
        subscription: Option<SubscriptionTag>,
    },
    /// Requests a boss-flagged enemy at a fixed position.
    SpawnBoss {
        /// Kind of enemy backing the boss.
        kind: EnemyKind,
        /// Position the boss appears at.
        position: Vec2,
        /// Whether the boss leaves a chest behind when it dies.
        spawns_chest: bool,
        /// Optional tag echoed back when the boss dies.
        subscription: Option<SubscriptionTag>,
    },
    /// Applies damage to a single enemy.
    DamageEnemy {
        /// Enemy receiving the damage.
        enemy: EnemyId,
        /// Amount of health removed.
        amount: f32,
    },
    /// Applies damage to every enemy within a circle, boundary inclusive.
    DamageInRadius {
        /// Center of the affected area.
        center: Vec2,
        /// Radius of the affected area.
        radius: f32,
        /// Amount of health removed from each affected enemy.
        amount: f32,
    },
    /// Applies damage to every non-boss enemy in bulk.
    DealDamageToAll {
        /// Amount of health removed from each affected enemy.
        amount: f32,
    },
    /// Force-kills every live enemy without rolling drops.
    KillAll,
    /// Moves an enemy to a new position without affecting its lifecycle.
    RepositionEnemy {
        /// Enemy being moved.
        enemy: EnemyId,
        /// Destination position.
        position: Vec2,
    },
    /// Marks whether a bossfight is in progress.
    SetBossfight {
        /// `true` while a bossfight is active.
        active: bool,
    },
}

/// Events broadcast by the registry after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
        /// Index of the tick that just started.
        tick: u64,
    },
    /// Confirms that pools were sized for a new stage.
    StagePrepared {
        /// Number of per-kind pools that now exist.
        pools: usize,
        /// Kill counter value the stage starts from.
        kill_count: u32,
    },
    /// Confirms that an enemy entered the live set.
    EnemySpawned {
        /// Handle assigned to the enemy.
        enemy: EnemyId,
        /// Kind of the enemy.
        kind: EnemyKind,
        /// Position the enemy appeared at.
        position: Vec2,
        /// Whether the enemy is boss-flagged.
        is_boss: bool,
    },
    /// Reports that an enemy lost health and survived.
    EnemyDamaged {
        /// Enemy that was hit.
        enemy: EnemyId,
        /// Health left after the hit.
        remaining: f32,
    },
    /// Death notification for a single enemy.
    EnemyDied {
        /// Handle the enemy had while alive. It is stale once this is observed.
        enemy: EnemyId,
        /// Kind of the enemy.
        kind: EnemyKind,
        /// Position at the moment of death.
        position: Vec2,
        /// Whether the enemy was boss-flagged.
        is_boss: bool,
        /// Tag supplied when the enemy was spawned.
        subscription: Option<SubscriptionTag>,
    },
    /// Reports that a bulk kill cleared the live set.
    EnemiesCleared {
        /// Number of enemies removed.
        count: u32,
    },
    /// Confirms that an enemy was moved by the offscreen leash.
    EnemyRepositioned {
        /// Enemy that was moved.
        enemy: EnemyId,
        /// Position before the move.
        from: Vec2,
        /// Position after the move.
        to: Vec2,
    },
    /// Reports the persisted kill counter after it changed.
    KillCountChanged {
        /// Total number of enemies killed on the stage.
        total: u32,
    },
    /// Announces that the bossfight flag changed.
    BossfightChanged {
        /// New value of the flag.
        active: bool,
    },
}

/// Identifier of an enemy archetype, matching an entry of the [`EnemyCatalog`].
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EnemyKind(u32);

impl EnemyKind {
    /// Creates a new enemy kind with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the kind.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Stable handle to a live enemy.
///
/// The generation changes every time the backing slot is recycled, so a handle
/// kept past the enemy's death never resolves to the next occupant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnemyId {
    slot: u32,
    generation: u32,
}

impl EnemyId {
    /// Creates a handle from a slot index and generation.
    #[must_use]
    pub const fn new(slot: u32, generation: u32) -> Self {
        Self { slot, generation }
    }

    /// Index of the arena slot backing the enemy.
    #[must_use]
    pub const fn slot(&self) -> u32 {
        self.slot
    }

    /// Generation of the slot at the time the handle was issued.
    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

/// Caller-chosen tag echoed in [`Event::EnemyDied`] for enemies spawned with it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionTag(u32);

impl SubscriptionTag {
    /// Creates a new tag.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the tag.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Pickups an enemy can leave behind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropKind {
    /// Small experience gem.
    SmallGem,
    /// Medium experience gem.
    MediumGem,
    /// Large experience gem.
    LargeGem,
    /// Healing food.
    Food,
    /// Magnet that pulls every gem toward the player.
    Magnet,
    /// Bomb that clears the screen.
    Bomb,
    /// Chest granting an ability.
    Chest,
}

/// Chance of a single drop kind, expressed in percent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DropDescriptor {
    /// Pickup produced when the roll succeeds.
    pub kind: DropKind,
    /// Probability in percent. Zero never drops, 100 always rolls successfully.
    pub chance: f32,
}

impl DropDescriptor {
    /// Creates a new drop descriptor.
    #[must_use]
    pub const fn new(kind: DropKind, chance: f32) -> Self {
        Self { kind, chance }
    }
}

/// Static data describing an enemy archetype.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnemyProfile {
    /// Kind the profile describes.
    pub kind: EnemyKind,
    /// Human readable name used in logs.
    #[serde(default)]
    pub name: String,
    /// Health an enemy of this kind spawns with.
    pub health: f32,
    /// Drop table rolled on natural death.
    #[serde(default)]
    pub drops: Vec<DropDescriptor>,
}

impl EnemyProfile {
    /// Creates a profile without a drop table.
    #[must_use]
    pub fn new(kind: EnemyKind, name: impl Into<String>, health: f32) -> Self {
        Self {
            kind,
            name: name.into(),
            health,
            drops: Vec::new(),
        }
    }

    /// Appends a drop descriptor to the profile.
    #[must_use]
    pub fn with_drop(mut self, drop: DropDescriptor) -> Self {
        self.drops.push(drop);
        self
    }
}

/// Read-only collection of enemy profiles keyed by kind.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnemyCatalog {
    profiles: BTreeMap<EnemyKind, EnemyProfile>,
}

impl EnemyCatalog {
    /// Builds a catalog from the provided profiles. Later duplicates win.
    #[must_use]
    pub fn from_profiles(profiles: impl IntoIterator<Item = EnemyProfile>) -> Self {
        let profiles = profiles
            .into_iter()
            .map(|profile| (profile.kind, profile))
            .collect();
        Self { profiles }
    }

    /// Looks up the profile for the provided kind.
    #[must_use]
    pub fn profile(&self, kind: EnemyKind) -> Option<&EnemyProfile> {
        self.profiles.get(&kind)
    }

    /// Iterator over the profiles in ascending kind order.
    pub fn iter(&self) -> impl Iterator<Item = &EnemyProfile> {
        self.profiles.values()
    }

    /// Number of profiles in the catalog.
    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Reports whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// Rule used to sample spawn candidates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnShape {
    /// Anywhere just outside the camera viewport.
    #[default]
    OutsideViewport,
    /// On a ring around the player slightly wider than the viewport diagonal.
    Circular,
}

/// Per-wave adjustments applied to the enemies a wave spawns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WaveOverride {
    /// Excludes the enemies from the offscreen leash.
    #[serde(default)]
    pub disable_offscreen_teleport: bool,
}

/// Where a single spawn request should place its enemy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SpawnSite {
    /// Exactly at the provided position.
    Fixed(Vec2),
    /// At a single unvalidated sample of the provided shape.
    Sampled(SpawnShape),
}

/// Declarative description of a timed wave.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaveDescriptor {
    /// Kind of enemy spawned by the wave.
    pub kind: EnemyKind,
    /// Total number of spawn requests the wave issues.
    pub count: u32,
    /// Delay between two consecutive spawn requests.
    #[serde(with = "seconds")]
    pub interval: Duration,
    /// Shape used when no fixed position is set.
    #[serde(default)]
    pub shape: SpawnShape,
    /// Fixed spawn position. `None` and the zero vector both mean unset.
    #[serde(default)]
    pub spawn_position: Option<Vec2>,
}

impl WaveDescriptor {
    /// Creates a wave descriptor without a fixed spawn position.
    #[must_use]
    pub const fn new(kind: EnemyKind, count: u32, interval: Duration, shape: SpawnShape) -> Self {
        Self {
            kind,
            count,
            interval,
            shape,
            spawn_position: None,
        }
    }

    /// Pins every spawn of the wave to the provided position.
    #[must_use]
    pub fn with_spawn_position(mut self, position: Vec2) -> Self {
        self.spawn_position = Some(position);
        self
    }

    /// Resolves the site used for each spawn request of the wave.
    #[must_use]
    pub fn site(&self) -> SpawnSite {
        match self.spawn_position {
            Some(position) if position != Vec2::ZERO => SpawnSite::Fixed(position),
            _ => SpawnSite::Sampled(self.shape),
        }
    }
}

mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|error| {
            serde::de::Error::custom(format!("invalid interval of {secs} seconds: {error}"))
        })
    }
}

/// Enemy kind and count taken from the stage timeline, used to size pools.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StageWave {
    /// Kind appearing on the timeline.
    pub kind: EnemyKind,
    /// Number of enemies the wave spawns.
    pub count: u32,
}

impl StageWave {
    /// Creates a new stage wave entry.
    #[must_use]
    pub const fn new(kind: EnemyKind, count: u32) -> Self {
        Self { kind, count }
    }
}

/// Position and facing of the player.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlayerPose {
    /// World position of the player.
    pub position: Vec2,
    /// Normalized direction the player looks toward.
    pub facing: Vec2,
}

impl PlayerPose {
    /// Creates a pose, normalizing the facing. A zero facing defaults to +Y.
    #[must_use]
    pub fn new(position: Vec2, facing: Vec2) -> Self {
        Self {
            position,
            facing: facing.try_normalize().unwrap_or(Vec2::Y),
        }
    }
}

impl Default for PlayerPose {
    fn default() -> Self {
        Self::new(Vec2::ZERO, Vec2::Y)
    }
}

/// Lifecycle stage of a pooled enemy slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    /// Acquired from the pool and being initialized.
    Spawned,
    /// Alive and part of the live set.
    Active,
    /// Death is being processed.
    Dying,
    /// Back in the pool.
    Removed,
}

/// Immutable representation of a single enemy used for queries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnemySnapshot {
    /// Handle of the enemy.
    pub id: EnemyId,
    /// Kind of the enemy.
    pub kind: EnemyKind,
    /// Current position.
    pub position: Vec2,
    /// Remaining health.
    pub health: f32,
    /// Whether the enemy is boss-flagged.
    pub is_boss: bool,
    /// Adjustments supplied by the wave that spawned the enemy.
    pub wave_override: Option<WaveOverride>,
}

impl EnemySnapshot {
    /// Reports whether the enemy opted out of the offscreen leash.
    #[must_use]
    pub fn leash_exempt(&self) -> bool {
        self.wave_override
            .map_or(false, |wave_override| wave_override.disable_offscreen_teleport)
    }
}

/// Boundary and obstacle check for candidate positions.
pub trait FieldValidator {
    /// Reports whether `position` shifted by `offset` is a legal place to stand.
    fn validate(&self, position: Vec2, offset: Vec2, consider_fence: bool) -> bool;

    /// Returns a random point on the field border. Border points are always legal.
    fn random_border_position(&self, rng: &mut dyn RngCore) -> Vec2;
}

/// Camera viewport the player sees.
pub trait Viewport {
    /// Half of the visible width in world units.
    fn half_width(&self) -> f32;

    /// Half of the visible height in world units.
    fn half_height(&self) -> f32;

    /// Returns a random point just outside the viewport, pushed out by `padding`.
    fn random_point_outside(&self, padding: f32, rng: &mut dyn RngCore) -> Vec2;

    /// Reports whether the point is currently visible.
    fn contains(&self, point: Vec2) -> bool;

    /// Distance from the viewport center to one of its corners.
    fn diagonal(&self) -> f32 {
        let half_width = self.half_width();
        let half_height = self.half_height();
        (half_width * half_width + half_height * half_height).sqrt()
    }
}

/// Receiver of the pickups enemies leave behind.
pub trait DropCollaborator {
    /// Reports whether a pickup of `kind` may drop now, updating any cooldown.
    fn check_cooldown(&mut self, kind: DropKind) -> bool;

    /// Places a pickup of `kind` at `position`.
    fn spawn_drop(&mut self, kind: DropKind, position: Vec2);

    /// Reports whether chests are worth dropping, e.g. abilities remain to be won.
    fn chest_allowed(&self) -> bool {
        true
    }
}

/// Persistent storage for the enemies-killed counter.
pub trait KillLedger {
    /// Last persisted value of the counter.
    fn enemies_killed(&self) -> u32;

    /// Persists a new value of the counter.
    fn set_enemies_killed(&mut self, total: u32);
}

/// Uniformly distributed point inside the unit circle.
pub fn point_in_unit_circle(rng: &mut dyn RngCore) -> Vec2 {
    let angle = rng.gen_range(0.0..TAU);
    let radius = rng.gen::<f32>().sqrt();
    Vec2::from_angle(angle) * radius
}

/// Uniformly distributed direction of unit length.
pub fn unit_direction(rng: &mut dyn RngCore) -> Vec2 {
    Vec2::from_angle(rng.gen_range(0.0..TAU))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn zero_spawn_position_falls_back_to_shape() {
        let kind = EnemyKind::new(3);
        let wave = WaveDescriptor::new(kind, 5, Duration::from_secs(1), SpawnShape::Circular)
            .with_spawn_position(Vec2::ZERO);
        assert_eq!(wave.site(), SpawnSite::Sampled(SpawnShape::Circular));

        let pinned = wave.with_spawn_position(Vec2::new(4.0, -2.0));
        assert_eq!(pinned.site(), SpawnSite::Fixed(Vec2::new(4.0, -2.0)));
    }

    #[test]
    fn catalog_keeps_last_duplicate() {
        let kind = EnemyKind::new(1);
        let catalog = EnemyCatalog::from_profiles([
            EnemyProfile::new(kind, "bat", 5.0),
            EnemyProfile::new(kind, "big bat", 9.0),
        ]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.profile(kind).map(|profile| profile.health), Some(9.0));
        assert!(catalog.profile(EnemyKind::new(2)).is_none());
    }

    #[test]
    fn player_pose_normalizes_facing() {
        let pose = PlayerPose::new(Vec2::ONE, Vec2::new(3.0, 4.0));
        assert!((pose.facing.length() - 1.0).abs() < 1e-6);
        assert_eq!(PlayerPose::new(Vec2::ZERO, Vec2::ZERO).facing, Vec2::Y);
    }

    #[test]
    fn unit_circle_samples_stay_inside() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..256 {
            assert!(point_in_unit_circle(&mut rng).length() <= 1.0 + 1e-6);
            assert!((unit_direction(&mut rng).length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn leash_exemption_follows_override() {
        let snapshot = EnemySnapshot {
            id: EnemyId::new(0, 0),
            kind: EnemyKind::new(0),
            position: Vec2::ZERO,
            health: 1.0,
            is_boss: false,
            wave_override: None,
        };
        assert!(!snapshot.leash_exempt());
        let exempt = EnemySnapshot {
            wave_override: Some(WaveOverride {
                disable_offscreen_teleport: true,
            }),
            ..snapshot
        };
        assert!(exempt.leash_exempt());
    }

    #[test]
    fn drop_descriptor_round_trips_through_bincode() {
        let descriptor = DropDescriptor::new(DropKind::MediumGem, 35.0);
        let bytes = bincode::serialize(&descriptor).expect("serialize");
        let restored: DropDescriptor = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(restored, descriptor);
    }
}
