//! TOML scenario files describing a headless survivors stage.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
};

use glam::Vec2;
use horde_core::{DropKind, EnemyCatalog, EnemyKind, EnemyProfile, WaveDescriptor};
use horde_system_leash::LeashConfig;
use horde_system_placement::PlacementConfig;
use horde_world::{BuildError, RegistryConfig};
use serde::Deserialize;
use thiserror::Error;

/// Scenario bundled with the binary and used when no file is given.
pub const BUILTIN_SCENARIO: &str = include_str!("../scenarios/meadow.toml");

/// Errors raised while loading or validating a scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// The scenario file could not be read.
    #[error("failed to read scenario at {}", .path.display())]
    Read {
        /// Location that was read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The scenario contents are not valid TOML for the expected schema.
    #[error("failed to parse scenario toml")]
    Parse(#[from] toml::de::Error),
    /// The scenario does not describe any enemy.
    #[error("scenario declares no enemies")]
    NoEnemies,
    /// The same kind is described twice.
    #[error("enemy kind {0} is declared more than once")]
    DuplicateEnemy(u32),
    /// A wave or boss refers to a kind without a profile.
    #[error("{context} refers to undeclared enemy kind {kind}")]
    UnknownKind {
        /// Section the reference was found in.
        context: &'static str,
        /// Numeric value of the kind.
        kind: u32,
    },
    /// The simulation step is zero.
    #[error("tick length must be positive")]
    ZeroTickLength,
    /// The registry rejected the configuration.
    #[error("failed to assemble the enemy registry")]
    Build(#[from] BuildError),
}

/// Length and seed of a run.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Number of ticks simulated.
    pub ticks: u32,
    /// Duration of a tick in milliseconds.
    pub tick_ms: u64,
    /// Seed shared by every random stream of the run.
    pub seed: u64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            ticks: 3_600,
            tick_ms: 16,
            seed: 7,
        }
    }
}

/// Rectangular playing field with optional obstacles.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct FieldSettings {
    /// Half extents of the walkable rectangle, centered on the origin.
    pub half_extents: Vec2,
    /// Axis-aligned obstacles enemies may not stand in.
    pub obstacles: Vec<Obstacle>,
    /// Radius of the circular boss fence. Only checked when fences count.
    pub fence_radius: Option<f32>,
}

impl Default for FieldSettings {
    fn default() -> Self {
        Self {
            half_extents: Vec2::new(60.0, 40.0),
            obstacles: Vec::new(),
            fence_radius: None,
        }
    }
}

/// Axis-aligned rectangle inside the field.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct Obstacle {
    /// Center of the rectangle.
    pub center: Vec2,
    /// Half extents of the rectangle.
    pub half_extents: Vec2,
}

impl Obstacle {
    /// Reports whether the point lies inside the obstacle.
    #[must_use]
    pub fn contains(&self, point: Vec2) -> bool {
        let local = (point - self.center).abs();
        local.x <= self.half_extents.x && local.y <= self.half_extents.y
    }
}

/// Visible area around the player.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Half of the visible width.
    pub half_width: f32,
    /// Half of the visible height.
    pub half_height: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            half_width: 9.0,
            half_height: 5.0,
        }
    }
}

/// Scripted player behaviour.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    /// Walking speed in units per second.
    pub speed: f32,
    /// Turning speed in radians per second.
    pub turn_rate: f32,
    /// Radius of the damage aura around the player.
    pub aura_radius: f32,
    /// Damage dealt by each aura pulse.
    pub aura_damage: f32,
    /// Seconds between two aura pulses.
    pub aura_period: f64,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            speed: 2.5,
            turn_rate: 0.2,
            aura_radius: 2.5,
            aura_damage: 3.0,
            aura_period: 0.5,
        }
    }
}

/// Drop cooldowns and chest budget of the reference drop collaborator.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DropSettings {
    /// Minimum seconds between two drops of the same kind.
    pub cooldowns: BTreeMap<DropKind, f64>,
    /// Number of chests that may still be awarded. `None` is unlimited.
    pub chests: Option<u32>,
}

/// Wave started once the stage clock reaches `start`.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct ScheduledWave {
    /// Stage time in seconds.
    pub start: f64,
    /// Wave to run.
    #[serde(flatten)]
    pub wave: WaveDescriptor,
}

/// Boss spawned once the stage clock reaches `at`.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct ScheduledBoss {
    /// Stage time in seconds.
    pub at: f64,
    /// Kind backing the boss.
    pub kind: EnemyKind,
    /// Spawn position.
    pub position: Vec2,
    /// Whether the boss leaves a chest.
    #[serde(default)]
    pub spawns_chest: bool,
}

/// Screen-wide damage applied once the stage clock reaches `at`.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct ScheduledPulse {
    /// Stage time in seconds.
    pub at: f64,
    /// Damage dealt to every non-boss enemy.
    pub damage: f32,
}

/// Complete description of a headless run.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Scenario {
    /// Run length and seed.
    #[serde(default)]
    pub simulation: SimulationSettings,
    /// Registry tunables.
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Placement tunables.
    #[serde(default)]
    pub placement: PlacementConfig,
    /// Offscreen leash tunables.
    #[serde(default)]
    pub leash: LeashConfig,
    /// Playing field.
    #[serde(default)]
    pub field: FieldSettings,
    /// Camera viewport.
    #[serde(default)]
    pub camera: CameraSettings,
    /// Scripted player.
    #[serde(default)]
    pub player: PlayerSettings,
    /// Drop collaborator settings.
    #[serde(default)]
    pub drops: DropSettings,
    /// Continue the kill counter persisted by a previous run.
    #[serde(default)]
    pub resume_kill_count: bool,
    /// Enemy archetypes.
    #[serde(default)]
    pub enemies: Vec<EnemyProfile>,
    /// Wave timeline.
    #[serde(default)]
    pub waves: Vec<ScheduledWave>,
    /// Boss timeline.
    #[serde(default)]
    pub bosses: Vec<ScheduledBoss>,
    /// Screen-wide damage timeline.
    #[serde(default)]
    pub pulses: Vec<ScheduledPulse>,
    /// Stage time at which spawning stops and every enemy is cleared.
    #[serde(default)]
    pub clear_at: Option<f64>,
}

impl Scenario {
    /// Parses and validates a scenario from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ScenarioError> {
        let scenario: Self = toml::from_str(contents)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Reads, parses and validates the scenario stored at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ScenarioError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Scenario shipped with the binary.
    pub fn builtin() -> Result<Self, ScenarioError> {
        Self::from_toml_str(BUILTIN_SCENARIO)
    }

    /// Catalog built from the declared enemies.
    #[must_use]
    pub fn catalog(&self) -> EnemyCatalog {
        EnemyCatalog::from_profiles(self.enemies.iter().cloned())
    }

    fn validate(&self) -> Result<(), ScenarioError> {
        if self.enemies.is_empty() {
            return Err(ScenarioError::NoEnemies);
        }
        if self.simulation.tick_ms == 0 {
            return Err(ScenarioError::ZeroTickLength);
        }

        let mut declared = BTreeSet::new();
        for profile in &self.enemies {
            if !declared.insert(profile.kind) {
                return Err(ScenarioError::DuplicateEnemy(profile.kind.get()));
            }
        }

        let referenced = self
            .waves
            .iter()
            .map(|scheduled| ("wave", scheduled.wave.kind))
            .chain(self.bosses.iter().map(|boss| ("boss", boss.kind)));
        for (context, kind) in referenced {
            if !declared.contains(&kind) {
                return Err(ScenarioError::UnknownKind {
                    context,
                    kind: kind.get(),
                });
            }
        }
        Ok(())
    }
}
