//! Headless stage loop wiring the registry to its systems.

use std::{
    cell::Cell,
    collections::{BTreeMap, VecDeque},
    fmt,
    rc::Rc,
    time::Duration,
};

use glam::Vec2;
use horde_core::{Command, DropKind, Event, PlayerPose};
use horde_system_leash::{LeashView, OffscreenLeash};
use horde_system_waves::{stage_plan, WaveScheduler};
use horde_world::{self as world, query, query::PoolStats, World, WorldBuilder};
use tracing::{debug, info};

use crate::{
    collaborators::{CooldownDrops, DropTally, FollowCamera, MemoryLedger, RectField},
    scenario::{Scenario, ScheduledBoss, ScheduledPulse, ScheduledWave},
};

/// Summary of a finished run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Report {
    /// Ticks simulated.
    pub ticks: u32,
    /// Enemies that entered the live set.
    pub spawned: u32,
    /// Death notifications observed, bulk clears included.
    pub deaths: u32,
    /// Bosses that died.
    pub bosses_defeated: u32,
    /// Enemies moved by the offscreen leash.
    pub leashed: u32,
    /// Largest live set observed at the end of a tick.
    pub peak_live: usize,
    /// Live set at the end of the run.
    pub live: usize,
    /// Kill counter at the end of the run.
    pub kill_count: u32,
    /// Value held by the ledger at the end of the run.
    pub persisted_kills: u32,
    /// Pickups handed to the field, per kind.
    pub drops: BTreeMap<DropKind, u32>,
    /// Pool occupancy at the end of the run.
    pub pools: Vec<PoolStats>,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ticks:           {}", self.ticks)?;
        writeln!(f, "spawned:         {}", self.spawned)?;
        writeln!(f, "deaths:          {}", self.deaths)?;
        writeln!(f, "bosses defeated: {}", self.bosses_defeated)?;
        writeln!(f, "leashed:         {}", self.leashed)?;
        writeln!(f, "live (peak):     {} ({})", self.live, self.peak_live)?;
        writeln!(f, "kill count:      {}", self.kill_count)?;
        for (kind, count) in &self.drops {
            writeln!(f, "drop {kind:?}: {count}")?;
        }
        for pool in &self.pools {
            writeln!(
                f,
                "pool {}: {}/{} in use",
                pool.kind.get(),
                pool.in_use,
                pool.capacity
            )?;
        }
        Ok(())
    }
}

/// Player walking a slow spiral across the field.
#[derive(Clone, Copy, Debug)]
struct Walker {
    pose: PlayerPose,
    speed: f32,
    turn_rate: f32,
}

impl Walker {
    fn advance(&mut self, dt: f32, field: &RectField) {
        let facing = Vec2::from_angle(self.turn_rate * dt).rotate(self.pose.facing);
        let position = field.clamp(self.pose.position + facing * self.speed * dt);
        self.pose = PlayerPose::new(position, facing);
    }
}

/// Owns the registry, its systems and the scripted stage timeline.
pub struct Simulation {
    world: World,
    scheduler: WaveScheduler,
    leash: OffscreenLeash,
    field: RectField,
    walker: Walker,
    camera_center: Rc<Cell<Vec2>>,
    clock: Rc<Cell<Duration>>,
    tally: DropTally,
    ledger: MemoryLedger,
    tick_length: Duration,
    aura_period: Duration,
    aura_elapsed: Duration,
    aura_radius: f32,
    aura_damage: f32,
    waves: VecDeque<ScheduledWave>,
    bosses: VecDeque<ScheduledBoss>,
    pulses: VecDeque<ScheduledPulse>,
    clear_at: Option<Duration>,
    report: Report,
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("world", &self.world)
            .field("scheduler", &self.scheduler)
            .field("clock", &self.clock.get())
            .field("report", &self.report)
            .finish_non_exhaustive()
    }
}

impl Simulation {
    /// Assembles the registry and systems described by `scenario`.
    pub fn new(scenario: Scenario) -> Result<Self, crate::ScenarioError> {
        Self::with_ledger(scenario, MemoryLedger::default())
    }

    /// Same as [`Simulation::new`] but persists kills into `ledger`.
    pub fn with_ledger(
        scenario: Scenario,
        ledger: MemoryLedger,
    ) -> Result<Self, crate::ScenarioError> {
        let seed = scenario.simulation.seed;
        let camera_center = Rc::new(Cell::new(Vec2::ZERO));
        let clock = Rc::new(Cell::new(Duration::ZERO));
        let tally = DropTally::default();
        let field = RectField::new(&scenario.field);

        let mut world = WorldBuilder::new(horde_world::RegistryConfig {
            rng_seed: seed,
            ..scenario.registry
        })
        .placement(scenario.placement)
        .catalog(scenario.catalog())
        .field(field.clone())
        .viewport(FollowCamera::new(scenario.camera, Rc::clone(&camera_center)))
        .drops(CooldownDrops::new(
            &scenario.drops,
            Rc::clone(&clock),
            Rc::clone(&tally),
        ))
        .ledger(ledger.clone())
        .build()?;

        let descriptors: Vec<_> = scenario.waves.iter().map(|wave| wave.wave).collect();
        let mut events = Vec::new();
        world::apply(
            &mut world,
            Command::PrepareStage {
                waves: stage_plan(&descriptors),
                resume_kill_count: scenario.resume_kill_count,
            },
            &mut events,
        );

        let mut waves = scenario.waves;
        waves.sort_by(|a, b| a.start.total_cmp(&b.start));
        let mut bosses = scenario.bosses;
        bosses.sort_by(|a, b| a.at.total_cmp(&b.at));
        let mut pulses = scenario.pulses;
        pulses.sort_by(|a, b| a.at.total_cmp(&b.at));

        Ok(Self {
            world,
            scheduler: WaveScheduler::new(),
            leash: OffscreenLeash::new(scenario.leash, seed.wrapping_add(1)),
            field,
            walker: Walker {
                pose: PlayerPose::default(),
                speed: scenario.player.speed,
                turn_rate: scenario.player.turn_rate,
            },
            camera_center,
            clock,
            tally,
            ledger,
            tick_length: Duration::from_millis(scenario.simulation.tick_ms),
            aura_period: seconds(scenario.player.aura_period),
            aura_elapsed: Duration::ZERO,
            aura_radius: scenario.player.aura_radius,
            aura_damage: scenario.player.aura_damage,
            waves: waves.into(),
            bosses: bosses.into(),
            pulses: pulses.into(),
            clear_at: scenario.clear_at.map(seconds),
            report: Report::default(),
        })
    }

    /// Read access to the registry.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Runs `ticks` ticks and returns the accumulated report.
    pub fn run(&mut self, ticks: u32) -> Report {
        for _ in 0..ticks {
            self.step();
        }

        let mut report = self.report.clone();
        report.live = query::live_count(&self.world);
        report.kill_count = query::kill_count(&self.world);
        report.persisted_kills = self.ledger.value();
        report.drops = self.tally.borrow().clone();
        report.pools = query::all_pool_stats(&self.world);
        info!(
            ticks = report.ticks,
            spawned = report.spawned,
            kills = report.kill_count,
            live = report.live,
            "run finished"
        );
        report
    }

    /// Advances the stage by one tick.
    pub fn step(&mut self) {
        let now = self.clock.get().saturating_add(self.tick_length);
        self.clock.set(now);
        self.report.ticks += 1;

        self.walker
            .advance(self.tick_length.as_secs_f32(), &self.field);
        self.camera_center.set(self.walker.pose.position);

        let mut commands = vec![Command::UpdatePlayer {
            pose: self.walker.pose,
        }];
        self.start_due_waves(now, &mut commands);
        self.spawn_due_bosses(now, &mut commands);
        let _ = self.execute(commands);

        let tick_events = self.execute(vec![Command::Tick {
            dt: self.tick_length,
        }]);
        let mut commands = Vec::new();
        self.scheduler.handle(&tick_events, &mut commands);
        let roster = query::roster(&self.world);
        self.leash.handle(
            &tick_events,
            LeashView {
                roster: &roster,
                player: query::player(&self.world),
                half_extents: query::viewport_half_extents(&self.world),
                bossfight_active: query::bossfight_active(&self.world),
            },
            &mut commands,
        );

        self.aura_elapsed = self.aura_elapsed.saturating_add(self.tick_length);
        if !self.aura_period.is_zero() && self.aura_elapsed >= self.aura_period {
            self.aura_elapsed -= self.aura_period;
            commands.push(Command::DamageInRadius {
                center: self.walker.pose.position,
                radius: self.aura_radius,
                amount: self.aura_damage,
            });
        }

        while let Some(pulse) = self.pulses.front().copied() {
            if seconds(pulse.at) > now {
                break;
            }
            let _ = self.pulses.pop_front();
            commands.push(Command::DealDamageToAll {
                amount: pulse.damage,
            });
        }

        if self.clear_at.map_or(false, |at| at <= now) {
            self.clear_at = None;
            self.scheduler.stop_spawning();
            commands.push(Command::KillAll);
            info!(at = ?now, "stage cleared");
        }

        let _ = self.execute(commands);
        self.report.peak_live = self.report.peak_live.max(query::live_count(&self.world));
    }

    fn start_due_waves(&mut self, now: Duration, out: &mut Vec<Command>) {
        while let Some(scheduled) = self.waves.front().copied() {
            if seconds(scheduled.start) > now {
                break;
            }
            let _ = self.waves.pop_front();
            debug!(kind = scheduled.wave.kind.get(), at = ?now, "starting wave");
            self.scheduler.start_wave(scheduled.wave, out);
        }
    }

    fn spawn_due_bosses(&mut self, now: Duration, out: &mut Vec<Command>) {
        while let Some(boss) = self.bosses.front().copied() {
            if seconds(boss.at) > now {
                break;
            }
            let _ = self.bosses.pop_front();
            out.push(Command::SpawnBoss {
                kind: boss.kind,
                position: boss.position,
                spawns_chest: boss.spawns_chest,
                subscription: None,
            });
        }
    }

    // Boss spawns and deaths toggle the bossfight flag as follow-up commands.
    fn execute(&mut self, commands: Vec<Command>) -> Vec<Event> {
        let mut pending: VecDeque<_> = commands.into();
        let mut events = Vec::new();
        while let Some(command) = pending.pop_front() {
            let start = events.len();
            world::apply(&mut self.world, command, &mut events);
            for event in &events[start..] {
                self.record(event, &mut pending);
            }
        }
        events
    }

    fn record(&mut self, event: &Event, pending: &mut VecDeque<Command>) {
        match event {
            Event::EnemySpawned { is_boss, .. } => {
                self.report.spawned += 1;
                if *is_boss {
                    pending.push_back(Command::SetBossfight { active: true });
                }
            }
            Event::EnemyDied { is_boss, .. } => {
                self.report.deaths += 1;
                if *is_boss {
                    self.report.bosses_defeated += 1;
                    let bosses_left = query::roster(&self.world)
                        .iter()
                        .any(|enemy| enemy.is_boss);
                    if !bosses_left {
                        pending.push_back(Command::SetBossfight { active: false });
                    }
                }
            }
            Event::EnemyRepositioned { .. } => self.report.leashed += 1,
            _ => {}
        }
    }
}

// Negative and NaN clamp to zero, anything past `Duration::MAX` saturates.
pub(crate) fn seconds(value: f64) -> Duration {
    if value.is_nan() || value <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
}
