use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use glam::Vec2;
use horde_core::{
    Command, DropCollaborator, DropDescriptor, DropKind, EnemyCatalog, EnemyId, EnemyKind,
    EnemyProfile, Event, FieldValidator, KillLedger, SpawnShape, SpawnSite, StageWave,
    SubscriptionTag, Viewport, WaveOverride,
};
use horde_world::{self as world, query, BuildError, RegistryConfig, World, WorldBuilder};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

const BAT: EnemyKind = EnemyKind::new(1);
const GOLEM: EnemyKind = EnemyKind::new(2);
const BORDER: Vec2 = Vec2::new(50.0, 50.0);

struct OpenField {
    accept: bool,
}

impl FieldValidator for OpenField {
    fn validate(&self, _position: Vec2, _offset: Vec2, _consider_fence: bool) -> bool {
        self.accept
    }

    fn random_border_position(&self, _rng: &mut dyn RngCore) -> Vec2 {
        BORDER
    }
}

struct Camera;

impl Viewport for Camera {
    fn half_width(&self) -> f32 {
        8.0
    }

    fn half_height(&self) -> f32 {
        5.0
    }

    fn random_point_outside(&self, padding: f32, _rng: &mut dyn RngCore) -> Vec2 {
        Vec2::new(self.half_width() + padding, 0.0)
    }

    fn contains(&self, point: Vec2) -> bool {
        point.x.abs() <= self.half_width() && point.y.abs() <= self.half_height()
    }
}

#[derive(Clone, Default)]
struct DropLog(Rc<RefCell<Vec<(DropKind, Vec2)>>>);

impl DropLog {
    fn kinds(&self) -> Vec<DropKind> {
        self.0.borrow().iter().map(|(kind, _)| *kind).collect()
    }
}

impl DropCollaborator for DropLog {
    fn check_cooldown(&mut self, _kind: DropKind) -> bool {
        true
    }

    fn spawn_drop(&mut self, kind: DropKind, position: Vec2) {
        self.0.borrow_mut().push((kind, position));
    }
}

#[derive(Clone, Default)]
struct Ledger(Rc<Cell<u32>>);

impl KillLedger for Ledger {
    fn enemies_killed(&self) -> u32 {
        self.0.get()
    }

    fn set_enemies_killed(&mut self, total: u32) {
        self.0.set(total);
    }
}

struct Harness {
    world: World,
    drops: DropLog,
    ledger: Ledger,
}

fn catalog() -> EnemyCatalog {
    EnemyCatalog::from_profiles([
        EnemyProfile::new(BAT, "bat", 1.0)
            .with_drop(DropDescriptor::new(DropKind::SmallGem, 100.0)),
        EnemyProfile::new(GOLEM, "golem", 10.0),
    ])
}

fn harness(config: RegistryConfig, accept: bool) -> Harness {
    let drops = DropLog::default();
    let ledger = Ledger::default();
    let world = WorldBuilder::new(config)
        .catalog(catalog())
        .field(OpenField { accept })
        .viewport(Camera)
        .drops(drops.clone())
        .ledger(ledger.clone())
        .build()
        .expect("all collaborators supplied");
    Harness {
        world,
        drops,
        ledger,
    }
}

fn run(world: &mut World, command: Command) -> Vec<Event> {
    let mut events = Vec::new();
    world::apply(world, command, &mut events);
    events
}

fn spawn_at(world: &mut World, kind: EnemyKind, position: Vec2) -> EnemyId {
    spawn_tagged(world, kind, position, None)
}

fn spawn_tagged(
    world: &mut World,
    kind: EnemyKind,
    position: Vec2,
    subscription: Option<SubscriptionTag>,
) -> EnemyId {
    let events = run(
        world,
        Command::SpawnEnemy {
            kind,
            site: SpawnSite::Fixed(position),
            subscription,
        },
    );
    match events.as_slice() {
        [Event::EnemySpawned { enemy, .. }] => *enemy,
        other => panic!("unexpected spawn events: {other:?}"),
    }
}

fn deaths(events: &[Event]) -> Vec<(EnemyId, Option<SubscriptionTag>)> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::EnemyDied {
                enemy,
                subscription,
                ..
            } => Some((*enemy, *subscription)),
            _ => None,
        })
        .collect()
}

#[test]
fn builder_reports_missing_collaborators() {
    let missing_ledger = WorldBuilder::new(RegistryConfig::default())
        .field(OpenField { accept: true })
        .viewport(Camera)
        .drops(DropLog::default())
        .build();
    assert_eq!(missing_ledger.err(), Some(BuildError::MissingLedger));

    let zero_cap = WorldBuilder::new(RegistryConfig {
        enemies_cap: 0,
        ..RegistryConfig::default()
    })
    .field(OpenField { accept: true })
    .viewport(Camera)
    .drops(DropLog::default())
    .ledger(Ledger::default())
    .build();
    assert_eq!(zero_cap.err(), Some(BuildError::ZeroCap));
}

#[test]
fn live_set_never_exceeds_cap() {
    let Harness { mut world, .. } = harness(
        RegistryConfig {
            enemies_cap: 3,
            ..RegistryConfig::default()
        },
        true,
    );

    let events = run(
        &mut world,
        Command::SpawnWave {
            kind: BAT,
            wave_override: None,
            shape: SpawnShape::Circular,
            count: 5,
            subscription: None,
        },
    );
    let spawned = events
        .iter()
        .filter(|event| matches!(event, Event::EnemySpawned { .. }))
        .count();
    assert_eq!(spawned, 3, "wave truncated at cap");
    assert_eq!(query::live_count(&world), 3);

    let extra = run(
        &mut world,
        Command::SpawnEnemy {
            kind: BAT,
            site: SpawnSite::Fixed(Vec2::ONE),
            subscription: None,
        },
    );
    assert!(extra.is_empty(), "single spawn skipped at cap");

    let boss = run(
        &mut world,
        Command::SpawnBoss {
            kind: GOLEM,
            position: Vec2::ZERO,
            spawns_chest: true,
            subscription: None,
        },
    );
    assert!(boss.is_empty(), "boss spawn skipped at cap");
    assert_eq!(query::live_count(&world), 3);
}

#[test]
fn closest_enemy_prefers_earliest_on_ties() {
    let Harness { mut world, .. } = harness(RegistryConfig::default(), true);
    let first = spawn_at(&mut world, BAT, Vec2::new(1.0, 0.0));
    let _far = spawn_at(&mut world, BAT, Vec2::new(5.0, 5.0));
    let _tied = spawn_at(&mut world, BAT, Vec2::new(-1.0, 0.0));

    assert_eq!(query::closest_enemy(&world, Vec2::ZERO), Some(first));
}

#[test]
fn closest_enemy_is_none_for_empty_registry() {
    let Harness { world, .. } = harness(RegistryConfig::default(), true);
    assert_eq!(query::closest_enemy(&world, Vec2::ZERO), None);
}

#[test]
fn radius_query_includes_boundary() {
    let Harness { mut world, .. } = harness(RegistryConfig::default(), true);
    let edge = spawn_at(&mut world, GOLEM, Vec2::new(2.0, 0.0));
    let _outside = spawn_at(&mut world, GOLEM, Vec2::new(2.1, 0.0));

    assert_eq!(query::enemies_in_radius(&world, Vec2::ZERO, 2.0), vec![edge]);
}

#[test]
fn kill_counter_counts_each_death_once() {
    let Harness {
        mut world, ledger, ..
    } = harness(RegistryConfig::default(), true);
    let _ = run(
        &mut world,
        Command::PrepareStage {
            waves: vec![StageWave::new(BAT, 4)],
            resume_kill_count: false,
        },
    );

    let victim = spawn_at(&mut world, BAT, Vec2::new(3.0, 0.0));
    for offset in 0..3 {
        let _ = spawn_at(&mut world, GOLEM, Vec2::new(0.0, offset as f32));
    }

    let events = run(
        &mut world,
        Command::DamageEnemy {
            enemy: victim,
            amount: 5.0,
        },
    );
    assert!(events.contains(&Event::KillCountChanged { total: 1 }));
    assert_eq!(query::kill_count(&world), 1);
    assert_eq!(ledger.0.get(), 1);

    let repeat = run(
        &mut world,
        Command::DamageEnemy {
            enemy: victim,
            amount: 5.0,
        },
    );
    assert!(repeat.is_empty(), "stale handle ignored");
    assert_eq!(query::kill_count(&world), 1);

    let cleared = run(&mut world, Command::KillAll);
    assert!(cleared.contains(&Event::EnemiesCleared { count: 3 }));
    assert_eq!(deaths(&cleared).len(), 3);
    assert_eq!(query::kill_count(&world), 4);
    assert_eq!(ledger.0.get(), 4);
    assert_eq!(query::live_count(&world), 0);
}

#[test]
fn stage_can_resume_persisted_counter() {
    let Harness {
        mut world, ledger, ..
    } = harness(RegistryConfig::default(), true);
    ledger.0.set(41);

    let events = run(
        &mut world,
        Command::PrepareStage {
            waves: Vec::new(),
            resume_kill_count: true,
        },
    );
    assert!(events.contains(&Event::StagePrepared {
        pools: 0,
        kill_count: 41
    }));

    let bat = spawn_at(&mut world, BAT, Vec2::ZERO);
    let _ = run(
        &mut world,
        Command::DamageEnemy {
            enemy: bat,
            amount: 1.0,
        },
    );
    assert_eq!(query::kill_count(&world), 42);

    let _ = run(
        &mut world,
        Command::PrepareStage {
            waves: Vec::new(),
            resume_kill_count: false,
        },
    );
    assert_eq!(query::kill_count(&world), 0);
    assert_eq!(ledger.0.get(), 0, "fresh stage persists the reset");
}

#[test]
fn bulk_damage_leaves_bosses_untouched() {
    let Harness { mut world, .. } = harness(RegistryConfig::default(), true);
    let grunt = spawn_at(&mut world, GOLEM, Vec2::new(1.0, 1.0));
    let boss_events = run(
        &mut world,
        Command::SpawnBoss {
            kind: GOLEM,
            position: Vec2::new(-1.0, -1.0),
            spawns_chest: false,
            subscription: None,
        },
    );
    let boss = match boss_events.as_slice() {
        [Event::EnemySpawned {
            enemy,
            is_boss: true,
            ..
        }] => *enemy,
        other => panic!("unexpected boss events: {other:?}"),
    };

    let _ = run(&mut world, Command::DealDamageToAll { amount: 4.0 });
    assert_eq!(query::enemy(&world, grunt).map(|enemy| enemy.health), Some(6.0));
    assert_eq!(query::enemy(&world, boss).map(|enemy| enemy.health), Some(10.0));

    let events = run(&mut world, Command::DealDamageToAll { amount: 100.0 });
    assert_eq!(deaths(&events), vec![(grunt, None)]);
    assert_eq!(query::live_count(&world), 1);
    assert!(query::enemy(&world, boss).is_some());
}

#[test]
fn bulk_damage_kills_count_and_drop_like_natural_deaths() {
    let Harness {
        mut world,
        drops,
        ledger,
    } = harness(RegistryConfig::default(), true);
    for index in 0..3 {
        let _ = spawn_at(&mut world, BAT, Vec2::new(index as f32, 2.0));
    }

    let events = run(&mut world, Command::DealDamageToAll { amount: 5.0 });

    assert_eq!(deaths(&events).len(), 3);
    assert_eq!(query::live_count(&world), 0);
    assert_eq!(query::kill_count(&world), 3);
    assert_eq!(ledger.0.get(), 3);
    assert_eq!(drops.kinds(), vec![DropKind::SmallGem; 3]);
    let counter_updates: Vec<_> = events
        .iter()
        .filter(|event| matches!(event, Event::KillCountChanged { .. }))
        .collect();
    assert_eq!(counter_updates, vec![&Event::KillCountChanged { total: 3 }]);
}

#[test]
fn configured_pool_bound_never_exceeds_hard_limit() {
    let Harness { mut world, .. } = harness(
        RegistryConfig {
            max_pool_size: 1_000,
            ..RegistryConfig::default()
        },
        true,
    );
    let _ = run(
        &mut world,
        Command::PrepareStage {
            waves: vec![StageWave::new(BAT, 300)],
            resume_kill_count: false,
        },
    );

    let stats = query::pool_stats(&world, BAT).expect("pool prewarmed");
    assert_eq!(stats.capacity, 100);
    assert_eq!(stats.in_use, 0);
}

#[test]
fn wave_placement_falls_back_to_border() {
    let Harness { mut world, .. } = harness(RegistryConfig::default(), false);
    let _ = run(
        &mut world,
        Command::SpawnWave {
            kind: BAT,
            wave_override: None,
            shape: SpawnShape::OutsideViewport,
            count: 4,
            subscription: None,
        },
    );

    let roster = query::roster(&world);
    assert_eq!(roster.len(), 4);
    assert!(roster.iter().all(|enemy| enemy.position == BORDER));
}

#[test]
fn wave_override_reaches_snapshots() {
    let Harness { mut world, .. } = harness(RegistryConfig::default(), true);
    let _ = run(
        &mut world,
        Command::SpawnWave {
            kind: BAT,
            wave_override: Some(WaveOverride {
                disable_offscreen_teleport: true,
            }),
            shape: SpawnShape::Circular,
            count: 2,
            subscription: None,
        },
    );

    assert!(query::roster(&world).iter().all(|enemy| enemy.leash_exempt()));
}

#[test]
fn pools_reuse_released_slots() {
    let Harness { mut world, .. } = harness(RegistryConfig::default(), true);
    let _ = run(
        &mut world,
        Command::PrepareStage {
            waves: vec![StageWave::new(BAT, 3), StageWave::new(BAT, 2)],
            resume_kill_count: false,
        },
    );
    let stats = query::pool_stats(&world, BAT).expect("pool prewarmed");
    assert_eq!((stats.capacity, stats.in_use), (3, 0));

    for _ in 0..4 {
        for index in 0..3 {
            let _ = spawn_at(&mut world, BAT, Vec2::new(index as f32, 0.0));
        }
        let _ = run(&mut world, Command::KillAll);
    }

    let stats = query::pool_stats(&world, BAT).expect("pool exists");
    assert_eq!((stats.capacity, stats.in_use), (3, 0));
    assert_eq!(query::arena_size(&world), 3);
    assert_eq!(query::all_pool_stats(&world), vec![stats]);
}

#[test]
fn natural_deaths_roll_drops_and_bulk_kills_do_not() {
    let Harness {
        mut world, drops, ..
    } = harness(RegistryConfig::default(), true);
    let bat = spawn_at(&mut world, BAT, Vec2::new(4.0, 4.0));
    let _ = run(
        &mut world,
        Command::DamageEnemy {
            enemy: bat,
            amount: 1.0,
        },
    );
    assert_eq!(drops.kinds(), vec![DropKind::SmallGem]);
    let (_, position) = drops.0.borrow()[0];
    assert!(position.distance(Vec2::new(4.0, 4.0)) <= 0.2 + 1e-5);

    let _ = spawn_at(&mut world, BAT, Vec2::ZERO);
    let _ = run(&mut world, Command::KillAll);
    assert_eq!(drops.kinds().len(), 1, "bulk kill skips drops");
}

#[test]
fn boss_death_leaves_guaranteed_rewards() {
    let Harness {
        mut world, drops, ..
    } = harness(RegistryConfig::default(), true);
    let _ = run(
        &mut world,
        Command::SpawnBoss {
            kind: GOLEM,
            position: Vec2::ZERO,
            spawns_chest: true,
            subscription: None,
        },
    );

    let _ = run(
        &mut world,
        Command::DamageInRadius {
            center: Vec2::ZERO,
            radius: 1.0,
            amount: 20.0,
        },
    );
    assert_eq!(
        drops.kinds(),
        vec![DropKind::Chest, DropKind::Magnet, DropKind::Food]
    );
}

#[test]
fn subscription_tag_echoes_exactly_once() {
    let Harness { mut world, .. } = harness(RegistryConfig::default(), true);
    let tag = SubscriptionTag::new(7);
    let enemy = spawn_tagged(&mut world, GOLEM, Vec2::ZERO, Some(tag));

    let first = run(
        &mut world,
        Command::DamageEnemy {
            enemy,
            amount: 10.0,
        },
    );
    assert_eq!(deaths(&first), vec![(enemy, Some(tag))]);

    let reused = spawn_at(&mut world, GOLEM, Vec2::ZERO);
    assert_eq!(reused.slot(), enemy.slot());
    let cleared = run(&mut world, Command::KillAll);
    assert_eq!(deaths(&cleared), vec![(reused, None)]);
}

#[test]
fn random_visible_enemy_ignores_offscreen_enemies() {
    let Harness { mut world, .. } = harness(RegistryConfig::default(), true);
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    assert_eq!(query::random_visible_enemy(&world, &mut rng), None);

    for index in 0..20 {
        let _ = spawn_at(&mut world, BAT, Vec2::new(30.0 + index as f32, 0.0));
    }
    assert_eq!(query::random_visible_enemy(&world, &mut rng), None);

    let visible = spawn_at(&mut world, BAT, Vec2::new(1.0, 1.0));
    for _ in 0..8 {
        assert_eq!(query::random_visible_enemy(&world, &mut rng), Some(visible));
    }
}

#[test]
fn reposition_moves_live_enemies_only() {
    let Harness { mut world, .. } = harness(RegistryConfig::default(), true);
    let golem = spawn_at(&mut world, GOLEM, Vec2::ZERO);

    let events = run(
        &mut world,
        Command::RepositionEnemy {
            enemy: golem,
            position: Vec2::new(9.0, 9.0),
        },
    );
    assert_eq!(
        events,
        vec![Event::EnemyRepositioned {
            enemy: golem,
            from: Vec2::ZERO,
            to: Vec2::new(9.0, 9.0),
        }]
    );

    let _ = run(&mut world, Command::KillAll);
    let stale = run(
        &mut world,
        Command::RepositionEnemy {
            enemy: golem,
            position: Vec2::ONE,
        },
    );
    assert!(stale.is_empty());
}

#[test]
fn tick_and_bossfight_flags_are_reported() {
    let Harness { mut world, .. } = harness(RegistryConfig::default(), true);
    let tick = run(
        &mut world,
        Command::Tick {
            dt: std::time::Duration::from_millis(16),
        },
    );
    assert!(matches!(tick.as_slice(), [Event::TimeAdvanced { tick: 1, .. }]));

    let enabled = run(&mut world, Command::SetBossfight { active: true });
    assert_eq!(enabled, vec![Event::BossfightChanged { active: true }]);
    assert!(query::bossfight_active(&world));
    assert!(run(&mut world, Command::SetBossfight { active: true }).is_empty());
}
