#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Headless driver for the Horde enemy registry.
//!
//! A [`Scenario`] describes the stage: enemy archetypes, the wave and boss
//! timeline, and the reference collaborators standing in for a game engine.
//! [`Simulation`] replays it tick by tick and summarizes the outcome.

mod collaborators;
mod scenario;
mod simulation;

pub use collaborators::{CooldownDrops, DropTally, FollowCamera, MemoryLedger, RectField};
pub use scenario::{
    CameraSettings, DropSettings, FieldSettings, Obstacle, PlayerSettings, Scenario,
    ScenarioError, ScheduledBoss, ScheduledPulse, ScheduledWave, SimulationSettings,
    BUILTIN_SCENARIO,
};
pub use simulation::{Report, Simulation};
