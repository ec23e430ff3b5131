#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Offscreen leash that keeps stragglers near the player.
//!
//! Enemies far behind the player are moved back in front of them, onto an arc
//! around the facing direction. This is a density heuristic: only a slice of
//! the roster is inspected per tick, so an enemy may stay out of range for a
//! few ticks before it is picked up.

use glam::Vec2;
use horde_core::{Command, EnemySnapshot, Event, PlayerPose};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use tracing::trace;

/// Roster size covered by one stride step.
const STRIDE_DIVISOR: usize = 20;
/// Upper bound of the stride, which also bounds the number of slices.
const MAX_STRIDE: usize = 100;
/// Half-angle of the arc in front of the player, in degrees.
const ARC_DEGREES: f32 = 45.0;

/// Tunables of the offscreen leash.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct LeashConfig {
    /// Master switch.
    pub enabled: bool,
    /// Scale applied to the squared viewport diagonal before comparing.
    pub diagonal_multiplier: f32,
    /// Width of the vision cone. Enemies with a facing dot below
    /// `cone_size - 1` are considered behind the player.
    pub cone_size: f32,
}

impl Default for LeashConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            diagonal_multiplier: 1.3,
            cone_size: 0.8,
        }
    }
}

/// Read-only inputs of a leash pass.
#[derive(Clone, Copy, Debug)]
pub struct LeashView<'a> {
    /// Live enemies in roster order.
    pub roster: &'a [EnemySnapshot],
    /// Current player pose.
    pub player: PlayerPose,
    /// Half width and half height of the viewport.
    pub half_extents: Vec2,
    /// Whether a bossfight is in progress.
    pub bossfight_active: bool,
}

/// Pure system emitting reposition commands for stragglers.
#[derive(Debug)]
pub struct OffscreenLeash {
    config: LeashConfig,
    rng: ChaCha8Rng,
}

impl OffscreenLeash {
    /// Creates a leash with its own deterministic random stream.
    #[must_use]
    pub fn new(config: LeashConfig, rng_seed: u64) -> Self {
        Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(rng_seed),
        }
    }

    /// Configuration the leash runs with.
    #[must_use]
    pub fn config(&self) -> &LeashConfig {
        &self.config
    }

    /// Runs one pass per `TimeAdvanced` event found in `events`.
    pub fn handle(&mut self, events: &[Event], view: LeashView<'_>, out: &mut Vec<Command>) {
        if !self.config.enabled || view.bossfight_active {
            return;
        }

        for event in events {
            if let Event::TimeAdvanced { tick, .. } = event {
                self.pass(*tick, &view, out);
            }
        }
    }

    fn pass(&mut self, tick: u64, view: &LeashView<'_>, out: &mut Vec<Command>) {
        let half = view.half_extents;
        let range_squared = half.length_squared() * self.config.diagonal_multiplier;
        let radius = range_squared.sqrt();
        let cone = self.config.cone_size - 1.0;
        let player = view.player;

        let step = stride(view.roster.len());
        let start = (tick % step as u64) as usize;
        for enemy in view.roster.iter().skip(start).step_by(step) {
            if enemy.leash_exempt() {
                continue;
            }

            let offset = enemy.position - player.position;
            if offset.length_squared() <= range_squared {
                continue;
            }
            if offset.normalize_or_zero().dot(player.facing) >= cone {
                continue;
            }

            let degrees: f32 = self.rng.gen_range(-ARC_DEGREES..ARC_DEGREES);
            let direction = Vec2::from_angle(degrees.to_radians()).rotate(player.facing);
            let position = player.position + direction * radius;
            trace!(slot = enemy.id.slot(), ?position, "leashed offscreen enemy");
            out.push(Command::RepositionEnemy {
                enemy: enemy.id,
                position,
            });
        }
    }
}

/// Step between roster entries inspected in the same tick.
#[must_use]
pub fn stride(live: usize) -> usize {
    (live / STRIDE_DIVISOR).clamp(1, MAX_STRIDE)
}
