#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Spawn placement with guaranteed success.
//!
//! A naive sample may land inside fences or obstacles, so placement walks
//! three tiers of increasingly permissive strategies:
//!
//! 1. sample the requested [`SpawnShape`] a bounded number of times and keep
//!    the first candidate the field accepts;
//! 2. probe points on the segment between the last candidate and the player;
//! 3. take a random point on the field border, which is always legal.

use glam::Vec2;
use horde_core::{unit_direction, FieldValidator, SpawnShape, Viewport};
use rand::RngCore;
use serde::Deserialize;
use tracing::trace;

/// Tunables of the placement fallbacks.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Number of shape samples tried before interpolating.
    pub sample_attempts: u32,
    /// Number of segments the candidate-to-player line is divided into.
    pub interpolation_steps: u32,
    /// Ring radius of circular spawns as a multiple of the viewport diagonal.
    pub ring_scale: f32,
    /// Distance outside the viewport edge used by viewport spawns.
    pub viewport_padding: f32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            sample_attempts: 10,
            interpolation_steps: 10,
            ring_scale: 1.05,
            viewport_padding: 0.5,
        }
    }
}

/// Fallback tier that produced a position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlacementTier {
    /// A shape sample was accepted as-is.
    Sampled,
    /// A point between the last sample and the player was accepted.
    Interpolated,
    /// The field border was used.
    Border,
}

/// Legal spawn position together with the tier that found it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    /// Position the enemy should appear at.
    pub position: Vec2,
    /// Tier that produced the position.
    pub tier: PlacementTier,
}

/// Stateless placement strategy.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlacementStrategy {
    config: PlacementConfig,
}

impl PlacementStrategy {
    /// Creates a strategy from the provided configuration.
    #[must_use]
    pub const fn new(config: PlacementConfig) -> Self {
        Self { config }
    }

    /// Configuration the strategy runs with.
    #[must_use]
    pub const fn config(&self) -> &PlacementConfig {
        &self.config
    }

    /// Draws a single candidate for `shape` without validating it.
    pub fn sample(
        &self,
        shape: SpawnShape,
        player: Vec2,
        padding: f32,
        viewport: &dyn Viewport,
        rng: &mut dyn RngCore,
    ) -> Vec2 {
        match shape {
            SpawnShape::Circular => {
                player + unit_direction(rng) * viewport.diagonal() * self.config.ring_scale
            }
            SpawnShape::OutsideViewport => viewport.random_point_outside(padding, rng),
        }
    }

    /// Finds a legal position for `shape` around `player`. Never fails.
    pub fn locate(
        &self,
        shape: SpawnShape,
        player: Vec2,
        field: &dyn FieldValidator,
        viewport: &dyn Viewport,
        rng: &mut dyn RngCore,
    ) -> Placement {
        let mut candidate = Vec2::ZERO;
        for _ in 0..self.config.sample_attempts {
            candidate = self.sample(shape, player, self.config.viewport_padding, viewport, rng);
            if field.validate(candidate, Vec2::ZERO, true) {
                return Placement {
                    position: candidate,
                    tier: PlacementTier::Sampled,
                };
            }
        }

        if let Some(position) = self.interpolate(candidate, player, field) {
            trace!(?position, "placement fell back to interpolation");
            return Placement {
                position,
                tier: PlacementTier::Interpolated,
            };
        }

        let position = field.random_border_position(rng);
        trace!(?position, "placement fell back to the field border");
        Placement {
            position,
            tier: PlacementTier::Border,
        }
    }

    // Probes t = 1 - j/steps for j in 1..steps, starting next to the player.
    fn interpolate(&self, candidate: Vec2, player: Vec2, field: &dyn FieldValidator) -> Option<Vec2> {
        let steps = self.config.interpolation_steps;
        (1..steps)
            .map(|step| {
                let t = 1.0 - step as f32 / steps as f32;
                candidate.lerp(player, t)
            })
            .find(|probe| field.validate(*probe, Vec2::ZERO, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Segment;

    impl FieldValidator for Segment {
        fn validate(&self, position: Vec2, _offset: Vec2, _consider_fence: bool) -> bool {
            position.x > 3.5 && position.x < 4.5
        }

        fn random_border_position(&self, _rng: &mut dyn RngCore) -> Vec2 {
            Vec2::new(-100.0, 0.0)
        }
    }

    #[test]
    fn interpolation_starts_next_to_the_player() {
        let strategy = PlacementStrategy::default();
        let probe = strategy
            .interpolate(Vec2::new(10.0, 0.0), Vec2::ZERO, &Segment)
            .expect("segment is reachable");
        assert!(probe.abs_diff_eq(Vec2::new(4.0, 0.0), 1e-4), "{probe:?}");
    }

    #[test]
    fn interpolation_never_probes_the_endpoints() {
        let strategy = PlacementStrategy::new(PlacementConfig {
            interpolation_steps: 2,
            ..PlacementConfig::default()
        });
        let probe = strategy.interpolate(Vec2::new(8.0, 0.0), Vec2::ZERO, &Segment);
        assert_eq!(probe, Some(Vec2::new(4.0, 0.0)));

        let single = PlacementStrategy::new(PlacementConfig {
            interpolation_steps: 1,
            ..PlacementConfig::default()
        });
        assert_eq!(single.interpolate(Vec2::new(4.0, 0.0), Vec2::ZERO, &Segment), None);
    }
}
