#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Tick-driven wave scheduler.
//!
//! At most one wave runs at a time. Starting a wave replaces whatever task
//! was in flight, so a cancelled wave can never emit again.

use std::{collections::BTreeMap, time::Duration};

use horde_core::{Command, Event, StageWave, SubscriptionTag, WaveDescriptor};
use tracing::debug;

/// Remaining emissions of the wave currently in flight.
#[derive(Clone, Debug, PartialEq)]
pub struct WaveTask {
    descriptor: WaveDescriptor,
    issued: u32,
    accumulator: Duration,
}

impl WaveTask {
    /// Descriptor the task was started from.
    #[must_use]
    pub fn descriptor(&self) -> &WaveDescriptor {
        &self.descriptor
    }

    /// Number of spawn requests issued so far.
    #[must_use]
    pub fn issued(&self) -> u32 {
        self.issued
    }

    /// Number of spawn requests still to be issued.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.descriptor.count.saturating_sub(self.issued)
    }

    fn emit(&mut self, subscription: Option<SubscriptionTag>, out: &mut Vec<Command>) {
        out.push(Command::SpawnEnemy {
            kind: self.descriptor.kind,
            site: self.descriptor.site(),
            subscription,
        });
        self.issued += 1;
    }

    // Zero intervals emit once per tick instead of draining the whole wave.
    fn advance(
        &mut self,
        dt: Duration,
        subscription: Option<SubscriptionTag>,
        out: &mut Vec<Command>,
    ) {
        let interval = self.descriptor.interval;
        if interval.is_zero() {
            if self.remaining() > 0 {
                self.emit(subscription, out);
            }
            return;
        }

        self.accumulator = self.accumulator.saturating_add(dt);
        while self.remaining() > 0 && self.accumulator >= interval {
            self.accumulator -= interval;
            self.emit(subscription, out);
        }
    }
}

/// Pure system that turns wave descriptors into timed spawn commands.
#[derive(Clone, Debug, Default)]
pub struct WaveScheduler {
    task: Option<WaveTask>,
    subscription: Option<SubscriptionTag>,
}

impl WaveScheduler {
    /// Creates an idle scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tags every spawn request so deaths of wave enemies can be told apart.
    #[must_use]
    pub fn with_subscription(mut self, tag: SubscriptionTag) -> Self {
        self.subscription = Some(tag);
        self
    }

    /// Starts `descriptor`, cancelling any wave still in flight.
    ///
    /// The first spawn request is emitted immediately.
    pub fn start_wave(&mut self, descriptor: WaveDescriptor, out: &mut Vec<Command>) {
        if let Some(previous) = self.task.take() {
            debug!(
                kind = previous.descriptor.kind.get(),
                remaining = previous.remaining(),
                "wave replaced before completion"
            );
        }

        let mut task = WaveTask {
            descriptor,
            issued: 0,
            accumulator: Duration::ZERO,
        };
        if task.remaining() == 0 {
            debug!(kind = descriptor.kind.get(), "ignored empty wave");
            return;
        }

        task.emit(self.subscription, out);
        debug!(
            kind = descriptor.kind.get(),
            count = descriptor.count,
            interval = ?descriptor.interval,
            "wave started"
        );
        if task.remaining() > 0 {
            self.task = Some(task);
        }
    }

    /// Cancels the wave in flight, if any. Spawned enemies are untouched.
    pub fn stop_spawning(&mut self) {
        if let Some(task) = self.task.take() {
            debug!(
                kind = task.descriptor.kind.get(),
                remaining = task.remaining(),
                "wave stopped"
            );
        }
    }

    /// Reports whether a wave is still emitting.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.task.is_some()
    }

    /// Wave currently in flight.
    #[must_use]
    pub fn active_wave(&self) -> Option<&WaveTask> {
        self.task.as_ref()
    }

    /// Consumes events and emits the spawn requests that came due.
    pub fn handle(&mut self, events: &[Event], out: &mut Vec<Command>) {
        for event in events {
            let Event::TimeAdvanced { dt, .. } = event else {
                continue;
            };
            let Some(task) = self.task.as_mut() else {
                return;
            };

            task.advance(*dt, self.subscription, out);
            if task.remaining() == 0 {
                debug!(kind = task.descriptor.kind.get(), "wave finished");
                self.task = None;
            }
        }
    }
}

/// Peak count per kind across `waves`, in ascending kind order.
///
/// The result feeds [`Command::PrepareStage`] so pools match the timeline.
#[must_use]
pub fn stage_plan(waves: &[WaveDescriptor]) -> Vec<StageWave> {
    let mut peaks: BTreeMap<_, u32> = BTreeMap::new();
    for wave in waves {
        let peak = peaks.entry(wave.kind).or_insert(0);
        *peak = (*peak).max(wave.count);
    }
    peaks
        .into_iter()
        .map(|(kind, count)| StageWave::new(kind, count))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use horde_core::{EnemyKind, SpawnShape};

    const SKELETON: EnemyKind = EnemyKind::new(3);

    fn tick(millis: u64) -> Event {
        Event::TimeAdvanced {
            dt: Duration::from_millis(millis),
            tick: 0,
        }
    }

    #[test]
    fn accumulator_carries_over_between_ticks() {
        let mut scheduler = WaveScheduler::new();
        let mut out = Vec::new();
        scheduler.start_wave(
            WaveDescriptor::new(SKELETON, 3, Duration::from_millis(300), SpawnShape::Circular),
            &mut out,
        );

        scheduler.handle(&[tick(200)], &mut out);
        assert_eq!(out.len(), 1);
        scheduler.handle(&[tick(200)], &mut out);
        assert_eq!(out.len(), 2);
        assert_eq!(scheduler.active_wave().map(WaveTask::remaining), Some(1));
    }

    #[test]
    fn empty_wave_never_becomes_active() {
        let mut scheduler = WaveScheduler::new();
        let mut out = Vec::new();
        scheduler.start_wave(
            WaveDescriptor::new(SKELETON, 0, Duration::from_secs(1), SpawnShape::Circular),
            &mut out,
        );
        assert!(out.is_empty());
        assert!(!scheduler.is_active());
    }

    #[test]
    fn plan_keeps_peak_per_kind() {
        let other = EnemyKind::new(1);
        let plan = stage_plan(&[
            WaveDescriptor::new(SKELETON, 4, Duration::ZERO, SpawnShape::Circular),
            WaveDescriptor::new(other, 2, Duration::ZERO, SpawnShape::Circular),
            WaveDescriptor::new(SKELETON, 9, Duration::ZERO, SpawnShape::Circular),
        ]);
        assert_eq!(
            plan,
            vec![StageWave::new(other, 2), StageWave::new(SKELETON, 9)]
        );
    }
}
