//! Per-tick processing of one recording.
//!
//! The engine is fully synchronous: one call to [`PlaybackEngine::tick`]
//! consumes exactly one sample. Timing between ticks belongs to the
//! scheduler.

use crate::integrator::{IntegrationPolicy, MotionIntegrator, MotionState};
use crate::orientation::OrientationTracker;
use crate::recording::Recording;
use crate::trajectory::Trail;
use crate::types::{dquat_serde, dvec3_serde, usable, AccelSemantics};
use glam::{DQuat, DVec3};
use motion_config::{PlaybackConfig, PolicyLimits, TuningParameters};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Why a sample was left out of integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// No finite `relativeTime`.
    MissingTimestamp,
    /// First sample with no finite `interval` to bootstrap from.
    MissingInterval,
    /// Step is zero, negative, or not a number.
    NonPositiveDt,
    /// Step exceeds the policy's `max_dt`.
    ExcessiveDt,
    /// No acceleration field the policy can use.
    MissingAcceleration,
}

/// Result of processing one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleOutcome {
    Accepted { dt: f64 },
    Rejected(RejectReason),
}

/// Result of one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tick {
    /// A sample was consumed; schedule the next tick after `next_delay`.
    Processed {
        index: usize,
        outcome: SampleOutcome,
        next_delay: Duration,
    },
    /// Every sample has been consumed.
    Complete,
}

/// Observable state after the most recent tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Number of samples consumed so far (index of the next sample).
    pub index: usize,
    /// Total samples in the recording.
    pub total: usize,
    #[serde(with = "dvec3_serde")]
    pub position: DVec3,
    #[serde(with = "dvec3_serde")]
    pub velocity: DVec3,
    #[serde(with = "dquat_serde")]
    pub orientation: DQuat,
    /// Acceleration that drove the last accepted step, world frame.
    #[serde(with = "dvec3_serde")]
    pub effective_acceleration: DVec3,
    pub acceleration_magnitude: f64,
    /// Recorded time of the last accepted sample, in seconds.
    pub elapsed_secs: f64,
    pub accepted: usize,
    pub rejected: usize,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            index: 0,
            total: 0,
            position: DVec3::ZERO,
            velocity: DVec3::ZERO,
            orientation: DQuat::IDENTITY,
            effective_acceleration: DVec3::ZERO,
            acceleration_magnitude: 0.0,
            elapsed_secs: 0.0,
            accepted: 0,
            rejected: 0,
        }
    }
}

impl Snapshot {
    /// Samples consumed per second of recorded time.
    pub fn rate(&self) -> f64 {
        if self.index == 0 {
            return 0.0;
        }
        let secs = if self.elapsed_secs > 0.0 {
            self.elapsed_secs
        } else {
            1.0
        };
        self.index as f64 / secs
    }
}

/// Replays one recording sample by sample.
pub struct PlaybackEngine {
    recording: Arc<Recording>,
    policy: IntegrationPolicy,
    limits: PolicyLimits,
    semantics: AccelSemantics,
    integrator: Box<dyn MotionIntegrator>,
    orientation: OrientationTracker,
    motion: MotionState,
    /// Recorded time (s) of the previous sample, `None` before the first one.
    last_sample_time: Option<f64>,
    index: usize,
    effective_acceleration: DVec3,
    elapsed_secs: f64,
    accepted: usize,
    rejected: usize,
    trail: Trail,
    speed: f64,
    fallback_tick_ms: f64,
}

impl PlaybackEngine {
    pub fn new(
        recording: Arc<Recording>,
        policy: IntegrationPolicy,
        speed: f64,
        config: &PlaybackConfig,
    ) -> Self {
        let limits = policy.limits();
        let semantics = policy.source_for(recording.semantics());
        Self {
            recording,
            policy,
            limits,
            semantics,
            integrator: policy.build(),
            orientation: OrientationTracker::new(limits.rotation_epsilon),
            motion: MotionState::default(),
            last_sample_time: None,
            index: 0,
            effective_acceleration: DVec3::ZERO,
            elapsed_secs: 0.0,
            accepted: 0,
            rejected: 0,
            trail: Trail::new(config.trail_length),
            speed,
            fallback_tick_ms: config.fallback_tick_ms,
        }
    }

    pub fn policy(&self) -> IntegrationPolicy {
        self.policy
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_finished(&self) -> bool {
        self.index >= self.recording.len()
    }

    pub fn motion(&self) -> MotionState {
        self.motion
    }

    pub fn orientation(&self) -> DQuat {
        self.orientation.quaternion()
    }

    pub fn last_sample_time(&self) -> Option<f64> {
        self.last_sample_time
    }

    pub fn trail(&self) -> &Trail {
        &self.trail
    }

    /// Rewind to the first sample with identity orientation and zero motion.
    pub fn reset(&mut self) {
        self.integrator.reset();
        self.orientation.reset();
        self.motion.reset();
        self.last_sample_time = None;
        self.index = 0;
        self.effective_acceleration = DVec3::ZERO;
        self.elapsed_secs = 0.0;
        self.accepted = 0;
        self.rejected = 0;
        self.trail.clear();
    }

    /// Consume the next sample.
    pub fn tick(&mut self, tuning: &TuningParameters) -> Tick {
        if self.is_finished() {
            return Tick::Complete;
        }

        let index = self.index;
        let outcome = self.process(index, tuning);
        match outcome {
            SampleOutcome::Accepted { .. } => self.accepted += 1,
            SampleOutcome::Rejected(reason) => {
                self.rejected += 1;
                tracing::trace!(index, ?reason, "Skipping sample");
            }
        }
        self.index += 1;

        Tick::Processed {
            index,
            outcome,
            next_delay: self.next_delay(),
        }
    }

    fn process(&mut self, index: usize, tuning: &TuningParameters) -> SampleOutcome {
        let sample = self.recording.samples()[index];

        let Some(current) = sample.time_secs() else {
            return SampleOutcome::Rejected(RejectReason::MissingTimestamp);
        };

        // Rejected steps still advance the time base.
        let previous = self.last_sample_time.replace(current);
        let dt = match previous {
            Some(last) => current - last,
            None => match sample.interval_secs() {
                Some(interval) => interval,
                None => return SampleOutcome::Rejected(RejectReason::MissingInterval),
            },
        };

        if !dt.is_finite() || dt <= 0.0 {
            return SampleOutcome::Rejected(RejectReason::NonPositiveDt);
        }
        if dt > self.limits.max_dt {
            return SampleOutcome::Rejected(RejectReason::ExcessiveDt);
        }
        let Some(acceleration) = sample.acceleration_for(self.semantics) else {
            return SampleOutcome::Rejected(RejectReason::MissingAcceleration);
        };

        self.orientation.update(sample.rotation_rate.as_ref(), dt);
        self.effective_acceleration = self.integrator.integrate(
            acceleration,
            self.orientation.quaternion(),
            dt,
            tuning,
            &mut self.motion,
        );
        self.elapsed_secs = current;
        self.trail.push(self.motion.position);

        SampleOutcome::Accepted { dt }
    }

    /// Wall-clock wait before the next tick.
    ///
    /// The recorded gap between the upcoming sample and the one just
    /// consumed, divided by the speed multiplier and floored at 1 ms. Falls
    /// back to one display refresh when either timestamp is unusable.
    pub fn next_delay(&self) -> Duration {
        let samples = self.recording.samples();
        let gap_ms = match (self.index.checked_sub(1), samples.get(self.index)) {
            (Some(prev), Some(next)) => usable(next.relative_time_ms)
                .zip(usable(samples[prev].relative_time_ms))
                .map(|(next, prev)| next - prev)
                .unwrap_or(self.fallback_tick_ms),
            _ => self.fallback_tick_ms,
        };
        let ms = (gap_ms / self.speed).max(1.0);
        Duration::from_micros((ms * 1000.0).round() as u64)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            index: self.index,
            total: self.recording.len(),
            position: self.motion.position,
            velocity: self.motion.velocity,
            orientation: self.orientation.quaternion(),
            effective_acceleration: self.effective_acceleration,
            acceleration_magnitude: self.effective_acceleration.length(),
            elapsed_secs: self.elapsed_secs,
            accepted: self.accepted,
            rejected: self.rejected,
        }
    }
}
