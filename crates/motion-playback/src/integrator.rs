//! Acceleration -> velocity -> position integration strategies.
//!
//! Two policies exist, chosen by what the recording's acceleration field
//! means. Raw accelerometer data still contains gravity and goes through a
//! high-pass filter; gravity-compensated data only needs a noise deadband.
//! Neither bounds position or velocity: without an absolute reference the
//! integrated trajectory drifts, and per-tick damping is the only brake.

use crate::types::AccelSemantics;
use glam::{DQuat, DVec3};
use motion_config::{AppConfig, PolicyLimits, PolicySelection, TuningParameters};

/// Scaled acceleration with every axis below this magnitude is treated as zero.
pub const DEADBAND_THRESHOLD: f64 = 0.4;

/// Integrated kinematic state in the world frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionState {
    pub position: DVec3,
    pub velocity: DVec3,
}

impl MotionState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// One integration policy.
pub trait MotionIntegrator: Send {
    fn name(&self) -> &'static str;

    /// Advance `state` by one accepted sample.
    ///
    /// `acceleration` is the sensor-frame reading in device units,
    /// `orientation` the current body -> world rotation. Returns the
    /// effective world-frame acceleration that drove this step.
    fn integrate(
        &mut self,
        acceleration: DVec3,
        orientation: DQuat,
        dt: f64,
        tuning: &TuningParameters,
        state: &mut MotionState,
    ) -> DVec3;

    /// Forget all filter history.
    fn reset(&mut self);
}

/// Gravity rejection by subtracting a running low-pass estimate.
///
/// Velocity uses the trapezoidal rule over consecutive high-passed
/// accelerations; position is forward Euler on the damped velocity.
#[derive(Debug, Clone, Default)]
pub struct HighPassIntegrator {
    /// Low-pass accumulator. `None` until the first step seeds it.
    low_pass: Option<DVec3>,
    /// High-passed acceleration of the previous step.
    last_high_pass: DVec3,
}

impl HighPassIntegrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn low_pass(&self) -> Option<DVec3> {
        self.low_pass
    }
}

impl MotionIntegrator for HighPassIntegrator {
    fn name(&self) -> &'static str {
        "high-pass"
    }

    fn integrate(
        &mut self,
        acceleration: DVec3,
        orientation: DQuat,
        dt: f64,
        tuning: &TuningParameters,
        state: &mut MotionState,
    ) -> DVec3 {
        let raw = orientation * (acceleration * tuning.accel_scale);

        // Seeded with the first reading.
        let alpha = tuning.hp_alpha;
        let low_pass = self.low_pass.get_or_insert(raw);
        *low_pass = *low_pass * alpha + raw * (1.0 - alpha);
        let high_pass = raw - *low_pass;

        state.velocity += (self.last_high_pass + high_pass) * 0.5 * dt;
        state.velocity *= tuning.damping;
        state.position += state.velocity * dt;

        self.last_high_pass = high_pass;
        high_pass
    }

    fn reset(&mut self) {
        self.low_pass = None;
        self.last_high_pass = DVec3::ZERO;
    }
}

/// Forward Euler on acceleration that already has gravity removed.
///
/// Readings inside the deadband leave the state untouched for that tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeadbandIntegrator;

impl DeadbandIntegrator {
    pub fn new() -> Self {
        Self
    }
}

impl MotionIntegrator for DeadbandIntegrator {
    fn name(&self) -> &'static str {
        "deadband"
    }

    fn integrate(
        &mut self,
        acceleration: DVec3,
        orientation: DQuat,
        dt: f64,
        tuning: &TuningParameters,
        state: &mut MotionState,
    ) -> DVec3 {
        let scaled = acceleration * tuning.accel_scale;
        if scaled.abs().cmplt(DVec3::splat(DEADBAND_THRESHOLD)).all() {
            return DVec3::ZERO;
        }

        let world = orientation * scaled;
        state.velocity += world * dt;
        state.velocity *= tuning.damping;
        state.position += state.velocity * dt;
        world
    }

    fn reset(&mut self) {}
}

/// A resolved integration policy together with its limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IntegrationPolicy {
    HighPass(PolicyLimits),
    Deadband(PolicyLimits),
}

impl IntegrationPolicy {
    /// Pick the policy for a recording.
    ///
    /// `Auto` follows the recording: raw accelerometer data needs gravity
    /// rejection, compensated data only the deadband.
    pub fn resolve(
        selection: PolicySelection,
        semantics: AccelSemantics,
        config: &AppConfig,
    ) -> Self {
        match (selection, semantics) {
            (PolicySelection::HighPass, _) | (PolicySelection::Auto, AccelSemantics::Raw) => {
                Self::HighPass(config.high_pass)
            }
            (PolicySelection::Deadband, _)
            | (PolicySelection::Auto, AccelSemantics::GravityCompensated) => {
                Self::Deadband(config.deadband)
            }
        }
    }

    pub fn limits(&self) -> PolicyLimits {
        match self {
            Self::HighPass(limits) | Self::Deadband(limits) => *limits,
        }
    }

    /// Which acceleration field this policy reads from a recording whose
    /// samples carry `recorded` semantics.
    ///
    /// High-pass follows the recording, so a forced high-pass run over
    /// compensated data reads `acceleration`. Deadband only ever reads
    /// `acceleration`.
    pub fn source_for(&self, recorded: AccelSemantics) -> AccelSemantics {
        match self {
            Self::HighPass(_) => recorded,
            Self::Deadband(_) => AccelSemantics::GravityCompensated,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::HighPass(_) => "high-pass",
            Self::Deadband(_) => "deadband",
        }
    }

    pub fn build(&self) -> Box<dyn MotionIntegrator> {
        match self {
            Self::HighPass(_) => Box::new(HighPassIntegrator::new()),
            Self::Deadband(_) => Box::new(DeadbandIntegrator::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn tuning(damping: f64) -> TuningParameters {
        TuningParameters {
            accel_scale: 1.0,
            damping,
            hp_alpha: 0.9,
            ..Default::default()
        }
    }

    #[test]
    fn high_pass_constant_input_is_fully_rejected() {
        let mut integrator = HighPassIntegrator::new();
        let mut state = MotionState::default();
        let t = tuning(1.0);

        for _ in 0..3 {
            let hp = integrator.integrate(DVec3::X, DQuat::IDENTITY, 0.01, &t, &mut state);
            assert_abs_diff_eq!(hp.length(), 0.0, epsilon = 1e-15);
        }
        assert_eq!(integrator.low_pass(), Some(DVec3::X));
        assert_abs_diff_eq!(state.velocity.length(), 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!(state.position.length(), 0.0, epsilon = 1e-15);
    }

    #[test]
    fn high_pass_step_input_matches_golden_values() {
        let mut integrator = HighPassIntegrator::new();
        let mut state = MotionState::default();
        let t = tuning(1.0);
        let dt = 0.01;

        let inputs = [0.0, 1.0, 1.0, 1.0];
        // (high-pass, velocity, position) on x after each step.
        let expected = [
            (0.0, 0.0, 0.0),
            (0.9, 0.0045, 0.000045),
            (0.81, 0.01305, 0.0001755),
            (0.729, 0.020745, 0.00038295),
        ];

        for (input, (hp_x, v_x, p_x)) in inputs.iter().zip(expected) {
            let hp = integrator.integrate(
                DVec3::new(*input, 0.0, 0.0),
                DQuat::IDENTITY,
                dt,
                &t,
                &mut state,
            );
            assert_abs_diff_eq!(hp.x, hp_x, epsilon = 1e-12);
            assert_abs_diff_eq!(state.velocity.x, v_x, epsilon = 1e-12);
            assert_abs_diff_eq!(state.position.x, p_x, epsilon = 1e-12);
            assert_eq!(state.velocity.y, 0.0);
            assert_eq!(state.position.z, 0.0);
        }
    }

    #[test]
    fn high_pass_rotates_before_filtering() {
        let mut integrator = HighPassIntegrator::new();
        let mut state = MotionState::default();
        let t = tuning(1.0);
        let quarter_turn = DQuat::from_rotation_z(std::f64::consts::FRAC_PI_2);

        integrator.integrate(DVec3::ZERO, quarter_turn, 0.01, &t, &mut state);
        let hp = integrator.integrate(DVec3::X, quarter_turn, 0.01, &t, &mut state);

        // Sensor x ends up along world y.
        assert_abs_diff_eq!(hp.x, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(hp.y, 0.9, epsilon = 1e-12);
        assert!(state.velocity.y > 0.0);
    }

    #[test]
    fn high_pass_reset_reseeds_the_filter() {
        let mut integrator = HighPassIntegrator::new();
        let mut state = MotionState::default();
        let t = tuning(1.0);

        integrator.integrate(DVec3::ZERO, DQuat::IDENTITY, 0.01, &t, &mut state);
        integrator.integrate(DVec3::X, DQuat::IDENTITY, 0.01, &t, &mut state);
        integrator.reset();
        assert_eq!(integrator.low_pass(), None);

        state.reset();
        let hp = integrator.integrate(DVec3::X, DQuat::IDENTITY, 0.01, &t, &mut state);
        assert_eq!(hp, DVec3::ZERO);
        assert_eq!(state, MotionState::default());
    }

    #[test]
    fn deadband_ignores_small_readings() {
        let mut integrator = DeadbandIntegrator::new();
        let mut state = MotionState::default();
        let t = tuning(0.9995);

        for reading in [
            DVec3::new(0.39, -0.39, 0.0),
            DVec3::new(-0.1, 0.2, 0.3999),
            DVec3::ZERO,
        ] {
            let eff = integrator.integrate(reading, DQuat::IDENTITY, 0.02, &t, &mut state);
            assert_eq!(eff, DVec3::ZERO);
        }
        assert_eq!(state, MotionState::default());
    }

    #[test]
    fn deadband_applies_after_scaling() {
        let mut integrator = DeadbandIntegrator::new();
        let mut state = MotionState::default();
        let mut t = tuning(1.0);
        t.accel_scale = 2.0;

        let reading = DVec3::new(0.3, 0.0, 0.0);
        let eff = integrator.integrate(reading, DQuat::IDENTITY, 0.1, &t, &mut state);
        assert_abs_diff_eq!(eff.x, 0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(state.velocity.x, 0.06, epsilon = 1e-12);
        assert_abs_diff_eq!(state.position.x, 0.006, epsilon = 1e-12);
    }

    #[test]
    fn deadband_uses_forward_euler_with_damping() {
        let mut integrator = DeadbandIntegrator::new();
        let mut state = MotionState::default();
        let t = tuning(0.5);

        integrator.integrate(DVec3::new(0.0, 0.0, 2.0), DQuat::IDENTITY, 0.5, &t, &mut state);
        // v = (0 + 2 * 0.5) * 0.5, p = v * 0.5
        assert_abs_diff_eq!(state.velocity.z, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(state.position.z, 0.25, epsilon = 1e-12);
    }

    #[test]
    fn damping_drains_velocity_without_drive() {
        let mut integrator = DeadbandIntegrator::new();
        let t = tuning(0.99);
        let mut state = MotionState {
            position: DVec3::ZERO,
            velocity: DVec3::new(1.0, -2.0, 0.5),
        };

        // Kick once so the deadband path is not the one under test.
        integrator.integrate(DVec3::new(1.0, 0.0, 0.0), DQuat::IDENTITY, 0.01, &t, &mut state);

        let mut hp = HighPassIntegrator::new();
        let mut last_speed = state.velocity.length();
        let mut last_position = state.position;
        let mut last_step = f64::INFINITY;
        for _ in 0..5_000 {
            hp.integrate(DVec3::ZERO, DQuat::IDENTITY, 0.01, &t, &mut state);
            let speed = state.velocity.length();
            assert!(speed <= last_speed);
            let step = (state.position - last_position).length();
            assert!(step <= last_step);
            last_speed = speed;
            last_step = step;
            last_position = state.position;
        }
        assert!(last_step < 1e-12);
    }

    #[test]
    fn policy_resolution_follows_semantics() {
        let config = AppConfig::default();

        let raw = IntegrationPolicy::resolve(PolicySelection::Auto, AccelSemantics::Raw, &config);
        assert_eq!(raw, IntegrationPolicy::HighPass(PolicyLimits::high_pass()));
        assert_eq!(raw.source_for(AccelSemantics::Raw), AccelSemantics::Raw);

        let compensated = IntegrationPolicy::resolve(
            PolicySelection::Auto,
            AccelSemantics::GravityCompensated,
            &config,
        );
        assert_eq!(compensated, IntegrationPolicy::Deadband(PolicyLimits::deadband()));
        assert_eq!(compensated.limits().max_dt, 0.5);

        let forced = IntegrationPolicy::resolve(
            PolicySelection::HighPass,
            AccelSemantics::GravityCompensated,
            &config,
        );
        assert_eq!(forced.name(), "high-pass");
        assert_eq!(forced.build().name(), "high-pass");
        assert_eq!(
            forced.source_for(AccelSemantics::GravityCompensated),
            AccelSemantics::GravityCompensated
        );

        let deadband =
            IntegrationPolicy::resolve(PolicySelection::Deadband, AccelSemantics::Raw, &config);
        assert_eq!(
            deadband.source_for(AccelSemantics::Raw),
            AccelSemantics::GravityCompensated
        );
    }
}
