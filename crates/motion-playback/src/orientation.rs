use crate::types::RotationRate;
use glam::DQuat;

/// Dead-reckoned device orientation (body -> world).
///
/// Integrates rotation-rate readings into a running unit quaternion. There is
/// no gravity or magnetometer correction, so heading and tilt drift freely.
#[derive(Debug, Clone)]
pub struct OrientationTracker {
    quaternion: DQuat,
    /// Angular speeds (rad/s) at or below this are treated as sensor noise.
    epsilon: f64,
}

impl OrientationTracker {
    pub fn new(epsilon: f64) -> Self {
        Self {
            quaternion: DQuat::IDENTITY,
            epsilon,
        }
    }

    /// Current orientation.
    pub fn quaternion(&self) -> DQuat {
        self.quaternion
    }

    /// Rotate by `rate` held for `dt` seconds.
    pub fn update(&mut self, rate: Option<&RotationRate>, dt: f64) {
        let Some(rate) = rate else {
            return;
        };

        let omega = rate.angular_velocity();
        let mag = omega.length();
        if mag <= self.epsilon {
            return;
        }

        let delta = DQuat::from_axis_angle(omega / mag, mag * dt);
        // Renormalize every step; thousands of products otherwise creep off unit length.
        self.quaternion = (self.quaternion * delta).normalize();
    }

    /// Back to identity.
    pub fn reset(&mut self) {
        self.quaternion = DQuat::IDENTITY;
    }
}
