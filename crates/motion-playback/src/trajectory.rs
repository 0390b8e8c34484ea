use crate::types::dvec3_serde;
use glam::DVec3;
use motion_config::TuningParameters;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Magnitudes at or below this hide the acceleration indicator.
const INDICATOR_MIN_MAGNITUDE: f64 = 0.001;

/// Bounded history of recent positions, oldest first.
#[derive(Debug, Clone)]
pub struct Trail {
    points: VecDeque<DVec3>,
    capacity: usize,
}

impl Trail {
    pub fn new(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, point: DVec3) {
        if self.capacity == 0 {
            return;
        }
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = DVec3> + '_ {
        self.points.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<DVec3> {
        self.points().collect()
    }
}

/// Directional indicator for the effective acceleration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccelIndicator {
    /// Unit direction in the world frame.
    #[serde(with = "dvec3_serde")]
    pub direction: DVec3,
    /// Display length, `min(magnitude * arrow_scale, arrow_max)`.
    pub length: f64,
}

impl AccelIndicator {
    /// `None` when the acceleration is too small to show.
    pub fn from_acceleration(acceleration: DVec3, tuning: &TuningParameters) -> Option<Self> {
        let magnitude = acceleration.length();
        if magnitude <= INDICATOR_MIN_MAGNITUDE {
            return None;
        }
        Some(Self {
            direction: acceleration / magnitude,
            length: (magnitude * tuning.arrow_scale).min(tuning.arrow_max),
        })
    }
}
