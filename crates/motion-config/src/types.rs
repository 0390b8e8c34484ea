use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Scheduler timing.
    pub playback: PlaybackConfig,
    /// Tuning values applied at the start of every session.
    pub tuning: TuningParameters,
    /// Which integration policy to use for loaded recordings.
    pub policy: PolicySelection,
    /// Limits for the gravity-rejecting (high-pass) policy.
    pub high_pass: PolicyLimits,
    /// Limits for the pre-filtered (deadband) policy.
    pub deadband: PolicyLimits,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            playback: PlaybackConfig::default(),
            tuning: TuningParameters::default(),
            policy: PolicySelection::Auto,
            high_pass: PolicyLimits::high_pass(),
            deadband: PolicyLimits::deadband(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Default playback speed multiplier (1.0 = recorded cadence).
    pub speed: f64,
    /// Delay before the first tick after `start`, in milliseconds.
    pub startup_delay_ms: f64,
    /// Tick spacing used when a sample has no usable timestamp (one display refresh).
    pub fallback_tick_ms: f64,
    /// Number of positions kept in the trajectory trail.
    pub trail_length: usize,
    /// Emit a debug heartbeat every N ticks.
    pub status_every: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            startup_delay_ms: 100.0,
            fallback_tick_ms: 16.0,
            trail_length: 500,
            status_every: 100,
        }
    }
}

/// User-adjustable scalars, read fresh on every tick.
///
/// None of these are clamped. Out-of-range values (e.g. `damping >= 1.0`)
/// propagate straight into the integration math.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningParameters {
    /// Multiplier applied to every raw acceleration reading. Typical range 0.1-5.0.
    pub accel_scale: f64,
    /// Per-tick velocity damping factor. Valid range [0.9, 1.0).
    pub damping: f64,
    /// Low-pass coefficient of the high-pass filter. Valid range (0.5, 0.99).
    pub hp_alpha: f64,
    /// Acceleration indicator length per unit of acceleration.
    pub arrow_scale: f64,
    /// Maximum acceleration indicator length.
    pub arrow_max: f64,
}

impl Default for TuningParameters {
    fn default() -> Self {
        Self {
            accel_scale: 1.0,
            damping: 0.9995,
            hp_alpha: 0.9,
            arrow_scale: 20.0,
            arrow_max: 4.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicySelection {
    /// Pick from the acceleration fields the recording carries.
    #[default]
    Auto,
    /// Gravity rejection via high-pass filter on raw acceleration.
    HighPass,
    /// Deadband on acceleration that already has gravity removed.
    Deadband,
}

/// Timing and noise limits of one integration policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolicyLimits {
    /// Samples with a larger step (seconds) are skipped.
    pub max_dt: f64,
    /// Rotation rates at or below this magnitude (rad/s) are ignored.
    pub rotation_epsilon: f64,
}

impl PolicyLimits {
    pub fn high_pass() -> Self {
        Self {
            max_dt: 0.1,
            rotation_epsilon: 1e-3,
        }
    }

    /// Looser gap tolerance, finer rotation threshold.
    pub fn deadband() -> Self {
        Self {
            max_dt: 0.5,
            rotation_epsilon: 1e-4,
        }
    }
}

impl Default for PolicyLimits {
    fn default() -> Self {
        Self::high_pass()
    }
}
