use glam::DVec3;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Tag carried by the leading metadata record of a recording.
pub const METADATA_TYPE: &str = "metadata";

/// One record as written by the recording page, before any interpretation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Milliseconds since recording start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_time: Option<f64>,
    /// Nominal sample spacing in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<f64>,
    /// Acceleration with gravity already removed by the device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceleration: Option<RawVector>,
    /// Raw (gravity-including) acceleration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceleration_corrected: Option<RawVector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_rate: Option<RawRotationRate>,
    /// Total length of the recording, metadata records only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_duration: Option<f64>,
    /// Anything else (device info and the like).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawRecord {
    pub fn is_metadata(&self) -> bool {
        self.kind.as_deref() == Some(METADATA_TYPE)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawVector {
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub z: Option<f64>,
}

impl From<RawVector> for DVec3 {
    fn from(v: RawVector) -> Self {
        DVec3::new(
            v.x.unwrap_or(0.0),
            v.y.unwrap_or(0.0),
            v.z.unwrap_or(0.0),
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRotationRate {
    #[serde(default)]
    pub alpha: Option<f64>,
    #[serde(default)]
    pub beta: Option<f64>,
    #[serde(default)]
    pub gamma: Option<f64>,
}

/// Device rotation rate in degrees per second.
///
/// Named after the DeviceMotion axes: `alpha` about z, `beta` about x,
/// `gamma` about y.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RotationRate {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl RotationRate {
    /// Angular velocity in rad/s with (beta, gamma, alpha) mapped to (x, y, z).
    pub fn angular_velocity(&self) -> DVec3 {
        DVec3::new(
            self.beta.to_radians(),
            self.gamma.to_radians(),
            self.alpha.to_radians(),
        )
    }
}

impl From<RawRotationRate> for RotationRate {
    fn from(r: RawRotationRate) -> Self {
        Self {
            alpha: r.alpha.unwrap_or(0.0),
            beta: r.beta.unwrap_or(0.0),
            gamma: r.gamma.unwrap_or(0.0),
        }
    }
}

/// Which acceleration semantics a recording declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccelSemantics {
    /// Samples carry `accelerationCorrected`: gravity still present.
    Raw,
    /// Samples carry only `acceleration`: gravity removed upstream.
    GravityCompensated,
}

/// One IMU reading ready for playback.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Sample {
    pub relative_time_ms: Option<f64>,
    pub interval_ms: Option<f64>,
    pub acceleration: Option<DVec3>,
    pub acceleration_corrected: Option<DVec3>,
    pub rotation_rate: Option<RotationRate>,
}

impl Sample {
    /// Timestamp in seconds, if present and finite.
    pub fn time_secs(&self) -> Option<f64> {
        usable(self.relative_time_ms).map(|ms| ms / 1000.0)
    }

    /// Nominal interval in seconds, if present and finite.
    pub fn interval_secs(&self) -> Option<f64> {
        usable(self.interval_ms).map(|ms| ms / 1000.0)
    }

    /// The acceleration field carrying `semantics`. No cross-field fallback.
    pub fn acceleration_for(&self, semantics: AccelSemantics) -> Option<DVec3> {
        match semantics {
            AccelSemantics::Raw => self.acceleration_corrected,
            AccelSemantics::GravityCompensated => self.acceleration,
        }
    }
}

impl From<RawRecord> for Sample {
    fn from(r: RawRecord) -> Self {
        Self {
            relative_time_ms: r.relative_time,
            interval_ms: r.interval,
            acceleration: r.acceleration.map(DVec3::from),
            acceleration_corrected: r.acceleration_corrected.map(DVec3::from),
            rotation_rate: r.rotation_rate.map(RotationRate::from),
        }
    }
}

/// Returns a millisecond timestamp only if it is present and finite.
pub(crate) fn usable(ms: Option<f64>) -> Option<f64> {
    ms.filter(|v| v.is_finite())
}

/// Leading metadata record of a recording.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub recording_duration_ms: Option<f64>,
    pub extra: Map<String, Value>,
}

impl Metadata {
    pub fn duration_secs(&self) -> Option<f64> {
        usable(self.recording_duration_ms).map(|ms| ms / 1000.0)
    }
}

impl From<RawRecord> for Metadata {
    fn from(r: RawRecord) -> Self {
        Self {
            recording_duration_ms: r.recording_duration,
            extra: r.extra,
        }
    }
}

// Serde helpers for glam types, written as plain arrays for exported
// trajectories.

pub(crate) mod dvec3_serde {
    use glam::DVec3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &DVec3, s: S) -> Result<S::Ok, S::Error> {
        [v.x, v.y, v.z].serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DVec3, D::Error> {
        let [x, y, z] = <[f64; 3]>::deserialize(d)?;
        Ok(DVec3::new(x, y, z))
    }
}

pub(crate) mod dquat_serde {
    use glam::DQuat;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(q: &DQuat, s: S) -> Result<S::Ok, S::Error> {
        [q.x, q.y, q.z, q.w].serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DQuat, D::Error> {
        let [x, y, z, w] = <[f64; 4]>::deserialize(d)?;
        Ok(DQuat::from_xyzw(x, y, z, w))
    }
}
