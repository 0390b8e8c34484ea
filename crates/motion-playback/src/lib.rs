//! Replays recorded motion-sensor sessions and dead-reckons a 3D trajectory.
//!
//! A [`PlaybackSession`] loads a recording, resolves an integration policy
//! and drives a background scheduler that feeds one sample per tick through
//! orientation tracking and motion integration.

pub mod engine;
pub mod integrator;
pub mod orientation;
pub mod recording;
pub mod scheduler;
pub mod session;
pub mod trajectory;
pub mod tuning;
pub mod types;

pub use engine::{PlaybackEngine, RejectReason, SampleOutcome, Snapshot, Tick};
pub use integrator::{IntegrationPolicy, MotionIntegrator, MotionState};
pub use recording::{parse_records, LoadError, Recording};
pub use scheduler::{Phase, PlaybackError, PlaybackScheduler, PlaybackStatus};
pub use session::PlaybackSession;
pub use trajectory::{AccelIndicator, Trail};
pub use tuning::TuningSource;
pub use types::{AccelSemantics, RawRecord, Sample};
