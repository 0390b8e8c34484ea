use crate::engine::Snapshot;
use crate::integrator::IntegrationPolicy;
use crate::recording::{parse_records, LoadError, Recording};
use crate::scheduler::{Phase, PlaybackError, PlaybackScheduler, PlaybackStatus};
use crate::trajectory::AccelIndicator;
use crate::tuning::TuningSource;
use crate::types::RawRecord;
use glam::DVec3;
use motion_config::{AppConfig, PolicySelection};
use std::sync::Arc;
use tokio::sync::watch;

/// One playback workspace: a loaded recording, live tuning and the scheduler.
///
/// Observers (renderers, status displays) read snapshots through
/// [`status`](Self::status) or [`subscribe`](Self::subscribe); nothing else
/// touches the motion state while a run is active.
pub struct PlaybackSession {
    config: AppConfig,
    selection: PolicySelection,
    tuning: TuningSource,
    scheduler: PlaybackScheduler,
    recording: Option<Arc<Recording>>,
    policy: Option<IntegrationPolicy>,
}

impl PlaybackSession {
    /// Create a session and spawn its scheduler. Must be called within a tokio runtime.
    pub fn new(config: AppConfig) -> Self {
        let tuning = TuningSource::new(config.tuning);
        let scheduler = PlaybackScheduler::spawn(config.playback, tuning.subscribe());
        Self {
            selection: config.policy,
            config,
            tuning,
            scheduler,
            recording: None,
            policy: None,
        }
    }

    /// Replace the current recording.
    ///
    /// Any run of the previous recording is stopped and rewound first. On
    /// failure the previous recording is dropped too, so playback stays
    /// unavailable until a valid recording is loaded.
    pub async fn load(&mut self, records: Vec<RawRecord>) -> Result<&Recording, LoadError> {
        self.unload().await;

        let recording = Recording::load(records).inspect_err(|e| {
            tracing::warn!(error = %e, "Recording rejected");
        })?;
        let policy =
            IntegrationPolicy::resolve(self.selection, recording.semantics(), &self.config);
        tracing::info!(
            policy = policy.name(),
            max_dt = policy.limits().max_dt,
            "Integration policy selected"
        );

        self.policy = Some(policy);
        Ok(&**self.recording.insert(Arc::new(recording)))
    }

    /// Decode and load a JSON recording document.
    pub async fn load_json(&mut self, json: &str) -> Result<&Recording, LoadError> {
        match parse_records(json) {
            Ok(records) => self.load(records).await,
            Err(e) => {
                self.unload().await;
                tracing::warn!(error = %e, "Recording rejected");
                Err(e)
            }
        }
    }

    /// Stop and rewind the scheduler, then forget the current recording.
    async fn unload(&mut self) {
        // Both only fail once the playback task is gone.
        let _ = self.scheduler.stop().await;
        let _ = self.scheduler.reset().await;
        self.recording = None;
        self.policy = None;
    }

    /// Override policy selection. Takes effect immediately for the loaded
    /// recording and at the next `play`.
    pub fn set_policy_selection(&mut self, selection: PolicySelection) {
        self.selection = selection;
        if let Some(recording) = &self.recording {
            self.policy = Some(IntegrationPolicy::resolve(
                selection,
                recording.semantics(),
                &self.config,
            ));
        }
    }

    pub fn recording(&self) -> Option<&Recording> {
        self.recording.as_deref()
    }

    pub fn policy(&self) -> Option<IntegrationPolicy> {
        self.policy
    }

    pub fn tuning(&self) -> &TuningSource {
        &self.tuning
    }

    /// Restart playback of the loaded recording from its first sample.
    pub async fn play(&self, speed: f64) -> Result<(), PlaybackError> {
        let (Some(recording), Some(policy)) = (self.recording.clone(), self.policy) else {
            return Err(PlaybackError::NoRecording);
        };
        self.scheduler.stop().await?;
        self.scheduler.reset().await?;
        self.scheduler.start(recording, policy, speed).await
    }

    /// Play at the configured default speed.
    pub async fn play_default(&self) -> Result<(), PlaybackError> {
        self.play(self.config.playback.speed).await
    }

    pub async fn stop(&self) -> Result<Snapshot, PlaybackError> {
        self.scheduler.stop().await
    }

    pub async fn reset(&self) -> Result<(), PlaybackError> {
        self.scheduler.reset().await
    }

    pub async fn wait_finished(&self) -> PlaybackStatus {
        self.scheduler.wait_finished().await
    }

    pub async fn trail(&self) -> Result<Vec<DVec3>, PlaybackError> {
        self.scheduler.trail().await
    }

    pub fn status(&self) -> PlaybackStatus {
        self.scheduler.status()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackStatus> {
        self.scheduler.subscribe()
    }

    /// Acceleration indicator for the latest snapshot, using live tuning.
    pub fn indicator(&self) -> Option<AccelIndicator> {
        AccelIndicator::from_acceleration(
            self.status().snapshot.effective_acceleration,
            &self.tuning.get(),
        )
    }

    /// One-line description of the current state.
    pub fn status_line(&self) -> String {
        let status = self.status();
        match (status.phase, self.recording()) {
            (Phase::Idle, Some(recording)) => recording.summary(),
            _ => status.to_string(),
        }
    }
}
