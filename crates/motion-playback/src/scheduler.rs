use crate::engine::{PlaybackEngine, Snapshot, Tick};
use crate::integrator::IntegrationPolicy;
use crate::recording::Recording;
use glam::DVec3;
use motion_config::{PlaybackConfig, TuningParameters};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlaybackError {
    #[error("Playback is already running")]
    AlreadyRunning,
    #[error("Recording has no samples")]
    NoSamples,
    #[error("Playback speed must be positive and finite, got {0}")]
    InvalidSpeed(f64),
    #[error("Cannot reset while playback is running")]
    Running,
    #[error("No recording loaded")]
    NoRecording,
    #[error("Playback task has shut down")]
    SchedulerClosed,
}

/// Scheduler lifecycle: `Idle -> Running -> (Complete | Stopped) -> Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    Complete,
    Stopped,
}

/// What observers see after every tick or state change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackStatus {
    pub phase: Phase,
    pub snapshot: Snapshot,
}

impl Default for PlaybackStatus {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            snapshot: Snapshot::default(),
        }
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.snapshot;
        match self.phase {
            Phase::Idle => write!(f, "Idle"),
            Phase::Running if s.index == 0 => write!(f, "Starting playback…"),
            Phase::Running => write!(
                f,
                "Playing… {}/{} | Pos: ({:.2}, {:.2}, {:.2}) | Vel: ({:.2}, {:.2}, {:.2}) | Rate: {:.1} fps",
                s.index,
                s.total,
                s.position.x,
                s.position.y,
                s.position.z,
                s.velocity.x,
                s.velocity.y,
                s.velocity.z,
                s.rate(),
            ),
            Phase::Stopped => write!(f, "Stopped at sample {}/{}", s.index, s.total),
            Phase::Complete => {
                write!(f, "Playback complete - {} samples processed", s.total)
            }
        }
    }
}

/// Commands sent to the playback task.
enum Command {
    Start {
        recording: Arc<Recording>,
        policy: IntegrationPolicy,
        speed: f64,
        reply: oneshot::Sender<Result<(), PlaybackError>>,
    },
    Stop {
        reply: oneshot::Sender<Snapshot>,
    },
    Reset {
        reply: oneshot::Sender<Result<(), PlaybackError>>,
    },
    Trail {
        reply: oneshot::Sender<Vec<DVec3>>,
    },
}

/// Replays a recording at its recorded cadence.
///
/// A background task owns the engine and a single timer deadline. Each
/// timer expiry processes exactly one sample and arms the next deadline, so
/// ticks never overlap. Commands win over an expired timer, and stopping
/// clears the deadline: a tick that was queued when `stop` returned never runs.
pub struct PlaybackScheduler {
    status_rx: watch::Receiver<PlaybackStatus>,
    command_tx: mpsc::UnboundedSender<Command>,
    _task: tokio::task::JoinHandle<()>,
}

impl PlaybackScheduler {
    /// Start the playback task. Must be called within a tokio runtime.
    pub fn spawn(config: PlaybackConfig, tuning: watch::Receiver<TuningParameters>) -> Self {
        let (status_tx, status_rx) = watch::channel(PlaybackStatus::default());
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let worker = Worker {
            config,
            tuning,
            status_tx,
            engine: None,
            phase: Phase::Idle,
            deadline: None,
            ticks: 0,
        };
        let task = tokio::spawn(playback_loop(worker, command_rx));

        Self {
            status_rx,
            command_tx,
            _task: task,
        }
    }

    /// Begin playback of `recording` from its first sample.
    pub async fn start(
        &self,
        recording: Arc<Recording>,
        policy: IntegrationPolicy,
        speed: f64,
    ) -> Result<(), PlaybackError> {
        self.request(|reply| Command::Start {
            recording,
            policy,
            speed,
            reply,
        })
        .await?
    }

    /// Cancel the pending tick. Returns the state after the last processed sample.
    pub async fn stop(&self) -> Result<Snapshot, PlaybackError> {
        self.request(|reply| Command::Stop { reply }).await
    }

    /// Rewind to the first sample with identity state.
    pub async fn reset(&self) -> Result<(), PlaybackError> {
        self.request(|reply| Command::Reset { reply }).await?
    }

    /// Positions of the most recent accepted samples, oldest first.
    pub async fn trail(&self) -> Result<Vec<DVec3>, PlaybackError> {
        self.request(|reply| Command::Trail { reply }).await
    }

    /// Latest published status (non-blocking).
    pub fn status(&self) -> PlaybackStatus {
        *self.status_rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackStatus> {
        self.status_rx.clone()
    }

    /// Wait until playback is no longer running.
    pub async fn wait_finished(&self) -> PlaybackStatus {
        let mut rx = self.status_rx.clone();
        // An error means the task is gone; its last status stands.
        let _ = rx.wait_for(|s| s.phase != Phase::Running).await;
        let status = *rx.borrow();
        status
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, PlaybackError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(command(reply))
            .map_err(|_| PlaybackError::SchedulerClosed)?;
        rx.await.map_err(|_| PlaybackError::SchedulerClosed)
    }
}

/// State owned by the playback task.
struct Worker {
    config: PlaybackConfig,
    tuning: watch::Receiver<TuningParameters>,
    status_tx: watch::Sender<PlaybackStatus>,
    engine: Option<PlaybackEngine>,
    phase: Phase,
    /// When the next tick fires. `None` while not running.
    deadline: Option<Instant>,
    ticks: u64,
}

impl Worker {
    fn handle(&mut self, command: Command) {
        match command {
            Command::Start {
                recording,
                policy,
                speed,
                reply,
            } => {
                let _ = reply.send(self.start(recording, policy, speed));
            }
            Command::Stop { reply } => {
                self.stop();
                let _ = reply.send(self.snapshot());
            }
            Command::Reset { reply } => {
                let _ = reply.send(self.reset());
            }
            Command::Trail { reply } => {
                let trail = self
                    .engine
                    .as_ref()
                    .map(|e| e.trail().to_vec())
                    .unwrap_or_default();
                let _ = reply.send(trail);
            }
        }
    }

    fn start(
        &mut self,
        recording: Arc<Recording>,
        policy: IntegrationPolicy,
        speed: f64,
    ) -> Result<(), PlaybackError> {
        if self.phase != Phase::Idle {
            return Err(PlaybackError::AlreadyRunning);
        }
        if recording.is_empty() {
            return Err(PlaybackError::NoSamples);
        }
        if !speed.is_finite() || speed <= 0.0 {
            return Err(PlaybackError::InvalidSpeed(speed));
        }

        tracing::info!(
            samples = recording.len(),
            policy = policy.name(),
            speed,
            "Playback starting"
        );
        self.engine = Some(PlaybackEngine::new(recording, policy, speed, &self.config));
        self.phase = Phase::Running;
        self.ticks = 0;
        let startup = Duration::from_secs_f64(self.config.startup_delay_ms.max(0.0) / 1000.0);
        self.deadline = Some(Instant::now() + startup);
        self.publish();
        Ok(())
    }

    fn stop(&mut self) {
        if self.phase != Phase::Running {
            return;
        }
        self.deadline = None;
        self.phase = Phase::Stopped;
        let snapshot = self.snapshot();
        tracing::info!(
            index = snapshot.index,
            total = snapshot.total,
            "Playback stopped"
        );
        self.publish();
    }

    fn reset(&mut self) -> Result<(), PlaybackError> {
        if self.phase == Phase::Running {
            return Err(PlaybackError::Running);
        }
        if let Some(engine) = self.engine.as_mut() {
            engine.reset();
        }
        self.phase = Phase::Idle;
        self.deadline = None;
        self.publish();
        Ok(())
    }

    fn tick(&mut self) {
        let Some(engine) = self.engine.as_mut() else {
            self.deadline = None;
            return;
        };

        let tuning = *self.tuning.borrow();
        match engine.tick(&tuning) {
            Tick::Processed { next_delay, .. } => {
                self.deadline = Some(Instant::now() + next_delay);
                self.ticks += 1;
                if self.ticks % self.config.status_every.max(1) == 0 {
                    let snapshot = engine.snapshot();
                    tracing::debug!(
                        index = snapshot.index,
                        total = snapshot.total,
                        accepted = snapshot.accepted,
                        rejected = snapshot.rejected,
                        "Playback heartbeat"
                    );
                }
            }
            Tick::Complete => {
                self.deadline = None;
                self.phase = Phase::Complete;
                let snapshot = engine.snapshot();
                tracing::info!(
                    policy = engine.policy().name(),
                    samples = snapshot.total,
                    accepted = snapshot.accepted,
                    rejected = snapshot.rejected,
                    "Playback complete"
                );
            }
        }
        self.publish();
    }

    fn snapshot(&self) -> Snapshot {
        self.engine
            .as_ref()
            .map(PlaybackEngine::snapshot)
            .unwrap_or_default()
    }

    fn publish(&self) {
        let _ = self.status_tx.send(PlaybackStatus {
            phase: self.phase,
            snapshot: self.snapshot(),
        });
    }
}

/// Background task: wait for the next tick or a command, whichever comes first.
async fn playback_loop(mut worker: Worker, mut command_rx: mpsc::UnboundedReceiver<Command>) {
    loop {
        let deadline = worker.deadline;
        tokio::select! {
            biased;
            command = command_rx.recv() => match command {
                Some(command) => worker.handle(command),
                None => break,
            },
            _ = sleep_until(deadline) => worker.tick(),
        }
    }
    tracing::debug!("Playback task exiting");
}

/// Sleeps until `deadline`, or forever when there is none.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
