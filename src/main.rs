use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use motion_config::{AppConfig, PolicySelection};
use motion_playback::{AccelIndicator, Phase, PlaybackSession, Snapshot};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Replay a recorded motion-sensor session and reconstruct its trajectory.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Recording to replay (JSON array of sample records)
    recording: PathBuf,

    /// Configuration file path (defaults to the per-user config)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Playback speed factor (1.0 = recorded cadence)
    #[arg(short, long)]
    speed: Option<f64>,

    /// Integration policy
    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,

    /// Acceleration scale factor
    #[arg(long)]
    accel_scale: Option<f64>,

    /// Per-step velocity damping
    #[arg(long)]
    damping: Option<f64>,

    /// Low-pass smoothing factor for the high-pass policy
    #[arg(long)]
    hp_alpha: Option<f64>,

    /// Write observed snapshots and the final trail to this JSON file
    #[arg(short, long)]
    trajectory: Option<PathBuf>,

    /// Save the effective config (file plus overrides) to this path
    #[arg(long)]
    save_config: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum PolicyArg {
    Auto,
    HighPass,
    Deadband,
}

impl From<PolicyArg> for PolicySelection {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Auto => PolicySelection::Auto,
            PolicyArg::HighPass => PolicySelection::HighPass,
            PolicyArg::Deadband => PolicySelection::Deadband,
        }
    }
}

/// Trajectory file contents.
#[derive(Serialize)]
struct TrajectoryExport<'a> {
    recording: &'a Path,
    policy: &'static str,
    phase: String,
    final_state: Snapshot,
    indicator: Option<AccelIndicator>,
    snapshots: Vec<Snapshot>,
    trail: Vec<[f64; 3]>,
}

impl Args {
    fn load_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => motion_config::load_config_from(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => motion_config::load_config().unwrap_or_else(|e| {
                warn!(?e, "Failed to load config, using defaults");
                AppConfig::default()
            }),
        };

        if let Some(policy) = self.policy {
            config.policy = policy.into();
        }
        if let Some(speed) = self.speed {
            config.playback.speed = speed;
        }
        if let Some(v) = self.accel_scale {
            config.tuning.accel_scale = v;
        }
        if let Some(v) = self.damping {
            config.tuning.damping = v;
        }
        if let Some(v) = self.hp_alpha {
            config.tuning.hp_alpha = v;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "motion_replay=info,motion_playback=info".into()),
        )
        .init();

    let args = Args::parse();
    info!("Motion replay starting");

    let config = args.load_config()?;
    info!(
        policy = ?config.policy,
        speed = config.playback.speed,
        accel_scale = config.tuning.accel_scale,
        damping = config.tuning.damping,
        hp_alpha = config.tuning.hp_alpha,
        "Config loaded"
    );
    if let Some(path) = &args.save_config {
        motion_config::save_config_to(&config, path)?;
    }

    let json = std::fs::read_to_string(&args.recording)
        .with_context(|| format!("Failed to read {}", args.recording.display()))?;

    let mut session = PlaybackSession::new(config.clone());
    let summary = session
        .load_json(&json)
        .await
        .with_context(|| format!("Failed to load {}", args.recording.display()))?
        .summary();
    info!("{summary}");

    let mut status_rx = session.subscribe();
    session.play_default().await?;

    let every = config.playback.status_every.max(1);
    let mut snapshots = Vec::new();
    loop {
        tokio::select! {
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = *status_rx.borrow_and_update();
                match status.phase {
                    Phase::Running => {
                        if status.snapshot.index == 0 {
                            continue;
                        }
                        if args.trajectory.is_some() {
                            snapshots.push(status.snapshot);
                        }
                        if status.snapshot.index as u64 % every == 0 {
                            info!("{status}");
                        }
                    }
                    Phase::Complete | Phase::Stopped => {
                        info!("{status}");
                        break;
                    }
                    Phase::Idle => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, stopping playback");
                session.stop().await?;
            }
        }
    }

    if let Some(path) = &args.trajectory {
        let recording = args.recording.as_path();
        write_trajectory(&session, recording, path, snapshots).await?;
    }

    Ok(())
}

async fn write_trajectory(
    session: &PlaybackSession,
    recording: &Path,
    path: &Path,
    snapshots: Vec<Snapshot>,
) -> Result<()> {
    let status = session.status();
    let trail = session.trail().await?;
    let export = TrajectoryExport {
        recording,
        policy: session.policy().map_or("none", |p| p.name()),
        phase: format!("{:?}", status.phase),
        final_state: status.snapshot,
        indicator: session.indicator(),
        snapshots,
        trail: trail.iter().map(|p| p.to_array()).collect(),
    };

    let json = serde_json::to_string_pretty(&export)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write trajectory to {}", path.display()))?;
    info!(
        path = %path.display(),
        points = export.trail.len(),
        snapshots = export.snapshots.len(),
        "Trajectory written"
    );
    Ok(())
}
