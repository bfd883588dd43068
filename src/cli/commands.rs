//! Subcommand handlers for tracking, the collector and config actions.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use super::args::ConfigAction;
use crate::camera::{
    CameraConfig, CameraRig, FfmpegSettings, FfmpegSource, FrameSource, OpenedSource,
};
use crate::capture_loop::{CaptureLoop, LoopState};
use crate::collector::{self, CollectorError};
use crate::config::{self, default_path, Config, ConfigError};
use crate::hotkeys::{install_ctrlc_quit, HotkeyListener};
use crate::pose::{PoseEstimator, SubprocessEstimator};
use crate::snapshot::SnapshotWriter;
use crate::telemetry::{DispatchError, TelemetryDispatcher};

/// Failures that stop a subcommand before it does its work.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Collector(#[from] CollectorError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Handle config subcommand actions.
pub fn handle_config_action(
    action: ConfigAction,
    config: &Config,
    path: Option<&Path>,
) -> Result<(), RunError> {
    let config_path = path.map(Path::to_path_buf).unwrap_or_else(default_path);
    match action {
        ConfigAction::Show => {
            if config_path.exists() {
                println!("# Config file: {} (exists)", config_path.display());
            } else {
                println!("# Config file: {} (not found)", config_path.display());
            }
            println!();
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Init => {
            config::init(&config_path)?;
            println!("Created config file: {}", config_path.display());
        }
    }
    Ok(())
}

fn open_camera(camera: &CameraConfig, settings: &FfmpegSettings) -> OpenedSource {
    log::info!(
        target: "pose_relay::camera",
        "Opening {} camera: {}",
        camera.role(),
        camera.source()
    );
    FfmpegSource::open_camera(camera, settings)
        .map(|source| Box::new(source) as Box<dyn FrameSource>)
}

fn start_estimator(command: &[String]) -> Option<Box<dyn PoseEstimator>> {
    if command.is_empty() {
        log::warn!("No pose estimator configured. Frames are captured without tracking.");
        return None;
    }
    match SubprocessEstimator::spawn(command) {
        Ok(estimator) => Some(Box::new(estimator)),
        Err(e) => {
            log::warn!(
                target: "pose_relay::estimator",
                "Pose estimator unavailable, tracking disabled: {}",
                e
            );
            None
        }
    }
}

/// Run the capture loop until quit or end of stream.
pub fn run_tracker(config: &Config) -> Result<LoopState, RunError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(RunError::Runtime)?;

    let settings = config.telemetry.dispatcher_settings();
    let drain_timeout = settings.timeout;
    let dispatcher = TelemetryDispatcher::new(settings, runtime.handle().clone())?;
    log::info!("Sending telemetry to {}", dispatcher.url());

    let ffmpeg = config.camera.ffmpeg_settings();
    let [primary, secondary] = config.camera.cameras();
    let primary = open_camera(&primary, &ffmpeg);
    let secondary = open_camera(&secondary, &ffmpeg);
    let rig = CameraRig::acquire(primary, Some(secondary), &config.camera.probe_settings());

    let estimator = match &rig {
        Ok(_) => start_estimator(&config.estimator.command),
        Err(_) => None,
    };

    let mut listener = HotkeyListener::new();
    if let Err(e) = install_ctrlc_quit(listener.sender()) {
        log::warn!("Failed to set Ctrl+C handler: {}", e);
    }
    if rig.is_ok() {
        if let Err(e) = listener.start() {
            log::warn!("Key listener not started: {}", e);
        }
    }

    let mut capture = CaptureLoop::new(
        rig,
        config.tracking.tracker(),
        dispatcher,
        SnapshotWriter::new(config.snapshot.path.clone()),
    )
    .with_estimator(estimator)
    .with_keys(Box::new(listener));

    let state = capture.run();

    if capture.dispatcher().in_flight() > 0 {
        let idle = runtime.block_on(tokio::time::timeout(
            drain_timeout,
            capture.dispatcher().wait_idle(),
        ));
        if idle.is_err() {
            log::debug!("Abandoning in-flight telemetry after {:?}", drain_timeout);
        }
    }
    let counts = capture.dispatcher().stats();
    log::info!(
        "Telemetry: {} sent, {} failed, {} dropped",
        counts.sent,
        counts.failed,
        counts.dropped
    );

    drop(capture);
    runtime.shutdown_timeout(Duration::from_millis(100));
    Ok(state)
}

/// Run the collector service until Ctrl+C.
pub fn run_collector(bind: &str) -> Result<(), RunError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(RunError::Runtime)?;
    runtime.block_on(collector::serve(bind))?;
    Ok(())
}
