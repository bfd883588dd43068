//! End-to-end tests of the capture loop with scripted cameras, estimator,
//! keys and a simulated clock.

mod common;

use std::path::Path;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tempfile::TempDir;
use tokio::runtime::Runtime;

use common::{fast_probe, nose_at, ScriptedEstimator, ScriptedKeys, ScriptedSource};
use pose_relay::camera::{CameraMode, CameraRig};
use pose_relay::capture_loop::{CaptureLoop, LoopState, StopReason, CALIBRATION_MSG};
use pose_relay::hotkeys::KeyCommand;
use pose_relay::pose::PoseError;
use pose_relay::snapshot::SnapshotWriter;
use pose_relay::telemetry::{DispatcherSettings, TelemetryDispatcher};
use pose_relay::tracker::ExtremityTracker;

/// Clock ticking one second per call, starting at 0.
fn ticking_clock() -> Box<dyn FnMut() -> f64> {
    let mut t = -1.0;
    Box::new(move || {
        t += 1.0;
        t
    })
}

fn dispatcher(runtime: &Runtime) -> TelemetryDispatcher {
    // Nothing listens on port 9; every call fails and is swallowed
    let settings = DispatcherSettings {
        url: "http://127.0.0.1:9/api/update-pose/".to_string(),
        timeout: Duration::from_millis(100),
        ..DispatcherSettings::default()
    };
    TelemetryDispatcher::new(settings, runtime.handle().clone()).unwrap()
}

fn read_snapshot(path: &Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn test_full_session_until_stream_end() {
    let runtime = Runtime::new().unwrap();
    let dir = TempDir::new().unwrap();
    let snapshot_path = dir.path().join("coords.json");

    // One probe read plus three loop frames
    let (primary, primary_counters) = ScriptedSource::new("left", 0, 4);
    let (secondary, secondary_counters) = ScriptedSource::dead("right");
    let rig = CameraRig::acquire(primary.boxed(), Some(secondary.boxed()), &fast_probe());

    let estimator = ScriptedEstimator::new(vec![
        Ok(Some(nose_at(100.0, 100.0))),
        Ok(Some(nose_at(105.0, 100.0))),
        Ok(None),
    ]);
    let closes = estimator.closes.clone();

    let mut capture = CaptureLoop::new(
        rig,
        ExtremityTracker::default(),
        dispatcher(&runtime),
        SnapshotWriter::new(&snapshot_path),
    )
    .with_estimator(Some(Box::new(estimator)))
    .with_keys(Box::new(ScriptedKeys::new(vec![
        None,
        Some(KeyCommand::Calibrate),
        None,
    ])))
    .with_clock(ticking_clock());

    assert_eq!(capture.state(), LoopState::Initializing);
    let state = capture.run();

    assert_eq!(state, LoopState::Terminated(StopReason::StreamEnded));
    assert_eq!(capture.frames(), 3);
    assert_eq!(capture.session().mode, CameraMode::Single);

    // Both frames with a pose were dispatched (interval 0.1 s, clock 1 s/frame)
    assert_eq!(capture.dispatcher().last_dispatch(), Some(1.0));

    let calibration = capture.session().calibration.clone().unwrap();
    assert_eq!(calibration.timestamp, 1.0);
    assert_eq!(calibration.msg, CALIBRATION_MSG);

    // Last frame had no pose; calibration carries over
    let snapshot = read_snapshot(&snapshot_path);
    assert!(snapshot["pose"].is_null());
    assert_eq!(snapshot["calibration"]["timestamp"], 1.0);
    assert_eq!(snapshot["calibration"]["msg"], CALIBRATION_MSG);

    // Released exactly once, secondary never read after the probe
    drop(capture);
    assert_eq!(primary_counters.releases(), 1);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert_eq!(secondary_counters.reads(), 5);
    assert_eq!(secondary_counters.releases(), 1);
}

#[test]
fn test_snapshot_holds_full_pose_in_pixels() {
    let runtime = Runtime::new().unwrap();
    let dir = TempDir::new().unwrap();
    let snapshot_path = dir.path().join("coords.json");

    let (primary, _) = ScriptedSource::new("left", 0, 10);
    let rig = CameraRig::acquire(primary.boxed(), None, &fast_probe());

    let mut capture = CaptureLoop::new(
        rig,
        ExtremityTracker::default(),
        dispatcher(&runtime),
        SnapshotWriter::new(&snapshot_path),
    )
    .with_estimator(Some(Box::new(ScriptedEstimator::new(vec![Ok(Some(
        nose_at(50.0, 150.0),
    ))]))))
    .with_keys(Box::new(ScriptedKeys::new(vec![Some(KeyCommand::Quit)])))
    .with_clock(ticking_clock());

    assert_eq!(capture.run(), LoopState::Terminated(StopReason::QuitKey));
    assert_eq!(capture.frames(), 1);

    let snapshot = read_snapshot(&snapshot_path);
    let landmarks = snapshot["pose"]["landmarks"].as_array().unwrap();
    assert_eq!(landmarks.len(), 1);
    assert_eq!(landmarks[0]["id"], 0);
    assert!((landmarks[0]["x"].as_f64().unwrap() - 50.0).abs() < 1e-3);
    assert!((landmarks[0]["y"].as_f64().unwrap() - 150.0).abs() < 1e-3);
    assert!((landmarks[0]["z"].as_f64().unwrap() + 20.0).abs() < 1e-3);
    assert!(snapshot["calibration"].is_null());
}

#[test]
fn test_quit_stops_at_iteration_boundary() {
    let runtime = Runtime::new().unwrap();
    let dir = TempDir::new().unwrap();

    let (primary, primary_counters) = ScriptedSource::new("left", 0, 100);
    let rig = CameraRig::acquire(primary.boxed(), None, &fast_probe());

    let mut capture = CaptureLoop::new(
        rig,
        ExtremityTracker::default(),
        dispatcher(&runtime),
        SnapshotWriter::new(dir.path().join("coords.json")),
    )
    .with_keys(Box::new(ScriptedKeys::new(vec![
        None,
        None,
        Some(KeyCommand::Quit),
    ])))
    .with_clock(ticking_clock());

    assert_eq!(capture.run(), LoopState::Terminated(StopReason::QuitKey));
    assert_eq!(capture.frames(), 3);
    assert_eq!(primary_counters.reads(), 4);
    assert_eq!(primary_counters.releases(), 1);

    // Without an estimator nothing is dispatched
    assert_eq!(capture.dispatcher().last_dispatch(), None);
}

#[test]
fn test_calibrate_without_pose_is_ignored() {
    let runtime = Runtime::new().unwrap();
    let dir = TempDir::new().unwrap();

    let (primary, _) = ScriptedSource::new("left", 0, 3);
    let rig = CameraRig::acquire(primary.boxed(), None, &fast_probe());

    let mut capture = CaptureLoop::new(
        rig,
        ExtremityTracker::default(),
        dispatcher(&runtime),
        SnapshotWriter::new(dir.path().join("coords.json")),
    )
    .with_estimator(Some(Box::new(ScriptedEstimator::new(vec![Ok(None), Ok(None)]))))
    .with_keys(Box::new(ScriptedKeys::new(vec![
        Some(KeyCommand::Calibrate),
        Some(KeyCommand::Calibrate),
    ])))
    .with_clock(ticking_clock());

    assert_eq!(capture.run(), LoopState::Terminated(StopReason::StreamEnded));
    assert!(capture.session().calibration.is_none());
    assert!(capture.session().banner_until.is_none());
}

#[test]
fn test_estimator_failures_degrade_to_no_pose() {
    let runtime = Runtime::new().unwrap();
    let dir = TempDir::new().unwrap();

    let (primary, _) = ScriptedSource::new("left", 0, 5);
    let rig = CameraRig::acquire(primary.boxed(), None, &fast_probe());

    let estimator = ScriptedEstimator::new(vec![
        Err(PoseError::Protocol(
            serde_json::from_str::<serde_json::Value>("{").unwrap_err(),
        )),
        Ok(Some(nose_at(10.0, 10.0))),
        Err(PoseError::Closed),
        Ok(Some(nose_at(20.0, 20.0))),
    ]);
    let calls = estimator.calls.clone();
    let closes = estimator.closes.clone();

    let mut capture = CaptureLoop::new(
        rig,
        ExtremityTracker::default(),
        dispatcher(&runtime),
        SnapshotWriter::new(dir.path().join("coords.json")),
    )
    .with_estimator(Some(Box::new(estimator)))
    .with_clock(ticking_clock());

    assert_eq!(capture.run(), LoopState::Terminated(StopReason::StreamEnded));
    assert_eq!(capture.frames(), 4);

    // The helper went away on the third frame; it is not asked again
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert_eq!(capture.dispatcher().last_dispatch(), Some(1.0));
}

#[test]
fn test_no_camera_never_runs() {
    let runtime = Runtime::new().unwrap();
    let dir = TempDir::new().unwrap();
    let snapshot_path = dir.path().join("coords.json");

    let (primary, _) = ScriptedSource::dead("left");
    let rig = CameraRig::acquire(primary.boxed(), None, &fast_probe());
    assert!(rig.is_err());

    let mut capture = CaptureLoop::new(
        rig,
        ExtremityTracker::default(),
        dispatcher(&runtime),
        SnapshotWriter::new(&snapshot_path),
    );
    assert_eq!(capture.state(), LoopState::NoCamera);
    assert_eq!(capture.run(), LoopState::NoCamera);
    assert_eq!(capture.frames(), 0);
    assert!(!snapshot_path.exists());
}
