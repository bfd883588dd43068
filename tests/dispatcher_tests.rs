//! Mock HTTP tests for the telemetry dispatcher.
//!
//! These tests cover:
//! - Request format (method, content type, sanitized body)
//! - Failure isolation (connection refused, timeout)
//! - In-flight limit
//! - Rate limiting in simulated time

use std::time::Duration;

use serde_json::json;
use tokio::runtime::Handle;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pose_relay::camera::CameraMode;
use pose_relay::telemetry::{DispatcherSettings, TelemetryDispatcher};
use pose_relay::tracker::{LandmarkObservation, Observations};

const UPDATE_PATH: &str = "/api/update-pose/";

fn observations(speed: f64) -> Observations {
    Observations::from([(
        "nose".to_string(),
        LandmarkObservation {
            x: 0.25,
            y: 0.5,
            z: -0.125,
            pixel_x: 160.0,
            pixel_y: 240.0,
            visibility: 0.75,
            moving: false,
            speed,
        },
    )])
}

fn settings(url: String) -> DispatcherSettings {
    DispatcherSettings {
        url,
        send_interval: Duration::from_secs(1),
        timeout: Duration::from_millis(200),
        max_in_flight: 8,
    }
}

#[tokio::test]
async fn test_posts_sanitized_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(UPDATE_PATH))
        .and(header("Content-Type", "application/json"))
        .and(wiremock::matchers::body_json(json!({
            "timestamp": 12.5,
            "camera_mode": "stereo",
            "extremities": {
                "nose": {
                    "x": 0.25,
                    "y": 0.5,
                    "z": -0.125,
                    "pixel_x": 160.0,
                    "pixel_y": 240.0,
                    "visibility": 0.75,
                    "moving": false,
                    "speed": null
                }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = format!("{}{}", mock_server.uri(), UPDATE_PATH);
    let mut dispatcher = TelemetryDispatcher::new(settings(url), Handle::current()).unwrap();

    let handle = dispatcher
        .maybe_dispatch(&observations(f64::NAN), CameraMode::Stereo, 12.5)
        .expect("first dispatch fires");
    handle.await.unwrap();

    assert_eq!(dispatcher.stats().sent, 1);
    assert_eq!(dispatcher.stats().failed, 0);
}

#[tokio::test]
async fn test_error_status_still_counts_as_sent() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let url = format!("{}{}", mock_server.uri(), UPDATE_PATH);
    let mut dispatcher = TelemetryDispatcher::new(settings(url), Handle::current()).unwrap();
    dispatcher
        .maybe_dispatch(&observations(1.0), CameraMode::Single, 1.0)
        .unwrap()
        .await
        .unwrap();

    assert_eq!(dispatcher.stats().sent, 1);
}

#[tokio::test]
async fn test_connection_refused_is_swallowed() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let url = format!("http://{}{}", addr, UPDATE_PATH);
    let mut dispatcher = TelemetryDispatcher::new(settings(url), Handle::current()).unwrap();
    dispatcher
        .maybe_dispatch(&observations(1.0), CameraMode::Single, 1.0)
        .unwrap()
        .await
        .unwrap();

    assert_eq!(dispatcher.stats().sent, 0);
    assert_eq!(dispatcher.stats().failed, 1);
    // The next interval dispatches again as if nothing happened
    assert!(dispatcher
        .maybe_dispatch(&observations(1.0), CameraMode::Single, 2.5)
        .is_some());
}

#[tokio::test]
async fn test_timeout_is_abandoned() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&mock_server)
        .await;

    let url = format!("{}{}", mock_server.uri(), UPDATE_PATH);
    let mut dispatcher = TelemetryDispatcher::new(settings(url), Handle::current()).unwrap();
    dispatcher
        .maybe_dispatch(&observations(1.0), CameraMode::Single, 1.0)
        .unwrap()
        .await
        .unwrap();

    assert_eq!(dispatcher.stats().failed, 1);
    assert_eq!(dispatcher.in_flight(), 0);
}

#[tokio::test]
async fn test_full_in_flight_limit_drops_payload() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(100)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = format!("{}{}", mock_server.uri(), UPDATE_PATH);
    let mut dispatcher = TelemetryDispatcher::new(
        DispatcherSettings {
            max_in_flight: 1,
            timeout: Duration::from_secs(1),
            ..settings(url)
        },
        Handle::current(),
    )
    .unwrap();

    let first = dispatcher
        .maybe_dispatch(&observations(1.0), CameraMode::Single, 1.0)
        .unwrap();
    assert_eq!(dispatcher.in_flight(), 1);

    // Gate is open again, but the only slot is taken
    assert!(dispatcher
        .maybe_dispatch(&observations(1.0), CameraMode::Single, 3.0)
        .is_none());
    assert_eq!(dispatcher.last_dispatch(), Some(3.0));

    first.await.unwrap();
    dispatcher.wait_idle().await;

    let counts = dispatcher.stats();
    assert_eq!(counts.sent, 1);
    assert_eq!(counts.dropped, 1);
    assert_eq!(dispatcher.in_flight(), 0);
}

#[tokio::test]
async fn test_default_bound_never_drops_within_timeout() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(900)))
        .expect(11)
        .mount(&mock_server)
        .await;

    let url = format!("{}{}", mock_server.uri(), UPDATE_PATH);
    let mut dispatcher = TelemetryDispatcher::new(
        DispatcherSettings {
            url,
            ..DispatcherSettings::default()
        },
        Handle::current(),
    )
    .unwrap();

    // Gate openings just over the 100 ms interval, all inside one timeout window
    let mut handles = Vec::new();
    for step in 0..11 {
        let now = 100.0 + f64::from(step) * 0.101;
        handles.push(
            dispatcher
                .maybe_dispatch(&observations(1.0), CameraMode::Single, now)
                .expect("gate is open and a slot is free"),
        );
    }
    assert_eq!(dispatcher.in_flight(), 11);
    assert_eq!(dispatcher.stats().dropped, 0);

    for handle in handles {
        handle.await.unwrap();
    }
    let counts = dispatcher.stats();
    assert_eq!(counts.dropped, 0);
    assert_eq!(counts.sent + counts.failed, 11);
}

#[tokio::test]
async fn test_rate_limit_in_simulated_time() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&mock_server)
        .await;

    let url = format!("{}{}", mock_server.uri(), UPDATE_PATH);
    let mut dispatcher = TelemetryDispatcher::new(settings(url), Handle::current()).unwrap();

    let mut fired = Vec::new();
    let mut handles = Vec::new();
    for now in [0.0, 0.5, 1.0, 1.5, 2.5, 3.0, 4.0] {
        if let Some(handle) = dispatcher.maybe_dispatch(&observations(1.0), CameraMode::Single, now)
        {
            fired.push(now);
            handles.push(handle);
        }
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // Strictly greater than the 1 s interval
    assert_eq!(fired, vec![0.0, 1.5, 3.0]);
    for pair in fired.windows(2) {
        assert!(pair[1] - pair[0] >= 1.0);
    }
    assert_eq!(dispatcher.stats().sent, 3);
}
