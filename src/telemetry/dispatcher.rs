//! Rate-limited, fire-and-forget delivery of telemetry to the collector.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use super::payload::{TelemetryPayload, WireTelemetry};
use super::sanitize::Sanitize;
use crate::camera::CameraMode;
use crate::tracker::Observations;

const LOG_TARGET: &str = "pose_relay::dispatch";

/// Default collector endpoint.
pub const DEFAULT_COLLECTOR_URL: &str = "http://127.0.0.1:8000/api/update-pose/";

/// Minimum spacing between dispatches (a soft 10 Hz cap).
pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_millis(100);

/// Per-request timeout; slower calls are abandoned.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Hard ceiling for the in-flight bound.
pub const MAX_IN_FLIGHT_CAP: usize = 256;

/// Concurrent calls needed so that no gate opening is dropped while every
/// call is still within `timeout`: `ceil(timeout / send_interval) + 1`.
pub fn in_flight_bound(send_interval: Duration, timeout: Duration) -> usize {
    if send_interval.is_zero() {
        return MAX_IN_FLIGHT_CAP;
    }
    let overlapping = timeout.as_nanos().div_ceil(send_interval.as_nanos());
    usize::try_from(overlapping + 1)
        .unwrap_or(MAX_IN_FLIGHT_CAP)
        .clamp(1, MAX_IN_FLIGHT_CAP)
}

/// Errors from building or running the dispatcher.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Gate that lets an event through only when more than `interval` has passed
/// since the last one it let through.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval: f64,
    last_fired: Option<f64>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.as_secs_f64(),
            last_fired: None,
        }
    }

    /// Whether an event at `now` (seconds) would pass.
    pub fn ready(&self, now: f64) -> bool {
        match self.last_fired {
            Some(last) => now - last > self.interval,
            None => true,
        }
    }

    /// Let an event through if the gate is open, recording its time.
    pub fn try_fire(&mut self, now: f64) -> bool {
        if self.ready(now) {
            self.last_fired = Some(now);
            true
        } else {
            false
        }
    }

    pub fn last_fired(&self) -> Option<f64> {
        self.last_fired
    }
}

/// Counters for dispatch outcomes.
#[derive(Debug, Default)]
pub struct DispatchStats {
    sent: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of [`DispatchStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchCounts {
    /// Calls that got any HTTP response
    pub sent: u64,
    /// Calls that errored or timed out
    pub failed: u64,
    /// Payloads discarded because the in-flight limit was reached
    pub dropped: u64,
}

impl DispatchStats {
    pub fn counts(&self) -> DispatchCounts {
        DispatchCounts {
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Dispatcher settings.
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub url: String,
    pub send_interval: Duration,
    pub timeout: Duration,
    pub max_in_flight: usize,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_COLLECTOR_URL.to_string(),
            send_interval: DEFAULT_SEND_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            max_in_flight: in_flight_bound(DEFAULT_SEND_INTERVAL, DEFAULT_TIMEOUT),
        }
    }
}

/// Pushes telemetry to the collector without blocking the capture loop.
///
/// The rate limiter is only touched from the loop thread. Each dispatch runs
/// as its own task on the runtime behind `runtime`, owns an immutable copy of
/// its payload, and holds one permit of a semaphore sized `max_in_flight`.
pub struct TelemetryDispatcher {
    client: reqwest::Client,
    url: String,
    limiter: RateLimiter,
    runtime: Handle,
    permits: Arc<Semaphore>,
    max_in_flight: usize,
    stats: Arc<DispatchStats>,
}

impl std::fmt::Debug for TelemetryDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryDispatcher")
            .field("url", &self.url)
            .field("limiter", &self.limiter)
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

impl TelemetryDispatcher {
    /// Create a dispatcher that spawns its calls on `runtime`.
    pub fn new(settings: DispatcherSettings, runtime: Handle) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        let max_in_flight = settings.max_in_flight.max(1);

        Ok(Self {
            client,
            url: settings.url,
            limiter: RateLimiter::new(settings.send_interval),
            runtime,
            permits: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
            stats: Arc::new(DispatchStats::default()),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn stats(&self) -> DispatchCounts {
        self.stats.counts()
    }

    /// Number of calls currently running.
    pub fn in_flight(&self) -> usize {
        self.max_in_flight - self.permits.available_permits()
    }

    pub fn last_dispatch(&self) -> Option<f64> {
        self.limiter.last_fired()
    }

    /// Send `observations` if the interval has elapsed and there is something
    /// to send.
    ///
    /// The dispatch time is recorded as soon as the call is decided, not when
    /// it completes. The returned handle may be dropped; the call keeps running.
    pub fn maybe_dispatch(
        &mut self,
        observations: &Observations,
        camera_mode: CameraMode,
        now: f64,
    ) -> Option<JoinHandle<()>> {
        if observations.is_empty() || !self.limiter.try_fire(now) {
            return None;
        }

        let payload = TelemetryPayload {
            timestamp: now,
            camera_mode,
            extremities: observations.clone(),
        }
        .sanitize();

        let permit = match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    target: LOG_TARGET,
                    "{} dispatches already in flight, dropping telemetry at t={:.3}",
                    self.max_in_flight,
                    now
                );
                return None;
            }
        };

        let client = self.client.clone();
        let url = self.url.clone();
        let stats = Arc::clone(&self.stats);

        Some(self.runtime.spawn(async move {
            let _permit = permit;
            post_payload(&client, &url, &payload, &stats).await;
        }))
    }

    /// Wait until no dispatch is running.
    pub async fn wait_idle(&self) {
        // Only this method takes more than one permit at a time
        let permits = u32::try_from(self.max_in_flight).unwrap_or(u32::MAX);
        let _all = self.permits.acquire_many(permits).await;
    }
}

/// POST one payload, logging the outcome. Never fails.
async fn post_payload(
    client: &reqwest::Client,
    url: &str,
    payload: &WireTelemetry,
    stats: &DispatchStats,
) {
    log::debug!(target: LOG_TARGET, "Sending telemetry to {}", url);

    match client.post(url).json(payload).send().await {
        Ok(response) => {
            stats.sent.fetch_add(1, Ordering::Relaxed);
            log::debug!(target: LOG_TARGET, "Collector responded: {}", response.status());
        }
        Err(e) => {
            stats.failed.fetch_add(1, Ordering::Relaxed);
            if e.is_connect() {
                log::warn!(
                    target: LOG_TARGET,
                    "Could not connect to {}. Is the collector running?",
                    url
                );
            } else if e.is_timeout() {
                log::warn!(target: LOG_TARGET, "Collector at {} timed out", url);
            } else {
                log::warn!(target: LOG_TARGET, "Dispatch to {} failed: {}", url, e);
            }
        }
    }
}
