//! Outbound telemetry: payload model, sanitization and rate-limited dispatch.

mod dispatcher;
mod payload;
pub mod sanitize;

pub use dispatcher::{
    in_flight_bound, DispatchCounts, DispatchError, DispatchStats, DispatcherSettings,
    RateLimiter, TelemetryDispatcher, DEFAULT_COLLECTOR_URL, DEFAULT_SEND_INTERVAL,
    DEFAULT_TIMEOUT, MAX_IN_FLIGHT_CAP,
};
pub use payload::{TelemetryPayload, WireObservation, WireTelemetry};
pub use sanitize::Sanitize;
