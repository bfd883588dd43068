//! Camera acquisition, probing and single/stereo fallback.

use std::thread;
use std::time::Duration;

use super::source::FrameSource;
use super::types::{CameraError, CameraMode, Frame};

const LOG_TARGET: &str = "pose_relay::camera";

/// Default number of read attempts when validating a source.
pub const DEFAULT_PROBE_ATTEMPTS: u32 = 20;

/// Default pause between failed probe reads.
pub const DEFAULT_PROBE_BACKOFF: Duration = Duration::from_millis(50);

/// How hard to try a source before declaring it unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSettings {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_PROBE_ATTEMPTS,
            backoff: DEFAULT_PROBE_BACKOFF,
        }
    }
}

/// Result of opening a source, before probing.
pub type OpenedSource = Result<Box<dyn FrameSource>, CameraError>;

/// Issue up to `settings.attempts` reads; the source is available as soon as
/// one of them succeeds.
pub fn probe(source: &mut dyn FrameSource, settings: &ProbeSettings) -> bool {
    for attempt in 1..=settings.attempts {
        match source.read() {
            Ok(_) => {
                log::debug!(
                    target: LOG_TARGET,
                    "{} delivered a frame on attempt {}",
                    source.name(),
                    attempt
                );
                return true;
            }
            Err(e) => {
                log::debug!(
                    target: LOG_TARGET,
                    "{} probe attempt {}/{} failed: {}",
                    source.name(),
                    attempt,
                    settings.attempts,
                    e
                );
                if attempt < settings.attempts {
                    thread::sleep(settings.backoff);
                }
            }
        }
    }
    false
}

/// Frames read from the rig in one iteration.
#[derive(Debug, Clone)]
pub struct FramePair {
    /// Frame that feeds tracking
    pub primary: Frame,
    /// Present only in stereo mode
    pub secondary: Option<Frame>,
}

/// The open cameras of a session.
pub struct CameraRig {
    primary: Box<dyn FrameSource>,
    secondary: Option<Box<dyn FrameSource>>,
    mode: CameraMode,
    released: bool,
}

impl std::fmt::Debug for CameraRig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraRig")
            .field("primary", &self.primary.name())
            .field("secondary", &self.secondary.as_ref().map(|s| s.name()))
            .field("mode", &self.mode)
            .field("released", &self.released)
            .finish()
    }
}

impl CameraRig {
    /// Probe the configured sources and decide the session mode.
    ///
    /// - primary and secondary available: `Stereo`, both kept open
    /// - only primary available: `Single`, secondary released right away
    /// - primary unavailable: `CameraError::NoCamera`, everything released
    pub fn acquire(
        primary: OpenedSource,
        secondary: Option<OpenedSource>,
        settings: &ProbeSettings,
    ) -> Result<Self, CameraError> {
        let mut primary = match primary {
            Ok(source) => source,
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Primary camera could not be opened: {}", e);
                if let Some(Ok(mut source)) = secondary {
                    source.release();
                }
                return Err(CameraError::NoCamera {
                    primary: primary_name(&e),
                });
            }
        };

        if !probe(primary.as_mut(), settings) {
            let name = primary.name();
            primary.release();
            if let Some(Ok(mut source)) = secondary {
                source.release();
            }
            return Err(CameraError::NoCamera { primary: name });
        }

        let secondary = match secondary {
            Some(Ok(mut source)) => {
                if probe(source.as_mut(), settings) {
                    Some(source)
                } else {
                    log::warn!(
                        target: LOG_TARGET,
                        "Secondary camera {} delivered no frames, releasing it",
                        source.name()
                    );
                    source.release();
                    None
                }
            }
            Some(Err(e)) => {
                log::warn!(target: LOG_TARGET, "Secondary camera could not be opened: {}", e);
                None
            }
            None => None,
        };

        let mode = if secondary.is_some() {
            log::info!("Stereo mode active.");
            CameraMode::Stereo
        } else {
            log::info!("Only the primary camera is available. Single mode.");
            CameraMode::Single
        };

        Ok(Self {
            primary,
            secondary,
            mode,
            released: false,
        })
    }

    pub fn mode(&self) -> CameraMode {
        self.mode
    }

    /// Read one frame from every open source.
    ///
    /// Any failing read is reported; the caller treats it as end of stream.
    pub fn read_frames(&mut self) -> Result<FramePair, CameraError> {
        let primary = self.primary.read()?;
        let secondary = match self.secondary.as_mut() {
            Some(source) => Some(source.read()?),
            None => None,
        };
        Ok(FramePair { primary, secondary })
    }

    /// Release all open sources. Later calls are no-ops.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.primary.release();
        if let Some(source) = self.secondary.as_mut() {
            source.release();
        }
        self.released = true;
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for CameraRig {
    fn drop(&mut self) {
        self.release();
    }
}

fn primary_name(error: &CameraError) -> String {
    match error {
        CameraError::OpenFailed { camera, .. }
        | CameraError::StreamEnded { camera }
        | CameraError::ReadFailed { camera, .. } => camera.clone(),
        CameraError::FfmpegNotFound { program } => program.clone(),
        CameraError::NoCamera { primary } => primary.clone(),
    }
}
