//! FFmpeg-backed frame source.
//!
//! Each camera runs in its own `ffmpeg` child process that decodes the device
//! or network stream and writes raw `rgb24` frames of a fixed size to stdout.
//! A reader thread drains stdout so that every read has a deadline.

use std::io::{self, BufRead, BufReader, ErrorKind, Read};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::source::FrameSource;
use super::types::{CameraConfig, CameraError, Frame, Resolution, SourceId};

const LOG_TARGET: &str = "pose_relay::camera";

/// Settings shared by every ffmpeg capture process.
#[derive(Debug, Clone)]
pub struct FfmpegSettings {
    /// ffmpeg executable
    pub program: String,
    /// Output frame size (frames are rescaled to it)
    pub resolution: Resolution,
    /// Requested capture rate for local devices
    pub fps: u32,
    /// Longest wait for one frame, also the network I/O timeout for streams
    pub read_timeout: Duration,
}

/// Default deadline for a single frame.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(2);

impl Default for FfmpegSettings {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            resolution: Resolution::default(),
            fps: 30,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// Input arguments for a local capture device on this platform.
fn device_input_args(index: u32, fps: u32) -> Vec<String> {
    let fps = fps.to_string();
    if cfg!(target_os = "macos") {
        vec![
            "-f".into(),
            "avfoundation".into(),
            "-framerate".into(),
            fps,
            "-i".into(),
            format!("{}:none", index),
        ]
    } else if cfg!(target_os = "windows") {
        vec![
            "-f".into(),
            "dshow".into(),
            "-framerate".into(),
            fps,
            "-i".into(),
            format!("video={}", index),
        ]
    } else {
        vec![
            "-f".into(),
            "v4l2".into(),
            "-framerate".into(),
            fps,
            "-i".into(),
            format!("/dev/video{}", index),
        ]
    }
}

/// Build the full ffmpeg argument list for a source.
pub fn ffmpeg_args(id: &SourceId, settings: &FfmpegSettings) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-nostdin".into(),
    ];

    match id {
        SourceId::Device(index) => args.extend(device_input_args(*index, settings.fps)),
        SourceId::Stream(url) => {
            // Both options take microseconds
            let micros = settings.read_timeout.as_micros().max(1).to_string();
            args.push("-rw_timeout".into());
            args.push(micros.clone());
            if url.starts_with("rtsp") || url.starts_with("http") {
                args.push("-timeout".into());
                args.push(micros);
            }
            args.push("-i".into());
            args.push(url.clone());
        }
    }

    args.extend([
        "-an".to_string(),
        "-vf".to_string(),
        format!(
            "scale={}:{}",
            settings.resolution.width, settings.resolution.height
        ),
        "-pix_fmt".to_string(),
        "rgb24".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "pipe:1".to_string(),
    ]);

    args
}

type FrameResult = io::Result<Vec<u8>>;

/// Read fixed-size frames off `stdout` until it closes or the receiver goes away.
fn spawn_frame_reader(
    mut stdout: ChildStdout,
    frame_len: usize,
    tx: SyncSender<FrameResult>,
) {
    thread::spawn(move || loop {
        let mut data = vec![0u8; frame_len];
        let result = stdout.read_exact(&mut data).map(|()| data);
        let failed = result.is_err();
        if tx.send(result).is_err() || failed {
            break;
        }
    });
}

/// A camera read through an ffmpeg child process.
pub struct FfmpegSource {
    name: String,
    resolution: Resolution,
    read_timeout: Duration,
    child: Option<Child>,
    frames: Option<Receiver<FrameResult>>,
    stderr_thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for FfmpegSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegSource")
            .field("name", &self.name)
            .field("resolution", &self.resolution)
            .field("read_timeout", &self.read_timeout)
            .field("open", &self.child.is_some())
            .finish_non_exhaustive()
    }
}

impl FfmpegSource {
    /// Spawn the capture process for `id`.
    ///
    /// # Errors
    /// * `CameraError::FfmpegNotFound` - if the ffmpeg binary is missing
    /// * `CameraError::OpenFailed` - if the process cannot be spawned
    pub fn open(id: &SourceId, settings: &FfmpegSettings) -> Result<Self, CameraError> {
        Self::spawn(id, id.to_string(), settings)
    }

    /// Spawn the capture process for a configured camera, named after its
    /// source and role.
    pub fn open_camera(
        camera: &CameraConfig,
        settings: &FfmpegSettings,
    ) -> Result<Self, CameraError> {
        Self::spawn(camera.source(), camera.label(), settings)
    }

    fn spawn(
        id: &SourceId,
        name: String,
        settings: &FfmpegSettings,
    ) -> Result<Self, CameraError> {
        let mut child = Command::new(&settings.program)
            .args(ffmpeg_args(id, settings))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    CameraError::FfmpegNotFound {
                        program: settings.program.clone(),
                    }
                } else {
                    CameraError::OpenFailed {
                        camera: name.clone(),
                        reason: e.to_string(),
                    }
                }
            })?;

        // One decoded frame may wait while the next is being read
        let frames = child.stdout.take().map(|stdout| {
            let (tx, rx) = mpsc::sync_channel(1);
            spawn_frame_reader(stdout, settings.resolution.rgb_frame_len(), tx);
            rx
        });

        // Forward ffmpeg diagnostics to the log
        let stderr_thread = child.stderr.take().map(|stderr| {
            let camera = name.clone();
            thread::spawn(move || {
                let reader = BufReader::new(stderr);
                for line in reader.lines() {
                    match line {
                        Ok(l) => log::debug!(target: LOG_TARGET, "[ffmpeg {}] {}", camera, l),
                        Err(_) => break,
                    }
                }
            })
        });

        log::debug!(target: LOG_TARGET, "Spawned ffmpeg for {} (pid {})", name, child.id());

        Ok(Self {
            name,
            resolution: settings.resolution,
            read_timeout: settings.read_timeout,
            child: Some(child),
            frames,
            stderr_thread,
        })
    }
}

impl FrameSource for FfmpegSource {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn read(&mut self) -> Result<Frame, CameraError> {
        let frames = self.frames.as_ref().ok_or_else(|| CameraError::StreamEnded {
            camera: self.name.clone(),
        })?;

        match frames.recv_timeout(self.read_timeout) {
            Ok(Ok(data)) => Ok(Frame::rgb(
                data,
                self.resolution.width,
                self.resolution.height,
            )),
            Ok(Err(e)) if e.kind() == ErrorKind::UnexpectedEof => Err(CameraError::StreamEnded {
                camera: self.name.clone(),
            }),
            Ok(Err(e)) => Err(CameraError::ReadFailed {
                camera: self.name.clone(),
                reason: e.to_string(),
            }),
            Err(RecvTimeoutError::Timeout) => Err(CameraError::ReadFailed {
                camera: self.name.clone(),
                reason: format!("no frame within {:?}", self.read_timeout),
            }),
            Err(RecvTimeoutError::Disconnected) => Err(CameraError::StreamEnded {
                camera: self.name.clone(),
            }),
        }
    }

    fn release(&mut self) {
        // The reader thread exits once the pipe closes or its send fails
        self.frames = None;
        if let Some(mut child) = self.child.take() {
            // Already exited processes report an error here, which is fine
            let _ = child.kill();
            let _ = child.wait();
            log::debug!(target: LOG_TARGET, "Released {}", self.name);
        }
        if let Some(handle) = self.stderr_thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.release();
    }
}
