//! Pose estimation through a helper process.
//!
//! The helper (typically a small MediaPipe script) is spawned once. For every
//! frame it receives a JSON header line followed by the raw pixels on stdin:
//!
//! ```text
//! {"width":640,"height":480,"format":"rgb24"}\n<width*height*3 bytes>
//! ```
//!
//! and answers with one JSON line on stdout:
//!
//! ```text
//! {"landmarks":[{"x":0.5,"y":0.4,"z":-0.1,"visibility":0.98}, ...]}
//! {"landmarks":null}
//! ```

use std::io::{self, BufRead, BufReader, ErrorKind, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};

use super::estimator::{PoseError, PoseEstimator};
use super::landmark::{Landmark, LandmarkSet};
use crate::camera::Frame;

const LOG_TARGET: &str = "pose_relay::estimator";

#[derive(Debug, Serialize)]
struct FrameHeader {
    width: u32,
    height: u32,
    format: &'static str,
}

#[derive(Debug, Deserialize)]
struct HelperReply {
    #[serde(default)]
    landmarks: Option<Vec<Landmark>>,
}

/// Parse one reply line from the helper.
fn parse_reply(line: &str) -> Result<Option<LandmarkSet>, PoseError> {
    let reply: HelperReply = serde_json::from_str(line.trim())?;
    Ok(reply
        .landmarks
        .filter(|landmarks| !landmarks.is_empty())
        .map(LandmarkSet::new))
}

/// A helper that exited makes its stdin a broken pipe.
fn pipe_error(e: io::Error) -> PoseError {
    if e.kind() == ErrorKind::BrokenPipe {
        PoseError::Closed
    } else {
        PoseError::Io(e)
    }
}

fn send_frame(stdin: &mut ChildStdin, header: &[u8], data: &[u8]) -> io::Result<()> {
    stdin.write_all(header)?;
    stdin.write_all(data)?;
    stdin.flush()
}

/// Pose estimator backed by a long-running helper process.
pub struct SubprocessEstimator {
    program: String,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<BufReader<ChildStdout>>,
    stderr_thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for SubprocessEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubprocessEstimator")
            .field("program", &self.program)
            .field("running", &self.child.is_some())
            .finish_non_exhaustive()
    }
}

impl SubprocessEstimator {
    /// Launch the helper. `command[0]` is the program, the rest its arguments.
    pub fn spawn(command: &[String]) -> Result<Self, PoseError> {
        let (program, args) = command.split_first().ok_or(PoseError::EmptyCommand)?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| PoseError::Spawn {
                program: program.clone(),
                reason: if e.kind() == ErrorKind::NotFound {
                    "program not found".to_string()
                } else {
                    e.to_string()
                },
            })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take().map(BufReader::new);
        let stderr_thread = child.stderr.take().map(|stderr| {
            let name = program.clone();
            thread::spawn(move || {
                for line in BufReader::new(stderr).lines() {
                    match line {
                        Ok(l) => log::debug!(target: LOG_TARGET, "[{}] {}", name, l),
                        Err(_) => break,
                    }
                }
            })
        });

        log::info!("Pose helper '{}' started (pid {})", program, child.id());

        Ok(Self {
            program: program.clone(),
            child: Some(child),
            stdin,
            stdout,
            stderr_thread,
        })
    }
}

impl PoseEstimator for SubprocessEstimator {
    fn name(&self) -> &str {
        &self.program
    }

    fn estimate(&mut self, frame: &Frame) -> Result<Option<LandmarkSet>, PoseError> {
        let (stdin, stdout) = match (self.stdin.as_mut(), self.stdout.as_mut()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => return Err(PoseError::Closed),
        };

        let header = FrameHeader {
            width: frame.width,
            height: frame.height,
            format: "rgb24",
        };
        let mut header = serde_json::to_vec(&header)?;
        header.push(b'\n');
        send_frame(stdin, &header, &frame.data).map_err(pipe_error)?;

        let mut line = String::new();
        if stdout.read_line(&mut line).map_err(pipe_error)? == 0 {
            return Err(PoseError::Closed);
        }
        parse_reply(&line)
    }

    fn close(&mut self) {
        // Closing stdin tells a well-behaved helper to exit
        self.stdin = None;
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
            log::debug!(target: LOG_TARGET, "Pose helper '{}' stopped", self.program);
        }
        if let Some(handle) = self.stderr_thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SubprocessEstimator {
    fn drop(&mut self) {
        self.close();
    }
}
