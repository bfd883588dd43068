//! Operator key input for the capture loop.
//!
//! Uses rdev for cross-platform global key listening. Key presses are queued
//! by a listener thread and drained one per loop iteration.

use rdev::{listen, Event, EventType, Key};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use thiserror::Error;

/// Commands the operator can issue while tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    /// Stop the capture loop
    Quit,
    /// Record a calibration mark
    Calibrate,
}

/// Map a physical key to a command.
pub fn command_for_key(key: Key) -> Option<KeyCommand> {
    match key {
        Key::KeyQ => Some(KeyCommand::Quit),
        Key::KeyC => Some(KeyCommand::Calibrate),
        _ => None,
    }
}

/// Something the loop can poll for a key press without blocking.
pub trait KeySource {
    /// Take at most one pending command.
    fn poll(&mut self) -> Option<KeyCommand>;
}

/// A key source that never reports anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoKeys;

impl KeySource for NoKeys {
    fn poll(&mut self) -> Option<KeyCommand> {
        None
    }
}

#[derive(Debug, Error)]
pub enum HotkeyError {
    #[error("Hotkey listener already running")]
    AlreadyRunning,
}

/// Global key listener feeding a command queue.
pub struct HotkeyListener {
    tx: Sender<KeyCommand>,
    rx: Receiver<KeyCommand>,
    /// Flag to stop the listener thread
    stop_flag: Arc<AtomicBool>,
    /// Handle to the listener thread
    listener_thread: Option<JoinHandle<()>>,
}

impl Default for HotkeyListener {
    fn default() -> Self {
        Self::new()
    }
}

impl HotkeyListener {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        HotkeyListener {
            tx,
            rx,
            stop_flag: Arc::new(AtomicBool::new(false)),
            listener_thread: None,
        }
    }

    /// A handle other producers (e.g. the Ctrl+C handler) can push commands into.
    pub fn sender(&self) -> Sender<KeyCommand> {
        self.tx.clone()
    }

    /// Start listening for global key presses.
    ///
    /// On macOS this requires Accessibility permissions; on Linux an X11
    /// session. Listener errors are logged and leave the queue usable.
    ///
    /// At most one listener thread is ever spawned. Starting after `stop`
    /// re-enables that thread instead of adding a second one.
    pub fn start(&mut self) -> Result<(), HotkeyError> {
        if self.listener_thread.is_some() {
            if self.stop_flag.swap(false, Ordering::SeqCst) {
                return Ok(());
            }
            return Err(HotkeyError::AlreadyRunning);
        }

        let tx = self.tx.clone();
        let stop_flag = self.stop_flag.clone();

        let handle = thread::spawn(move || {
            let callback = move |event: Event| {
                if stop_flag.load(Ordering::SeqCst) {
                    return;
                }
                if let EventType::KeyPress(key) = event.event_type {
                    if let Some(command) = command_for_key(key) {
                        let _ = tx.send(command);
                    }
                }
            };

            // Blocks until error; there is no clean way to stop rdev
            if let Err(e) = listen(callback) {
                log::warn!("Key listener unavailable: {:?}", e);
            }
        });

        self.listener_thread = Some(handle);
        Ok(())
    }

    /// Stop reacting to key presses.
    pub fn stop(&mut self) {
        // The rdev thread keeps running until the process exits
        self.stop_flag.store(true, Ordering::SeqCst);
    }

    /// Whether key presses are currently forwarded.
    pub fn is_listening(&self) -> bool {
        self.listener_thread.is_some() && !self.stop_flag.load(Ordering::SeqCst)
    }
}

impl KeySource for HotkeyListener {
    fn poll(&mut self) -> Option<KeyCommand> {
        self.rx.try_recv().ok()
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Turn Ctrl+C into a `Quit` command.
pub fn install_ctrlc_quit(tx: Sender<KeyCommand>) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        log::info!("Received Ctrl+C, shutting down...");
        let _ = tx.send(KeyCommand::Quit);
    })
}
