//! Delayed, cancellable single-shot window property detection

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, error, info};

use crate::rules::PropertyBag;

/// Source of a flat property snapshot for one window
pub trait WindowPropertyProbe: Send + 'static {
    fn query_window_info(&self) -> Result<PropertyBag>;
}

/// Reads a snapshot previously captured as a JSON object
#[derive(Debug, Clone)]
pub struct JsonFileProbe {
    path: PathBuf,
}

impl JsonFileProbe {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl WindowPropertyProbe for JsonFileProbe {
    fn query_window_info(&self) -> Result<PropertyBag> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read window properties from {}", self.path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Expected a JSON object of window properties in {}", self.path.display()))
    }
}

/// Handle to an in-flight detection
#[derive(Debug)]
pub struct DetectionRequest {
    cancelled: Arc<AtomicBool>,
    handle: thread::JoinHandle<()>,
}

impl DetectionRequest {
    /// Suppress delivery if the probe has not answered yet
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the worker to exit
    pub fn join(self) {
        if self.handle.join().is_err() {
            error!("Window property probe thread panicked");
        }
    }
}

/// Spawn a worker that waits `delay`, queries `probe` and sends the snapshot
/// to `sender` unless cancelled. Probe failures are logged and dropped.
pub fn detect_window_properties<P: WindowPropertyProbe>(
    probe: P,
    delay: Duration,
    sender: Sender<PropertyBag>,
) -> Result<DetectionRequest> {
    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancelled);

    let handle = thread::Builder::new()
        .name("window-probe".into())
        .spawn(move || {
            debug!(delay_ms = delay.as_millis() as u64, "Window property probe scheduled");
            thread::sleep(delay);
            if flag.load(Ordering::SeqCst) {
                debug!("Window property probe cancelled before query");
                return;
            }

            let bag = match probe.query_window_info() {
                Ok(bag) => bag,
                Err(e) => {
                    error!(error = %e, "Window property probe failed");
                    return;
                }
            };
            if flag.load(Ordering::SeqCst) {
                debug!("Window property probe cancelled, discarding reply");
                return;
            }

            info!(properties = bag.len(), "Window properties detected");
            if sender.send(bag).is_err() {
                debug!("Window property receiver dropped");
            }
        })
        .context("Failed to spawn window property probe thread")?;

    Ok(DetectionRequest { cancelled, handle })
}
