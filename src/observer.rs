//! Transition events emitted by the quality controller
//!
//! The controller never logs directly. Every operating-point change goes
//! through a [`QualityObserver`], which defaults to [`TracingObserver`].

use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::info;

use crate::resolution::Resolution;

/// Operating-point transition reported by the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum QualityEvent {
    FrameRateChanged { from: u32, to: u32 },
    MaxBitrateSet { bitrate: u32 },
    TargetBitrateChanged { from: u32, to: u32 },
    ResolutionChanged { bitrate: u32, resolution: Resolution },
}

impl fmt::Display for QualityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityEvent::FrameRateChanged { from, to } => {
                write!(f, "FrameRate changed from {}, to {}", from, to)
            }
            QualityEvent::MaxBitrateSet { bitrate } => {
                write!(f, "Setting Max Bitrate : {}", bitrate)
            }
            QualityEvent::TargetBitrateChanged { from, to } => {
                write!(f, "Bitrate changed from {}, to {}", from, to)
            }
            QualityEvent::ResolutionChanged {
                bitrate,
                resolution,
            } => write!(
                f,
                "BestMatch Resolution for bitrate {} : {}",
                bitrate, resolution
            ),
        }
    }
}

/// Sink for controller transitions
pub trait QualityObserver: Send {
    fn on_event(&mut self, event: &QualityEvent);
}

/// Logs every transition at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl QualityObserver for TracingObserver {
    fn on_event(&mut self, event: &QualityEvent) {
        info!(target: "rws_quality::controller", "{}", event);
    }
}

/// Keeps transitions in memory; clones share the same event list
#[derive(Debug, Default, Clone)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<QualityEvent>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<QualityEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl QualityObserver for RecordingObserver {
    fn on_event(&mut self, event: &QualityEvent) {
        self.events.lock().push(event.clone());
    }
}
