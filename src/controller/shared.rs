use parking_lot::Mutex;
use std::sync::Arc;

use super::core::QualityController;
use super::types::{Adaptation, QualitySnapshot};
use crate::resolution::Resolution;

/// Cloneable handle serializing access to one controller
///
/// Telemetry callbacks and the encoder control task can each hold a clone;
/// every call takes the lock for its duration only.
#[derive(Debug, Clone)]
pub struct SharedQualityController {
    inner: Arc<Mutex<QualityController>>,
}

impl SharedQualityController {
    pub fn new(controller: QualityController) -> Self {
        Self {
            inner: Arc::new(Mutex::new(controller)),
        }
    }

    /// Run `f` with exclusive access, for compound read-modify sequences
    pub fn with<R>(&self, f: impl FnOnce(&mut QualityController) -> R) -> R {
        let mut controller = self.inner.lock();
        f(&mut controller)
    }

    pub fn report_qp(&self, qp: u32) {
        self.inner.lock().report_qp(qp);
    }

    pub fn report_channel_parameters(&self, packet_loss: u32, rtt: u64) {
        self.inner.lock().report_channel_parameters(packet_loss, rtt);
    }

    pub fn report_frame_rate(&self, framerate: u32) {
        self.inner.lock().report_frame_rate(framerate);
    }

    pub fn report_max_bitrate(&self, bitrate: u32) {
        self.inner.lock().report_max_bitrate(bitrate);
    }

    pub fn report_target_bitrate(&self, bitrate: u32) {
        self.inner.lock().report_target_bitrate(bitrate);
    }

    pub fn reset(&self) {
        self.inner.lock().reset();
    }

    pub fn is_adaptation_required(&self) -> bool {
        self.inner.lock().is_adaptation_required()
    }

    pub fn adaptation(&self) -> Adaptation {
        self.inner.lock().adaptation()
    }

    pub fn frame_rate(&self) -> u32 {
        self.inner.lock().frame_rate()
    }

    pub fn bitrate(&self) -> u32 {
        self.inner.lock().bitrate()
    }

    pub fn best_match(&self) -> Option<Resolution> {
        self.inner.lock().best_match()
    }

    pub fn best_match_for(&self, target_bitrate: u32) -> Option<Resolution> {
        self.inner.lock().best_match_for(target_bitrate)
    }

    pub fn initial_best_match(&self) -> Option<Resolution> {
        self.inner.lock().initial_best_match()
    }

    pub fn current_resolution(&self) -> Resolution {
        self.inner.lock().current_resolution()
    }

    pub fn snapshot(&self) -> QualitySnapshot {
        self.inner.lock().snapshot()
    }
}

impl From<QualityController> for SharedQualityController {
    fn from(controller: QualityController) -> Self {
        Self::new(controller)
    }
}
