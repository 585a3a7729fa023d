//! Recorded telemetry and offline replay
//!
//! Samples are stored one JSON object per line, tagged by `kind`:
//!
//! ```text
//! {"kind":"target_bitrate","kbps":1800}
//! {"kind":"qp","qp":31}
//! {"kind":"channel","packet_loss":3,"rtt":85}
//! ```

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

use crate::controller::{QualityController, QualitySnapshot};
use crate::error::{QualityError, Result};
use crate::resolution::Resolution;

/// One telemetry record fed to the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TelemetrySample {
    Qp { qp: u32 },
    Channel { packet_loss: u32, rtt: u64 },
    FrameRate { fps: u32 },
    TargetBitrate { kbps: u32 },
    MaxBitrate { kbps: u32 },
    Reset,
}

/// Resolution change observed during a replay
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionChange {
    /// Index of the sample that caused the change
    pub sample: usize,
    pub bitrate: u32,
    pub resolution: Resolution,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub samples: usize,
    pub initial_resolution: Option<Resolution>,
    pub changes: Vec<ResolutionChange>,
    pub adaptation_required: bool,
    pub final_state: QualitySnapshot,
}

/// Parse JSON-lines telemetry, skipping blank lines and `#` comments
pub fn read_samples<R: BufRead>(reader: R) -> Result<Vec<TelemetrySample>> {
    let mut samples = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let sample = serde_json::from_str(trimmed)
            .map_err(|e| QualityError::telemetry(index + 1, e.to_string()))?;
        samples.push(sample);
    }

    debug!("Parsed {} telemetry samples", samples.len());
    Ok(samples)
}

pub fn load_samples<P: AsRef<Path>>(path: P) -> Result<Vec<TelemetrySample>> {
    let file = File::open(path.as_ref())?;
    read_samples(BufReader::new(file))
}

/// Apply one sample to the controller
///
/// Target bitrate samples are followed by a best-match query, which is
/// returned when it produces a new resolution.
pub fn apply_sample(
    controller: &mut QualityController,
    sample: &TelemetrySample,
) -> Option<Resolution> {
    match *sample {
        TelemetrySample::Qp { qp } => controller.report_qp(qp),
        TelemetrySample::Channel { packet_loss, rtt } => {
            controller.report_channel_parameters(packet_loss, rtt)
        }
        TelemetrySample::FrameRate { fps } => controller.report_frame_rate(fps),
        TelemetrySample::MaxBitrate { kbps } => controller.report_max_bitrate(kbps),
        TelemetrySample::Reset => controller.reset(),
        TelemetrySample::TargetBitrate { kbps } => {
            controller.report_target_bitrate(kbps);
            return controller.best_match();
        }
    }
    None
}

/// Replay a recorded session through `controller`
///
/// The session starts with an initial best match, as a sender does before
/// its first frame.
pub fn replay(controller: &mut QualityController, samples: &[TelemetrySample]) -> ReplayReport {
    let initial_resolution = controller.initial_best_match();
    let mut changes = Vec::new();

    for (index, sample) in samples.iter().enumerate() {
        if let Some(resolution) = apply_sample(controller, sample) {
            changes.push(ResolutionChange {
                sample: index,
                bitrate: controller.bitrate(),
                resolution,
            });
        }
    }

    info!(
        "Replayed {} samples with {} resolution changes",
        samples.len(),
        changes.len()
    );

    ReplayReport {
        samples: samples.len(),
        initial_resolution,
        changes,
        adaptation_required: controller.is_adaptation_required(),
        final_state: controller.snapshot(),
    }
}
