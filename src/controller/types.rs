use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::resolution::{AspectFamily, MatchStrategy, Resolution};

/// Latched adaptation requests
///
/// Set by telemetry reports and never cleared by the controller itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdaptationFlags {
    pub up: bool,
    pub down: bool,
}

impl AdaptationFlags {
    pub fn any(&self) -> bool {
        self.up || self.down
    }
}

/// Adaptation direction derived from the current window averages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Adaptation {
    #[default]
    None,
    Escalate,
    Degrade,
}

/// Point-in-time view of the controller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualitySnapshot {
    pub captured_at: DateTime<Utc>,
    pub aspect_family: Option<AspectFamily>,
    pub match_strategy: MatchStrategy,
    pub average_qp: Option<i64>,
    pub average_packet_loss: Option<i64>,
    pub average_rtt: Option<i64>,
    pub qp_samples: usize,
    pub flags: AdaptationFlags,
    pub adaptation: Adaptation,
    pub target_framerate: u32,
    pub framerate: u32,
    pub target_bitrate: u32,
    pub max_bitrate: u32,
    pub current_resolution: Resolution,
}
