//! Resolution catalogs and bitrate-to-resolution matching
//!
//! Each profile carries a bandwidth range estimated with the Kush gauge
//! (pixels x fps x 0.07 x motion factor). The table is scanned for the
//! profile whose average bandwidth sits closest to a target bitrate.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;

use crate::error::{QualityError, Result};

/// Kush gauge bits-per-pixel constant
const KUSH_GAUGE_CONSTANT: f64 = 0.07;
/// Motion factor used for the upper bandwidth bound (the gauge allows 1..=4)
const MAX_MOTION_FACTOR: f64 = 3.0;
/// Motion factor used for the lower bandwidth bound
const MIN_MOTION_FACTOR: f64 = 1.0;

const DEFAULT_MIN_FPS: u32 = 20;
const DEFAULT_MAX_FPS: u32 = 30;

/// 4:3 catalog in ascending pixel count
const STANDARD_RESOLUTIONS: &[(u32, u32)] = &[
    (320, 240),
    (400, 300),
    (512, 384),
    (640, 480),
    (1024, 768),
    (1152, 864),
    (1296, 972),
    (1640, 1232),
];

/// 16:9 catalog in ascending pixel count
const WIDE_RESOLUTIONS: &[(u32, u32)] = &[
    (384, 216),
    (512, 288),
    (640, 360),
    (768, 432),
    (896, 504),
    (1024, 576),
    (1152, 648),
    (1280, 720),
    (1408, 864),
    (1920, 1080),
];

/// Output resolution handed to the encoder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A zero-sized resolution means nothing has been chosen yet
    pub fn is_unset(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Aspect ratio family selecting the resolution catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectFamily {
    /// 4:3
    Standard,
    /// 16:9
    Wide,
}

impl AspectFamily {
    fn catalog(self) -> &'static [(u32, u32)] {
        match self {
            AspectFamily::Standard => STANDARD_RESOLUTIONS,
            AspectFamily::Wide => WIDE_RESOLUTIONS,
        }
    }
}

impl fmt::Display for AspectFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AspectFamily::Standard => write!(f, "4:3"),
            AspectFamily::Wide => write!(f, "16:9"),
        }
    }
}

/// How a target bitrate is resolved against the table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Examine every profile and keep the smallest bandwidth distance
    #[default]
    Nearest,
    /// Stop at the first profile that does not improve on the previous one
    FirstValley,
}

impl MatchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrategy::Nearest => "nearest",
            MatchStrategy::FirstValley => "first_valley",
        }
    }
}

/// One entry of the resolution table with its estimated bandwidth range (kbps)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionProfile {
    width: u32,
    height: u32,
    min_fps: u32,
    max_fps: u32,
    max_bandwidth: u32,
    min_bandwidth: u32,
    average_bandwidth: u32,
}

impl ResolutionProfile {
    pub fn new(width: u32, height: u32, min_fps: u32, max_fps: u32) -> Self {
        let pixels = width as f64 * height as f64;
        let max_bandwidth =
            (pixels * max_fps as f64 * KUSH_GAUGE_CONSTANT * MAX_MOTION_FACTOR / 1000.0) as u32;
        let min_bandwidth =
            (pixels * min_fps as f64 * KUSH_GAUGE_CONSTANT * MIN_MOTION_FACTOR / 1000.0) as u32;
        // Both bounds saturate at u32::MAX for oversized inputs
        let average_bandwidth = ((max_bandwidth as u64 + min_bandwidth as u64) / 2) as u32;

        Self {
            width,
            height,
            min_fps,
            max_fps,
            max_bandwidth,
            min_bandwidth,
            average_bandwidth,
        }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn min_fps(&self) -> u32 {
        self.min_fps
    }

    pub fn max_fps(&self) -> u32 {
        self.max_fps
    }

    pub fn max_bandwidth(&self) -> u32 {
        self.max_bandwidth
    }

    pub fn min_bandwidth(&self) -> u32 {
        self.min_bandwidth
    }

    pub fn average_bandwidth(&self) -> u32 {
        self.average_bandwidth
    }

    /// Distance between this profile's average bandwidth and a target bitrate
    pub fn distance(&self, target_bitrate: u32) -> u32 {
        self.average_bandwidth.abs_diff(target_bitrate)
    }
}

/// Resolution profiles ordered by ascending average bandwidth
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionTable {
    family: Option<AspectFamily>,
    profiles: Vec<ResolutionProfile>,
}

impl ResolutionTable {
    /// Build one of the two built-in catalogs
    pub fn for_family(family: AspectFamily) -> Self {
        let profiles = family
            .catalog()
            .iter()
            .map(|&(width, height)| {
                ResolutionProfile::new(width, height, DEFAULT_MIN_FPS, DEFAULT_MAX_FPS)
            })
            .collect();

        Self {
            family: Some(family),
            profiles,
        }
    }

    /// Build a custom table
    ///
    /// The profiles must be non-empty and strictly increasing in average bandwidth.
    pub fn from_profiles(profiles: Vec<ResolutionProfile>) -> Result<Self> {
        if profiles.is_empty() {
            return Err(QualityError::invalid_table("table has no profiles"));
        }

        for pair in profiles.windows(2) {
            if pair[1].average_bandwidth <= pair[0].average_bandwidth {
                return Err(QualityError::invalid_table(format!(
                    "{} ({} kbps) does not exceed {} ({} kbps)",
                    pair[1].resolution(),
                    pair[1].average_bandwidth,
                    pair[0].resolution(),
                    pair[0].average_bandwidth
                )));
            }
        }

        for profile in &profiles {
            if profile.min_fps == 0 || profile.min_fps > profile.max_fps {
                return Err(QualityError::invalid_table(format!(
                    "{} has invalid fps range {}..{}",
                    profile.resolution(),
                    profile.min_fps,
                    profile.max_fps
                )));
            }
        }

        Ok(Self {
            family: None,
            profiles,
        })
    }

    /// Catalog family, `None` for custom tables
    pub fn family(&self) -> Option<AspectFamily> {
        self.family
    }

    pub fn profiles(&self) -> &[ResolutionProfile] {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Find the profile matching `target_bitrate` with the given strategy
    pub fn best_match(&self, target_bitrate: u32, strategy: MatchStrategy) -> &ResolutionProfile {
        match strategy {
            MatchStrategy::Nearest => self.nearest(target_bitrate),
            MatchStrategy::FirstValley => self.first_valley(target_bitrate),
        }
    }

    fn nearest(&self, target_bitrate: u32) -> &ResolutionProfile {
        let mut best = &self.profiles[0];
        for profile in &self.profiles[1..] {
            // Strict comparison keeps the lower entry on ties
            if profile.distance(target_bitrate) < best.distance(target_bitrate) {
                best = profile;
            }
        }
        trace!(
            "Nearest profile for {} kbps: {}",
            target_bitrate,
            best.resolution()
        );
        best
    }

    fn first_valley(&self, target_bitrate: u32) -> &ResolutionProfile {
        let mut candidate = &self.profiles[0];
        let mut last_diff = candidate.distance(target_bitrate);

        for profile in &self.profiles[1..] {
            let diff = profile.distance(target_bitrate);
            if diff >= last_diff {
                trace!(
                    "Distance turned at {} for {} kbps, keeping {}",
                    profile.resolution(),
                    target_bitrate,
                    candidate.resolution()
                );
                return candidate;
            }
            candidate = profile;
            last_diff = diff;
        }

        candidate
    }
}
