use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::resolution::{AspectFamily, MatchStrategy, Resolution};

/// Upper bound on samples held by each rolling window
pub const MAX_AVERAGE_WINDOW: usize = 10_000;

#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
pub struct QualityConfig {
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct VideoConfig {
    /// Follow the bandwidth estimate with resolution changes
    #[serde(default = "default_use_dynamic_resolution")]
    pub use_dynamic_resolution: bool,

    /// Start the session at `initial_resolution` instead of a bitrate match
    #[serde(default = "default_use_initial_resolution")]
    pub use_initial_resolution: bool,

    /// Use the 4:3 resolution catalog instead of 16:9
    #[serde(default = "default_resolution_4_3_enable")]
    pub resolution_4_3_enable: bool,

    /// Initial resolution (width, height)
    #[serde(default = "default_initial_resolution")]
    pub initial_resolution: (u32, u32),

    /// How a target bitrate is matched against the resolution table
    #[serde(default)]
    pub match_strategy: MatchStrategy,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ThresholdConfig {
    /// Average QP above this requests upward adaptation, below it downward
    #[serde(default = "default_high_qp")]
    pub high_qp: u32,

    /// Lower H.264 QP bound; must not exceed `high_qp`, not used by the adaptation checks
    #[serde(default = "default_low_qp")]
    pub low_qp: u32,

    /// Average packet loss (fraction of 255) above which quality degrades
    #[serde(default = "default_packet_loss")]
    pub packet_loss: u32,

    /// Average round-trip time in milliseconds above which quality degrades
    #[serde(default = "default_rtt_ms")]
    pub rtt_ms: u64,

    /// Ceiling applied to the reported framerate
    #[serde(default = "default_max_framerate")]
    pub max_framerate: u32,

    /// Number of samples in each rolling window
    #[serde(default = "default_average_window")]
    pub average_window: usize,
}

impl QualityConfig {
    /// Load configuration from a specific file path, then `RWS_QUALITY_*` variables
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::load_with_environment(path, Self::environment())
    }

    // RWS_QUALITY_THRESHOLDS__HIGH_QP=30 overrides thresholds.high_qp
    fn environment() -> Environment {
        Environment::with_prefix("RWS_QUALITY")
            .prefix_separator("_")
            .separator("__")
    }

    fn load_with_environment<P: AsRef<Path>>(
        path: P,
        environment: Environment,
    ) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default(
                "video.use_dynamic_resolution",
                default_use_dynamic_resolution(),
            )?
            .set_default(
                "video.use_initial_resolution",
                default_use_initial_resolution(),
            )?
            .set_default(
                "video.resolution_4_3_enable",
                default_resolution_4_3_enable(),
            )?
            .set_default(
                "video.initial_resolution",
                vec![default_initial_resolution().0, default_initial_resolution().1],
            )?
            .set_default("video.match_strategy", MatchStrategy::default().as_str())?
            .set_default("thresholds.high_qp", default_high_qp())?
            .set_default("thresholds.low_qp", default_low_qp())?
            .set_default("thresholds.packet_loss", default_packet_loss())?
            .set_default("thresholds.rtt_ms", default_rtt_ms() as i64)?
            .set_default("thresholds.max_framerate", default_max_framerate())?
            .set_default(
                "thresholds.average_window",
                default_average_window() as i64,
            )?
            .add_source(File::with_name(&path_str).required(false))
            .add_source(environment)
            .build()?;

        let config: QualityConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (width, height) = self.video.initial_resolution;
        if width == 0 || height == 0 {
            return Err(ConfigError::Message(
                "Initial resolution must be greater than 0".to_string(),
            ));
        }

        if self.thresholds.average_window == 0 {
            return Err(ConfigError::Message(
                "Average window must hold at least one sample".to_string(),
            ));
        }

        if self.thresholds.average_window > MAX_AVERAGE_WINDOW {
            return Err(ConfigError::Message(format!(
                "Average window {} exceeds the limit of {} samples",
                self.thresholds.average_window, MAX_AVERAGE_WINDOW
            )));
        }

        if self.thresholds.max_framerate == 0 {
            return Err(ConfigError::Message(
                "Max framerate must be greater than 0".to_string(),
            ));
        }

        if self.thresholds.low_qp > self.thresholds.high_qp {
            return Err(ConfigError::Message(format!(
                "Low QP threshold {} is above high QP threshold {}",
                self.thresholds.low_qp, self.thresholds.high_qp
            )));
        }

        Ok(())
    }

    /// Render the configuration as a TOML document
    pub fn to_toml(&self) -> crate::error::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn aspect_family(&self) -> AspectFamily {
        if self.video.resolution_4_3_enable {
            AspectFamily::Standard
        } else {
            AspectFamily::Wide
        }
    }

    pub fn initial_resolution(&self) -> Resolution {
        let (width, height) = self.video.initial_resolution;
        Resolution::new(width, height)
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            use_dynamic_resolution: default_use_dynamic_resolution(),
            use_initial_resolution: default_use_initial_resolution(),
            resolution_4_3_enable: default_resolution_4_3_enable(),
            initial_resolution: default_initial_resolution(),
            match_strategy: MatchStrategy::default(),
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            high_qp: default_high_qp(),
            low_qp: default_low_qp(),
            packet_loss: default_packet_loss(),
            rtt_ms: default_rtt_ms(),
            max_framerate: default_max_framerate(),
            average_window: default_average_window(),
        }
    }
}

// Default value functions
fn default_use_dynamic_resolution() -> bool {
    true
}
fn default_use_initial_resolution() -> bool {
    false
}
fn default_resolution_4_3_enable() -> bool {
    false
}
fn default_initial_resolution() -> (u32, u32) {
    (640, 480)
}

fn default_high_qp() -> u32 {
    35
}
fn default_low_qp() -> u32 {
    24
}
fn default_packet_loss() -> u32 {
    8
} // Roughly 3.1% on the 0-255 loss fraction scale
fn default_rtt_ms() -> u64 {
    200
}
fn default_max_framerate() -> u32 {
    30
}
fn default_average_window() -> usize {
    3 * 30
} // About three seconds at 30 samples per second
