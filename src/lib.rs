pub mod config;
pub mod controller;
pub mod error;
pub mod observer;
pub mod resolution;
pub mod rolling;
pub mod telemetry;

pub use config::{QualityConfig, ThresholdConfig, VideoConfig};
pub use controller::{
    Adaptation, AdaptationFlags, QualityController, QualityControllerBuilder, QualitySnapshot,
    SharedQualityController,
};
pub use error::{QualityError, Result};
pub use observer::{QualityEvent, QualityObserver, RecordingObserver, TracingObserver};
pub use resolution::{AspectFamily, MatchStrategy, Resolution, ResolutionProfile, ResolutionTable};
pub use rolling::RollingSample;
pub use telemetry::{replay, ReplayReport, ResolutionChange, TelemetrySample};
