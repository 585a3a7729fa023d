use chrono::Utc;
use std::fmt;
use tracing::debug;

use super::types::{Adaptation, AdaptationFlags, QualitySnapshot};
use crate::config::{QualityConfig, ThresholdConfig};
use crate::error::Result;
use crate::observer::{QualityEvent, QualityObserver, TracingObserver};
use crate::resolution::{MatchStrategy, Resolution, ResolutionTable};
use crate::rolling::RollingSample;

/// Adaptive quality controller for one streaming session
///
/// Collects QP, packet loss and RTT samples into rolling windows, raises
/// adaptation requests when their averages cross the configured thresholds,
/// and maps target bitrates onto the resolution table. Every method is
/// synchronous; callers reporting from several tasks should go through
/// [`SharedQualityController`](super::SharedQualityController).
pub struct QualityController {
    table: ResolutionTable,
    thresholds: ThresholdConfig,
    use_dynamic_resolution: bool,
    use_initial_resolution: bool,
    initial_resolution: Resolution,
    match_strategy: MatchStrategy,
    average_qp: RollingSample<u32>,
    packet_loss: RollingSample<u32>,
    rtt: RollingSample<u64>,
    target_framerate: u32,
    target_bitrate: u32,
    max_bitrate: u32,
    current_resolution: Resolution,
    flags: AdaptationFlags,
    observer: Box<dyn QualityObserver>,
}

impl QualityController {
    /// Create a controller that logs transitions through `tracing`
    pub fn new(config: &QualityConfig) -> Result<Self> {
        Self::with_observer(config, Box::new(TracingObserver))
    }

    /// Create a controller reporting transitions to `observer`
    pub fn with_observer(
        config: &QualityConfig,
        observer: Box<dyn QualityObserver>,
    ) -> Result<Self> {
        config.validate()?;
        let table = ResolutionTable::for_family(config.aspect_family());
        Ok(Self::assemble(config, table, observer))
    }

    /// Create a controller over a custom resolution table
    pub fn with_table(
        config: &QualityConfig,
        table: ResolutionTable,
        observer: Box<dyn QualityObserver>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(config, table, observer))
    }

    fn assemble(
        config: &QualityConfig,
        table: ResolutionTable,
        observer: Box<dyn QualityObserver>,
    ) -> Self {
        let window = config.thresholds.average_window;

        debug!(
            "Creating quality controller: {} profiles, window {}, dynamic resolution {}",
            table.len(),
            window,
            config.video.use_dynamic_resolution
        );

        Self {
            table,
            thresholds: config.thresholds.clone(),
            use_dynamic_resolution: config.video.use_dynamic_resolution,
            use_initial_resolution: config.video.use_initial_resolution,
            initial_resolution: config.initial_resolution(),
            match_strategy: config.video.match_strategy,
            average_qp: RollingSample::new(window),
            packet_loss: RollingSample::new(window),
            rtt: RollingSample::new(window),
            target_framerate: 0,
            target_bitrate: 0,
            max_bitrate: 0,
            current_resolution: Resolution::default(),
            flags: AdaptationFlags::default(),
            observer,
        }
    }

    /// Record an encoder QP sample
    ///
    /// The up and down requests compare against the same high threshold, so
    /// an average sitting exactly on it raises neither.
    pub fn report_qp(&mut self, qp: u32) {
        self.average_qp.add_sample(qp);

        if let Some(average) = self.average_qp.average() {
            let threshold = self.thresholds.high_qp as i64;
            if average > threshold {
                self.flags.up = true;
            } else if average < threshold {
                self.flags.down = true;
            }
        }
    }

    /// Record packet loss and round-trip time from receiver feedback
    ///
    /// Only ever requests downward adaptation. When the loss average is over
    /// its threshold the RTT average is not consulted.
    pub fn report_channel_parameters(&mut self, packet_loss: u32, rtt: u64) {
        self.packet_loss.add_sample(packet_loss);
        self.rtt.add_sample(rtt);

        if let Some(average) = self.packet_loss.average() {
            if average > self.thresholds.packet_loss as i64 {
                debug!("Packet loss average {} over threshold", average);
                self.flags.down = true;
                return;
            }
        }

        if let Some(average) = self.rtt.average() {
            if average > self.thresholds.rtt_ms as i64 {
                debug!("RTT average {}ms over threshold", average);
                self.flags.down = true;
            }
        }
    }

    pub fn report_frame_rate(&mut self, framerate: u32) {
        if self.target_framerate == framerate {
            return;
        }
        let from = self.target_framerate;
        self.target_framerate = framerate;
        self.emit(QualityEvent::FrameRateChanged {
            from,
            to: framerate,
        });
    }

    /// Record the bitrate ceiling; it is not enforced here
    pub fn report_max_bitrate(&mut self, bitrate: u32) {
        self.max_bitrate = bitrate;
        self.emit(QualityEvent::MaxBitrateSet { bitrate });
    }

    pub fn report_target_bitrate(&mut self, bitrate: u32) {
        if self.target_bitrate == bitrate {
            return;
        }
        let from = self.target_bitrate;
        self.target_bitrate = bitrate;
        self.emit(QualityEvent::TargetBitrateChanged { from, to: bitrate });
    }

    /// Empty the sample windows
    ///
    /// Adaptation flags and the operating point survive a reset.
    pub fn reset(&mut self) {
        self.average_qp.reset();
        self.packet_loss.reset();
        self.rtt.reset();
        debug!("Quality sample windows cleared");
    }

    /// Whether an upward adaptation has been requested
    ///
    /// The down request is not part of this answer; read it from
    /// [`adaptation_flags`](Self::adaptation_flags).
    // TODO: fold the down flag in once the encoder control layer decides how to react to it
    pub fn is_adaptation_required(&self) -> bool {
        self.flags.up
    }

    pub fn adaptation_flags(&self) -> AdaptationFlags {
        self.flags
    }

    /// Adaptation direction computed from the current averages
    ///
    /// Unlike the latched flags this is recomputed on every call, so it
    /// returns to `None` once the windows are reset. Channel degradation
    /// takes precedence over the QP signal.
    pub fn adaptation(&self) -> Adaptation {
        let loss_high = self
            .packet_loss
            .average()
            .is_some_and(|average| average > self.thresholds.packet_loss as i64);
        let rtt_high = self
            .rtt
            .average()
            .is_some_and(|average| average > self.thresholds.rtt_ms as i64);
        if loss_high || rtt_high {
            return Adaptation::Degrade;
        }

        let threshold = self.thresholds.high_qp as i64;
        match self.average_qp.average() {
            Some(average) if average > threshold => Adaptation::Escalate,
            Some(average) if average < threshold => Adaptation::Degrade,
            _ => Adaptation::None,
        }
    }

    /// Target framerate capped at the configured maximum
    pub fn frame_rate(&self) -> u32 {
        self.target_framerate.min(self.thresholds.max_framerate)
    }

    pub fn bitrate(&self) -> u32 {
        self.target_bitrate
    }

    pub fn max_bitrate(&self) -> u32 {
        self.max_bitrate
    }

    pub fn current_resolution(&self) -> Resolution {
        self.current_resolution
    }

    pub fn table(&self) -> &ResolutionTable {
        &self.table
    }

    pub fn match_strategy(&self) -> MatchStrategy {
        self.match_strategy
    }

    /// Best resolution for the current target bitrate
    pub fn best_match(&mut self) -> Option<Resolution> {
        self.best_match_for(self.target_bitrate)
    }

    /// Resolution to start the session with
    ///
    /// Returns the configured initial resolution when that policy is on,
    /// otherwise the bitrate match.
    pub fn initial_best_match(&mut self) -> Option<Resolution> {
        if self.use_initial_resolution {
            self.current_resolution = self.initial_resolution;
            return Some(self.initial_resolution);
        }
        self.best_match()
    }

    /// Best resolution for `target_bitrate`
    ///
    /// `target_bitrate` becomes the new target. Returns `Some` only when the
    /// chosen resolution differs from the current one and the caller should
    /// reconfigure the encoder; `None` leaves
    /// [`current_resolution`](Self::current_resolution) in effect. With
    /// dynamic resolution disabled this always returns `None`.
    pub fn best_match_for(&mut self, target_bitrate: u32) -> Option<Resolution> {
        self.target_bitrate = target_bitrate;

        if !self.use_dynamic_resolution {
            return None;
        }

        let candidate = self
            .table
            .best_match(target_bitrate, self.match_strategy)
            .resolution();

        if candidate == self.current_resolution {
            return None;
        }

        self.current_resolution = candidate;
        self.emit(QualityEvent::ResolutionChanged {
            bitrate: target_bitrate,
            resolution: candidate,
        });
        Some(candidate)
    }

    pub fn snapshot(&self) -> QualitySnapshot {
        QualitySnapshot {
            captured_at: Utc::now(),
            aspect_family: self.table.family(),
            match_strategy: self.match_strategy,
            average_qp: self.average_qp.average(),
            average_packet_loss: self.packet_loss.average(),
            average_rtt: self.rtt.average(),
            qp_samples: self.average_qp.len(),
            flags: self.flags,
            adaptation: self.adaptation(),
            target_framerate: self.target_framerate,
            framerate: self.frame_rate(),
            target_bitrate: self.target_bitrate,
            max_bitrate: self.max_bitrate,
            current_resolution: self.current_resolution,
        }
    }

    fn emit(&mut self, event: QualityEvent) {
        self.observer.on_event(&event);
    }
}

impl fmt::Debug for QualityController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QualityController")
            .field("table", &self.table.family())
            .field("match_strategy", &self.match_strategy)
            .field("target_framerate", &self.target_framerate)
            .field("target_bitrate", &self.target_bitrate)
            .field("max_bitrate", &self.max_bitrate)
            .field("current_resolution", &self.current_resolution)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}
