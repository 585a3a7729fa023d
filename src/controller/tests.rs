use super::*;
use crate::config::QualityConfig;
use crate::observer::{QualityEvent, RecordingObserver};
use crate::resolution::{MatchStrategy, Resolution, ResolutionProfile, ResolutionTable};

fn create_test_controller(config: QualityConfig) -> (QualityController, RecordingObserver) {
    let recorder = RecordingObserver::new();
    let controller = QualityControllerBuilder::new()
        .config(config)
        .observer(recorder.clone())
        .build()
        .expect("controller should be created");
    (controller, recorder)
}

fn wide_config() -> QualityConfig {
    QualityConfig::default()
}

fn small_window_config(window: usize) -> QualityConfig {
    let mut config = QualityConfig::default();
    config.thresholds.average_window = window;
    config
}

#[test]
fn test_controller_creation() {
    let (controller, recorder) = create_test_controller(wide_config());

    assert_eq!(controller.table().len(), 10);
    assert_eq!(controller.bitrate(), 0);
    assert_eq!(controller.frame_rate(), 0);
    assert!(controller.current_resolution().is_unset());
    assert_eq!(controller.adaptation_flags(), AdaptationFlags::default());
    assert_eq!(controller.adaptation(), Adaptation::None);
    assert!(recorder.is_empty());
}

#[test]
fn test_standard_family_table() {
    let mut config = QualityConfig::default();
    config.video.resolution_4_3_enable = true;
    let (controller, _) = create_test_controller(config);

    assert_eq!(controller.table().len(), 8);
}

#[test]
fn test_invalid_config_is_rejected() {
    let mut config = QualityConfig::default();
    config.thresholds.average_window = 0;

    let result = QualityControllerBuilder::new().config(config).build();
    assert!(matches!(
        result,
        Err(crate::error::QualityError::Config(_))
    ));
}

#[test]
fn test_oversized_window_is_rejected() {
    let mut config = QualityConfig::default();
    config.thresholds.average_window = usize::MAX / 2;

    let result = QualityController::new(&config);
    assert!(matches!(
        result,
        Err(crate::error::QualityError::Config(_))
    ));
}

#[test]
fn test_high_qp_requests_up() {
    let (mut controller, _) = create_test_controller(wide_config());

    controller.report_qp(40);

    let flags = controller.adaptation_flags();
    assert!(flags.up);
    assert!(!flags.down);
    assert!(controller.is_adaptation_required());
    assert_eq!(controller.adaptation(), Adaptation::Escalate);
}

#[test]
fn test_low_qp_requests_down() {
    let (mut controller, _) = create_test_controller(wide_config());

    controller.report_qp(20);

    let flags = controller.adaptation_flags();
    assert!(!flags.up);
    assert!(flags.down);
    assert_eq!(controller.adaptation(), Adaptation::Degrade);
}

#[test]
fn test_qp_on_threshold_requests_nothing() {
    let (mut controller, _) = create_test_controller(wide_config());

    controller.report_qp(35);
    controller.report_qp(30);
    controller.report_qp(40);

    // Running averages: 35, 32 (down), 35
    let flags = controller.adaptation_flags();
    assert!(!flags.up);
    assert!(flags.down);
    assert_eq!(controller.adaptation(), Adaptation::None);
}

#[test]
fn test_qp_uses_window_average() {
    let (mut controller, _) = create_test_controller(small_window_config(4));

    // Average stays below 35 until the low samples are evicted
    for qp in [10, 10, 10, 10] {
        controller.report_qp(qp);
    }
    assert!(!controller.adaptation_flags().up);

    for _ in 0..3 {
        controller.report_qp(50);
    }
    // Window is now 10, 50, 50, 50 -> average 40
    assert!(controller.adaptation_flags().up);
    assert_eq!(controller.snapshot().average_qp, Some(40));
}

#[test]
fn test_flags_latch() {
    let (mut controller, _) = create_test_controller(small_window_config(1));

    controller.report_qp(50);
    controller.report_qp(10);

    // Both requests stay raised once set
    let flags = controller.adaptation_flags();
    assert!(flags.up);
    assert!(flags.down);
    assert!(flags.any());
    // The derived direction follows the latest window only
    assert_eq!(controller.adaptation(), Adaptation::Degrade);
}

#[test]
fn test_packet_loss_requests_down() {
    let (mut controller, _) = create_test_controller(wide_config());

    controller.report_channel_parameters(20, 50);

    assert!(controller.adaptation_flags().down);
    assert!(!controller.adaptation_flags().up);
    assert!(!controller.is_adaptation_required());
}

#[test]
fn test_rtt_requests_down() {
    let (mut controller, _) = create_test_controller(wide_config());

    controller.report_channel_parameters(0, 350);

    assert!(controller.adaptation_flags().down);
    assert_eq!(controller.adaptation(), Adaptation::Degrade);
}

#[test]
fn test_loss_masks_rtt_check() {
    let (mut controller, recorder) = create_test_controller(wide_config());

    controller.report_channel_parameters(40, 900);

    // Both samples land in their windows even though only loss was evaluated
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.average_packet_loss, Some(40));
    assert_eq!(snapshot.average_rtt, Some(900));
    assert!(snapshot.flags.down);
    assert!(!snapshot.flags.up);
    assert_eq!(snapshot.adaptation, Adaptation::Degrade);
    assert!(recorder.is_empty());

    // The same RTT sample on a healthy loss average degrades on its own
    let (mut rtt_only, _) = create_test_controller(wide_config());
    rtt_only.report_channel_parameters(0, 900);

    let snapshot = rtt_only.snapshot();
    assert_eq!(snapshot.average_packet_loss, Some(0));
    assert_eq!(snapshot.average_rtt, Some(900));
    assert!(snapshot.flags.down);
    assert!(!snapshot.flags.up);
    assert_eq!(snapshot.adaptation, Adaptation::Degrade);

    // Neither signal over threshold leaves the direction untouched
    let (mut healthy, _) = create_test_controller(wide_config());
    healthy.report_channel_parameters(8, 200);
    assert!(!healthy.adaptation_flags().down);
    assert_eq!(healthy.adaptation(), Adaptation::None);
}

#[test]
fn test_healthy_channel_requests_nothing() {
    let (mut controller, _) = create_test_controller(wide_config());

    for _ in 0..30 {
        controller.report_channel_parameters(2, 40);
    }

    assert_eq!(controller.adaptation_flags(), AdaptationFlags::default());
    assert_eq!(controller.adaptation(), Adaptation::None);
}

#[test]
fn test_channel_never_requests_up() {
    let (mut controller, _) = create_test_controller(wide_config());

    for (loss, rtt) in [(0, 0), (255, 10_000), (8, 200), (9, 201)] {
        controller.report_channel_parameters(loss, rtt);
    }

    assert!(!controller.adaptation_flags().up);
}

#[test]
fn test_channel_degrade_overrides_high_qp() {
    let (mut controller, _) = create_test_controller(wide_config());

    controller.report_qp(45);
    controller.report_channel_parameters(30, 20);

    assert_eq!(controller.adaptation(), Adaptation::Degrade);
}

#[test]
fn test_frame_rate_is_capped() {
    let (mut controller, recorder) = create_test_controller(wide_config());

    controller.report_frame_rate(60);
    assert_eq!(controller.frame_rate(), 30);

    controller.report_frame_rate(24);
    assert_eq!(controller.frame_rate(), 24);

    assert_eq!(
        recorder.events(),
        vec![
            QualityEvent::FrameRateChanged { from: 0, to: 60 },
            QualityEvent::FrameRateChanged { from: 60, to: 24 },
        ]
    );
}

#[test]
fn test_unchanged_frame_rate_is_silent() {
    let (mut controller, recorder) = create_test_controller(wide_config());

    controller.report_frame_rate(30);
    controller.report_frame_rate(30);

    assert_eq!(recorder.len(), 1);
}

#[test]
fn test_target_bitrate_reporting() {
    let (mut controller, recorder) = create_test_controller(wide_config());

    controller.report_target_bitrate(1200);
    controller.report_target_bitrate(1200);
    controller.report_target_bitrate(900);

    assert_eq!(controller.bitrate(), 900);
    assert_eq!(
        recorder.events(),
        vec![
            QualityEvent::TargetBitrateChanged { from: 0, to: 1200 },
            QualityEvent::TargetBitrateChanged { from: 1200, to: 900 },
        ]
    );
}

#[test]
fn test_max_bitrate_is_recorded_every_time() {
    let (mut controller, recorder) = create_test_controller(wide_config());

    controller.report_max_bitrate(5000);
    controller.report_max_bitrate(5000);

    assert_eq!(controller.max_bitrate(), 5000);
    assert_eq!(recorder.len(), 2);
    // Not enforced against the target
    controller.report_target_bitrate(8000);
    assert_eq!(controller.bitrate(), 8000);
}

#[test]
fn test_reset_clears_windows_only() {
    let (mut controller, _) = create_test_controller(wide_config());

    controller.report_target_bitrate(1500);
    controller.report_qp(50);
    controller.report_channel_parameters(30, 400);
    controller.reset();

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.average_qp, None);
    assert_eq!(snapshot.average_packet_loss, None);
    assert_eq!(snapshot.average_rtt, None);
    assert_eq!(snapshot.qp_samples, 0);
    assert_eq!(controller.bitrate(), 1500);
    assert!(controller.adaptation_flags().up);
    assert!(controller.adaptation_flags().down);
    assert!(controller.is_adaptation_required());
    assert_eq!(controller.adaptation(), Adaptation::None);
}

#[test]
fn test_exact_bandwidth_match() {
    let (mut controller, recorder) = create_test_controller(wide_config());

    // 1280x720 averages 3548 kbps
    let resolution = controller.best_match_for(3548);

    assert_eq!(resolution, Some(Resolution::new(1280, 720)));
    assert_eq!(controller.current_resolution(), Resolution::new(1280, 720));
    assert_eq!(controller.bitrate(), 3548);
    assert_eq!(
        recorder.events(),
        vec![QualityEvent::ResolutionChanged {
            bitrate: 3548,
            resolution: Resolution::new(1280, 720),
        }]
    );
}

#[test]
fn test_every_entry_matches_itself() {
    let (mut controller, _) = create_test_controller(wide_config());
    let profiles: Vec<_> = controller.table().profiles().to_vec();

    for profile in profiles.iter().rev() {
        let resolution = controller.best_match_for(profile.average_bandwidth());
        assert_eq!(resolution, Some(profile.resolution()));
    }
}

#[test]
fn test_best_match_is_idempotent() {
    let (mut controller, recorder) = create_test_controller(wide_config());

    assert!(controller.best_match_for(2000).is_some());
    assert!(controller.best_match_for(2000).is_none());
    // A nearby bitrate mapping to the same entry is not a transition either
    assert!(controller.best_match_for(1900).is_none());
    assert_eq!(recorder.len(), 1);

    assert_eq!(
        controller.best_match_for(600),
        Some(Resolution::new(512, 288))
    );
    assert_eq!(recorder.len(), 2);
}

#[test]
fn test_best_match_uses_target_bitrate() {
    let (mut controller, _) = create_test_controller(wide_config());

    controller.report_target_bitrate(7983);
    assert_eq!(controller.best_match(), Some(Resolution::new(1920, 1080)));
    assert!(controller.best_match().is_none());
}

#[test]
fn test_best_match_silently_updates_target() {
    let (mut controller, recorder) = create_test_controller(wide_config());

    controller.best_match_for(319);

    assert_eq!(controller.bitrate(), 319);
    assert!(recorder
        .events()
        .iter()
        .all(|event| !matches!(event, QualityEvent::TargetBitrateChanged { .. })));
}

#[test]
fn test_bitrate_beyond_table() {
    let (mut controller, _) = create_test_controller(wide_config());

    assert_eq!(
        controller.best_match_for(50_000),
        Some(Resolution::new(1920, 1080))
    );
    assert_eq!(controller.best_match_for(0), Some(Resolution::new(384, 216)));
}

#[test]
fn test_first_valley_strategy() {
    let mut config = QualityConfig::default();
    config.video.match_strategy = MatchStrategy::FirstValley;
    let (mut controller, _) = create_test_controller(config);

    assert_eq!(controller.match_strategy(), MatchStrategy::FirstValley);
    assert_eq!(
        controller.best_match_for(3000),
        Some(Resolution::new(1152, 648))
    );
    assert_eq!(
        controller.best_match_for(50_000),
        Some(Resolution::new(1920, 1080))
    );
    assert!(controller.best_match_for(50_000).is_none());
}

#[test]
fn test_dynamic_resolution_disabled() {
    let mut config = QualityConfig::default();
    config.video.use_dynamic_resolution = false;
    let (mut controller, recorder) = create_test_controller(config);

    assert!(controller.best_match_for(3548).is_none());
    assert!(controller.best_match_for(700).is_none());
    assert!(controller.current_resolution().is_unset());
    // The target still moves
    assert_eq!(controller.bitrate(), 700);
    assert!(recorder.is_empty());
}

#[test]
fn test_dynamic_disabled_keeps_initial_resolution() {
    let mut config = QualityConfig::default();
    config.video.use_dynamic_resolution = false;
    config.video.use_initial_resolution = true;
    config.video.initial_resolution = (1024, 576);
    let (mut controller, _) = create_test_controller(config);

    assert_eq!(
        controller.initial_best_match(),
        Some(Resolution::new(1024, 576))
    );
    assert!(controller.best_match_for(7983).is_none());
    assert_eq!(controller.current_resolution(), Resolution::new(1024, 576));
}

#[test]
fn test_initial_resolution_bypasses_table() {
    let mut config = QualityConfig::default();
    config.video.use_initial_resolution = true;
    config.video.initial_resolution = (1000, 500);
    let (mut controller, recorder) = create_test_controller(config);

    // Returned unconditionally, even when already current
    assert_eq!(
        controller.initial_best_match(),
        Some(Resolution::new(1000, 500))
    );
    assert_eq!(
        controller.initial_best_match(),
        Some(Resolution::new(1000, 500))
    );
    assert_eq!(controller.current_resolution(), Resolution::new(1000, 500));
    assert!(recorder.is_empty());
}

#[test]
fn test_initial_match_without_override() {
    let (mut controller, _) = create_test_controller(wide_config());

    controller.report_target_bitrate(886);
    assert_eq!(
        controller.initial_best_match(),
        Some(Resolution::new(640, 360))
    );
}

#[test]
fn test_custom_table() {
    let table = ResolutionTable::from_profiles(vec![
        ResolutionProfile::new(320, 180, 15, 30),
        ResolutionProfile::new(1280, 720, 15, 30),
    ])
    .unwrap();
    let recorder = RecordingObserver::new();
    let mut controller = QualityControllerBuilder::new()
        .table(table)
        .observer(recorder.clone())
        .build()
        .unwrap();

    assert_eq!(controller.table().family(), None);
    assert_eq!(
        controller.best_match_for(10_000),
        Some(Resolution::new(1280, 720))
    );
    assert_eq!(recorder.len(), 1);
}

#[test]
fn test_snapshot_serializes() {
    let (mut controller, _) = create_test_controller(wide_config());
    controller.report_frame_rate(45);
    controller.report_qp(38);
    controller.best_match_for(1738);

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.framerate, 30);
    assert_eq!(snapshot.target_framerate, 45);
    assert_eq!(snapshot.current_resolution, Resolution::new(896, 504));

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["adaptation"], "escalate");
    assert_eq!(json["aspect_family"], "wide");
    assert_eq!(json["current_resolution"]["width"], 896);
}

#[test]
fn test_shared_controller() {
    let (controller, recorder) = create_test_controller(wide_config());
    let shared = SharedQualityController::new(controller);
    let telemetry = shared.clone();

    let handle = std::thread::spawn(move || {
        for _ in 0..10 {
            telemetry.report_qp(45);
        }
    });
    handle.join().unwrap();

    assert!(shared.is_adaptation_required());
    assert_eq!(shared.adaptation(), Adaptation::Escalate);

    shared.report_target_bitrate(567);
    assert_eq!(shared.best_match(), Some(Resolution::new(512, 288)));
    assert_eq!(shared.current_resolution(), Resolution::new(512, 288));

    let flags = shared.with(|controller| {
        controller.reset();
        controller.adaptation_flags()
    });
    assert!(flags.up);
    assert_eq!(shared.snapshot().average_qp, None);
    assert_eq!(recorder.len(), 2);
}
