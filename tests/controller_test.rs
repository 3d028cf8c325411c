use std::cell::Cell;
use std::time::{Duration, Instant};

use glam::{Vec2, Vec3};
use passthrough_anchors::gateway::RecordedReply;
use passthrough_anchors::visualization::RecordingRenderHost;
use passthrough_anchors::{
    ClassSpec, ConfigError, CycleOutcome, InferenceError, PinholeCamera, PipelineConfig,
    PlaneRaycaster, RawDetection, Ray, ReplayGateway, StillImageSource, StreamState,
    StreamingController,
};

type Controller =
    StreamingController<StillImageSource, ReplayGateway, PlaneRaycaster, RecordingRenderHost>;

fn config() -> PipelineConfig {
    PipelineConfig {
        model_id: "bears/2".to_string(),
        classes: vec![ClassSpec::new("bear", 0), ClassSpec::new("panda", 1)],
        encoded_size: [32, 32],
        cycle_interval_secs: 0.001,
        ..Default::default()
    }
}

fn bear(confidence: f32) -> RawDetection {
    RawDetection::new(0, "bear", confidence, Vec2::new(16.0, 16.0), Vec2::new(8.0, 8.0))
}

fn panda(confidence: f32) -> RawDetection {
    RawDetection::new(1, "panda", confidence, Vec2::new(8.0, 24.0), Vec2::new(4.0, 4.0))
}

/// Camera at the origin looking down +z at a wall 2 m away.
fn controller_with(config: &PipelineConfig, gateway: ReplayGateway) -> Controller {
    let camera = PinholeCamera::new(&[40.0, 40.0, 32.0, 24.0], 64, 48);
    StreamingController::new(
        config,
        StillImageSource::blank(camera),
        gateway,
        PlaneRaycaster::new(Vec3::new(0.0, 0.0, 2.0), Vec3::Z),
        RecordingRenderHost::new(),
    )
    .unwrap()
}

fn controller(batches: Vec<Vec<RawDetection>>) -> Controller {
    controller_with(&config(), ReplayGateway::from_detections(batches))
}

#[test]
fn test_refuses_invalid_config() {
    let mut bad = config();
    bad.classes.clear();
    let result = StreamingController::new(
        &bad,
        StillImageSource::blank(PinholeCamera::new(&[40.0, 40.0, 32.0, 24.0], 64, 48)),
        ReplayGateway::default(),
        PlaneRaycaster::floor(0.0),
        RecordingRenderHost::new(),
    );
    assert!(matches!(result, Err(ConfigError::EmptyClassList)));
}

#[test]
fn test_start_and_stop_are_idempotent() {
    let mut c = controller(vec![]);
    assert_eq!(c.session().state(), StreamState::Idle);
    assert!(!c.stop());

    assert!(c.start());
    let epoch = c.session().epoch();
    assert!(!c.start());
    assert_eq!(c.session().epoch(), epoch);
    assert!(c.is_active());

    assert!(c.stop());
    assert!(!c.stop());
    assert!(!c.is_active());
    assert_eq!(c.toggle(), StreamState::Streaming);
    assert_eq!(c.toggle(), StreamState::Idle);
}

#[test]
fn test_idle_cycle_does_nothing() {
    let mut c = controller(vec![vec![bear(0.9)]]);
    assert!(matches!(c.run_cycle(Instant::now()), CycleOutcome::Idle));
    assert_eq!(c.gateway().calls(), 0);
}

#[test]
fn test_cycle_places_confident_known_detections() {
    let mut c = controller(vec![vec![bear(0.9), panda(0.5)]]);
    c.start();
    let now = Instant::now();

    match c.run_cycle(now) {
        CycleOutcome::Applied { received, anchored } => {
            assert_eq!(received, 2);
            assert_eq!(anchored, 1);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(c.gateway().last_model_id(), Some("bears/2"));

    let marker = c.registry().get(0).unwrap();
    assert!(marker.visible);
    assert_eq!(marker.label_text, "bear 0.90");
    // box center is the image center, so the ray is the optical axis
    assert!((marker.position - Vec3::new(0.0, 0.0, 2.0)).length() < 1e-4);
    assert!(!c.registry().get(1).unwrap().visible);
    assert_eq!(c.host().visible_ids(), vec![0]);
}

#[test]
fn test_unknown_class_is_ignored() {
    let stranger = RawDetection::new(9, "wolf", 0.99, Vec2::new(16.0, 16.0), Vec2::ONE);
    let mut c = controller(vec![vec![stranger]]);
    c.start();
    match c.run_cycle(Instant::now()) {
        CycleOutcome::Applied { received, anchored } => {
            assert_eq!(received, 1);
            assert_eq!(anchored, 0);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(c.registry().visible_count(), 0);
}

#[test]
fn test_gated_and_unknown_detections_cost_no_raycast() {
    let casts = Cell::new(0);
    let wall = PlaneRaycaster::new(Vec3::new(0.0, 0.0, 2.0), Vec3::Z);
    let counting = |ray: &Ray| {
        casts.set(casts.get() + 1);
        passthrough_anchors::EnvironmentRaycast::cast(&wall, ray)
    };
    let stranger = RawDetection::new(9, "wolf", 0.99, Vec2::new(16.0, 16.0), Vec2::ONE);
    let gateway =
        ReplayGateway::from_detections(vec![vec![panda(0.5), stranger, panda(0.84)]]);
    let mut c = StreamingController::new(
        &config(),
        StillImageSource::blank(PinholeCamera::new(&[40.0, 40.0, 32.0, 24.0], 64, 48)),
        gateway,
        counting,
        RecordingRenderHost::new(),
    )
    .unwrap();
    c.start();

    match c.run_cycle(Instant::now()) {
        CycleOutcome::Applied { received, anchored } => {
            assert_eq!(received, 3);
            assert_eq!(anchored, 1);
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    // extent corners go through the camera model, only the center is raycast
    assert_eq!(casts.get(), 1);
    assert_eq!(c.registry().get(1).unwrap().label_text, "panda 0.84");
}

#[test]
fn test_empty_reply_is_applied_without_changes() {
    let mut c = controller(vec![vec![]]);
    c.start();
    assert!(matches!(
        c.run_cycle(Instant::now()),
        CycleOutcome::Applied {
            received: 0,
            anchored: 0
        }
    ));
}

#[test]
fn test_only_one_request_in_flight() {
    let mut c = controller(vec![]);
    c.start();

    let pending = c.prepare_request().unwrap().expect("camera is ready");
    assert!(c.session().in_flight());
    assert!(c.prepare_request().unwrap().is_none());
    assert!(matches!(c.run_cycle(Instant::now()), CycleOutcome::NotReady));

    c.complete_request(pending, Ok(vec![]), Instant::now());
    assert!(!c.session().in_flight());
    assert!(c.prepare_request().unwrap().is_some());
}

#[test]
fn test_reply_after_stop_is_dropped() {
    let mut c = controller(vec![]);
    c.start();
    let pending = c.prepare_request().unwrap().unwrap();

    c.stop();
    let outcome = c.complete_request(pending, Ok(vec![bear(0.95)]), Instant::now());

    assert!(matches!(outcome, CycleOutcome::Stale));
    assert_eq!(c.registry().visible_count(), 0);
    assert!(c.host().visible_ids().is_empty());
}

#[test]
fn test_reply_from_previous_session_is_dropped_after_restart() {
    let mut c = controller(vec![]);
    c.start();
    let old = c.prepare_request().unwrap().unwrap();
    c.stop();
    c.start();

    // the old request still occupies the slot until it completes
    assert!(c.prepare_request().unwrap().is_none());
    let outcome = c.complete_request(old, Ok(vec![bear(0.95)]), Instant::now());
    assert!(matches!(outcome, CycleOutcome::Stale));
    assert_eq!(c.registry().visible_count(), 0);

    let fresh = c.prepare_request().unwrap().unwrap();
    let outcome = c.complete_request(fresh, Ok(vec![bear(0.95)]), Instant::now());
    assert!(matches!(outcome, CycleOutcome::Applied { anchored: 1, .. }));
}

#[test]
fn test_stop_hides_markers_and_restart_starts_clean() {
    let mut c = controller(vec![vec![bear(0.9), panda(0.9)], vec![]]);
    c.start();
    c.run_cycle(Instant::now());
    assert_eq!(c.registry().visible_count(), 2);

    c.stop();
    assert_eq!(c.registry().visible_count(), 0);
    assert!(c.host().visible_ids().is_empty());

    c.start();
    c.run_cycle(Instant::now());
    assert_eq!(c.registry().visible_count(), 0);
}

#[test]
fn test_inference_failure_keeps_streaming() {
    let mut gateway = ReplayGateway::new(vec![RecordedReply::Error(
        "connection refused".to_string(),
    )]);
    gateway.push(RecordedReply::Response(Default::default()));
    let mut c = controller_with(&config(), gateway);
    c.start();

    match c.run_cycle(Instant::now()) {
        CycleOutcome::Failed(InferenceError::Transport(message)) => {
            assert_eq!(message, "connection refused")
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(c.is_active());
    assert!(!c.session().in_flight());
    assert!(matches!(
        c.run_cycle(Instant::now()),
        CycleOutcome::Applied { .. }
    ));
    assert!(matches!(
        c.run_cycle(Instant::now()),
        CycleOutcome::Failed(InferenceError::Exhausted)
    ));
    assert_eq!(c.gateway().calls(), 3);
}

#[test]
fn test_camera_not_ready_skips_the_cycle() {
    let mut c = controller(vec![vec![bear(0.9)]]);
    c.start();
    c.camera_mut().ready = false;
    assert!(matches!(c.run_cycle(Instant::now()), CycleOutcome::NotReady));
    assert_eq!(c.gateway().calls(), 0);
    assert!(!c.session().in_flight());

    c.camera_mut().ready = true;
    assert!(matches!(
        c.run_cycle(Instant::now()),
        CycleOutcome::Applied { anchored: 1, .. }
    ));
}

#[test]
fn test_markers_expire_through_tick() {
    let mut c = controller(vec![vec![bear(0.9)]]);
    c.start();
    let t0 = Instant::now();
    c.run_cycle(t0);
    assert_eq!(c.tick(t0 + Duration::from_secs(1)), 0);
    assert_eq!(c.tick(t0 + Duration::from_secs(2)), 1);
    assert!(c.host().visible_ids().is_empty());
    assert!(c.is_active());
}

#[test]
fn test_intrinsics_are_captured_with_the_frame() {
    let mut c = controller(vec![]);
    c.start();
    let pending = c.prepare_request().unwrap().unwrap();
    assert_eq!(pending.encoded_size, (32, 32));
    assert_eq!(pending.intrinsics.width, 64);

    // the headset moves while the request is out
    c.camera_mut().camera.set_pose(nalgebra::Isometry3::translation(5.0, 0.0, 0.0));
    c.complete_request(pending, Ok(vec![bear(0.9)]), Instant::now());

    let position = c.registry().get(0).unwrap().position;
    assert!((position - Vec3::new(0.0, 0.0, 2.0)).length() < 1e-4);
}

#[test]
fn test_auto_start_fires_after_delay() {
    let mut config = config();
    config.auto_start_delay_secs = Some(2.0);
    let mut c = controller_with(&config, ReplayGateway::default());
    let t0 = Instant::now();

    c.schedule_auto_start(t0);
    c.tick(t0 + Duration::from_secs(1));
    assert!(!c.is_active());
    c.tick(t0 + Duration::from_secs(2));
    assert!(c.is_active());
}

#[test]
fn test_manual_stop_cancels_pending_auto_start() {
    let mut config = config();
    config.auto_start_delay_secs = Some(1.0);
    let mut c = controller_with(&config, ReplayGateway::default());
    let t0 = Instant::now();

    c.schedule_auto_start(t0);
    c.stop();
    c.tick(t0 + Duration::from_secs(5));
    assert!(!c.is_active());
}

#[test]
fn test_run_stops_after_max_cycles() {
    let mut c = controller(vec![vec![bear(0.9)], vec![panda(0.9)], vec![]]);
    c.start();
    assert_eq!(c.run(Some(3)), 3);
    assert_eq!(c.gateway().calls(), 3);
    assert_eq!(c.gateway().remaining(), 0);
    assert_eq!(c.registry().visible_count(), 2);
}

#[test]
fn test_run_returns_immediately_when_idle() {
    let mut c = controller(vec![vec![bear(0.9)]]);
    assert_eq!(c.run(Some(5)), 0);
    assert_eq!(c.gateway().calls(), 0);
}
