//! Sample → infer → project → update loop.
//!
//! Everything runs on the thread that owns the controller. A cycle is split in
//! two halves around the inference round-trip so the in-flight request is an
//! explicit value: `prepare_request` hands out at most one `PendingInference`
//! and `complete_request` consumes it. Every start and stop bumps the session
//! epoch; a response whose epoch no longer matches is dropped so a stop cannot
//! be undone by a late reply.

use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::{ConfigError, InferenceError, SampleError};
use crate::gateway::InferenceGateway;
use crate::projector::DetectionProjector;
use crate::raycast::EnvironmentRaycast;
use crate::registry::{MarkerRegistry, RenderHost};
use crate::sampler::{CameraSource, FrameSampler};
use crate::types::RawDetection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Streaming,
}

#[derive(Debug, Clone, Default)]
pub struct StreamingSession {
    active: bool,
    epoch: u64,
    in_flight: Option<u64>,
}

impl StreamingSession {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn state(&self) -> StreamState {
        if self.active {
            StreamState::Streaming
        } else {
            StreamState::Idle
        }
    }

    fn start(&mut self) -> bool {
        if self.active {
            return false;
        }
        self.active = true;
        self.epoch += 1;
        true
    }

    fn stop(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.epoch += 1;
        true
    }

    /// True while a reply tagged `epoch` may still be applied.
    fn accepts(&self, epoch: u64) -> bool {
        self.active && self.epoch == epoch
    }
}

/// The outstanding request of the current cycle.
#[derive(Debug)]
pub struct PendingInference<I> {
    pub epoch: u64,
    pub image_base64: String,
    pub encoded_size: (u32, u32),
    /// Camera intrinsics and pose at capture time.
    pub intrinsics: I,
}

#[derive(Debug)]
pub enum CycleOutcome {
    /// Streaming is off.
    Idle,
    /// Camera not ready, no frame, or a request still in flight.
    NotReady,
    SampleFailed(SampleError),
    Failed(InferenceError),
    /// Reply arrived after a stop or restart and was discarded.
    Stale,
    Applied { received: usize, anchored: usize },
}

pub struct StreamingController<C, G, R, H>
where
    C: CameraSource,
    G: InferenceGateway,
    R: EnvironmentRaycast,
    H: RenderHost,
{
    camera: C,
    gateway: G,
    raycaster: R,
    host: H,
    sampler: FrameSampler,
    projector: DetectionProjector,
    registry: MarkerRegistry,
    session: StreamingSession,
    model_id: String,
    cycle_interval: Duration,
    auto_start_delay: Option<Duration>,
    auto_start_at: Option<Instant>,
}

impl<C, G, R, H> StreamingController<C, G, R, H>
where
    C: CameraSource,
    G: InferenceGateway,
    R: EnvironmentRaycast,
    H: RenderHost,
{
    pub fn new(
        config: &PipelineConfig,
        camera: C,
        gateway: G,
        raycaster: R,
        mut host: H,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let registry = MarkerRegistry::new(&config.classes, config.auto_hide())?;
        registry.sync_host(&mut host);
        Ok(StreamingController {
            camera,
            gateway,
            raycaster,
            host,
            sampler: FrameSampler::new(config.encoded_size()),
            projector: DetectionProjector::new(config.min_confidence),
            registry,
            session: StreamingSession::default(),
            model_id: config.model_id.clone(),
            cycle_interval: config.cycle_interval(),
            auto_start_delay: config.auto_start_delay(),
            auto_start_at: None,
        })
    }

    pub fn is_active(&self) -> bool {
        self.session.is_active()
    }

    pub fn session(&self) -> &StreamingSession {
        &self.session
    }

    pub fn registry(&self) -> &MarkerRegistry {
        &self.registry
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn camera_mut(&mut self) -> &mut C {
        &mut self.camera
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }

    /// Returns `false` when already streaming.
    pub fn start(&mut self) -> bool {
        self.auto_start_at = None;
        if !self.session.start() {
            return false;
        }
        info!("streaming started (epoch {})", self.session.epoch());
        true
    }

    /// Returns `false` when already idle. Hides every marker.
    pub fn stop(&mut self) -> bool {
        self.auto_start_at = None;
        if !self.session.stop() {
            return false;
        }
        self.registry.clear_all(&mut self.host);
        info!("streaming stopped");
        true
    }

    pub fn toggle(&mut self) -> StreamState {
        if self.is_active() {
            self.stop();
        } else {
            self.start();
        }
        self.session.state()
    }

    /// Arms the configured auto-start delay from `now`. No-op without one.
    pub fn schedule_auto_start(&mut self, now: Instant) {
        if let Some(delay) = self.auto_start_delay {
            debug!("auto-start in {:?}", delay);
            self.auto_start_at = now.checked_add(delay);
        }
    }

    /// Fires a due auto-start and hides expired markers.
    pub fn tick(&mut self, now: Instant) -> usize {
        if self.auto_start_at.is_some_and(|at| now >= at) {
            self.start();
        }
        self.registry.tick(now, &mut self.host)
    }

    pub fn prepare_request(
        &mut self,
    ) -> Result<Option<PendingInference<C::Intrinsics>>, SampleError> {
        if !self.session.is_active() {
            return Ok(None);
        }
        if self.session.in_flight() {
            debug!("request still in flight, not sampling");
            return Ok(None);
        }
        let Some(frame) = self.sampler.sample(&self.camera)? else {
            return Ok(None);
        };
        let epoch = self.session.epoch();
        self.session.in_flight = Some(epoch);
        Ok(Some(PendingInference {
            epoch,
            image_base64: frame.image_base64,
            encoded_size: frame.encoded_size,
            intrinsics: self.camera.intrinsics(),
        }))
    }

    pub fn complete_request(
        &mut self,
        pending: PendingInference<C::Intrinsics>,
        result: Result<Vec<RawDetection>, InferenceError>,
        now: Instant,
    ) -> CycleOutcome {
        if self.session.in_flight == Some(pending.epoch) {
            self.session.in_flight = None;
        }
        let PendingInference {
            epoch,
            image_base64,
            encoded_size,
            intrinsics,
        } = pending;
        self.sampler.recycle(image_base64);

        if !self.session.accepts(epoch) {
            debug!("dropping reply from epoch {}", epoch);
            return CycleOutcome::Stale;
        }
        let detections = match result {
            Ok(detections) => detections,
            Err(e) => {
                warn!("inference failed: {}", e);
                return CycleOutcome::Failed(e);
            }
        };
        if detections.is_empty() {
            debug!("no predictions");
        }

        let received = detections.len();
        let mut anchored = 0;
        for detection in &detections {
            if !self.registry.contains(detection.class_id) {
                debug!(
                    "no marker assigned for class {} ({})",
                    detection.class_id, detection.label
                );
                continue;
            }
            match self
                .projector
                .project(detection, encoded_size, &intrinsics, &self.raycaster)
            {
                Ok(anchor) => {
                    if self
                        .registry
                        .update(detection.class_id, &anchor, now, &mut self.host)
                    {
                        anchored += 1;
                    }
                }
                Err(skip) => debug!("{} skipped: {}", detection.label, skip),
            }
        }
        CycleOutcome::Applied { received, anchored }
    }

    /// One full cycle: sample, infer, project, update.
    pub fn run_cycle(&mut self, now: Instant) -> CycleOutcome {
        if !self.session.is_active() {
            return CycleOutcome::Idle;
        }
        let pending = match self.prepare_request() {
            Ok(Some(pending)) => pending,
            Ok(None) => return CycleOutcome::NotReady,
            Err(e) => {
                warn!("failed to sample camera frame: {}", e);
                return CycleOutcome::SampleFailed(e);
            }
        };
        let result = self.gateway.infer(&self.model_id, &pending.image_base64);
        self.complete_request(pending, result, now)
    }

    /// Cycles at the configured cadence while streaming. Returns the number of
    /// cycles run.
    pub fn run(&mut self, max_cycles: Option<usize>) -> usize {
        let mut cycles = 0;
        while self.is_active() && max_cycles.is_none_or(|max| cycles < max) {
            let started = Instant::now();
            self.tick(started);
            let outcome = self.run_cycle(Instant::now());
            debug!("cycle {}: {:?}", cycles, outcome);
            cycles += 1;
            if let Some(rest) = self.cycle_interval.checked_sub(started.elapsed()) {
                std::thread::sleep(rest);
            }
        }
        self.tick(Instant::now());
        cycles
    }
}
