pub mod camera_model;
pub mod config;
pub mod controller;
pub mod error;
pub mod gateway;
pub mod io;
pub mod projector;
pub mod raycast;
pub mod registry;
pub mod sampler;
pub mod types;
pub mod visualization;

pub use camera_model::{CameraModel, PinholeCamera};
pub use config::{PipelineConfig, ServiceConfig, ServiceMode};
pub use controller::{CycleOutcome, PendingInference, StreamState, StreamingController};
pub use error::{ConfigError, InferenceError, ProjectionSkip, SampleError};
pub use gateway::{HttpInferenceGateway, InferenceGateway, ReplayGateway};
pub use projector::DetectionProjector;
pub use raycast::{EnvironmentRaycast, PlaneRaycaster};
pub use registry::{MarkerRegistry, RenderHost, TrackedMarker};
pub use sampler::{CameraSource, FrameSampler, StillImageSource};
pub use types::{ClassSpec, RawDetection, Ray, WorldAnchor, WorldHit};
