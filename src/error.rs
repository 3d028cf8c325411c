use thiserror::Error;

/// Startup problems. The controller refuses to exist while any of these hold.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("class list is empty")]
    EmptyClassList,
    #[error("class id {class_id} is used by both {first:?} and {second:?}")]
    DuplicateClassId {
        class_id: i32,
        first: String,
        second: String,
    },
    #[error("model id is missing")]
    MissingModelId,
    #[error("service endpoint is missing")]
    MissingEndpoint,
    #[error("{field} is out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
    #[error("failed to read {path:?}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path:?}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Per-cycle inference failure. Logged and treated as an empty detection set.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("inference service answered {code}: {body}")]
    Status { code: u16, body: String },
    #[error("malformed inference payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("no recorded response left")]
    Exhausted,
}

/// Failure while turning the latest camera frame into a request payload.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("camera frame is empty")]
    EmptyFrame,
    #[error(transparent)]
    Buffer(#[from] fast_image_resize::ImageBufferError),
    #[error(transparent)]
    Resize(#[from] fast_image_resize::ResizeError),
    #[error(transparent)]
    Encode(#[from] image::ImageError),
}

/// Why a detection produced no anchor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionSkip {
    #[error("confidence {confidence:.2} below threshold {threshold:.2}")]
    BelowConfidence { confidence: f32, threshold: f32 },
    #[error("environment raycast missed")]
    RaycastMiss,
}
