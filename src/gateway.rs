//! Inference service boundary.
//!
//! Request and response shapes follow the object-detection endpoint of a
//! Roboflow-compatible inference server (`POST /infer/object_detection`).

use std::collections::VecDeque;

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::config::ServiceConfig;
use crate::error::{ConfigError, InferenceError};
use crate::io::object_from_json;
use crate::types::RawDetection;

pub const OBJECT_DETECTION_PATH: &str = "/infer/object_detection";

/// Sends an encoded frame to a detector.
pub trait InferenceGateway {
    fn infer(
        &mut self,
        model_id: &str,
        image_base64: &str,
    ) -> Result<Vec<RawDetection>, InferenceError>;
}

#[derive(Debug, Serialize)]
pub struct InferenceRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<&'a str>,
    pub model_id: &'a str,
    pub image: RequestImage<'a>,
}

#[derive(Debug, Serialize)]
pub struct RequestImage<'a> {
    #[serde(rename = "type")]
    pub kind: &'a str,
    pub value: &'a str,
}

impl<'a> InferenceRequest<'a> {
    pub fn base64(api_key: Option<&'a str>, model_id: &'a str, image_base64: &'a str) -> Self {
        InferenceRequest {
            api_key,
            model_id,
            image: RequestImage {
                kind: "base64",
                value: image_base64,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    #[serde(rename = "class")]
    pub class_name: String,
    pub class_id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection_id: Option<String>,
}

impl From<Prediction> for RawDetection {
    fn from(p: Prediction) -> RawDetection {
        RawDetection {
            class_id: p.class_id,
            label: p.class_name,
            confidence: p.confidence,
            center_x: p.x,
            center_y: p.y,
            width: p.width,
            height: p.height,
            detection_id: p.detection_id,
        }
    }
}

impl From<RawDetection> for Prediction {
    fn from(d: RawDetection) -> Prediction {
        Prediction {
            x: d.center_x,
            y: d.center_y,
            width: d.width,
            height: d.height,
            confidence: d.confidence,
            class_name: d.label,
            class_id: d.class_id,
            detection_id: d.detection_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InferenceResponse {
    #[serde(default)]
    pub inference_id: Option<String>,
    #[serde(default)]
    pub time: Option<f64>,
    #[serde(default)]
    pub image: Option<ImageSize>,
    #[serde(default)]
    pub predictions: Vec<Prediction>,
}

impl InferenceResponse {
    pub fn into_detections(self) -> Vec<RawDetection> {
        self.predictions.into_iter().map(RawDetection::from).collect()
    }
}

pub fn parse_response(body: &str) -> Result<Vec<RawDetection>, InferenceError> {
    let response: InferenceResponse = serde_json::from_str(body)?;
    Ok(response.into_detections())
}

/// Blocking HTTP client for a local or hosted inference server.
pub struct HttpInferenceGateway {
    agent: ureq::Agent,
    url: String,
    api_key: Option<String>,
}

impl HttpInferenceGateway {
    pub fn new(service: &ServiceConfig) -> HttpInferenceGateway {
        let agent = ureq::AgentBuilder::new().timeout(service.timeout()).build();
        let url = format!(
            "{}{}",
            service.base_url().trim_end_matches('/'),
            OBJECT_DETECTION_PATH
        );
        HttpInferenceGateway {
            agent,
            url,
            api_key: service.api_key.clone(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl InferenceGateway for HttpInferenceGateway {
    fn infer(
        &mut self,
        model_id: &str,
        image_base64: &str,
    ) -> Result<Vec<RawDetection>, InferenceError> {
        let request = InferenceRequest::base64(self.api_key.as_deref(), model_id, image_base64);
        let payload = serde_json::to_string(&request)?;
        trace!("POST {} ({} bytes)", self.url, payload.len());

        let response = match self
            .agent
            .post(&self.url)
            .set("Content-Type", "application/json")
            .send_string(&payload)
        {
            Ok(response) => response,
            Err(ureq::Error::Status(code, response)) => {
                return Err(InferenceError::Status {
                    code,
                    body: response.into_string().unwrap_or_default(),
                });
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(InferenceError::Transport(transport.to_string()));
            }
        };
        let body = response
            .into_string()
            .map_err(|e| InferenceError::Transport(e.to_string()))?;
        let detections = parse_response(&body)?;
        debug!("{} predictions from {}", detections.len(), model_id);
        Ok(detections)
    }
}

/// One recorded round-trip outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordedReply {
    Response(InferenceResponse),
    Error(String),
}

/// Plays back recorded replies in order, then reports `Exhausted`.
#[derive(Debug, Default)]
pub struct ReplayGateway {
    replies: VecDeque<RecordedReply>,
    calls: usize,
    last_model_id: Option<String>,
}

impl ReplayGateway {
    pub fn new(replies: Vec<RecordedReply>) -> ReplayGateway {
        ReplayGateway {
            replies: replies.into(),
            ..Default::default()
        }
    }

    pub fn from_detections(batches: Vec<Vec<RawDetection>>) -> ReplayGateway {
        let replies = batches
            .into_iter()
            .map(|batch| {
                RecordedReply::Response(InferenceResponse {
                    predictions: batch.into_iter().map(Prediction::from).collect(),
                    ..Default::default()
                })
            })
            .collect();
        Self::new(replies)
    }

    pub fn load(path: &str) -> Result<ReplayGateway, ConfigError> {
        let replies: Vec<RecordedReply> = object_from_json(path)?;
        Ok(Self::new(replies))
    }

    pub fn remaining(&self) -> usize {
        self.replies.len()
    }

    /// Number of `infer` calls so far, including exhausted ones.
    pub fn calls(&self) -> usize {
        self.calls
    }

    pub fn last_model_id(&self) -> Option<&str> {
        self.last_model_id.as_deref()
    }

    pub fn push(&mut self, reply: RecordedReply) {
        self.replies.push_back(reply);
    }
}

impl InferenceGateway for ReplayGateway {
    fn infer(
        &mut self,
        model_id: &str,
        _image_base64: &str,
    ) -> Result<Vec<RawDetection>, InferenceError> {
        self.calls += 1;
        self.last_model_id = Some(model_id.to_string());
        match self.replies.pop_front() {
            Some(RecordedReply::Response(response)) => Ok(response.into_detections()),
            Some(RecordedReply::Error(message)) => Err(InferenceError::Transport(message)),
            None => Err(InferenceError::Exhausted),
        }
    }
}
