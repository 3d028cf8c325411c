use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::io::object_from_json;
use crate::types::ClassSpec;

pub const LOCAL_ENDPOINT: &str = "http://localhost:9001";
pub const HOSTED_ENDPOINT: &str = "https://detect.roboflow.com";

/// Upper bound for every configured duration (one day).
pub const MAX_DURATION_SECS: f64 = 86_400.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceMode {
    /// Self-hosted inference server on the local network.
    #[default]
    Local,
    Hosted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub mode: ServiceMode,
    /// Overrides the mode's default base URL.
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: f64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            mode: ServiceMode::Local,
            endpoint: None,
            api_key: None,
            timeout_secs: 10.0,
        }
    }
}

impl ServiceConfig {
    pub fn base_url(&self) -> &str {
        match (&self.endpoint, self.mode) {
            (Some(url), _) => url.as_str(),
            (None, ServiceMode::Local) => LOCAL_ENDPOINT,
            (None, ServiceMode::Hosted) => HOSTED_ENDPOINT,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub min_confidence: f32,
    pub auto_hide_secs: f64,
    /// Width and height of the frame sent to the detector.
    pub encoded_size: [u32; 2],
    pub cycle_interval_secs: f64,
    pub model_id: String,
    pub service: ServiceConfig,
    pub classes: Vec<ClassSpec>,
    pub auto_start_delay_secs: Option<f64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.84,
            auto_hide_secs: 2.0,
            encoded_size: [512, 512],
            cycle_interval_secs: 0.1,
            model_id: String::new(),
            service: ServiceConfig::default(),
            classes: Vec::new(),
            auto_start_delay_secs: None,
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &str) -> Result<PipelineConfig, ConfigError> {
        let config: PipelineConfig = object_from_json(path)?;
        config.validate()?;
        log::info!(
            "loaded {} with {} classes, model {}",
            path,
            config.classes.len(),
            config.model_id
        );
        Ok(config)
    }

    pub fn auto_hide(&self) -> Duration {
        Duration::from_secs_f64(self.auto_hide_secs)
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs_f64(self.cycle_interval_secs)
    }

    pub fn auto_start_delay(&self) -> Option<Duration> {
        self.auto_start_delay_secs.map(Duration::from_secs_f64)
    }

    pub fn encoded_size(&self) -> (u32, u32) {
        (self.encoded_size[0], self.encoded_size[1])
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_classes(&self.classes)?;
        if self.model_id.trim().is_empty() {
            return Err(ConfigError::MissingModelId);
        }
        if self.service.base_url().trim().is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConfigError::OutOfRange {
                field: "min_confidence",
                value: self.min_confidence as f64,
            });
        }
        positive("auto_hide_secs", self.auto_hide_secs)?;
        positive("cycle_interval_secs", self.cycle_interval_secs)?;
        positive("service.timeout_secs", self.service.timeout_secs)?;
        if let Some(delay) = self.auto_start_delay_secs {
            if !(0.0..=MAX_DURATION_SECS).contains(&delay) {
                return Err(ConfigError::OutOfRange {
                    field: "auto_start_delay_secs",
                    value: delay,
                });
            }
        }
        if self.encoded_size.contains(&0) {
            return Err(ConfigError::OutOfRange {
                field: "encoded_size",
                value: 0.0,
            });
        }
        Ok(())
    }
}

/// Accepts `(0, MAX_DURATION_SECS]`; NaN and infinities fail the range check.
fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value <= MAX_DURATION_SECS {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { field, value })
    }
}

/// Rejects an empty class list and colliding class ids.
pub fn validate_classes(classes: &[ClassSpec]) -> Result<(), ConfigError> {
    if classes.is_empty() {
        return Err(ConfigError::EmptyClassList);
    }
    let mut seen: HashMap<i32, &str> = HashMap::with_capacity(classes.len());
    for class in classes {
        if let Some(first) = seen.insert(class.class_id, &class.label) {
            return Err(ConfigError::DuplicateClassId {
                class_id: class.class_id,
                first: first.to_string(),
                second: class.label.clone(),
            });
        }
    }
    Ok(())
}
