//! Detection → world anchor projection.
//!
//! A detection lives in the encoded image (origin top-left, y-down). The camera
//! API wants a pixel in the live camera resolution with origin bottom-left,
//! y-up. The encoded frame is a resized copy of the full camera frame, so the
//! center is normalized, flipped, then scaled back up before a ray is built.

use glam::Vec2;
use log::{debug, warn};

use crate::camera_model::CameraModel;
use crate::error::ProjectionSkip;
use crate::raycast::EnvironmentRaycast;
use crate::types::{RawDetection, WorldAnchor};

pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.84;

/// Normalizes an encoded-image point into `[0,1]²` with the vertical axis
/// flipped (`v = 1 - y / h`).
pub fn normalized_center(point: Vec2, encoded_size: (u32, u32)) -> Vec2 {
    let u = point.x / encoded_size.0 as f32;
    let v = 1.0 - point.y / encoded_size.1 as f32;
    Vec2::new(u, v)
}

/// Maps an encoded-image point to the nearest live camera pixel (y-up).
pub fn encoded_to_camera_pixel(
    point: Vec2,
    encoded_size: (u32, u32),
    camera_resolution: (u32, u32),
) -> Vec2 {
    let uv = normalized_center(point, encoded_size);
    Vec2::new(
        (uv.x * camera_resolution.0 as f32).round(),
        (uv.y * camera_resolution.1 as f32).round(),
    )
}

pub fn format_label(label: &str, confidence: f32) -> String {
    format!("{} {:.2}", label, confidence)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionProjector {
    min_confidence: f32,
    estimate_extent: bool,
}

impl Default for DetectionProjector {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CONFIDENCE)
    }
}

impl DetectionProjector {
    pub fn new(min_confidence: f32) -> DetectionProjector {
        DetectionProjector {
            min_confidence,
            estimate_extent: true,
        }
    }

    pub fn with_extent_estimation(mut self, enabled: bool) -> DetectionProjector {
        self.estimate_extent = enabled;
        self
    }

    pub fn min_confidence(&self) -> f32 {
        self.min_confidence
    }

    /// Inclusive gate; NaN never passes.
    pub fn passes_gate(&self, confidence: f32) -> bool {
        confidence >= self.min_confidence
    }

    pub fn project<M, R>(
        &self,
        detection: &RawDetection,
        encoded_size: (u32, u32),
        intrinsics: &M,
        raycast: &R,
    ) -> Result<WorldAnchor, ProjectionSkip>
    where
        M: CameraModel + ?Sized,
        R: EnvironmentRaycast + ?Sized,
    {
        if !self.passes_gate(detection.confidence) {
            debug!(
                "{} ({}) confidence {:.2} below {:.2}",
                detection.label, detection.class_id, detection.confidence, self.min_confidence
            );
            return Err(ProjectionSkip::BelowConfidence {
                confidence: detection.confidence,
                threshold: self.min_confidence,
            });
        }

        let resolution = intrinsics.resolution();
        let pixel = encoded_to_camera_pixel(detection.center(), encoded_size, resolution);
        let ray = intrinsics.pixel_to_ray(pixel);
        let Some(hit) = raycast.cast(&ray) else {
            warn!(
                "raycast missed for {} at pixel ({}, {})",
                detection.label,
                pixel.x,
                pixel.y
            );
            return Err(ProjectionSkip::RaycastMiss);
        };

        let extent = if self.estimate_extent && detection.width > 0.0 && detection.height > 0.0 {
            let depth = hit.point.distance(ray.origin);
            let tl = encoded_to_camera_pixel(detection.top_left(), encoded_size, resolution);
            let br = encoded_to_camera_pixel(detection.bottom_right(), encoded_size, resolution);
            let world_tl = intrinsics.pixel_to_ray(tl).at(depth);
            let world_br = intrinsics.pixel_to_ray(br).at(depth);
            Some(Vec2::new(
                (world_br.x - world_tl.x).abs(),
                (world_br.y - world_tl.y).abs(),
            ))
        } else {
            None
        };

        debug!(
            "{} anchored at {:?} ({:.2} m away)",
            detection.label, hit.point, hit.distance
        );
        Ok(WorldAnchor {
            position: hit.point,
            label_text: format_label(&detection.label, detection.confidence),
            extent,
            viewer: ray.origin,
        })
    }
}
