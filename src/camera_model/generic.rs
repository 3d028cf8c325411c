use glam::Vec2;

use crate::types::Ray;

/// Live camera intrinsics as seen by the projector.
///
/// Pixels use the camera API convention: origin bottom-left, y-up, in the live
/// camera resolution (not the encoded image's).
pub trait CameraModel {
    fn resolution(&self) -> (u32, u32);

    /// World-space ray from the camera's current pose through `pixel`.
    fn pixel_to_ray(&self, pixel: Vec2) -> Ray;
}
