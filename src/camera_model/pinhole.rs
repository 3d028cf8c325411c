use glam::{Vec2, Vec3};
use nalgebra as na;
use serde::{Deserialize, Serialize};

use super::generic::CameraModel;
use crate::types::Ray;

/// Undistorted pinhole camera with a camera-to-world pose.
///
/// The camera frame follows the usual vision convention (x right, y down,
/// z forward); `pixel_to_ray` converts the y-up pixel it receives first.
#[derive(Debug, Clone, PartialEq)]
pub struct PinholeCamera {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
    pub width: u32,
    pub height: u32,
    pub camera_to_world: na::Isometry3<f32>,
}

/// Serialized form, `[fx, fy, cx, cy]` plus the image size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinholeParams {
    pub params: [f32; 4],
    pub width: u32,
    pub height: u32,
}

impl PinholeCamera {
    pub fn new(params: &[f32; 4], width: u32, height: u32) -> PinholeCamera {
        PinholeCamera {
            fx: params[0],
            fy: params[1],
            cx: params[2],
            cy: params[3],
            width,
            height,
            camera_to_world: na::Isometry3::identity(),
        }
    }

    /// Centered principal point with a square focal length derived from the
    /// horizontal field of view.
    pub fn from_fov(horizontal_fov_rad: f32, width: u32, height: u32) -> PinholeCamera {
        let f = width as f32 * 0.5 / (horizontal_fov_rad * 0.5).tan();
        Self::new(
            &[f, f, width as f32 * 0.5, height as f32 * 0.5],
            width,
            height,
        )
    }

    pub fn from_params(p: &PinholeParams) -> PinholeCamera {
        Self::new(&p.params, p.width, p.height)
    }

    pub fn with_pose(mut self, camera_to_world: na::Isometry3<f32>) -> PinholeCamera {
        self.camera_to_world = camera_to_world;
        self
    }

    pub fn set_pose(&mut self, camera_to_world: na::Isometry3<f32>) {
        self.camera_to_world = camera_to_world;
    }

    fn unproject_one(&self, pixel: Vec2) -> na::Vector3<f32> {
        let row = self.height as f32 - pixel.y;
        let mx = (pixel.x - self.cx) / self.fx;
        let my = (row - self.cy) / self.fy;
        na::Vector3::new(mx, my, 1.0)
    }

    /// Inverse of `pixel_to_ray`: world point to y-up pixel, `None` behind the
    /// camera.
    pub fn project_one(&self, world: Vec3) -> Option<Vec2> {
        let p = self
            .camera_to_world
            .inverse_transform_point(&na::Point3::new(world.x, world.y, world.z));
        if p.z <= f32::EPSILON {
            return None;
        }
        let col = self.fx * p.x / p.z + self.cx;
        let row = self.fy * p.y / p.z + self.cy;
        Some(Vec2::new(col, self.height as f32 - row))
    }
}

impl CameraModel for PinholeCamera {
    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn pixel_to_ray(&self, pixel: Vec2) -> Ray {
        let dir = self.camera_to_world.rotation * self.unproject_one(pixel);
        let origin = self.camera_to_world.translation.vector;
        Ray::new(
            Vec3::new(origin.x, origin.y, origin.z),
            Vec3::new(dir.x, dir.y, dir.z),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_point_is_optical_axis() {
        let cam = PinholeCamera::new(&[500.0, 500.0, 320.0, 240.0], 640, 480);
        let ray = cam.pixel_to_ray(Vec2::new(320.0, 240.0));
        assert!((ray.direction - Vec3::Z).length() < 1e-6);
        assert!(ray.origin.length() < 1e-6);
    }

    #[test]
    fn upper_pixels_point_up_in_camera_frame() {
        let cam = PinholeCamera::new(&[500.0, 500.0, 320.0, 240.0], 640, 480);
        // y-up pixel above the center maps to a row above the principal point,
        // which is negative y in the y-down camera frame
        let ray = cam.pixel_to_ray(Vec2::new(320.0, 400.0));
        assert!(ray.direction.y < 0.0);
    }

    #[test]
    fn project_inverts_unproject() {
        let pose = na::Isometry3::new(
            na::Vector3::new(0.5, 1.6, -0.2),
            na::Vector3::new(0.1, -0.3, 0.05),
        );
        let cam = PinholeCamera::new(&[610.0, 605.0, 640.0, 480.0], 1280, 960).with_pose(pose);
        let pixel = Vec2::new(200.0, 700.0);
        let ray = cam.pixel_to_ray(pixel);
        let back = cam.project_one(ray.at(3.0)).unwrap();
        assert!((back - pixel).length() < 1e-2, "got {back:?}");
    }
}
