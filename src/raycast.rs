use glam::Vec3;

use crate::types::{Ray, WorldHit};

/// Environment raycast service (ray → nearest world hit).
pub trait EnvironmentRaycast {
    fn cast(&self, ray: &Ray) -> Option<WorldHit>;
}

impl<F> EnvironmentRaycast for F
where
    F: Fn(&Ray) -> Option<WorldHit>,
{
    fn cast(&self, ray: &Ray) -> Option<WorldHit> {
        self(ray)
    }
}

/// Single infinite plane, e.g. the floor or a table top.
#[derive(Debug, Clone, Copy)]
pub struct PlaneRaycaster {
    pub point: Vec3,
    pub normal: Vec3,
    pub max_distance: f32,
}

impl PlaneRaycaster {
    pub fn new(point: Vec3, normal: Vec3) -> PlaneRaycaster {
        PlaneRaycaster {
            point,
            normal: normal.normalize_or_zero(),
            max_distance: f32::INFINITY,
        }
    }

    /// Horizontal plane at `height` in a y-up world.
    pub fn floor(height: f32) -> PlaneRaycaster {
        Self::new(Vec3::new(0.0, height, 0.0), Vec3::Y)
    }

    pub fn with_max_distance(mut self, max_distance: f32) -> PlaneRaycaster {
        self.max_distance = max_distance;
        self
    }
}

impl EnvironmentRaycast for PlaneRaycaster {
    fn cast(&self, ray: &Ray) -> Option<WorldHit> {
        let denom = self.normal.dot(ray.direction);
        if denom.abs() < 1e-6 {
            return None;
        }
        let t = self.normal.dot(self.point - ray.origin) / denom;
        if t <= 0.0 || t > self.max_distance {
            return None;
        }
        Some(WorldHit {
            point: ray.at(t),
            distance: t,
        })
    }
}
