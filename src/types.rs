use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// One detector output in encoded-image pixels (origin top-left, y-down).
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub class_id: i32,
    pub label: String,
    pub confidence: f32,
    pub center_x: f32,
    pub center_y: f32,
    pub width: f32,
    pub height: f32,
    pub detection_id: Option<String>,
}

impl RawDetection {
    pub fn new(class_id: i32, label: &str, confidence: f32, center: Vec2, size: Vec2) -> Self {
        RawDetection {
            class_id,
            label: label.to_string(),
            confidence,
            center_x: center.x,
            center_y: center.y,
            width: size.x,
            height: size.y,
            detection_id: None,
        }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.center_x, self.center_y)
    }

    pub fn top_left(&self) -> Vec2 {
        Vec2::new(
            self.center_x - self.width * 0.5,
            self.center_y - self.height * 0.5,
        )
    }

    pub fn bottom_right(&self) -> Vec2 {
        Vec2::new(
            self.center_x + self.width * 0.5,
            self.center_y + self.height * 0.5,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// unit length
    pub direction: Vec3,
}

impl Ray {
    /// Builds a ray, normalizing `direction`.
    pub fn new(origin: Vec3, direction: Vec3) -> Ray {
        Ray {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldHit {
    pub point: Vec3,
    pub distance: f32,
}

/// World-space result of projecting one detection.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldAnchor {
    pub position: Vec3,
    pub label_text: String,
    /// Estimated world width/height of the bounding box at the hit depth.
    pub extent: Option<Vec2>,
    /// Origin of the camera ray, for hosts that turn labels toward the viewer.
    pub viewer: Vec3,
}

/// A known object class; one marker is pooled per entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSpec {
    pub label: String,
    pub class_id: i32,
}

impl ClassSpec {
    pub fn new(label: &str, class_id: i32) -> ClassSpec {
        ClassSpec {
            label: label.to_string(),
            class_id,
        }
    }
}
