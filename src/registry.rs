//! Fixed pool of one marker per known class.
//!
//! Markers are allocated once from the validated class list and never grown,
//! so a noisy detector cannot make the pool allocate. Each marker carries its
//! own expiry deadline; `update` re-arms it, `tick` hides markers whose
//! deadline has passed and `clear_all` hides everything.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use glam::{Vec2, Vec3};
use log::{debug, trace};

use crate::config::validate_classes;
use crate::error::ConfigError;
use crate::types::{ClassSpec, WorldAnchor};

/// Rendering side of a marker. The host never owns marker identity; it only
/// receives state for the class id it was given.
pub trait RenderHost {
    fn set_marker_transform(&mut self, class_id: i32, position: Vec3);
    fn set_marker_visible(&mut self, class_id: i32, visible: bool);
    fn set_marker_label(&mut self, class_id: i32, text: &str);
    fn set_marker_extent(&mut self, _class_id: i32, _extent: Vec2) {}
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackedMarker {
    pub class_id: i32,
    pub label: String,
    pub label_text: String,
    pub visible: bool,
    pub last_seen_at: Option<Instant>,
    /// Armed auto-hide deadline; `None` when disarmed.
    pub expires_at: Option<Instant>,
    pub position: Vec3,
    pub extent: Option<Vec2>,
}

impl TrackedMarker {
    fn new(class: &ClassSpec) -> TrackedMarker {
        TrackedMarker {
            class_id: class.class_id,
            label: class.label.clone(),
            label_text: class.label.clone(),
            visible: false,
            last_seen_at: None,
            expires_at: None,
            position: Vec3::ZERO,
            extent: None,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

pub struct MarkerRegistry {
    markers: HashMap<i32, TrackedMarker>,
    /// class ids in configuration order
    order: Vec<i32>,
    auto_hide: Duration,
}

impl MarkerRegistry {
    pub fn new(classes: &[ClassSpec], auto_hide: Duration) -> Result<MarkerRegistry, ConfigError> {
        validate_classes(classes)?;
        let markers = classes
            .iter()
            .map(|c| (c.class_id, TrackedMarker::new(c)))
            .collect();
        let order = classes.iter().map(|c| c.class_id).collect();
        Ok(MarkerRegistry {
            markers,
            order,
            auto_hide,
        })
    }

    /// Pushes every marker's current state to `host`.
    pub fn sync_host<H: RenderHost + ?Sized>(&self, host: &mut H) {
        for marker in self.markers() {
            host.set_marker_transform(marker.class_id, marker.position);
            host.set_marker_label(marker.class_id, &marker.label_text);
            host.set_marker_visible(marker.class_id, marker.visible);
        }
    }

    pub fn auto_hide(&self) -> Duration {
        self.auto_hide
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn contains(&self, class_id: i32) -> bool {
        self.markers.contains_key(&class_id)
    }

    pub fn get(&self, class_id: i32) -> Option<&TrackedMarker> {
        self.markers.get(&class_id)
    }

    /// Markers in configuration order.
    pub fn markers(&self) -> impl Iterator<Item = &TrackedMarker> {
        self.order.iter().filter_map(|id| self.markers.get(id))
    }

    pub fn visible_count(&self) -> usize {
        self.markers.values().filter(|m| m.visible).count()
    }

    /// Moves and shows the marker for `class_id`, re-arming its timer.
    /// Returns `false` for classes that have no marker.
    pub fn update<H: RenderHost + ?Sized>(
        &mut self,
        class_id: i32,
        anchor: &WorldAnchor,
        now: Instant,
        host: &mut H,
    ) -> bool {
        let Some(marker) = self.markers.get_mut(&class_id) else {
            debug!("class {} not recognized, no marker to update", class_id);
            return false;
        };
        marker.position = anchor.position;
        marker.label_text = anchor.label_text.clone();
        marker.extent = anchor.extent;
        marker.visible = true;
        marker.last_seen_at = Some(now);
        // an unrepresentable deadline leaves the marker up until cleared
        marker.expires_at = now.checked_add(self.auto_hide);

        host.set_marker_transform(class_id, marker.position);
        host.set_marker_label(class_id, &marker.label_text);
        if let Some(extent) = marker.extent {
            host.set_marker_extent(class_id, extent);
        }
        host.set_marker_visible(class_id, true);
        trace!("{} shown at {:?}", marker.label, marker.position);
        true
    }

    /// Hides markers whose timer elapsed. Returns how many were hidden.
    pub fn tick<H: RenderHost + ?Sized>(&mut self, now: Instant, host: &mut H) -> usize {
        let mut hidden = 0;
        for id in &self.order {
            let Some(marker) = self.markers.get_mut(id) else {
                continue;
            };
            if marker.is_expired(now) {
                marker.expires_at = None;
                if marker.visible {
                    marker.visible = false;
                    host.set_marker_visible(*id, false);
                    debug!("{} not seen for {:?}, hiding", marker.label, self.auto_hide);
                    hidden += 1;
                }
            }
        }
        hidden
    }

    /// Hides every marker and disarms every timer.
    pub fn clear_all<H: RenderHost + ?Sized>(&mut self, host: &mut H) {
        for id in &self.order {
            if let Some(marker) = self.markers.get_mut(id) {
                marker.visible = false;
                marker.expires_at = None;
                host.set_marker_visible(*id, false);
            }
        }
    }
}
