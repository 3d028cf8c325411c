use std::collections::BTreeMap;

use glam::{Vec2, Vec3};
use log::info;

use crate::registry::RenderHost;

/// What a host was last told about one marker.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MarkerView {
    pub position: Vec3,
    pub visible: bool,
    pub label: String,
    pub extent: Option<Vec2>,
    /// times the marker was switched from hidden to visible
    pub shown: usize,
}

/// Keeps the latest state per marker. Used by the replay tool and tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingRenderHost {
    pub markers: BTreeMap<i32, MarkerView>,
}

impl RecordingRenderHost {
    pub fn new() -> RecordingRenderHost {
        Self::default()
    }

    pub fn view(&self, class_id: i32) -> Option<&MarkerView> {
        self.markers.get(&class_id)
    }

    pub fn visible_ids(&self) -> Vec<i32> {
        self.markers
            .iter()
            .filter(|(_, m)| m.visible)
            .map(|(id, _)| *id)
            .collect()
    }
}

impl RenderHost for RecordingRenderHost {
    fn set_marker_transform(&mut self, class_id: i32, position: Vec3) {
        self.markers.entry(class_id).or_default().position = position;
    }

    fn set_marker_visible(&mut self, class_id: i32, visible: bool) {
        let view = self.markers.entry(class_id).or_default();
        if visible && !view.visible {
            view.shown += 1;
        }
        view.visible = visible;
    }

    fn set_marker_label(&mut self, class_id: i32, text: &str) {
        self.markers.entry(class_id).or_default().label = text.to_string();
    }

    fn set_marker_extent(&mut self, class_id: i32, extent: Vec2) {
        self.markers.entry(class_id).or_default().extent = Some(extent);
    }
}

/// Logs visibility changes and placements at info level.
#[derive(Debug, Default)]
pub struct LogRenderHost {
    pub inner: RecordingRenderHost,
}

impl RenderHost for LogRenderHost {
    fn set_marker_transform(&mut self, class_id: i32, position: Vec3) {
        self.inner.set_marker_transform(class_id, position);
    }

    fn set_marker_visible(&mut self, class_id: i32, visible: bool) {
        let was_visible = self.inner.view(class_id).is_some_and(|m| m.visible);
        self.inner.set_marker_visible(class_id, visible);
        if was_visible != visible {
            let view = &self.inner.markers[&class_id];
            if visible {
                info!(
                    "marker {} shown: {:?} at ({:.3}, {:.3}, {:.3})",
                    class_id, view.label, view.position.x, view.position.y, view.position.z
                );
            } else {
                info!("marker {} hidden", class_id);
            }
        }
    }

    fn set_marker_label(&mut self, class_id: i32, text: &str) {
        self.inner.set_marker_label(class_id, text);
    }

    fn set_marker_extent(&mut self, class_id: i32, extent: Vec2) {
        self.inner.set_marker_extent(class_id, extent);
    }
}
