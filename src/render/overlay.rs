use std::collections::VecDeque;

use glam::Vec2;

/// Screen-space rectangle in logical pixels, origin at the top left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// A slider widget request. `id` is the parameter the slider edits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliderDescriptor<'a> {
    pub id: &'a str,
    pub label: &'a str,
    pub bounds: Rect,
    pub value: f32,
    pub min: f32,
    pub max: f32,
    pub precision: usize,
}

/// The GUI collaborator drawn on top of the 3D passes.
pub trait Overlay {
    fn text(&mut self, text: &str, position: Vec2, size: f32);

    /// Draws the slider and returns its value after this frame's interaction.
    fn slider(&mut self, slider: &SliderDescriptor<'_>) -> f32;
}

#[derive(Debug, Clone, PartialEq)]
pub struct SliderRecord {
    pub id: String,
    pub label: String,
    pub bounds: Rect,
    pub shown: f32,
    pub returned: f32,
}

/// Overlay that replays queued slider drags and records what was drawn.
#[derive(Debug, Default)]
pub struct ScriptedOverlay {
    pending: VecDeque<(String, f32)>,
    texts: Vec<(String, Vec2)>,
    sliders: Vec<SliderRecord>,
}

impl ScriptedOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a drag: the next slider drawn for `id` reports `value`.
    pub fn drag_slider(&mut self, id: impl Into<String>, value: f32) {
        self.pending.push_back((id.into(), value));
    }

    pub fn texts(&self) -> &[(String, Vec2)] {
        &self.texts
    }

    pub fn sliders(&self) -> &[SliderRecord] {
        &self.sliders
    }

    pub fn clear_records(&mut self) {
        self.texts.clear();
        self.sliders.clear();
    }
}

impl Overlay for ScriptedOverlay {
    fn text(&mut self, text: &str, position: Vec2, _size: f32) {
        self.texts.push((text.to_string(), position));
    }

    fn slider(&mut self, slider: &SliderDescriptor<'_>) -> f32 {
        let returned = match self.pending.iter().position(|(id, _)| id == slider.id) {
            Some(index) => self
                .pending
                .remove(index)
                .map(|(_, value)| value)
                .unwrap_or(slider.value),
            None => slider.value,
        };
        self.sliders.push(SliderRecord {
            id: slider.id.to_string(),
            label: slider.label.to_string(),
            bounds: slider.bounds,
            shown: slider.value,
            returned,
        });
        returned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(id: &str, value: f32) -> SliderDescriptor<'_> {
        SliderDescriptor {
            id,
            label: "Roughness",
            bounds: Rect::new(130.0, 40.0, 200.0, 20.0),
            value,
            min: 0.0,
            max: 1.0,
            precision: 2,
        }
    }

    #[test]
    fn queued_drag_is_consumed_once() {
        let mut overlay = ScriptedOverlay::new();
        overlay.drag_slider("roughness", 0.8);
        assert_eq!(overlay.slider(&descriptor("metallic", 0.5)), 0.5);
        assert_eq!(overlay.slider(&descriptor("roughness", 0.5)), 0.8);
        assert_eq!(overlay.slider(&descriptor("roughness", 0.8)), 0.8);
        assert_eq!(overlay.sliders().len(), 3);
        assert_eq!(overlay.sliders()[1].shown, 0.5);
    }

    #[test]
    fn clearing_records_keeps_pending_drags() {
        let mut overlay = ScriptedOverlay::new();
        overlay.text("Main Layer", Vec2::new(10.0, 40.0), 20.0);
        overlay.slider(&descriptor("metallic", 0.5));
        overlay.drag_slider("roughness", 0.1);
        overlay.clear_records();
        assert!(overlay.texts().is_empty());
        assert!(overlay.sliders().is_empty());
        assert_eq!(overlay.slider(&descriptor("roughness", 0.5)), 0.1);
    }
}
