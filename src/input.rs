use std::collections::HashSet;

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Identifier for a physical keyboard key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    Named(NamedKey),
    Character(char),
    Digit(u8),
    Function(u8),
}

impl KeyCode {
    pub fn from_name(name: &str) -> Option<Self> {
        if let Some(key) = parse_named_key(name) {
            return Some(key);
        }
        let mut chars = name.chars();
        if let (Some(ch), None) = (chars.next(), chars.next()) {
            if ch.is_ascii_alphabetic() {
                return Some(Self::Character(ch.to_ascii_uppercase()));
            }
            if ch.is_ascii_digit() {
                return Some(Self::Digit(ch as u8 - b'0'));
            }
        }
        if let Some(function) = name.strip_prefix('F').or_else(|| name.strip_prefix('f')) {
            if let Ok(index) = function.parse::<u8>() {
                if (1..=25).contains(&index) {
                    return Some(Self::Function(index));
                }
            }
        }
        None
    }
}

fn parse_named_key(name: &str) -> Option<KeyCode> {
    use NamedKey::*;
    let key = match name {
        "Space" => Space,
        "Enter" | "Return" => Enter,
        "Tab" => Tab,
        "Left" => Left,
        "Right" => Right,
        "Up" => Up,
        "Down" => Down,
        "Escape" | "Esc" => Escape,
        "Backspace" => Backspace,
        "LeftShift" | "LShift" => LeftShift,
        "RightShift" | "RShift" => RightShift,
        "LeftCtrl" | "LControl" => LeftCtrl,
        "RightCtrl" | "RControl" => RightCtrl,
        "LeftAlt" | "LAlt" => LeftAlt,
        "RightAlt" | "RAlt" => RightAlt,
        _ => return None,
    };
    Some(KeyCode::Named(key))
}

/// Friendly names for the keys a control binding may refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedKey {
    Space,
    Enter,
    Tab,
    Left,
    Right,
    Up,
    Down,
    Escape,
    Backspace,
    LeftShift,
    RightShift,
    LeftCtrl,
    RightCtrl,
    LeftAlt,
    RightAlt,
}

/// Identifier for a mouse button (left button is zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MouseButton(u8);

impl MouseButton {
    pub const LEFT: Self = Self(0);
    pub const RIGHT: Self = Self(1);
    pub const MIDDLE: Self = Self(2);

    pub fn new(index: u8) -> Self {
        Self(index)
    }

    pub fn index(self) -> u8 {
        self.0
    }
}

/// Inputs bound to the harness actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlBindings {
    pub orbit: MouseButton,
    pub fullscreen: KeyCode,
    pub quit: KeyCode,
}

impl Default for ControlBindings {
    fn default() -> Self {
        Self {
            orbit: MouseButton::MIDDLE,
            fullscreen: KeyCode::Function(11),
            quit: KeyCode::Named(NamedKey::Escape),
        }
    }
}

/// A key or mouse button referenced by name, e.g. `"F11"` or `"Mouse3"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputName {
    Key(KeyCode),
    Mouse(MouseButton),
}

pub fn parse_input_name(name: &str) -> Option<InputName> {
    if let Some(button) = parse_mouse_button(name) {
        return Some(InputName::Mouse(button));
    }
    KeyCode::from_name(name).map(InputName::Key)
}

fn parse_mouse_button(name: &str) -> Option<MouseButton> {
    let prefix = name.get(..5)?;
    if !prefix.eq_ignore_ascii_case("mouse") {
        return None;
    }
    let suffix = &name[5..];
    if suffix.is_empty() {
        return Some(MouseButton::LEFT);
    }
    let index = suffix.parse::<u8>().ok()?;
    Some(MouseButton::new(index.saturating_sub(1)))
}

/// Everything the frame loop consumes from one poll of the input backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameInput {
    pub drag_active: bool,
    pub pointer_delta: Vec2,
    pub wheel_delta: f32,
    pub pressed: Vec<KeyCode>,
    pub close_requested: bool,
}

impl FrameInput {
    pub fn was_pressed(&self, key: KeyCode) -> bool {
        self.pressed.contains(&key)
    }
}

/// Accumulates window events between frames.
#[derive(Debug, Default)]
pub struct InputState {
    keys: HashSet<KeyCode>,
    pressed: Vec<KeyCode>,
    mouse_buttons: HashSet<MouseButton>,
    mouse_position: Option<Vec2>,
    pointer_delta: Vec2,
    wheel_delta: f32,
    close_requested: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key_down(&mut self, key: KeyCode) {
        // Key repeat must not count as a fresh press.
        if self.keys.insert(key) {
            self.pressed.push(key);
        }
    }

    pub fn set_key_up(&mut self, key: KeyCode) {
        self.keys.remove(&key);
    }

    pub fn set_mouse_button_down(&mut self, button: MouseButton) {
        self.mouse_buttons.insert(button);
    }

    pub fn set_mouse_button_up(&mut self, button: MouseButton) {
        self.mouse_buttons.remove(&button);
    }

    pub fn set_mouse_position(&mut self, position: Vec2) {
        if let Some(previous) = self.mouse_position {
            self.pointer_delta += position - previous;
        }
        self.mouse_position = Some(position);
    }

    /// Adds wheel movement in notches; positive values scroll away from the user.
    pub fn add_wheel(&mut self, notches: f32) {
        self.wheel_delta += notches;
    }

    pub fn request_close(&mut self) {
        self.close_requested = true;
    }

    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys.contains(&key)
    }

    pub fn is_mouse_button_down(&self, button: MouseButton) -> bool {
        self.mouse_buttons.contains(&button)
    }

    pub fn mouse_position(&self) -> Option<Vec2> {
        self.mouse_position
    }

    /// Drains the per-frame deltas into a snapshot; held keys and buttons persist.
    pub fn take_frame(&mut self, bindings: &ControlBindings) -> FrameInput {
        FrameInput {
            drag_active: self.is_mouse_button_down(bindings.orbit),
            pointer_delta: std::mem::take(&mut self.pointer_delta),
            wheel_delta: std::mem::take(&mut self.wheel_delta),
            pressed: std::mem::take(&mut self.pressed),
            close_requested: self.close_requested,
        }
    }
}
