//! Pointer input.
//!
//! [`PointerState`] turns raw winit window events into what the emitter
//! needs: where the pointer is in normalized device coordinates, whether a
//! button is held, and which one. Escape is tracked too so the event loop can
//! close the window.

use glam::Vec2;
use winit::event::{ElementState, MouseButton as WinitMouseButton, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Mouse buttons that pour particles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

impl MouseButton {
    /// Button id carried in the frame uniforms (1 = left, 2 = middle, 3 = right).
    pub fn id(self) -> u32 {
        match self {
            MouseButton::Left => 1,
            MouseButton::Middle => 2,
            MouseButton::Right => 3,
        }
    }
}

impl TryFrom<WinitMouseButton> for MouseButton {
    type Error = WinitMouseButton;

    fn try_from(btn: WinitMouseButton) -> Result<Self, Self::Error> {
        match btn {
            WinitMouseButton::Left => Ok(MouseButton::Left),
            WinitMouseButton::Middle => Ok(MouseButton::Middle),
            WinitMouseButton::Right => Ok(MouseButton::Right),
            other => Err(other),
        }
    }
}

/// Pointer position and button state.
#[derive(Debug, Clone)]
pub struct PointerState {
    position: Vec2,
    pressed: bool,
    button: MouseButton,
    held: [bool; 3],
    window_size: (u32, u32),
    escape: bool,
}

impl Default for PointerState {
    fn default() -> Self {
        Self::new()
    }
}

impl PointerState {
    pub fn new() -> Self {
        Self {
            position: Vec2::ZERO,
            pressed: false,
            button: MouseButton::Left,
            held: [false; 3],
            window_size: (800, 800),
            escape: false,
        }
    }

    /// Pointer position in window pixels.
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Whether any pouring button is held.
    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    /// Most recently pressed button.
    pub fn button(&self) -> MouseButton {
        self.button
    }

    /// Whether Escape was pressed since the last call.
    pub fn take_escape(&mut self) -> bool {
        std::mem::take(&mut self.escape)
    }

    /// Pointer position in normalized device coordinates.
    ///
    /// Origin at the window centre, Y up.
    pub fn ndc(&self) -> Vec2 {
        let (w, h) = self.window_size;
        if w == 0 || h == 0 {
            return Vec2::ZERO;
        }
        Vec2::new(
            (self.position.x / w as f32) * 2.0 - 1.0,
            1.0 - (self.position.y / h as f32) * 2.0, // Y flipped
        )
    }

    pub fn set_window_size(&mut self, width: u32, height: u32) {
        self.window_size = (width, height);
    }

    pub fn set_position(&mut self, x: f32, y: f32) {
        self.position = Vec2::new(x, y);
    }

    /// Record a button transition.
    pub fn set_button(&mut self, button: MouseButton, down: bool) {
        self.held[button.id() as usize - 1] = down;
        if down {
            self.button = button;
        }
        self.pressed = self.held.iter().any(|&h| h);
    }

    /// Process a winit window event.
    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::CursorMoved { position, .. } => {
                self.set_position(position.x as f32, position.y as f32);
            }

            WindowEvent::MouseInput { state, button, .. } => {
                if let Ok(btn) = MouseButton::try_from(*button) {
                    self.set_button(btn, *state == ElementState::Pressed);
                }
            }

            WindowEvent::Resized(size) => {
                self.set_window_size(size.width, size.height);
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                {
                    self.escape = true;
                }
            }

            _ => {}
        }
    }
}
