//! Keyboard toggles of the viewer.
//!
//! A toggle flips once per key press: holding the key or receiving OS key
//! repeats does nothing until the key has been released again.

use winit::keyboard::KeyCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Toggle {
    pub value: bool,
    held: bool,
}

impl Toggle {
    pub fn new(value: bool) -> Self {
        Self { value, held: false }
    }

    /// Feed a key state. Returns `true` when the value flipped.
    pub fn update(&mut self, pressed: bool) -> bool {
        if pressed && !self.held {
            self.held = true;
            self.value = !self.value;
            true
        } else {
            if !pressed {
                self.held = false;
            }
            false
        }
    }
}

/// What a key event asked the viewer to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Exit,
    TangentSpace(bool),
    AlbedoSrgb(bool),
    CursorLock(bool),
}

#[derive(Debug, Clone, Copy)]
pub struct ViewerToggles {
    pub tangent_space: Toggle,
    pub albedo_srgb: Toggle,
    pub cursor_locked: Toggle,
}

impl ViewerToggles {
    pub fn new(tangent_space: bool, albedo_srgb: bool) -> Self {
        Self {
            tangent_space: Toggle::new(tangent_space),
            albedo_srgb: Toggle::new(albedo_srgb),
            cursor_locked: Toggle::new(true),
        }
    }

    /// V flips tangent-space normal mapping, N flips sRGB decoding of albedo,
    /// 0 flips the cursor lock and Escape exits.
    pub fn handle_key(&mut self, key: KeyCode, pressed: bool) -> Option<Action> {
        match key {
            KeyCode::Escape if pressed => Some(Action::Exit),
            KeyCode::KeyV => self
                .tangent_space
                .update(pressed)
                .then_some(Action::TangentSpace(self.tangent_space.value)),
            KeyCode::KeyN => self
                .albedo_srgb
                .update(pressed)
                .then_some(Action::AlbedoSrgb(self.albedo_srgb.value)),
            KeyCode::Digit0 | KeyCode::Numpad0 => self
                .cursor_locked
                .update(pressed)
                .then_some(Action::CursorLock(self.cursor_locked.value)),
            _ => None,
        }
    }
}
