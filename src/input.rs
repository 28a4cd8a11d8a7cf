//! Input event types and coordinate scaling between the host's logical
//! pixels and the engine's device pixels.

use bitflags::bitflags;

bitflags! {
    /// Modifier flags attached to a mouse event when it reaches the engine.
    pub struct EventFlags: u32 {
        const LEFT_MOUSE_BUTTON   = 0b0001;
        const MIDDLE_MOUSE_BUTTON = 0b0010;
        const RIGHT_MOUSE_BUTTON  = 0b0100;
    }
}

/// Mouse button identifier, as the engine expects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

/// A positioned mouse event in the engine's view coordinate space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MouseEvent {
    pub x: i32,
    pub y: i32,
    pub modifiers: EventFlags,
}

impl MouseEvent {
    pub fn at(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            modifiers: EventFlags::empty(),
        }
    }

    pub fn with_modifiers(mut self, modifiers: EventFlags) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// Integer rectangle used for IME character bounds and screen mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Scale a logical value into device pixels: `floor(value * scale)`.
pub fn logical_to_device(value: f64, scale: f64) -> u32 {
    let scaled = value * scale;
    if scaled <= 0.0 {
        return 0;
    }
    scaled.floor() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_to_device_floors() {
        assert_eq!(logical_to_device(100.0, 1.0), 100);
        assert_eq!(logical_to_device(100.0, 1.5), 150);
        assert_eq!(logical_to_device(99.0, 1.25), 123); // 123.75
        assert_eq!(logical_to_device(33.3, 3.0), 99);   // 99.899..
    }

    #[test]
    fn logical_to_device_never_negative() {
        assert_eq!(logical_to_device(-5.0, 2.0), 0);
        assert_eq!(logical_to_device(0.0, 2.0), 0);
    }

    #[test]
    fn mouse_event_builder() {
        let ev = MouseEvent::at(10, 20).with_modifiers(EventFlags::LEFT_MOUSE_BUTTON);
        assert_eq!(ev.x, 10);
        assert_eq!(ev.y, 20);
        assert!(ev.modifiers.contains(EventFlags::LEFT_MOUSE_BUTTON));
        assert!(!ev.modifiers.contains(EventFlags::RIGHT_MOUSE_BUTTON));
    }
}
