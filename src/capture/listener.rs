//! rdev-backed global keyboard listener.
//!
//! Requirements:
//! - Linux: an X11 session (or XWayland) with the XRecord extension
//! - macOS: the terminal/app must be granted Accessibility access
//! - Windows: none

use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Duration;

use rdev::{EventType, Key};

use super::{CaptureError, KeyCode, KeyDispatch, KeyInput, Modifier, PhysicalKey, Side};

/// rdev::listen() blocks for as long as the hook is installed, so success is
/// only observable as the absence of an early error.
const STARTUP_PROBE: Duration = Duration::from_millis(250);

pub(super) fn spawn<F>(mut dispatch: KeyDispatch<F>) -> Result<JoinHandle<()>, CaptureError>
where
    F: Fn(&str) + Send + 'static,
{
    let (startup_tx, startup_rx) = mpsc::channel::<String>();

    let thread = std::thread::Builder::new()
        .name("hotkey-capture".into())
        .spawn(move || {
            let result = rdev::listen(move |event| {
                if let Some(input) = translate(&event.event_type) {
                    dispatch.feed(input);
                }
            });
            if let Err(e) = result {
                let message = format!("{e:?}");
                tracing::error!(error = %message, "global keyboard listener stopped");
                let _ = startup_tx.send(message);
            }
        })
        .map_err(|e| CaptureError::Listen(e.to_string()))?;

    match startup_rx.recv_timeout(STARTUP_PROBE) {
        Ok(message) => Err(CaptureError::Listen(message)),
        Err(mpsc::RecvTimeoutError::Timeout) => Ok(thread),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(CaptureError::Listen(
            "listener thread exited unexpectedly".into(),
        )),
    }
}

fn translate(event_type: &EventType) -> Option<KeyInput> {
    match event_type {
        EventType::KeyPress(key) => Some(KeyInput::Press(physical_key(key))),
        EventType::KeyRelease(key) => Some(KeyInput::Release(physical_key(key))),
        _ => None,
    }
}

fn physical_key(key: &Key) -> PhysicalKey {
    let code = match key {
        Key::ControlLeft => return PhysicalKey::Modifier(Modifier::Ctrl, Side::Left),
        Key::ControlRight => return PhysicalKey::Modifier(Modifier::Ctrl, Side::Right),
        Key::ShiftLeft => return PhysicalKey::Modifier(Modifier::Shift, Side::Left),
        Key::ShiftRight => return PhysicalKey::Modifier(Modifier::Shift, Side::Right),
        Key::Alt => return PhysicalKey::Modifier(Modifier::Alt, Side::Left),
        Key::MetaLeft => return PhysicalKey::Modifier(Modifier::Meta, Side::Left),
        Key::MetaRight => return PhysicalKey::Modifier(Modifier::Meta, Side::Right),
        Key::KpReturn => return PhysicalKey::Keypad(KeyCode::Enter),
        Key::KpDelete => return PhysicalKey::Keypad(KeyCode::Delete),
        Key::Kp0 => return PhysicalKey::Keypad(KeyCode::Char('0')),
        Key::Kp1 => return PhysicalKey::Keypad(KeyCode::Char('1')),
        Key::Kp2 => return PhysicalKey::Keypad(KeyCode::Char('2')),
        Key::Kp3 => return PhysicalKey::Keypad(KeyCode::Char('3')),
        Key::Kp4 => return PhysicalKey::Keypad(KeyCode::Char('4')),
        Key::Kp5 => return PhysicalKey::Keypad(KeyCode::Char('5')),
        Key::Kp6 => return PhysicalKey::Keypad(KeyCode::Char('6')),
        Key::Kp7 => return PhysicalKey::Keypad(KeyCode::Char('7')),
        Key::Kp8 => return PhysicalKey::Keypad(KeyCode::Char('8')),
        Key::Kp9 => return PhysicalKey::Keypad(KeyCode::Char('9')),
        Key::Pause => KeyCode::Pause,
        Key::Escape => KeyCode::Escape,
        Key::F1 => KeyCode::F(1),
        Key::F2 => KeyCode::F(2),
        Key::F3 => KeyCode::F(3),
        Key::F4 => KeyCode::F(4),
        Key::F5 => KeyCode::F(5),
        Key::F6 => KeyCode::F(6),
        Key::F7 => KeyCode::F(7),
        Key::F8 => KeyCode::F(8),
        Key::F9 => KeyCode::F(9),
        Key::F10 => KeyCode::F(10),
        Key::F11 => KeyCode::F(11),
        Key::F12 => KeyCode::F(12),
        Key::Space => KeyCode::Space,
        Key::Return => KeyCode::Enter,
        Key::Tab => KeyCode::Tab,
        Key::Backspace => KeyCode::Backspace,
        Key::Delete => KeyCode::Delete,
        Key::Insert => KeyCode::Insert,
        Key::Home => KeyCode::Home,
        Key::End => KeyCode::End,
        Key::PageUp => KeyCode::PageUp,
        Key::PageDown => KeyCode::PageDown,
        Key::UpArrow => KeyCode::Up,
        Key::DownArrow => KeyCode::Down,
        Key::LeftArrow => KeyCode::Left,
        Key::RightArrow => KeyCode::Right,
        Key::PrintScreen => KeyCode::PrintScreen,
        Key::ScrollLock => KeyCode::ScrollLock,
        Key::KeyA => KeyCode::Char('a'),
        Key::KeyB => KeyCode::Char('b'),
        Key::KeyC => KeyCode::Char('c'),
        Key::KeyD => KeyCode::Char('d'),
        Key::KeyE => KeyCode::Char('e'),
        Key::KeyF => KeyCode::Char('f'),
        Key::KeyG => KeyCode::Char('g'),
        Key::KeyH => KeyCode::Char('h'),
        Key::KeyI => KeyCode::Char('i'),
        Key::KeyJ => KeyCode::Char('j'),
        Key::KeyK => KeyCode::Char('k'),
        Key::KeyL => KeyCode::Char('l'),
        Key::KeyM => KeyCode::Char('m'),
        Key::KeyN => KeyCode::Char('n'),
        Key::KeyO => KeyCode::Char('o'),
        Key::KeyP => KeyCode::Char('p'),
        Key::KeyQ => KeyCode::Char('q'),
        Key::KeyR => KeyCode::Char('r'),
        Key::KeyS => KeyCode::Char('s'),
        Key::KeyT => KeyCode::Char('t'),
        Key::KeyU => KeyCode::Char('u'),
        Key::KeyV => KeyCode::Char('v'),
        Key::KeyW => KeyCode::Char('w'),
        Key::KeyX => KeyCode::Char('x'),
        Key::KeyY => KeyCode::Char('y'),
        Key::KeyZ => KeyCode::Char('z'),
        Key::Num0 => KeyCode::Char('0'),
        Key::Num1 => KeyCode::Char('1'),
        Key::Num2 => KeyCode::Char('2'),
        Key::Num3 => KeyCode::Char('3'),
        Key::Num4 => KeyCode::Char('4'),
        Key::Num5 => KeyCode::Char('5'),
        Key::Num6 => KeyCode::Char('6'),
        Key::Num7 => KeyCode::Char('7'),
        Key::Num8 => KeyCode::Char('8'),
        Key::Num9 => KeyCode::Char('9'),
        _ => return PhysicalKey::Other,
    };
    PhysicalKey::Key(code)
}
