use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    Ctrl,
    Shift,
    Alt,
    Meta,
}

impl Modifier {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "ctrl" | "control" => Some(Modifier::Ctrl),
            "shift" => Some(Modifier::Shift),
            "alt" | "option" => Some(Modifier::Alt),
            "meta" | "super" | "win" | "windows" | "cmd" | "command" => Some(Modifier::Meta),
            _ => None,
        }
    }
}

/// Set of held modifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub fn set(&mut self, modifier: Modifier, held: bool) {
        match modifier {
            Modifier::Ctrl => self.ctrl = held,
            Modifier::Shift => self.shift = held,
            Modifier::Alt => self.alt = held,
            Modifier::Meta => self.meta = held,
        }
    }

    pub fn with(mut self, modifier: Modifier) -> Self {
        self.set(modifier, true);
        self
    }
}

/// Non-modifier keys a combination can end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Pause,
    Escape,
    /// F1 through F12.
    F(u8),
    /// Lowercase ASCII letter or digit.
    Char(char),
    Space,
    Enter,
    Tab,
    Backspace,
    Delete,
    Insert,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
    PrintScreen,
    ScrollLock,
}

impl KeyCode {
    pub fn from_name(name: &str) -> Option<Self> {
        let key = match name {
            "pause break" | "pause" | "break" => KeyCode::Pause,
            "escape" | "esc" => KeyCode::Escape,
            "space" | "spacebar" => KeyCode::Space,
            "enter" | "return" => KeyCode::Enter,
            "tab" => KeyCode::Tab,
            "backspace" => KeyCode::Backspace,
            "delete" | "del" => KeyCode::Delete,
            "insert" | "ins" => KeyCode::Insert,
            "home" => KeyCode::Home,
            "end" => KeyCode::End,
            "page up" | "pageup" | "pgup" => KeyCode::PageUp,
            "page down" | "pagedown" | "pgdn" => KeyCode::PageDown,
            "up" | "up arrow" => KeyCode::Up,
            "down" | "down arrow" => KeyCode::Down,
            "left" | "left arrow" => KeyCode::Left,
            "right" | "right arrow" => KeyCode::Right,
            "print screen" | "printscreen" | "prtsc" => KeyCode::PrintScreen,
            "scroll lock" | "scrolllock" => KeyCode::ScrollLock,
            _ => return Self::function_or_char(name),
        };
        Some(key)
    }

    fn function_or_char(name: &str) -> Option<Self> {
        if let Some(n) = name.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
            return (1..=12).contains(&n).then_some(KeyCode::F(n));
        }
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_lowercase() || c.is_ascii_digit() => {
                Some(KeyCode::Char(c))
            }
            _ => None,
        }
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyCode::F(n) => return write!(f, "f{n}"),
            KeyCode::Char(c) => return write!(f, "{c}"),
            KeyCode::Pause => "pause break",
            KeyCode::Escape => "escape",
            KeyCode::Space => "space",
            KeyCode::Enter => "enter",
            KeyCode::Tab => "tab",
            KeyCode::Backspace => "backspace",
            KeyCode::Delete => "delete",
            KeyCode::Insert => "insert",
            KeyCode::Home => "home",
            KeyCode::End => "end",
            KeyCode::PageUp => "page up",
            KeyCode::PageDown => "page down",
            KeyCode::Up => "up",
            KeyCode::Down => "down",
            KeyCode::Left => "left",
            KeyCode::Right => "right",
            KeyCode::PrintScreen => "print screen",
            KeyCode::ScrollLock => "scroll lock",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComboParseError {
    #[error("empty key combination")]
    Empty,
    #[error("unknown key '{0}'")]
    UnknownKey(String),
    #[error("'{0}' must be the last part of the combination")]
    KeyBeforeModifier(String),
    #[error("combination has only modifiers")]
    MissingKey,
}

/// `[modifier+...]key`, e.g. `ctrl+shift+f8` or `pause break`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCombo {
    pub modifiers: Modifiers,
    pub key: KeyCode,
}

impl FromStr for KeyCombo {
    type Err = ComboParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<String> = s
            .split('+')
            .map(|part| {
                part.split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_lowercase()
            })
            .collect();
        if parts.iter().all(|p| p.is_empty()) {
            return Err(ComboParseError::Empty);
        }

        let (last, leading) = parts.split_last().ok_or(ComboParseError::Empty)?;
        let mut modifiers = Modifiers::default();
        for part in leading {
            match Modifier::from_name(part) {
                Some(m) => modifiers.set(m, true),
                None if KeyCode::from_name(part).is_some() => {
                    return Err(ComboParseError::KeyBeforeModifier(part.clone()))
                }
                None => return Err(ComboParseError::UnknownKey(part.clone())),
            }
        }

        if Modifier::from_name(last).is_some() {
            return Err(ComboParseError::MissingKey);
        }
        let key = KeyCode::from_name(last).ok_or_else(|| ComboParseError::UnknownKey(last.clone()))?;
        Ok(KeyCombo { modifiers, key })
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.modifiers;
        for (held, name) in [(m.ctrl, "ctrl"), (m.shift, "shift"), (m.alt, "alt"), (m.meta, "meta")] {
            if held {
                write!(f, "{name}+")?;
            }
        }
        write!(f, "{}", self.key)
    }
}

/// Which of a pair of modifier keys was used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

/// A key as reported by the OS listener.
///
/// Keys that share a meaning stay distinct here (left/right ctrl, keypad
/// enter/enter) so releasing one does not forget the other is still down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhysicalKey {
    Modifier(Modifier, Side),
    Key(KeyCode),
    /// Numeric keypad key. Matches like its main-block twin.
    Keypad(KeyCode),
    /// Anything no combination can refer to.
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    Press(PhysicalKey),
    Release(PhysicalKey),
}

/// Tracks keyboard state and reports which registered combination, if any,
/// a press completes.
///
/// Modifiers must match exactly: `f2` does not fire while ctrl is held.
/// Auto-repeat presses of a key that is already down are ignored.
#[derive(Debug, Default)]
pub struct ComboMatcher {
    bindings: HashMap<KeyCombo, String>,
    held: HashSet<(Modifier, Side)>,
    down: HashSet<PhysicalKey>,
}

impl ComboMatcher {
    pub fn new(bindings: HashMap<KeyCombo, String>) -> Self {
        Self {
            bindings,
            ..Default::default()
        }
    }

    pub fn feed(&mut self, input: KeyInput) -> Option<&str> {
        match input {
            KeyInput::Press(PhysicalKey::Modifier(m, side)) => {
                self.held.insert((m, side));
            }
            KeyInput::Release(PhysicalKey::Modifier(m, side)) => {
                self.held.remove(&(m, side));
            }
            KeyInput::Press(physical @ (PhysicalKey::Key(key) | PhysicalKey::Keypad(key))) => {
                if !self.down.insert(physical) {
                    return None;
                }
                let combo = KeyCombo {
                    modifiers: self.held_modifiers(),
                    key,
                };
                return self.bindings.get(&combo).map(String::as_str);
            }
            KeyInput::Release(physical @ (PhysicalKey::Key(_) | PhysicalKey::Keypad(_))) => {
                self.down.remove(&physical);
            }
            KeyInput::Press(PhysicalKey::Other) | KeyInput::Release(PhysicalKey::Other) => {}
        }
        None
    }

    fn held_modifiers(&self) -> Modifiers {
        self.held
            .iter()
            .fold(Modifiers::default(), |held, (m, _)| held.with(*m))
    }
}
