//! Key-binding lookup
//!
//! Converts key events into the byte sequences forwarded to the child
//! process. Binding tables are looked up by name; an unknown name falls
//! back to the default table rather than failing.

use std::collections::HashMap;

use bitflags::bitflags;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

bitflags! {
    /// Modifier keys, reduced from the crossterm flag set.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const CTRL  = 0b0010;
        const ALT   = 0b0100;
    }
}

impl From<KeyModifiers> for Modifiers {
    fn from(mods: KeyModifiers) -> Self {
        let mut result = Modifiers::empty();
        if mods.contains(KeyModifiers::SHIFT) {
            result |= Modifiers::SHIFT;
        }
        if mods.contains(KeyModifiers::CONTROL) {
            result |= Modifiers::CTRL;
        }
        if mods.contains(KeyModifiers::ALT) {
            result |= Modifiers::ALT;
        }
        result
    }
}

/// Cursor-key encoding variant a table uses for unmodified arrows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CursorKeyMode {
    /// `ESC [ A` style.
    Normal,
    /// `ESC O A` style, for hosts that keep application mode on.
    Application,
}

/// A named key-binding table.
pub struct KeyBindingTable {
    name: String,
    cursor_keys: CursorKeyMode,
}

impl KeyBindingTable {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Translate a key event into the bytes to send to the process.
    /// `application_cursor` is the emulation's current DECCKM state and
    /// overrides the table's resting mode when set.
    pub fn map(&self, event: &KeyEvent, application_cursor: bool) -> Option<Vec<u8>> {
        let mods = Modifiers::from(event.modifiers);
        let app_cursor =
            application_cursor || self.cursor_keys == CursorKeyMode::Application;

        match event.code {
            KeyCode::Char(ch) => Some(map_char(ch, mods)),
            KeyCode::Enter => Some(vec![0x0D]),
            KeyCode::Backspace => {
                if mods.contains(Modifiers::ALT) {
                    Some(vec![0x1B, 0x7F])
                } else {
                    Some(vec![0x7F])
                }
            }
            KeyCode::Tab => {
                if mods.contains(Modifiers::SHIFT) {
                    Some(b"\x1b[Z".to_vec())
                } else {
                    Some(vec![0x09])
                }
            }
            KeyCode::Esc => Some(vec![0x1B]),

            KeyCode::Up => Some(arrow_key(b'A', mods, app_cursor)),
            KeyCode::Down => Some(arrow_key(b'B', mods, app_cursor)),
            KeyCode::Right => Some(arrow_key(b'C', mods, app_cursor)),
            KeyCode::Left => Some(arrow_key(b'D', mods, app_cursor)),

            KeyCode::Home => Some(special_key(b'H', mods)),
            KeyCode::End => Some(special_key(b'F', mods)),
            KeyCode::PageUp => Some(tilde_key(5, mods)),
            KeyCode::PageDown => Some(tilde_key(6, mods)),
            KeyCode::Insert => Some(tilde_key(2, mods)),
            KeyCode::Delete => Some(tilde_key(3, mods)),

            KeyCode::F(n) => Some(function_key(n, mods)),

            _ => None,
        }
    }
}

/// Registry of built-in binding tables with a guaranteed default.
pub struct KeyBindingRegistry {
    tables: HashMap<String, KeyBindingTable>,
}

pub const DEFAULT_TABLE: &str = "default";

impl Default for KeyBindingRegistry {
    fn default() -> Self {
        let mut tables = HashMap::new();
        tables.insert(
            DEFAULT_TABLE.to_string(),
            KeyBindingTable {
                name: DEFAULT_TABLE.to_string(),
                cursor_keys: CursorKeyMode::Normal,
            },
        );
        tables.insert(
            "application".to_string(),
            KeyBindingTable {
                name: "application".to_string(),
                cursor_keys: CursorKeyMode::Application,
            },
        );
        Self { tables }
    }
}

impl KeyBindingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, name: &str) -> Option<&KeyBindingTable> {
        self.tables.get(name)
    }

    /// Look up `name`, falling back to the default table when not found.
    pub fn resolve(&self, name: &str) -> &KeyBindingTable {
        self.find(name).unwrap_or_else(|| {
            tracing::debug!(name, "unknown key-binding table, using default");
            &self.tables[DEFAULT_TABLE]
        })
    }
}

fn map_char(ch: char, mods: Modifiers) -> Vec<u8> {
    // Ctrl + letter = control character
    if mods.contains(Modifiers::CTRL) && !mods.contains(Modifiers::ALT) {
        if ch.is_ascii_lowercase() {
            return vec![(ch as u8) - b'a' + 1];
        } else if ch.is_ascii_uppercase() {
            return vec![(ch as u8) - b'A' + 1];
        }
        match ch {
            '@' | '`' | ' ' => return vec![0x00],
            '[' => return vec![0x1B],
            '\\' => return vec![0x1C],
            ']' => return vec![0x1D],
            '^' | '~' => return vec![0x1E],
            '_' | '?' => return vec![0x1F],
            _ => {}
        }
    }

    if mods.contains(Modifiers::CTRL) && mods.contains(Modifiers::ALT) && ch.is_ascii_alphabetic()
    {
        return vec![0x1B, (ch.to_ascii_lowercase() as u8) - b'a' + 1];
    }

    // Alt + key = ESC prefix
    if mods.contains(Modifiers::ALT) && !mods.contains(Modifiers::CTRL) {
        let mut bytes = vec![0x1B];
        bytes.extend(ch.to_string().as_bytes());
        return bytes;
    }

    ch.to_string().into_bytes()
}

fn arrow_key(key: u8, mods: Modifiers, application_cursor: bool) -> Vec<u8> {
    if !mods.is_empty() {
        format!("\x1b[1;{}{}", modifier_code(mods), key as char).into_bytes()
    } else if application_cursor {
        vec![0x1B, b'O', key]
    } else {
        vec![0x1B, b'[', key]
    }
}

fn special_key(key: u8, mods: Modifiers) -> Vec<u8> {
    if mods.is_empty() {
        vec![0x1B, b'[', key]
    } else {
        format!("\x1b[1;{}{}", modifier_code(mods), key as char).into_bytes()
    }
}

fn tilde_key(code: u8, mods: Modifiers) -> Vec<u8> {
    if mods.is_empty() {
        format!("\x1b[{}~", code).into_bytes()
    } else {
        format!("\x1b[{};{}~", code, modifier_code(mods)).into_bytes()
    }
}

fn function_key(n: u8, mods: Modifiers) -> Vec<u8> {
    let base = match n {
        1 => b"\x1bOP".to_vec(),
        2 => b"\x1bOQ".to_vec(),
        3 => b"\x1bOR".to_vec(),
        4 => b"\x1bOS".to_vec(),
        5 => b"\x1b[15~".to_vec(),
        6 => b"\x1b[17~".to_vec(),
        7 => b"\x1b[18~".to_vec(),
        8 => b"\x1b[19~".to_vec(),
        9 => b"\x1b[20~".to_vec(),
        10 => b"\x1b[21~".to_vec(),
        11 => b"\x1b[23~".to_vec(),
        12 => b"\x1b[24~".to_vec(),
        _ => return vec![],
    };

    if mods.is_empty() {
        base
    } else {
        let mod_code = modifier_code(mods);
        match n {
            1..=4 => {
                let key = base[2];
                format!("\x1b[1;{}{}", mod_code, key as char).into_bytes()
            }
            _ => {
                let code_str = String::from_utf8_lossy(&base[2..base.len() - 1]);
                format!("\x1b[{};{}~", code_str, mod_code).into_bytes()
            }
        }
    }
}

/// xterm modifier parameter.
fn modifier_code(mods: Modifiers) -> u8 {
    1 + if mods.contains(Modifiers::SHIFT) { 1 } else { 0 }
        + if mods.contains(Modifiers::ALT) { 2 } else { 0 }
        + if mods.contains(Modifiers::CTRL) { 4 } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, mods: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, mods)
    }

    #[test]
    fn unknown_table_falls_back_to_default() {
        let registry = KeyBindingRegistry::new();
        let table = registry.resolve("no-such-table");
        assert_eq!(table.name(), DEFAULT_TABLE);
        assert!(registry.find("no-such-table").is_none());
        assert!(registry.find("application").is_some());
    }

    #[test]
    fn plain_and_control_characters() {
        let registry = KeyBindingRegistry::new();
        let table = registry.resolve(DEFAULT_TABLE);

        let plain = table.map(&key(KeyCode::Char('a'), KeyModifiers::NONE), false);
        assert_eq!(plain, Some(b"a".to_vec()));

        let ctrl_c = table.map(&key(KeyCode::Char('c'), KeyModifiers::CONTROL), false);
        assert_eq!(ctrl_c, Some(vec![0x03]));

        let alt_x = table.map(&key(KeyCode::Char('x'), KeyModifiers::ALT), false);
        assert_eq!(alt_x, Some(vec![0x1B, b'x']));
    }

    #[test]
    fn cursor_keys_respect_application_mode() {
        let registry = KeyBindingRegistry::new();
        let table = registry.resolve(DEFAULT_TABLE);

        let normal = table.map(&key(KeyCode::Up, KeyModifiers::NONE), false);
        assert_eq!(normal, Some(b"\x1b[A".to_vec()));

        let app = table.map(&key(KeyCode::Up, KeyModifiers::NONE), true);
        assert_eq!(app, Some(b"\x1bOA".to_vec()));

        let modified = table.map(&key(KeyCode::Up, KeyModifiers::SHIFT), false);
        assert_eq!(modified, Some(b"\x1b[1;2A".to_vec()));
    }

    #[test]
    fn function_keys_encode_with_modifiers() {
        let registry = KeyBindingRegistry::new();
        let table = registry.resolve(DEFAULT_TABLE);

        let f5 = table.map(&key(KeyCode::F(5), KeyModifiers::NONE), false);
        assert_eq!(f5, Some(b"\x1b[15~".to_vec()));

        let ctrl_f1 = table.map(&key(KeyCode::F(1), KeyModifiers::CONTROL), false);
        assert_eq!(ctrl_f1, Some(b"\x1b[1;5P".to_vec()));
    }
}
