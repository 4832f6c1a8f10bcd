//! Key mapping for terminal input
//!
//! Converts key events to VT sequences sent to the remote terminal.

use bitflags::bitflags;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

bitflags! {
    /// Modifier keys, laid out so that `bits() + 1` is the xterm modifier parameter
    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const ALT   = 0b0010;
        const CTRL  = 0b0100;
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

/// Input modes assumed for the remote terminal.
///
/// The viewer only sees rendered snapshots, so it cannot track mode changes
/// requested by the remote application; these come from configuration.
#[derive(Clone, Copy, Debug, Default)]
pub struct InputModes {
    /// Enter sends CR LF instead of CR
    pub linefeed_newline: bool,
    /// Arrow keys use SS3 (`ESC O x`) sequences
    pub application_cursor: bool,
}

/// Key mapper for converting key events to bytes
pub struct KeyMapper;

impl KeyMapper {
    /// Whether a key press leaves the viewer.
    ///
    /// While input is forwarded only Ctrl+Q quits, so that Ctrl+C and Esc
    /// reach the remote shell.
    pub fn is_quit(event: &KeyEvent, forwarding: bool) -> bool {
        let ctrl = event.modifiers.contains(KeyModifiers::CONTROL);
        match event.code {
            KeyCode::Char('q') | KeyCode::Char('Q') if ctrl => true,
            _ if forwarding => false,
            KeyCode::Char('c') if ctrl => true,
            KeyCode::Char('q') | KeyCode::Esc => true,
            _ => false,
        }
    }

    /// Bytes to PUT to `/write/{id}` for a key press, if the key types anything
    pub fn map(event: &KeyEvent, modes: &InputModes) -> Option<Vec<u8>> {
        let mods = Modifiers::from(event.modifiers);

        let bytes = match event.code {
            KeyCode::Char(ch) => Self::typed(ch, mods),
            KeyCode::Enter if modes.linefeed_newline => b"\r\n".to_vec(),
            KeyCode::Enter => vec![b'\r'],
            KeyCode::Tab if mods.contains(Modifiers::SHIFT) => b"\x1b[Z".to_vec(),
            KeyCode::Tab => vec![b'\t'],
            KeyCode::Backspace => Self::meta(mods, vec![0x7F]),
            KeyCode::Esc => vec![0x1B],
            code => Self::sequence(code, modes)?.encode(mods),
        };
        Some(bytes)
    }

    /// Text typed by a character key
    fn typed(ch: char, mods: Modifiers) -> Vec<u8> {
        if mods.contains(Modifiers::CTRL) {
            if let Some(control) = control_byte(ch) {
                return Self::meta(mods, vec![control]);
            }
        }
        let mut buf = [0u8; 4];
        Self::meta(mods, ch.encode_utf8(&mut buf).as_bytes().to_vec())
    }

    /// Alt sends ESC ahead of the key
    fn meta(mods: Modifiers, bytes: Vec<u8>) -> Vec<u8> {
        if mods.contains(Modifiers::ALT) {
            let mut prefixed = Vec::with_capacity(bytes.len() + 1);
            prefixed.push(0x1B);
            prefixed.extend(bytes);
            prefixed
        } else {
            bytes
        }
    }

    /// Escape sequence family of a cursor, editing or function key
    fn sequence(code: KeyCode, modes: &InputModes) -> Option<KeySequence> {
        let cursor = |key| {
            if modes.application_cursor {
                KeySequence::Ss3(key)
            } else {
                KeySequence::Csi(key)
            }
        };
        Some(match code {
            KeyCode::Up => cursor(b'A'),
            KeyCode::Down => cursor(b'B'),
            KeyCode::Right => cursor(b'C'),
            KeyCode::Left => cursor(b'D'),
            KeyCode::Home => KeySequence::Csi(b'H'),
            KeyCode::End => KeySequence::Csi(b'F'),
            KeyCode::Insert => KeySequence::Tilde(2),
            KeyCode::Delete => KeySequence::Tilde(3),
            KeyCode::PageUp => KeySequence::Tilde(5),
            KeyCode::PageDown => KeySequence::Tilde(6),
            KeyCode::F(n @ 1..=4) => KeySequence::Ss3(b'P' + (n - 1)),
            KeyCode::F(n @ 5..=12) => {
                const CODES: [u8; 8] = [15, 17, 18, 19, 20, 21, 23, 24];
                KeySequence::Tilde(CODES[usize::from(n - 5)])
            }
            _ => return None,
        })
    }
}

/// VT escape sequence shapes used by non-character keys
#[derive(Clone, Copy, Debug, PartialEq)]
enum KeySequence {
    /// `ESC [ x`
    Csi(u8),
    /// `ESC O x`
    Ss3(u8),
    /// `ESC [ n ~`
    Tilde(u8),
}

impl KeySequence {
    /// Encode, switching to the xterm `;<modifier>` form when modifiers are held
    fn encode(self, mods: Modifiers) -> Vec<u8> {
        if mods.is_empty() {
            return match self {
                KeySequence::Csi(key) => vec![0x1B, b'[', key],
                KeySequence::Ss3(key) => vec![0x1B, b'O', key],
                KeySequence::Tilde(n) => format!("\x1b[{}~", n).into_bytes(),
            };
        }

        let param = 1 + mods.bits();
        match self {
            KeySequence::Csi(key) | KeySequence::Ss3(key) => {
                format!("\x1b[1;{}{}", param, key as char).into_bytes()
            }
            KeySequence::Tilde(n) => format!("\x1b[{};{}~", n, param).into_bytes(),
        }
    }
}

/// C0 byte produced by Ctrl plus `ch`
fn control_byte(ch: char) -> Option<u8> {
    match ch {
        'a'..='z' | 'A'..='Z' => Some(ch.to_ascii_lowercase() as u8 - b'a' + 1),
        '@' | '`' | ' ' | '2' => Some(0x00),
        '[' | '3' => Some(0x1B),
        '\\' | '4' => Some(0x1C),
        ']' | '5' => Some(0x1D),
        '^' | '~' | '6' => Some(0x1E),
        '_' | '?' | '7' => Some(0x1F),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_event(code: KeyCode, mods: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, mods)
    }

    #[test]
    fn test_char_keys() {
        let modes = InputModes::default();

        let event = key_event(KeyCode::Char('a'), KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event, &modes), Some(b"a".to_vec()));

        // Ctrl+C
        let event = key_event(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(KeyMapper::map(&event, &modes), Some(vec![0x03]));

        // Alt+x
        let event = key_event(KeyCode::Char('x'), KeyModifiers::ALT);
        assert_eq!(KeyMapper::map(&event, &modes), Some(vec![0x1B, b'x']));

        let event = key_event(KeyCode::Char('é'), KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event, &modes), Some("é".as_bytes().to_vec()));
    }

    #[test]
    fn test_enter_modes() {
        let event = key_event(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event, &InputModes::default()), Some(vec![0x0D]));

        let modes = InputModes { linefeed_newline: true, ..InputModes::default() };
        assert_eq!(KeyMapper::map(&event, &modes), Some(vec![0x0D, 0x0A]));
    }

    #[test]
    fn test_arrow_keys() {
        let modes = InputModes::default();

        let event = key_event(KeyCode::Up, KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event, &modes), Some(b"\x1b[A".to_vec()));

        let event = key_event(KeyCode::Up, KeyModifiers::CONTROL);
        assert_eq!(KeyMapper::map(&event, &modes), Some(b"\x1b[1;5A".to_vec()));

        let all = KeyModifiers::SHIFT | KeyModifiers::ALT | KeyModifiers::CONTROL;
        let event = key_event(KeyCode::Right, all);
        assert_eq!(KeyMapper::map(&event, &modes), Some(b"\x1b[1;8C".to_vec()));

        let modes = InputModes { application_cursor: true, ..InputModes::default() };
        let event = key_event(KeyCode::Left, KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event, &modes), Some(b"\x1bOD".to_vec()));
    }

    #[test]
    fn test_function_keys() {
        let modes = InputModes::default();

        let event = key_event(KeyCode::F(1), KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event, &modes), Some(b"\x1bOP".to_vec()));

        let event = key_event(KeyCode::F(5), KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event, &modes), Some(b"\x1b[15~".to_vec()));

        let event = key_event(KeyCode::F(5), KeyModifiers::SHIFT);
        assert_eq!(KeyMapper::map(&event, &modes), Some(b"\x1b[15;2~".to_vec()));

        let event = key_event(KeyCode::F(12), KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event, &modes), Some(b"\x1b[24~".to_vec()));

        let event = key_event(KeyCode::F(2), KeyModifiers::CONTROL);
        assert_eq!(KeyMapper::map(&event, &modes), Some(b"\x1b[1;5Q".to_vec()));
    }

    #[test]
    fn test_editing_keys() {
        let modes = InputModes::default();

        let event = key_event(KeyCode::Delete, KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event, &modes), Some(b"\x1b[3~".to_vec()));

        let event = key_event(KeyCode::PageUp, KeyModifiers::CONTROL);
        assert_eq!(KeyMapper::map(&event, &modes), Some(b"\x1b[5;5~".to_vec()));

        let event = key_event(KeyCode::Home, KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event, &modes), Some(b"\x1b[H".to_vec()));

        // Alt+Backspace deletes a word in most shells
        let event = key_event(KeyCode::Backspace, KeyModifiers::ALT);
        assert_eq!(KeyMapper::map(&event, &modes), Some(vec![0x1B, 0x7F]));

        // Ctrl+Alt+letter
        let event = key_event(KeyCode::Char('b'), KeyModifiers::CONTROL | KeyModifiers::ALT);
        assert_eq!(KeyMapper::map(&event, &modes), Some(vec![0x1B, 0x02]));

        let event = key_event(KeyCode::Char('['), KeyModifiers::CONTROL);
        assert_eq!(KeyMapper::map(&event, &modes), Some(vec![0x1B]));

        let event = key_event(KeyCode::F(13), KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event, &modes), None);
    }

    #[test]
    fn test_quit_keys() {
        let q = key_event(KeyCode::Char('q'), KeyModifiers::NONE);
        let esc = key_event(KeyCode::Esc, KeyModifiers::NONE);
        let ctrl_c = key_event(KeyCode::Char('c'), KeyModifiers::CONTROL);
        let ctrl_q = key_event(KeyCode::Char('q'), KeyModifiers::CONTROL);

        // View only
        assert!(KeyMapper::is_quit(&q, false));
        assert!(KeyMapper::is_quit(&esc, false));
        assert!(KeyMapper::is_quit(&ctrl_c, false));
        assert!(KeyMapper::is_quit(&ctrl_q, false));

        // Forwarding input
        assert!(!KeyMapper::is_quit(&q, true));
        assert!(!KeyMapper::is_quit(&esc, true));
        assert!(!KeyMapper::is_quit(&ctrl_c, true));
        assert!(KeyMapper::is_quit(&ctrl_q, true));
    }
}
