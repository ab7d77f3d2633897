use crate::error::{BotError, Result};
use log::{info, warn};

/* ------------------------------ Virtual keys ------------------------------ */

/// Keyboard keys a lane can be bound to. Names follow the physical-key
/// convention (`KeyZ`, `Digit1`, `Period`, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VirtualKey {
    /// `b'A'..=b'Z'`
    Letter(u8),
    /// `0..=9`
    Digit(u8),
    Space,
    Comma,
    Period,
    Slash,
    Semicolon,
    Quote,
    BracketLeft,
    BracketRight,
    Backslash,
    Minus,
    Equal,
}

impl VirtualKey {
    /// Linux input-event code (`KEY_*` from `input-event-codes.h`).
    pub const fn evdev_code(self) -> u16 {
        const LETTERS: [u16; 26] = [
            30, 48, 46, 32, 18, 33, 34, 35, 23, 36, 37, 38, 50, 49, 24, 25, 16, 19, 31, 20, 22, 47,
            17, 45, 21, 44,
        ];
        match self {
            Self::Letter(c) => LETTERS[(c - b'A') as usize],
            Self::Digit(0) => 11,
            Self::Digit(d) => 1 + d as u16,
            Self::Minus => 12,
            Self::Equal => 13,
            Self::BracketLeft => 26,
            Self::BracketRight => 27,
            Self::Semicolon => 39,
            Self::Quote => 40,
            Self::Backslash => 43,
            Self::Comma => 51,
            Self::Period => 52,
            Self::Slash => 53,
            Self::Space => 57,
        }
    }

    /// Windows virtual-key code for a US layout.
    #[cfg(windows)]
    pub const fn windows_vk(self) -> u16 {
        match self {
            Self::Letter(c) => c as u16,
            Self::Digit(d) => b'0' as u16 + d as u16,
            Self::Space => 0x20,
            Self::Semicolon => 0xBA,
            Self::Equal => 0xBB,
            Self::Comma => 0xBC,
            Self::Minus => 0xBD,
            Self::Period => 0xBE,
            Self::Slash => 0xBF,
            Self::BracketLeft => 0xDB,
            Self::Backslash => 0xDC,
            Self::BracketRight => 0xDD,
            Self::Quote => 0xDE,
        }
    }

    pub fn name(self) -> String {
        match self {
            Self::Letter(c) => format!("Key{}", c as char),
            Self::Digit(d) => format!("Digit{d}"),
            Self::Space => "Space".into(),
            Self::Comma => "Comma".into(),
            Self::Period => "Period".into(),
            Self::Slash => "Slash".into(),
            Self::Semicolon => "Semicolon".into(),
            Self::Quote => "Quote".into(),
            Self::BracketLeft => "BracketLeft".into(),
            Self::BracketRight => "BracketRight".into(),
            Self::Backslash => "Backslash".into(),
            Self::Minus => "Minus".into(),
            Self::Equal => "Equal".into(),
        }
    }
}

impl std::fmt::Display for VirtualKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}

impl std::str::FromStr for VirtualKey {
    type Err = BotError;

    /// Accepts physical-key names (`KeyZ`, `Digit4`, `Slash`, optionally
    /// prefixed with `KeyCode::`) or the character itself (`z`, `4`, `/`).
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let s = s.strip_prefix("KeyCode::").unwrap_or(s);
        let unknown = || BotError::Config(format!("unknown key name '{s}'"));

        if let [c] = s.as_bytes() {
            return match c {
                b'a'..=b'z' | b'A'..=b'Z' => Ok(Self::Letter(c.to_ascii_uppercase())),
                b'0'..=b'9' => Ok(Self::Digit(c - b'0')),
                b' ' => Ok(Self::Space),
                b',' => Ok(Self::Comma),
                b'.' => Ok(Self::Period),
                b'/' => Ok(Self::Slash),
                b';' => Ok(Self::Semicolon),
                b'\'' => Ok(Self::Quote),
                b'[' => Ok(Self::BracketLeft),
                b']' => Ok(Self::BracketRight),
                b'\\' => Ok(Self::Backslash),
                b'-' => Ok(Self::Minus),
                b'=' => Ok(Self::Equal),
                _ => Err(unknown()),
            };
        }
        if let Some(rest) = s.strip_prefix("Key")
            && let [c @ b'A'..=b'Z'] = rest.as_bytes()
        {
            return Ok(Self::Letter(*c));
        }
        if let Some(rest) = s.strip_prefix("Digit")
            && let [c @ b'0'..=b'9'] = rest.as_bytes()
        {
            return Ok(Self::Digit(c - b'0'));
        }
        match s.to_ascii_lowercase().as_str() {
            "space" => Ok(Self::Space),
            "comma" => Ok(Self::Comma),
            "period" | "dot" => Ok(Self::Period),
            "slash" => Ok(Self::Slash),
            "semicolon" => Ok(Self::Semicolon),
            "quote" | "apostrophe" => Ok(Self::Quote),
            "bracketleft" => Ok(Self::BracketLeft),
            "bracketright" => Ok(Self::BracketRight),
            "backslash" => Ok(Self::Backslash),
            "minus" => Ok(Self::Minus),
            "equal" => Ok(Self::Equal),
            _ => Err(unknown()),
        }
    }
}

/// Comma-separated key list, e.g. `KeyZ,KeyX,Period,Slash`.
pub fn parse_key_list(s: &str) -> Result<Vec<VirtualKey>> {
    s.split(',')
        .filter(|tok| !tok.trim().is_empty())
        .map(str::parse)
        .collect()
}

/* ------------------------------- Key sinks ------------------------------- */

/// The keyboard-event primitive: one press or release per call.
pub trait KeySink {
    fn press(&mut self, key: VirtualKey) -> Result<()>;
    fn release(&mut self, key: VirtualKey) -> Result<()>;
}

impl<T: KeySink + ?Sized> KeySink for Box<T> {
    #[inline(always)]
    fn press(&mut self, key: VirtualKey) -> Result<()> {
        (**self).press(key)
    }

    #[inline(always)]
    fn release(&mut self, key: VirtualKey) -> Result<()> {
        (**self).release(key)
    }
}

/// Logs instead of typing; used by `--dry-run`.
#[derive(Debug, Default)]
pub struct DryRunKeys;

impl KeySink for DryRunKeys {
    fn press(&mut self, key: VirtualKey) -> Result<()> {
        info!("[dry-run] press {key}");
        Ok(())
    }

    fn release(&mut self, key: VirtualKey) -> Result<()> {
        info!("[dry-run] release {key}");
        Ok(())
    }
}

/// Tracks which keys are down so presses and releases are idempotent: a
/// release of a key that is not down, or a press of one that is, never
/// reaches the backend.
#[derive(Debug)]
pub struct HeldKeys<S> {
    sink: S,
    down: Vec<VirtualKey>,
}

impl<S: KeySink> HeldKeys<S> {
    pub const fn new(sink: S) -> Self {
        Self {
            sink,
            down: Vec::new(),
        }
    }

    #[inline(always)]
    pub fn is_down(&self, key: VirtualKey) -> bool {
        self.down.contains(&key)
    }

    /// Keys the backend has pressed and not yet confirmed released.
    #[inline(always)]
    pub fn held(&self) -> &[VirtualKey] {
        &self.down
    }

    /// Lets go of everything still down; returns how many releases went
    /// through. Keys whose release fails stay tracked for the next call.
    pub fn release_all(&mut self) -> usize {
        let before = self.down.len();
        let sink = &mut self.sink;
        self.down.retain(|&key| match sink.release(key) {
            Ok(()) => false,
            Err(e) => {
                warn!("Failed to release {key} during cleanup: {e}");
                true
            }
        });
        before - self.down.len()
    }

    #[cfg(test)]
    pub fn into_inner(mut self) -> S {
        self.release_all();
        let Self { sink, .. } = self;
        sink
    }
}

impl<S: KeySink> KeySink for HeldKeys<S> {
    fn press(&mut self, key: VirtualKey) -> Result<()> {
        if self.is_down(key) {
            return Ok(());
        }
        self.sink.press(key)?;
        self.down.push(key);
        Ok(())
    }

    fn release(&mut self, key: VirtualKey) -> Result<()> {
        let Some(pos) = self.down.iter().position(|&k| k == key) else {
            return Ok(());
        };
        self.sink.release(key)?;
        self.down.swap_remove(pos);
        Ok(())
    }
}

/* --------------------------- Platform backends --------------------------- */

#[cfg(target_os = "linux")]
mod linux_uinput;
#[cfg(windows)]
mod windows_send_input;

/// The platform's virtual keyboard, announcing the keys the lanes will use.
pub fn open_default(keys: &[VirtualKey]) -> Result<Box<dyn KeySink>> {
    #[cfg(target_os = "linux")]
    return Ok(Box::new(linux_uinput::UinputKeyboard::open(keys)?));
    #[cfg(windows)]
    {
        let _ = keys;
        return Ok(Box::new(windows_send_input::SendInputKeyboard));
    }
    #[cfg(not(any(windows, target_os = "linux")))]
    {
        let _ = keys;
        Err(BotError::Unsupported("keyboard output"))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{KeyAction, RecordingKeys};
    use super::{HeldKeys, KeySink, VirtualKey, parse_key_list};

    #[test]
    fn parses_names_and_characters() {
        let keys = parse_key_list("KeyZ, x ,.,Slash").expect("valid list");
        assert_eq!(
            keys,
            vec![
                VirtualKey::Letter(b'Z'),
                VirtualKey::Letter(b'X'),
                VirtualKey::Period,
                VirtualKey::Slash
            ]
        );
        assert_eq!("KeyCode::Digit7".parse::<VirtualKey>().unwrap(), VirtualKey::Digit(7));
        assert!("KeyZZ".parse::<VirtualKey>().is_err());
        assert!("F13".parse::<VirtualKey>().is_err());
    }

    #[test]
    fn names_round_trip_through_display() {
        for key in [
            VirtualKey::Letter(b'Q'),
            VirtualKey::Digit(0),
            VirtualKey::Semicolon,
            VirtualKey::BracketRight,
        ] {
            assert_eq!(key.to_string().parse::<VirtualKey>().unwrap(), key);
        }
    }

    #[test]
    fn platform_codes_match_us_layout() {
        assert_eq!(VirtualKey::Letter(b'Z').evdev_code(), 44);
        assert_eq!(VirtualKey::Letter(b'X').evdev_code(), 45);
        assert_eq!(VirtualKey::Letter(b'A').evdev_code(), 30);
        assert_eq!(VirtualKey::Letter(b'Q').evdev_code(), 16);
        assert_eq!(VirtualKey::Digit(1).evdev_code(), 2);
        assert_eq!(VirtualKey::Digit(0).evdev_code(), 11);
        assert_eq!(VirtualKey::Period.evdev_code(), 52);
    }

    #[cfg(windows)]
    #[test]
    fn virtual_key_codes_match_us_layout() {
        assert_eq!(VirtualKey::Slash.windows_vk(), 0xBF);
        assert_eq!(VirtualKey::Letter(b'Z').windows_vk(), 0x5A);
        assert_eq!(VirtualKey::Digit(4).windows_vk(), 0x34);
    }

    #[test]
    fn held_keys_drops_duplicate_edges() {
        let z = VirtualKey::Letter(b'Z');
        let mut keys = HeldKeys::new(RecordingKeys::default());
        keys.release(z).unwrap();
        keys.press(z).unwrap();
        keys.press(z).unwrap();
        keys.release(z).unwrap();
        keys.release(z).unwrap();
        assert_eq!(keys.release_all(), 0);
        let sink = keys.into_inner();
        assert_eq!(sink.log, vec![KeyAction::Press(z), KeyAction::Release(z)]);
    }

    #[test]
    fn failed_press_is_not_tracked_as_down() {
        let x = VirtualKey::Letter(b'X');
        let mut keys = HeldKeys::new(RecordingKeys {
            fail_presses: 1,
            ..Default::default()
        });
        assert!(keys.press(x).is_err());
        assert!(!keys.is_down(x));
        keys.press(x).unwrap();
        assert_eq!(keys.release_all(), 1);
    }

    #[test]
    fn failed_release_keeps_the_key_tracked_until_it_goes_through() {
        let z = VirtualKey::Letter(b'Z');
        let mut keys = HeldKeys::new(RecordingKeys {
            fail_releases: 2,
            ..Default::default()
        });
        keys.press(z).unwrap();
        assert!(keys.release(z).is_err());
        assert!(keys.is_down(z), "a release the backend rejected must be retried");
        assert_eq!(keys.release_all(), 0, "second release fails too");
        assert_eq!(keys.held(), &[z]);
        assert_eq!(keys.release_all(), 1);
        assert!(keys.held().is_empty());
        let sink = keys.into_inner();
        assert_eq!(sink.log, vec![KeyAction::Press(z), KeyAction::Release(z)]);
    }
}
