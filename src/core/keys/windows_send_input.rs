use super::{KeySink, VirtualKey};
use crate::error::{BotError, Result};
use std::mem::size_of;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    INPUT, INPUT_0, INPUT_KEYBOARD, KEYBD_EVENT_FLAGS, KEYBDINPUT, KEYEVENTF_KEYUP, SendInput,
    VIRTUAL_KEY,
};

/// Injects keystrokes into the foreground window with `SendInput`.
#[derive(Debug, Default)]
pub struct SendInputKeyboard;

impl SendInputKeyboard {
    fn send(key: VirtualKey, flags: KEYBD_EVENT_FLAGS) -> Result<()> {
        let input = INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: VIRTUAL_KEY(key.windows_vk()),
                    wScan: 0,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        };
        let sent = unsafe { SendInput(&[input], size_of::<INPUT>() as i32) };
        if sent != 1 {
            return Err(BotError::KeyOutput(format!(
                "SendInput dropped {key}: {}",
                std::io::Error::last_os_error()
            )));
        }
        Ok(())
    }
}

impl KeySink for SendInputKeyboard {
    fn press(&mut self, key: VirtualKey) -> Result<()> {
        Self::send(key, KEYBD_EVENT_FLAGS(0))
    }

    fn release(&mut self, key: VirtualKey) -> Result<()> {
        Self::send(key, KEYEVENTF_KEYUP)
    }
}
