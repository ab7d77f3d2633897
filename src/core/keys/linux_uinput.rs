//! Virtual keyboard through `/dev/uinput`.
//!
//! The device needs write access to `/dev/uinput` (usually the `input` group or
//! a udev rule). Wayland compositors and X11 both pick the device up like any
//! other keyboard.

use super::{KeySink, VirtualKey};
use crate::error::{BotError, Result};
use log::{debug, warn};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::mem::size_of;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::time::Duration;

const EV_SYN: u16 = 0x00;
const EV_KEY: u16 = 0x01;
const SYN_REPORT: u16 = 0;

const BUS_VIRTUAL: u16 = 0x06;

// _IOW('U', 100, int), _IOW('U', 101, int), _IOW('U', 3, uinput_setup), _IO('U', 1), _IO('U', 2)
const UI_SET_EVBIT: u64 = 0x4004_5564;
const UI_SET_KEYBIT: u64 = 0x4004_5565;
const UI_DEV_SETUP: u64 = 0x405c_5503;
const UI_DEV_CREATE: u64 = 0x5501;
const UI_DEV_DESTROY: u64 = 0x5502;

const DEVICE_NAME: &[u8] = b"hitlane virtual keyboard";

#[repr(C)]
#[derive(Clone, Copy)]
struct InputId {
    bustype: u16,
    vendor: u16,
    product: u16,
    version: u16,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct UinputSetup {
    id: InputId,
    name: [u8; 80],
    ff_effects_max: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct InputEventRaw {
    tv_sec: libc::time_t,
    tv_usec: libc::suseconds_t,
    type_: u16,
    code: u16,
    value: i32,
}

pub struct UinputKeyboard {
    file: File,
}

#[inline(always)]
fn ioctl_arg(file: &File, request: u64, arg: libc::c_ulong) -> Result<()> {
    let rc = unsafe { libc::ioctl(file.as_raw_fd(), request as libc::Ioctl, arg) };
    if rc < 0 {
        return Err(BotError::KeyOutput(format!(
            "uinput ioctl {request:#x} failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(())
}

impl UinputKeyboard {
    pub fn open(keys: &[VirtualKey]) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open("/dev/uinput")
            .map_err(|e| BotError::KeyOutput(format!("cannot open /dev/uinput: {e}")))?;

        ioctl_arg(&file, UI_SET_EVBIT, libc::c_ulong::from(EV_KEY))?;
        for key in keys {
            ioctl_arg(&file, UI_SET_KEYBIT, libc::c_ulong::from(key.evdev_code()))?;
        }

        let mut setup = UinputSetup {
            id: InputId {
                bustype: BUS_VIRTUAL,
                vendor: 0x1209,
                product: 0x4c4e,
                version: 1,
            },
            name: [0; 80],
            ff_effects_max: 0,
        };
        setup.name[..DEVICE_NAME.len()].copy_from_slice(DEVICE_NAME);
        let rc = unsafe {
            libc::ioctl(
                file.as_raw_fd(),
                UI_DEV_SETUP as libc::Ioctl,
                &setup as *const UinputSetup,
            )
        };
        if rc < 0 {
            return Err(BotError::KeyOutput(format!(
                "uinput device setup failed: {}",
                std::io::Error::last_os_error()
            )));
        }
        ioctl_arg(&file, UI_DEV_CREATE, 0)?;

        // Give the session a moment to register the new device before the
        // first key event, otherwise early presses are dropped.
        std::thread::sleep(Duration::from_millis(200));
        debug!("uinput keyboard created with {} keys", keys.len());
        Ok(Self { file })
    }

    fn emit(&mut self, type_: u16, code: u16, value: i32) -> Result<()> {
        let ev = InputEventRaw {
            tv_sec: 0,
            tv_usec: 0,
            type_,
            code,
            value,
        };
        let bytes = unsafe {
            std::slice::from_raw_parts(
                (&ev as *const InputEventRaw).cast::<u8>(),
                size_of::<InputEventRaw>(),
            )
        };
        self.file
            .write_all(bytes)
            .map_err(|e| BotError::KeyOutput(format!("uinput write failed: {e}")))
    }

    fn key(&mut self, key: VirtualKey, down: bool) -> Result<()> {
        self.emit(EV_KEY, key.evdev_code(), i32::from(down))?;
        self.emit(EV_SYN, SYN_REPORT, 0)
    }
}

impl KeySink for UinputKeyboard {
    fn press(&mut self, key: VirtualKey) -> Result<()> {
        self.key(key, true)
    }

    fn release(&mut self, key: VirtualKey) -> Result<()> {
        self.key(key, false)
    }
}

impl Drop for UinputKeyboard {
    fn drop(&mut self) {
        if let Err(e) = ioctl_arg(&self.file, UI_DEV_DESTROY, 0) {
            warn!("Failed to destroy uinput keyboard: {e}");
        }
    }
}
