//! Cooperative cancellation for the poll loop.
//!
//! The process interrupt (Ctrl+C / SIGINT, SIGTERM, console close) only flips
//! an atomic flag; the loop notices it at the next cycle boundary.

use crate::error::{BotError, Result};
use log::info;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    follows_interrupt: bool,
}

impl CancelToken {
    /// A token only cancelled by an explicit [`CancelToken::cancel`].
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that is also cancelled by the process interrupt. Requires
    /// [`install_interrupt_handler`] to have run.
    pub fn interrupt() -> Self {
        Self {
            flag: Arc::default(),
            follows_interrupt: true,
        }
    }

    #[cfg(test)]
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    #[inline(always)]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || (self.follows_interrupt && INTERRUPTED.load(Ordering::SeqCst))
    }
}

#[cfg(unix)]
extern "C" fn on_signal(_: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

#[cfg(windows)]
unsafe extern "system" fn on_console_ctrl(_: u32) -> windows::core::BOOL {
    INTERRUPTED.store(true, Ordering::SeqCst);
    windows::core::BOOL::from(true)
}

/// Routes the process interrupt into [`CancelToken::interrupt`] tokens.
pub fn install_interrupt_handler() -> Result<()> {
    #[cfg(unix)]
    {
        let handler = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
        for sig in [libc::SIGINT, libc::SIGTERM] {
            if unsafe { libc::signal(sig, handler) } == libc::SIG_ERR {
                return Err(BotError::Unsupported("signal handler installation"));
            }
        }
    }
    #[cfg(windows)]
    unsafe {
        windows::Win32::System::Console::SetConsoleCtrlHandler(Some(on_console_ctrl), true)
            .map_err(|_| BotError::Unsupported("console control handler"))?;
    }
    info!("Press Ctrl+C to stop.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::CancelToken;

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled(), "cancelling twice is harmless");
    }
}
