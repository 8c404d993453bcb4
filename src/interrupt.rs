//! Ctrl-C handling
//!
//! The first SIGINT cancels the run's token so in-flight commands are
//! killed and both phases unwind. A second one terminates the process.

use declarative::CancelToken;
use std::sync::OnceLock;

static INTERRUPT: OnceLock<CancelToken> = OnceLock::new();

#[cfg(unix)]
extern "C" fn on_interrupt(_signal: libc::c_int) {
    if let Some(token) = INTERRUPT.get() {
        token.cancel();
    }
    // SAFETY: signal(2) is async-signal-safe; restores the default disposition
    unsafe {
        libc::signal(libc::SIGINT, libc::SIG_DFL);
    }
}

/// Route SIGINT to `cancel` (first call wins)
pub fn install(cancel: &CancelToken) {
    if INTERRUPT.set(cancel.clone()).is_err() {
        log::debug!("interrupt handler already installed");
        return;
    }

    #[cfg(unix)]
    // SAFETY: the handler only touches atomics and calls signal(2)
    unsafe {
        libc::signal(libc::SIGINT, on_interrupt as libc::sighandler_t);
    }
}
