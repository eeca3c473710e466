//! POSIX signal handling for the daemon.
//!
//! SIGINT and SIGTERM request shutdown; SIGHUP requests an immediate
//! recalibration. The handlers only set bits in a static atomic; a poll
//! thread moves them into the shared [`SignalState`] the main loop reads.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Signals the daemon reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// SIGTERM.
    Terminate,
    /// SIGINT.
    Interrupt,
    /// SIGHUP, used to force a recalibration.
    Hangup,
}

impl SignalKind {
    const ALL: [SignalKind; 3] = [Self::Terminate, Self::Interrupt, Self::Hangup];

    fn bit(self) -> u32 {
        match self {
            Self::Terminate => 1 << 0,
            Self::Interrupt => 1 << 1,
            Self::Hangup => 1 << 2,
        }
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalKind::Terminate => write!(f, "SIGTERM"),
            SignalKind::Interrupt => write!(f, "SIGINT"),
            SignalKind::Hangup => write!(f, "SIGHUP"),
        }
    }
}

/// Requests raised by signals, shared between the poll thread and the
/// main loop.
#[derive(Debug, Default)]
pub struct SignalState {
    shutdown_requested: AtomicBool,
    recalibration_requested: AtomicBool,
    signal_count: AtomicU32,
}

impl SignalState {
    /// No pending requests.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether shutdown has been requested.
    #[inline]
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Relaxed)
    }

    /// Consume a pending recalibration request.
    #[inline]
    pub fn take_recalibration_request(&self) -> bool {
        self.recalibration_requested.swap(false, Ordering::Relaxed)
    }

    /// Request shutdown.
    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::Relaxed);
    }

    /// Request a forced recalibration.
    pub fn request_recalibration(&self) {
        self.recalibration_requested.store(true, Ordering::Relaxed);
    }

    /// Apply one delivered signal.
    fn record_signal(&self, kind: SignalKind) {
        self.signal_count.fetch_add(1, Ordering::Relaxed);
        match kind {
            SignalKind::Terminate | SignalKind::Interrupt => self.request_shutdown(),
            SignalKind::Hangup => self.request_recalibration(),
        }
    }

    /// Signals delivered so far.
    pub fn signal_count(&self) -> u32 {
        self.signal_count.load(Ordering::Relaxed)
    }
}

/// Bits set by the async-signal handlers, drained by the poll thread.
static PENDING_SIGNALS: AtomicU32 = AtomicU32::new(0);

/// Cloneable handle onto the shared signal state.
#[derive(Debug, Clone)]
pub struct SignalHandler {
    state: Arc<SignalState>,
}

impl SignalHandler {
    /// Install the handlers and start the poll thread.
    ///
    /// # Errors
    ///
    /// Fails if a handler cannot be installed or the poll thread cannot be
    /// spawned.
    pub fn install() -> std::io::Result<Self> {
        let handler = Self {
            state: Arc::new(SignalState::new()),
        };

        #[cfg(unix)]
        handler.register_unix_handlers()?;

        Ok(handler)
    }

    #[cfg(unix)]
    fn register_unix_handlers(&self) -> std::io::Result<()> {
        extern "C" fn on_signal(signum: libc::c_int) {
            let kind = match signum {
                libc::SIGTERM => SignalKind::Terminate,
                libc::SIGINT => SignalKind::Interrupt,
                _ => SignalKind::Hangup,
            };
            PENDING_SIGNALS.fetch_or(kind.bit(), Ordering::Relaxed);
        }

        let state = Arc::clone(&self.state);
        std::thread::Builder::new()
            .name("hubclock-signals".into())
            .spawn(move || loop {
                let pending = PENDING_SIGNALS.swap(0, Ordering::Relaxed);
                for kind in SignalKind::ALL {
                    if pending & kind.bit() != 0 {
                        info!(signal = %kind, "Signal received");
                        state.record_signal(kind);
                    }
                }
                if state.shutdown_requested() {
                    break;
                }
                std::thread::sleep(Duration::from_millis(10));
            })?;

        for signum in [libc::SIGTERM, libc::SIGINT, libc::SIGHUP] {
            // The handler only touches a static atomic, which is async-signal-safe
            #[allow(unsafe_code)]
            let previous = unsafe { libc::signal(signum, on_signal as libc::sighandler_t) };
            if previous == libc::SIG_ERR {
                return Err(std::io::Error::last_os_error());
            }
        }

        debug!("Unix signal handlers registered");
        Ok(())
    }

    /// Whether shutdown has been requested.
    #[inline]
    pub fn shutdown_requested(&self) -> bool {
        self.state.shutdown_requested()
    }

    /// Consume a pending recalibration request.
    #[inline]
    pub fn take_recalibration_request(&self) -> bool {
        self.state.take_recalibration_request()
    }

    /// Request shutdown from inside the daemon.
    pub fn request_shutdown(&self) {
        info!("Shutdown requested");
        self.state.request_shutdown();
    }

    /// Shared state, for inspection.
    pub fn state(&self) -> &SignalState {
        &self.state
    }
}

/// Sleep up to `timeout`, returning early with `true` once shutdown has
/// been requested.
pub fn wait_for_shutdown(handler: &SignalHandler, timeout: Duration) -> bool {
    let start = Instant::now();
    let poll_interval = Duration::from_millis(20);

    loop {
        if handler.shutdown_requested() {
            return true;
        }
        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return false;
        }
        std::thread::sleep(poll_interval.min(timeout - elapsed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_state_default() {
        let state = SignalState::new();
        assert!(!state.shutdown_requested());
        assert!(!state.take_recalibration_request());
        assert_eq!(state.signal_count(), 0);
    }

    #[test]
    fn test_hangup_requests_recalibration_once() {
        let state = SignalState::new();
        state.record_signal(SignalKind::Hangup);

        assert!(!state.shutdown_requested());
        assert!(state.take_recalibration_request());
        assert!(!state.take_recalibration_request());
        assert_eq!(state.signal_count(), 1);
    }

    #[test]
    fn test_terminate_and_interrupt_request_shutdown() {
        for kind in [SignalKind::Terminate, SignalKind::Interrupt] {
            let state = SignalState::new();
            state.record_signal(kind);
            assert!(state.shutdown_requested(), "{kind}");
        }
    }

    #[test]
    fn test_signal_bits_are_distinct() {
        let mask = SignalKind::ALL.iter().fold(0, |acc, k| acc | k.bit());
        assert_eq!(mask.count_ones(), 3);
    }

    #[test]
    fn test_wait_for_shutdown_times_out() {
        let handler = SignalHandler {
            state: Arc::new(SignalState::new()),
        };
        assert!(!wait_for_shutdown(&handler, Duration::from_millis(30)));

        handler.request_shutdown();
        assert!(wait_for_shutdown(&handler, Duration::from_secs(5)));
    }
}
