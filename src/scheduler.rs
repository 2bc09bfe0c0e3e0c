//! Delayed-callback scheduler
//!
//! Sessions bound their lifetime with a timeout armed through this
//! interface. Cancellation is best-effort: a `cancel` racing the
//! firing callback may lose, and callers must tolerate the callback
//! running anyway.
//!
//! `ThreadScheduler` is the stock implementation: one short-lived
//! thread per timer, parked on a channel `recv_timeout` so `cancel`
//! is a cheap non-blocking send.

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::time::Duration;
use tracing::error;

/// Handle to a scheduled callback that has not yet fired.
pub trait CancelHandle: Send {
    /// Request that the callback not run. Best-effort; has no effect
    /// once the callback has started.
    fn cancel(&self);
}

/// Schedules a one-shot callback after a delay.
pub trait Scheduler: Send + Sync {
    fn schedule(
        &self,
        delay: Duration,
        callback: Box<dyn FnOnce() + Send + 'static>,
    ) -> Box<dyn CancelHandle>;
}

/// Thread-per-timer scheduler.
///
/// Sessions are long (seconds) and rare (one at a time), so a
/// dedicated thread per timeout is cheaper than keeping a timer wheel
/// alive for the whole process.
#[derive(Debug, Default)]
pub struct ThreadScheduler;

impl ThreadScheduler {
    pub fn new() -> Self {
        ThreadScheduler
    }
}

struct TimerCancel {
    tx: Sender<()>,
}

impl CancelHandle for TimerCancel {
    fn cancel(&self) {
        // A full or disconnected channel means the timer already
        // resolved; nothing left to cancel.
        let _ = self.tx.try_send(());
    }
}

impl Scheduler for ThreadScheduler {
    fn schedule(
        &self,
        delay: Duration,
        callback: Box<dyn FnOnce() + Send + 'static>,
    ) -> Box<dyn CancelHandle> {
        let (tx, rx) = bounded::<()>(1);
        let spawned = std::thread::Builder::new()
            .name("perfil-timeout".to_string())
            .spawn(move || match rx.recv_timeout(delay) {
                Err(RecvTimeoutError::Timeout) => callback(),
                // Cancelled, or every sender dropped.
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
            });
        if let Err(e) = spawned {
            // Timer thread could not start; the session will simply
            // never time out and must resolve naturally.
            error!(error = %e, "failed to spawn timeout thread");
        }
        Box::new(TimerCancel { tx })
    }
}
