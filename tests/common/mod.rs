//! Shared test doubles for the coordinator suites: a fake recorder
//! with failure injection and a scheduler whose timers fire only when
//! the test says so.

#![allow(dead_code)]

use perfil::recorder::{Capture, Recorder, RecorderError, RecordingHandle};
use perfil::scheduler::{CancelHandle, Scheduler};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct FakeRecorder {
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub fail_start: AtomicBool,
    pub fail_stop: AtomicBool,
    next_token: AtomicU64,
}

impl FakeRecorder {
    pub fn new() -> Self {
        FakeRecorder {
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            fail_start: AtomicBool::new(false),
            fail_stop: AtomicBool::new(false),
            next_token: AtomicU64::new(1),
        }
    }
}

impl Recorder for FakeRecorder {
    fn start(&self) -> Result<RecordingHandle, RecorderError> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(RecorderError::Start("injected failure".to_string()));
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(RecordingHandle::new(
            self.next_token.fetch_add(1, Ordering::SeqCst),
        ))
    }

    fn stop(&self, _handle: RecordingHandle) -> Result<Capture, RecorderError> {
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(RecorderError::Stop("injected failure".to_string()));
        }
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(Capture {
            raw_trace: vec![0xCC; 32],
            duration: Duration::from_millis(120),
            environment: "test".to_string(),
            cpu_architecture: "x86_64".to_string(),
        })
    }
}

struct TimerSlot {
    callback: Option<Box<dyn FnOnce() + Send>>,
    cancelled: Arc<AtomicBool>,
}

/// Deterministic scheduler: timers are queued and fire only on
/// `fire_all`.
#[derive(Default)]
pub struct ManualScheduler {
    pending: Mutex<Vec<TimerSlot>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every queued, uncancelled callback.
    pub fn fire_all(&self) {
        let slots: Vec<TimerSlot> = self.pending.lock().unwrap().drain(..).collect();
        for mut slot in slots {
            if !slot.cancelled.load(Ordering::SeqCst) {
                if let Some(cb) = slot.callback.take() {
                    cb();
                }
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }
}

struct FlagCancel(Arc<AtomicBool>);

impl CancelHandle for FlagCancel {
    fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(
        &self,
        _delay: Duration,
        callback: Box<dyn FnOnce() + Send + 'static>,
    ) -> Box<dyn CancelHandle> {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.pending.lock().unwrap().push(TimerSlot {
            callback: Some(callback),
            cancelled: Arc::clone(&cancelled),
        });
        Box::new(FlagCancel(cancelled))
    }
}
