//! Session coordinator
//!
//! The public entry point of the crate. The coordinator owns at most
//! one live session, the cached enablement decision and the single
//! pending-timeout-artifact slot. `on_transaction_start` and
//! `on_transaction_finish` may be called concurrently from any number
//! of threads; the timeout callback arrives on the scheduler's thread.
//! Every mutation goes through one mutex, so finalization is a plain
//! state check inside the critical section: whichever of {last finish,
//! timeout} gets there first wins, and the loser observes the already-
//! resolved session and backs off.

use crate::artifact::{ArtifactBuilder, ProfilingArtifact, TruncationReason};
use crate::config::ProfilerConfig;
use crate::gate::{GateDecision, GateEvaluator, RuntimeInfo};
use crate::recorder::{Capture, Recorder};
use crate::scheduler::Scheduler;
use crate::session::{FinishOutcome, Session, SessionState};
use crate::transaction::TransactionHandle;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use thiserror::Error;
use tracing::{debug, warn};

/// Construction-time errors. Missing collaborators are programming
/// errors and are rejected eagerly rather than discovered at runtime.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("recorder collaborator is required")]
    MissingRecorder,

    #[error("scheduler collaborator is required")]
    MissingScheduler,

    #[error("sample rate {0} is outside [0.0, 1.0]")]
    InvalidSampleRate(f64),
}

/// Leftovers of a timed-out session: the tracked id set for routing
/// late finishers, and the artifact until someone claims it.
struct ExpiredSession {
    tracked_ids: Vec<String>,
    artifact: Option<ProfilingArtifact>,
}

struct Inner {
    /// Enablement decision, evaluated on the first start call and
    /// never again.
    gate: Option<GateDecision>,
    /// The one live session, if any.
    session: Option<Session>,
    /// Most recently timed-out session awaiting its claim.
    expired: Option<ExpiredSession>,
    next_generation: u64,
}

fn lock_inner(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Multiplexes one recorder across overlapping transactions and
/// delivers each session's artifact to exactly one caller.
pub struct Coordinator {
    inner: Arc<Mutex<Inner>>,
    recorder: Arc<dyn Recorder>,
    scheduler: Arc<dyn Scheduler>,
    config: ProfilerConfig,
    runtime: RuntimeInfo,
    builder: ArtifactBuilder,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator").finish_non_exhaustive()
    }
}

impl Coordinator {
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::new()
    }

    /// Register a transaction for profiling coverage.
    ///
    /// Evaluates the gate on first use. When profiling is enabled and
    /// no session is live, opens one: starts the recorder and arms the
    /// session timeout. The transaction is added to the live session's
    /// tracked set with start timings captured now. Re-registering an
    /// id that is already tracked is a no-op.
    pub fn on_transaction_start(&self, tx: &TransactionHandle) {
        if tx.id().is_empty() {
            warn!("ignoring transaction with empty id");
            return;
        }
        let mut inner = lock_inner(&self.inner);
        let gate = *inner
            .gate
            .get_or_insert_with(|| GateEvaluator::evaluate(&self.config, &self.runtime));
        if !gate.allowed() {
            return;
        }

        if inner.session.is_none() {
            let generation = inner.next_generation;
            inner.next_generation += 1;
            let recording = match self.recorder.start() {
                Ok(handle) => Some(handle),
                Err(e) => {
                    // Keep the session for start/finish pairing, but it
                    // will never produce an artifact.
                    warn!(error = %e, "recorder failed to start");
                    None
                }
            };
            let mut session = Session::new(generation, recording);
            let weak = Arc::downgrade(&self.inner);
            let recorder = Arc::clone(&self.recorder);
            let builder = self.builder.clone();
            let handle = self.scheduler.schedule(
                self.config.max_session_duration(),
                Box::new(move || timeout_fired(&weak, &recorder, &builder, generation)),
            );
            session.set_timeout(handle);
            debug!(generation, "opened recording session");
            inner.session = Some(session);
        }

        if let Some(session) = inner.session.as_mut() {
            if session.track(tx) {
                debug!(id = tx.id(), pending = session.pending(), "tracking transaction");
            }
        }
    }

    /// Resolve a transaction and, if it closes its session, receive
    /// the session's artifact.
    ///
    /// Returns `Some` in exactly two cases: this finish drained the
    /// live session's pending count to zero (a `Normal` artifact), or
    /// the transaction belonged to a timed-out session whose artifact
    /// had not yet been claimed (the `Timeout` artifact). Every other
    /// call returns `None`: gate disabled, unknown transaction,
    /// already-finished transaction, or an already-claimed artifact.
    pub fn on_transaction_finish(&self, tx: &TransactionHandle) -> Option<ProfilingArtifact> {
        let mut inner = lock_inner(&self.inner);
        // The gate is only ever evaluated by a start call; a finish
        // before any start has nothing to resolve.
        let gate = inner.gate?;
        if !gate.allowed() {
            return None;
        }

        if let Some(session) = inner.session.as_mut() {
            match session.finish(tx.id()) {
                FinishOutcome::Drained => {
                    let session = inner.session.take()?;
                    return self.finalize_natural(session);
                }
                FinishOutcome::StillPending | FinishOutcome::AlreadyFinished => return None,
                // Not ours; maybe it belongs to the expired session.
                FinishOutcome::Unknown => {}
            }
        }

        if let Some(expired) = inner.expired.as_mut() {
            if expired.tracked_ids.iter().any(|id| id == tx.id()) {
                let claimed = expired.artifact.take();
                if claimed.is_some() {
                    debug!(id = tx.id(), "delivering timed-out session artifact");
                }
                return claimed;
            }
        }
        None
    }

    /// Natural completion: the last pending transaction finished.
    /// Runs with the coordinator lock held.
    fn finalize_natural(&self, mut session: Session) -> Option<ProfilingArtifact> {
        if let Some(timeout) = session.take_timeout() {
            timeout.cancel();
        }
        session.mark_finalized();
        debug!(generation = session.generation(), "session completed");
        let capture = self.stop_recording(&mut session)?;
        Some(
            self.builder
                .build(&session, &capture, TruncationReason::Normal),
        )
    }

    fn stop_recording(&self, session: &mut Session) -> Option<Capture> {
        let handle = session.take_recording()?;
        match self.recorder.stop(handle) {
            Ok(capture) => Some(capture),
            Err(e) => {
                warn!(error = %e, "recorder failed to stop; no artifact for this session");
                None
            }
        }
    }
}

/// Timeout callback. Runs on the scheduler's thread; takes the same
/// lock as start/finish, so it either sees the session still Active
/// (and truncates it) or finds it already resolved and backs off.
fn timeout_fired(
    inner: &Weak<Mutex<Inner>>,
    recorder: &Arc<dyn Recorder>,
    builder: &ArtifactBuilder,
    generation: u64,
) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let mut guard = lock_inner(&inner);
    let live = guard
        .session
        .as_ref()
        .is_some_and(|s| s.generation() == generation && s.state() == SessionState::Active);
    if !live {
        // Stale timer: the session finalized naturally or was already
        // replaced. Nothing to do.
        return;
    }
    let Some(mut session) = guard.session.take() else {
        return;
    };
    session.mark_timed_out();
    // The timer has fired; the handle is spent.
    let _ = session.take_timeout();
    let capture = session.take_recording().and_then(|h| match recorder.stop(h) {
        Ok(capture) => Some(capture),
        Err(e) => {
            warn!(error = %e, "recorder failed to stop on timeout");
            None
        }
    });
    let artifact = capture.map(|c| builder.build(&session, &c, TruncationReason::Timeout));
    if guard
        .expired
        .as_ref()
        .is_some_and(|e| e.artifact.is_some())
    {
        debug!("discarding unclaimed artifact of a previous timed-out session");
    }
    warn!(
        generation,
        pending = session.pending(),
        "session timed out before all transactions finished"
    );
    guard.expired = Some(ExpiredSession {
        tracked_ids: session.tracked_ids(),
        artifact,
    });
}

/// Assembles a [`Coordinator`], validating that the required
/// collaborators were supplied.
#[derive(Default)]
pub struct CoordinatorBuilder {
    config: ProfilerConfig,
    runtime: RuntimeInfo,
    recorder: Option<Arc<dyn Recorder>>,
    scheduler: Option<Arc<dyn Scheduler>>,
}

impl CoordinatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: ProfilerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn runtime(mut self, runtime: RuntimeInfo) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn recorder(mut self, recorder: Arc<dyn Recorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn build(self) -> Result<Coordinator, BuildError> {
        let recorder = self.recorder.ok_or(BuildError::MissingRecorder)?;
        let scheduler = self.scheduler.ok_or(BuildError::MissingScheduler)?;
        if !(0.0..=1.0).contains(&self.config.sample_rate) {
            return Err(BuildError::InvalidSampleRate(self.config.sample_rate));
        }
        let builder = ArtifactBuilder::new(self.config.environment.clone());
        Ok(Coordinator {
            inner: Arc::new(Mutex::new(Inner {
                gate: None,
                session: None,
                expired: None,
                next_generation: 0,
            })),
            recorder,
            scheduler,
            config: self.config,
            runtime: self.runtime,
            builder,
        })
    }
}
