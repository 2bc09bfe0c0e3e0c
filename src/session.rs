//! Recording session state machine
//!
//! A session is one contiguous recorder-active window. It owns the
//! set of transactions attributed to it, their timing entries, the
//! recording handle and the timeout handle. Transitions only move
//! forward: `Active → TimedOut → Finalized` or `Active → Finalized`;
//! there is no way back to `Active`.
//!
//! The session itself is not thread-safe. The coordinator serializes
//! all access through its own lock and uses the state enum as the
//! single "already finalized" check that decides the timeout-versus-
//! completion race.

use crate::clock;
use crate::recorder::RecordingHandle;
use crate::scheduler::CancelHandle;
use crate::transaction::TransactionHandle;
use std::time::Instant;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    TimedOut,
    Finalized,
}

/// Outcome of recording a finish call against a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishOutcome {
    /// This finish drained the pending count to zero; the caller must
    /// finalize the session.
    Drained,
    /// End timing recorded, other transactions still pending.
    StillPending,
    /// The transaction was already finished earlier; no-op.
    AlreadyFinished,
    /// The transaction is not tracked by this session.
    Unknown,
}

/// Timing entry for one tracked transaction.
///
/// Timestamps are absolute here; the artifact builder converts them to
/// offsets against the session's recording start.
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    pub id: String,
    pub name: String,
    pub started_at: Instant,
    pub start_cpu_ms: u64,
    pub ended_at: Option<Instant>,
    pub end_cpu_ms: Option<u64>,
}

/// One recorder-active window and its bookkeeping.
pub struct Session {
    generation: u64,
    started_at: Instant,
    start_cpu_ms: u64,
    recording: Option<RecordingHandle>,
    // Insertion order, keyed by id. Linear scan is fine: tens of
    // concurrent transactions, not thousands.
    tracked: Vec<TransactionRecord>,
    pending: usize,
    state: SessionState,
    timeout: Option<Box<dyn CancelHandle>>,
}

impl Session {
    /// Open a session. `recording` is `None` when the recorder failed
    /// to start; the session still tracks transactions so the caller's
    /// start/finish pairing stays consistent, but it will never
    /// produce an artifact.
    pub fn new(generation: u64, recording: Option<RecordingHandle>) -> Self {
        Session {
            generation,
            started_at: Instant::now(),
            start_cpu_ms: clock::process_cpu_millis(),
            recording,
            tracked: Vec::new(),
            pending: 0,
            state: SessionState::Active,
            timeout: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn start_cpu_ms(&self) -> u64 {
        self.start_cpu_ms
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn tracked(&self) -> &[TransactionRecord] {
        &self.tracked
    }

    pub fn is_tracked(&self, id: &str) -> bool {
        self.tracked.iter().any(|r| r.id == id)
    }

    /// Ids of every tracked transaction, for late-finisher routing
    /// after the session is discarded.
    pub fn tracked_ids(&self) -> Vec<String> {
        self.tracked.iter().map(|r| r.id.clone()).collect()
    }

    pub fn set_timeout(&mut self, handle: Box<dyn CancelHandle>) {
        self.timeout = Some(handle);
    }

    pub fn take_timeout(&mut self) -> Option<Box<dyn CancelHandle>> {
        self.timeout.take()
    }

    pub fn take_recording(&mut self) -> Option<RecordingHandle> {
        self.recording.take()
    }

    /// Add a transaction to the tracked set with start timings taken
    /// now. Re-tracking an id that is already present is tolerated and
    /// does not double-count the pending total. Returns whether the
    /// transaction was newly tracked.
    pub fn track(&mut self, tx: &TransactionHandle) -> bool {
        if self.state != SessionState::Active {
            return false;
        }
        if self.is_tracked(tx.id()) {
            return false;
        }
        self.tracked.push(TransactionRecord {
            id: tx.id().to_string(),
            name: tx.name().to_string(),
            started_at: Instant::now(),
            start_cpu_ms: clock::process_cpu_millis(),
            ended_at: None,
            end_cpu_ms: None,
        });
        self.pending += 1;
        true
    }

    /// Record end timings for a tracked transaction and decrement the
    /// pending count if it had not finished before.
    pub fn finish(&mut self, id: &str) -> FinishOutcome {
        let Some(record) = self.tracked.iter_mut().find(|r| r.id == id) else {
            return FinishOutcome::Unknown;
        };
        if record.ended_at.is_some() {
            return FinishOutcome::AlreadyFinished;
        }
        record.ended_at = Some(Instant::now());
        record.end_cpu_ms = Some(clock::process_cpu_millis());
        self.pending -= 1;
        if self.pending == 0 {
            FinishOutcome::Drained
        } else {
            FinishOutcome::StillPending
        }
    }

    /// `Active → TimedOut`. Freezes the tracked set.
    pub fn mark_timed_out(&mut self) {
        debug_assert_eq!(self.state, SessionState::Active);
        self.state = SessionState::TimedOut;
    }

    /// `Active/TimedOut → Finalized`.
    pub fn mark_finalized(&mut self) {
        self.state = SessionState::Finalized;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(id: &str) -> TransactionHandle {
        TransactionHandle::new(id, format!("txn-{id}"))
    }

    #[test]
    fn test_new_session_is_active_and_empty() {
        let s = Session::new(1, Some(RecordingHandle::new(1)));
        assert_eq!(s.state(), SessionState::Active);
        assert_eq!(s.pending(), 0);
        assert!(s.tracked().is_empty());
        assert_eq!(s.generation(), 1);
    }

    #[test]
    fn test_track_increments_pending() {
        let mut s = Session::new(1, None);
        assert!(s.track(&tx("a")));
        assert!(s.track(&tx("b")));
        assert_eq!(s.pending(), 2);
        assert!(s.is_tracked("a"));
        assert!(s.is_tracked("b"));
        assert!(!s.is_tracked("c"));
    }

    #[test]
    fn test_double_track_does_not_double_count() {
        let mut s = Session::new(1, None);
        assert!(s.track(&tx("a")));
        assert!(!s.track(&tx("a")));
        assert_eq!(s.pending(), 1);
        assert_eq!(s.tracked().len(), 1);
    }

    #[test]
    fn test_track_rejected_once_timed_out() {
        let mut s = Session::new(1, None);
        s.track(&tx("a"));
        s.mark_timed_out();
        assert!(!s.track(&tx("b")));
        assert_eq!(s.tracked().len(), 1);
    }

    #[test]
    fn test_finish_unknown() {
        let mut s = Session::new(1, None);
        assert_eq!(s.finish("ghost"), FinishOutcome::Unknown);
    }

    #[test]
    fn test_finish_drains_in_any_order() {
        let mut s = Session::new(1, None);
        s.track(&tx("a"));
        s.track(&tx("b"));
        s.track(&tx("c"));
        assert_eq!(s.finish("b"), FinishOutcome::StillPending);
        assert_eq!(s.finish("a"), FinishOutcome::StillPending);
        assert_eq!(s.finish("c"), FinishOutcome::Drained);
    }

    #[test]
    fn test_finish_twice_is_noop() {
        let mut s = Session::new(1, None);
        s.track(&tx("a"));
        s.track(&tx("b"));
        assert_eq!(s.finish("a"), FinishOutcome::StillPending);
        assert_eq!(s.finish("a"), FinishOutcome::AlreadyFinished);
        assert_eq!(s.pending(), 1);
    }

    #[test]
    fn test_finish_records_end_timings() {
        let mut s = Session::new(1, None);
        s.track(&tx("a"));
        s.finish("a");
        let rec = &s.tracked()[0];
        assert!(rec.ended_at.is_some());
        assert!(rec.end_cpu_ms.is_some());
        assert!(rec.ended_at.unwrap() >= rec.started_at);
    }

    #[test]
    fn test_tracked_ids_preserve_insertion_order() {
        let mut s = Session::new(1, None);
        s.track(&tx("first"));
        s.track(&tx("second"));
        s.track(&tx("third"));
        assert_eq!(s.tracked_ids(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_take_recording_is_once() {
        let mut s = Session::new(1, Some(RecordingHandle::new(9)));
        assert_eq!(s.take_recording(), Some(RecordingHandle::new(9)));
        assert_eq!(s.take_recording(), None);
    }
}
