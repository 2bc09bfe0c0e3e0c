//! Profiling artifact assembly
//!
//! Converts a finished or timed-out session plus the recorder's
//! capture into the final artifact. All timing rows are offsets from
//! the session's recording start rather than absolute timestamps, so
//! artifacts from different devices stay comparable.

use crate::clock;
use crate::recorder::Capture;
use crate::session::Session;
use serde::{Deserialize, Serialize};

/// Why a session's recording ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruncationReason {
    /// Every tracked transaction finished.
    Normal,
    /// The session timeout fired first.
    Timeout,
}

/// Session-relative timing row for one tracked transaction.
///
/// End fields are absent for transactions that had not finished when a
/// timed-out session was truncated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionTiming {
    pub id: String,
    pub relative_start_ns: u64,
    pub relative_end_ns: Option<u64>,
    pub relative_start_cpu_ms: u64,
    pub relative_end_cpu_ms: Option<u64>,
}

/// The finalized profiling output, delivered to exactly one caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfilingArtifact {
    pub lead_transaction_id: String,
    pub lead_transaction_name: String,
    pub transactions: Vec<TransactionTiming>,
    pub duration_ns: u64,
    pub truncation_reason: TruncationReason,
    pub environment: String,
    pub cpu_architecture: String,
    pub raw_trace: Vec<u8>,
}

impl ProfilingArtifact {
    /// Whether the capture produced no samples. The downstream
    /// transport discards such artifacts; the coordinator still
    /// returns them with whatever metadata it has.
    pub fn is_empty_capture(&self) -> bool {
        self.raw_trace.is_empty()
    }
}

/// Builds artifacts from sessions. Holds the fallback environment name
/// used when the capture does not report one.
#[derive(Debug, Clone)]
pub struct ArtifactBuilder {
    environment: String,
}

impl ArtifactBuilder {
    pub fn new(environment: impl Into<String>) -> Self {
        ArtifactBuilder {
            environment: environment.into(),
        }
    }

    /// Assemble the artifact for a session.
    ///
    /// The lead transaction is the first one tracked, the one whose
    /// start opened the session. All tracked transactions are
    /// included, end fields optional; a timed-out session therefore
    /// still accounts for the coverage of its unfinished transactions.
    ///
    /// `duration_ns` spans from the earliest relative start to the
    /// latest relative end. When no transaction has an end timing
    /// (timeout before any finish) the recorder-reported capture
    /// duration is used instead.
    pub fn build(
        &self,
        session: &Session,
        capture: &Capture,
        reason: TruncationReason,
    ) -> ProfilingArtifact {
        let origin = session.started_at();
        let origin_cpu = session.start_cpu_ms();

        let transactions: Vec<TransactionTiming> = session
            .tracked()
            .iter()
            .map(|rec| TransactionTiming {
                id: rec.id.clone(),
                relative_start_ns: clock::elapsed_ns(origin, rec.started_at),
                relative_end_ns: rec.ended_at.map(|t| clock::elapsed_ns(origin, t)),
                relative_start_cpu_ms: rec.start_cpu_ms.saturating_sub(origin_cpu),
                relative_end_cpu_ms: rec
                    .end_cpu_ms
                    .map(|ms| ms.saturating_sub(origin_cpu)),
            })
            .collect();

        let min_start = transactions
            .iter()
            .map(|t| t.relative_start_ns)
            .min()
            .unwrap_or(0);
        let max_end = transactions.iter().filter_map(|t| t.relative_end_ns).max();
        let duration_ns = match max_end {
            Some(end) => end.saturating_sub(min_start),
            None => u64::try_from(capture.duration.as_nanos()).unwrap_or(u64::MAX),
        };

        let (lead_transaction_id, lead_transaction_name) = session
            .tracked()
            .first()
            .map(|r| (r.id.clone(), r.name.clone()))
            .unwrap_or_default();

        let environment = if capture.environment.is_empty() {
            self.environment.clone()
        } else {
            capture.environment.clone()
        };

        ProfilingArtifact {
            lead_transaction_id,
            lead_transaction_name,
            transactions,
            duration_ns,
            truncation_reason: reason,
            environment,
            cpu_architecture: capture.cpu_architecture.clone(),
            raw_trace: capture.raw_trace.clone(),
        }
    }
}
