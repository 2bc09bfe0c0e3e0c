//! Enablement gate for profiling
//!
//! The gate decides, once per coordinator lifetime, whether profiling
//! is permitted at all. Checks run in a fixed order and short-circuit
//! on the first failure; each failure is logged at evaluation time and
//! never again, because the coordinator caches the decision.
//!
//! A failed gate is not an error: profiling silently degrades to a
//! no-op and every finish call yields nothing.

use crate::config::ProfilerConfig;
use std::fmt;
use tracing::{debug, warn};

/// Minimum runtime capability level required for sampling.
pub const MIN_RUNTIME_API: u32 = 22;

/// Why the gate denied profiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateReason {
    /// Configured sample rate is 0.
    NotSampled,
    /// Hosting runtime is below the minimum capability level.
    UnsupportedPlatform,
    /// No traces directory configured.
    NoOutputLocation,
    /// Configured sampling frequency is 0 Hz.
    ZeroFrequency,
}

impl fmt::Display for GateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GateReason::NotSampled => "sample rate is 0",
            GateReason::UnsupportedPlatform => "runtime below minimum capability level",
            GateReason::NoOutputLocation => "no traces directory configured",
            GateReason::ZeroFrequency => "sampling frequency is 0 Hz",
        };
        f.write_str(s)
    }
}

/// Immutable snapshot of the enablement decision.
///
/// Computed on the first transaction start and never recomputed for
/// the life of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateDecision {
    allowed: bool,
    reason: Option<GateReason>,
}

impl GateDecision {
    fn allow() -> Self {
        GateDecision {
            allowed: true,
            reason: None,
        }
    }

    fn deny(reason: GateReason) -> Self {
        GateDecision {
            allowed: false,
            reason: Some(reason),
        }
    }

    pub fn allowed(&self) -> bool {
        self.allowed
    }

    pub fn reason(&self) -> Option<GateReason> {
        self.reason
    }
}

/// Capability description of the hosting runtime, supplied by the
/// embedding application at coordinator construction.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeInfo {
    pub api_level: u32,
}

impl Default for RuntimeInfo {
    fn default() -> Self {
        RuntimeInfo {
            api_level: MIN_RUNTIME_API,
        }
    }
}

/// One-shot evaluator of the profiling gate.
pub struct GateEvaluator;

impl GateEvaluator {
    /// Run the gate checks in order, short-circuiting on the first
    /// failure. The caller is responsible for caching the result.
    pub fn evaluate(config: &ProfilerConfig, runtime: &RuntimeInfo) -> GateDecision {
        if config.sample_rate <= 0.0 {
            warn!("profiling disabled: sample rate is 0");
            return GateDecision::deny(GateReason::NotSampled);
        }

        if runtime.api_level < MIN_RUNTIME_API {
            warn!(
                api_level = runtime.api_level,
                minimum = MIN_RUNTIME_API,
                "profiling disabled: runtime below minimum capability level"
            );
            return GateDecision::deny(GateReason::UnsupportedPlatform);
        }

        if !config.has_traces_dir() {
            warn!("profiling disabled: no traces directory configured");
            return GateDecision::deny(GateReason::NoOutputLocation);
        }

        if config.traces_hz == 0 {
            warn!("profiling disabled: sampling frequency is 0 Hz");
            return GateDecision::deny(GateReason::ZeroFrequency);
        }

        // The deprecated interval knob is read for diagnostics only.
        // It neither enables nor disables anything.
        #[allow(deprecated)]
        let legacy_interval = config.traces_interval_hz;
        if legacy_interval != 0 {
            debug!(
                traces_interval_hz = legacy_interval,
                "ignoring deprecated traces_interval_hz setting"
            );
        }

        GateDecision::allow()
    }
}
