//! Wall-clock and CPU-clock timestamp helpers
//!
//! Session-relative offsets in the artifact need two clocks: a
//! monotonic wall clock for nanosecond offsets and the process CPU
//! clock for CPU-millisecond offsets. Both are sampled at transaction
//! start/finish and converted to offsets against the session's
//! recording start when the artifact is built.

use std::time::Instant;

/// Milliseconds of CPU time consumed by the process so far.
///
/// Uses `CLOCK_PROCESS_CPUTIME_ID` so readings taken on different
/// threads stay comparable. Returns 0 if the clock is unavailable.
#[cfg(unix)]
pub fn process_cpu_millis() -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: clock_gettime only writes into the timespec we own.
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_PROCESS_CPUTIME_ID, &mut ts) };
    if rc != 0 {
        return 0;
    }
    (ts.tv_sec as u64) * 1_000 + (ts.tv_nsec as u64) / 1_000_000
}

/// Fallback for targets without a POSIX CPU clock.
#[cfg(not(unix))]
pub fn process_cpu_millis() -> u64 {
    0
}

/// Nanoseconds elapsed between `origin` and `at`, saturating at zero
/// when `at` precedes `origin`.
pub fn elapsed_ns(origin: Instant, at: Instant) -> u64 {
    let d = at.saturating_duration_since(origin);
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}
