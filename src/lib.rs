//! Perfil - in-process profiling session coordinator
//!
//! This library decides when CPU sampling may run, multiplexes one
//! recorder across overlapping transactions, bounds every recording
//! window with a timeout, and delivers each session's profiling
//! artifact to exactly one caller exactly once.

pub mod artifact;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod gate;
pub mod recorder;
pub mod scheduler;
pub mod session;
pub mod transaction;
