//! Performance profiling utilities.
//!
//! Only compiled when the `perf_stats` feature is enabled. Zero overhead
//! when disabled.

pub use skirmish_movement_macros::profile;
