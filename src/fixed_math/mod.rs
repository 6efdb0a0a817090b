//! Deterministic fixed-point mathematics library.
//!
//! This module provides deterministic math types and operations using
//! fixed-point arithmetic so that the same command stream produces
//! bit-identical state on any platform — critical for save/load
//! round-trips and for any future lockstep-replay use of this engine.

use fixed::types::I48F16;

pub use vec2::FixedVec2;

mod vec2;

/// Fixed-point number type used throughout the simulation.
///
/// Uses I48F16 format: 48 bits for the integer part, 16 bits for the
/// fractional part. This provides a range of approximately ±140 trillion
/// with a precision of ~0.000015.
pub type FixedNum = I48F16;

/// Truncate `v` to `max_len` if it exceeds it, preserving direction.
/// Ubiquitous in the steering pipeline: every force and velocity is clamped
/// this way rather than allowed to blow up.
pub fn vec2_truncate(v: FixedVec2, max_len: FixedNum) -> FixedVec2 {
    let len_sq = v.length_squared();
    if len_sq <= max_len * max_len || len_sq == FixedNum::ZERO {
        return v;
    }
    v.normalize() * max_len
}
