//! Velocity smoothing and orientation derivation (§4.5).
//!
//! Orientation lags the true instantaneous velocity slightly, trading a
//! small amount of responsiveness for much smoother turning.

use crate::fixed_math::{FixedNum, FixedVec2};
use crate::motion::VEL_HIST_LEN;

/// Weighted moving average of the velocity-history ring buffer, weights
/// decreasing linearly from `VEL_HIST_LEN` down to `1`.
///
/// The weights are applied to the buffer's raw array *slots*
/// (`vel_hist[0]` always gets weight `VEL_HIST_LEN`, `vel_hist[LEN-1]`
/// always gets weight `1`) rather than to chronological recency relative
/// to the ring's write cursor. This is a faithful reproduction of the
/// original weighting scheme — not a recency-correct exponential
/// moving average — and is preserved deliberately (SPEC_FULL.md §4.5/§9).
pub fn vel_wma(vel_hist: &[FixedVec2; VEL_HIST_LEN]) -> FixedVec2 {
    let mut sum = FixedVec2::ZERO;
    let mut denom = FixedNum::ZERO;

    for (i, v) in vel_hist.iter().enumerate() {
        let weight = FixedNum::from_num((VEL_HIST_LEN - i) as f32);
        sum += *v * weight;
        denom += weight;
    }

    sum / denom
}

/// Yaw-only orientation as a quaternion, derived from a smoothed
/// velocity vector. `atan2(v.y, v.x) - pi/2` matches the convention that
/// "facing +y" is the zero-rotation pose.
pub fn yaw_quat_from_velocity(v: FixedVec2) -> glam::Quat {
    let (x, y): (f32, f32) = v.to_f32();
    let angle = y.atan2(x) - std::f32::consts::FRAC_PI_2;
    glam::Quat::from_rotation_z(angle)
}

/// Update `orientation` in place from the smoothed velocity history,
/// only when the smoothed vector's magnitude exceeds `epsilon` (§4.5).
pub fn update_orientation(
    orientation: &mut glam::Quat,
    vel_hist: &[FixedVec2; VEL_HIST_LEN],
    epsilon: FixedNum,
) {
    let smoothed = vel_wma(vel_hist);
    if smoothed.length() > epsilon {
        *orientation = yaw_quat_from_velocity(smoothed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fnum(v: f32) -> FixedNum {
        FixedNum::from_num(v)
    }

    #[test]
    fn wma_of_uniform_history_equals_that_velocity() {
        let v = FixedVec2::new(fnum(2.0), fnum(0.0));
        let hist = [v; VEL_HIST_LEN];
        let wma = vel_wma(&hist);
        assert_eq!(wma, v);
    }

    #[test]
    fn wma_weights_slot_zero_most_heavily() {
        let mut hist = [FixedVec2::ZERO; VEL_HIST_LEN];
        hist[0] = FixedVec2::new(fnum(100.0), fnum(0.0));
        let wma = vel_wma(&hist);
        // slot 0 carries weight VEL_HIST_LEN out of a triangular-number
        // denominator; it should dominate but not equal the raw value.
        assert!(wma.x > FixedNum::ZERO);
        assert!(wma.x < fnum(100.0));
    }

    #[test]
    fn orientation_unchanged_below_epsilon() {
        let mut orientation = glam::Quat::IDENTITY;
        let hist = [FixedVec2::ZERO; VEL_HIST_LEN];
        update_orientation(&mut orientation, &hist, fnum(1.0 / 1024.0));
        assert_eq!(orientation, glam::Quat::IDENTITY);
    }

    #[test]
    fn orientation_updates_above_epsilon() {
        let mut orientation = glam::Quat::IDENTITY;
        let hist = [FixedVec2::new(fnum(1.0), fnum(0.0)); VEL_HIST_LEN];
        update_orientation(&mut orientation, &hist, fnum(1.0 / 1024.0));
        assert_ne!(orientation, glam::Quat::IDENTITY);
    }
}
