//! Tunable constants, loaded from a human-readable RON file and converted
//! once into fixed-point for the simulation layer.
//!
//! # Why two layers?
//!
//! [`RawConfig`] is user-facing (hand-edited RON, plain `f32`s — easy to
//! write `separation_weight: 0.6`). [`Config`] is what the engine actually
//! reads, with every value pre-converted to [`FixedNum`]. Keeping the
//! conversion at a single boundary means the rest of the crate never does
//! `f32 -> FixedNum` conversion scattered through hot-path code, and no
//! config reload can silently introduce a float rounding difference
//! between two engines mid-run (config is meant to be loaded once, at
//! `MovementEngine::new`, and never hot-reloaded while replaying a
//! deterministic history).

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::MovementResult;
use crate::fixed_math::FixedNum;

/// User-facing configuration, as written in a `.ron` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawConfig {
    pub tick_rate: f32,
    pub mass: f32,
    pub epsilon: f32,
    pub max_force: f32,
    pub separation_force_scale: f32,
    pub arrive_force_scale: f32,
    pub cohesion_force_scale: f32,
    pub cohesion_neighbour_radius: f32,
    pub align_neighbour_radius: f32,
    pub separation_neighbour_radius: f32,
    pub adjacency_sep_dist: f32,
    pub arrive_slowing_radius: f32,
    pub clearpath_neighbour_radius: f32,
    pub collision_max_see_ahead: f32,
    pub wait_ticks: u32,
    pub vel_hist_len: usize,
    pub spatial_hash_cell_size: f32,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            tick_rate: 20.0,
            mass: 1.0,
            epsilon: 1.0 / 1024.0,
            max_force: 0.75,
            separation_force_scale: 0.6,
            arrive_force_scale: 0.5,
            cohesion_force_scale: 0.15,
            cohesion_neighbour_radius: 50.0,
            align_neighbour_radius: 10.0,
            separation_neighbour_radius: 30.0,
            adjacency_sep_dist: 5.0,
            arrive_slowing_radius: 10.0,
            clearpath_neighbour_radius: 30.0,
            collision_max_see_ahead: 10.0,
            wait_ticks: 60,
            vel_hist_len: 14,
            spatial_hash_cell_size: 32.0,
        }
    }
}

/// Simulation-layer configuration: every tunable pre-converted to
/// [`FixedNum`], read every tick by the steering and integration code.
#[derive(Debug, Clone)]
pub struct Config {
    pub tick_rate: FixedNum,
    pub mass: FixedNum,
    pub epsilon: FixedNum,
    pub max_force: FixedNum,
    pub separation_force_scale: FixedNum,
    pub arrive_force_scale: FixedNum,
    pub cohesion_force_scale: FixedNum,
    pub cohesion_neighbour_radius: FixedNum,
    pub align_neighbour_radius: FixedNum,
    pub separation_neighbour_radius: FixedNum,
    pub adjacency_sep_dist: FixedNum,
    pub arrive_slowing_radius: FixedNum,
    pub clearpath_neighbour_radius: FixedNum,
    pub collision_max_see_ahead: FixedNum,
    pub wait_ticks: u32,
    pub vel_hist_len: usize,
    pub spatial_hash_cell_size: FixedNum,
}

impl Config {
    pub fn from_raw(raw: &RawConfig) -> Self {
        Self {
            tick_rate: FixedNum::from_num(raw.tick_rate),
            mass: FixedNum::from_num(raw.mass),
            epsilon: FixedNum::from_num(raw.epsilon),
            max_force: FixedNum::from_num(raw.max_force),
            separation_force_scale: FixedNum::from_num(raw.separation_force_scale),
            arrive_force_scale: FixedNum::from_num(raw.arrive_force_scale),
            cohesion_force_scale: FixedNum::from_num(raw.cohesion_force_scale),
            cohesion_neighbour_radius: FixedNum::from_num(raw.cohesion_neighbour_radius),
            align_neighbour_radius: FixedNum::from_num(raw.align_neighbour_radius),
            separation_neighbour_radius: FixedNum::from_num(raw.separation_neighbour_radius),
            adjacency_sep_dist: FixedNum::from_num(raw.adjacency_sep_dist),
            arrive_slowing_radius: FixedNum::from_num(raw.arrive_slowing_radius),
            clearpath_neighbour_radius: FixedNum::from_num(raw.clearpath_neighbour_radius),
            collision_max_see_ahead: FixedNum::from_num(raw.collision_max_see_ahead),
            wait_ticks: raw.wait_ticks,
            vel_hist_len: raw.vel_hist_len,
            spatial_hash_cell_size: FixedNum::from_num(raw.spatial_hash_cell_size),
        }
    }

    pub fn from_ron_str(s: &str) -> MovementResult<Self> {
        let raw: RawConfig = ron::from_str(s)?;
        Ok(Self::from_raw(&raw))
    }

    pub fn from_file(path: impl AsRef<Path>) -> MovementResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron_str(&text)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_raw(&RawConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_authoritative_constants() {
        let cfg = Config::default();
        assert_eq!(cfg.max_force, FixedNum::from_num(0.75));
        assert_eq!(cfg.wait_ticks, 60);
        assert_eq!(cfg.vel_hist_len, 14);
    }

    #[test]
    fn round_trips_through_ron() {
        let raw = RawConfig::default();
        let text = ron::to_string(&raw).unwrap();
        let cfg = Config::from_ron_str(&text).unwrap();
        assert_eq!(cfg.separation_force_scale, FixedNum::from_num(0.6));
    }
}
