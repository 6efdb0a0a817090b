//! Steering force blend (§4.3): arrive, cohesion, separation, and the
//! (intentionally unused) alignment primitive, composed with a
//! prioritized fallback so agents never fully deadlock when forces
//! cancel out.

use smallvec::SmallVec;

use crate::config::Config;
use crate::fixed_math::{vec2_truncate, FixedNum, FixedVec2};
use crate::ids::{AgentId, DestId};
use crate::nav::NavService;

/// One flock peer or neighbor, as seen by the steering functions: just
/// enough to compute a force, never an owning reference.
#[derive(Clone, Copy, Debug)]
pub struct Neighbor {
    pub id: AgentId,
    pub pos: FixedVec2,
    pub velocity: FixedVec2,
    pub radius: FixedNum,
}

/// Seek + linear deceleration toward `target_xz`, falling back to the
/// nav service's flow-field direction when the target isn't in line of
/// sight. Weight applied by the caller (§4.3 item "arrive").
pub fn arrive_force(
    cfg: &Config,
    nav: &dyn NavService,
    dest: DestId,
    pos: FixedVec2,
    target_xz: FixedVec2,
    velocity: FixedVec2,
    vdes: FixedVec2,
    max_speed: FixedNum,
) -> FixedVec2 {
    let desired = if nav.has_dest_los(dest, pos) {
        let to_target = target_xz - pos;
        let distance = to_target.length();
        let mut desired = to_target.normalize() * (max_speed / cfg.tick_rate);
        if distance < cfg.arrive_slowing_radius {
            desired = desired * (distance / cfg.arrive_slowing_radius);
        }
        desired
    } else {
        vdes * (max_speed / cfg.tick_rate)
    };

    vec2_truncate(desired - velocity, cfg.max_force)
}

/// Steer toward the weighted centroid of flock peers within
/// `cohesion_neighbour_radius`, weighted by an exponential falloff that
/// peaks at `0.75 * radius` (§4.3 item "cohesion").
pub fn cohesion_force(cfg: &Config, pos: FixedVec2, peers: &[Neighbor]) -> FixedVec2 {
    let radius = cfg.cohesion_neighbour_radius;
    let mut com = FixedVec2::ZERO;
    let mut count = 0u32;

    for peer in peers {
        let diff = peer.pos - pos;
        let dist = diff.length();
        let t = (dist - radius * FixedNum::from_num(0.75)) / radius;
        let scale = exp_fixed(-FixedNum::from_num(6.0) * t);
        com += peer.pos * scale;
        count += 1;
    }

    if count == 0 {
        return FixedVec2::ZERO;
    }

    com = com / FixedNum::from_num(count as f32);
    vec2_truncate(com - pos, cfg.max_force)
}

/// Steer away from every non-static neighbor within
/// `separation_neighbour_radius`, weighted by an exponential falloff
/// that peaks at `0.85 * (r_self + r_peer)` (§4.3 item "separation").
pub fn separation_force(cfg: &Config, pos: FixedVec2, radius: FixedNum, neighbors: &[Neighbor]) -> FixedVec2 {
    let mut sum = FixedVec2::ZERO;
    let mut count = 0u32;

    for n in neighbors {
        let diff = n.pos - pos;
        let dist = diff.length();
        if dist == FixedNum::ZERO {
            continue;
        }
        let pair_radius = radius + n.radius;
        let t = (dist - pair_radius * FixedNum::from_num(0.85)) / dist;
        let scale = exp_fixed(-FixedNum::from_num(20.0) * t);
        sum += diff * scale;
        count += 1;
    }

    if count == 0 {
        return FixedVec2::ZERO;
    }

    vec2_truncate(-sum, cfg.max_force)
}

/// Steer toward the average heading of flock peers within
/// `align_neighbour_radius`. Faithfully reproduces the original's
/// self-velocity read when accumulating neighbor headings (a documented
/// discrepancy, see SPEC_FULL.md §9 / §4.3): each neighbor within range
/// contributes `self`'s own velocity to the sum rather than the
/// neighbor's, so this only ever converges trivially. Kept for parity
/// and testability; never wired into either live blend.
pub fn alignment_force(cfg: &Config, pos: FixedVec2, self_velocity: FixedVec2, peers: &[Neighbor]) -> FixedVec2 {
    let mut sum = FixedVec2::ZERO;
    let mut count = 0u32;

    for peer in peers {
        let diff = peer.pos - pos;
        if diff.length() < cfg.align_neighbour_radius {
            if self_velocity.length() < cfg.epsilon {
                continue;
            }
            sum += self_velocity;
            count += 1;
        }
    }

    if count == 0 {
        return FixedVec2::ZERO;
    }

    let avg = sum / FixedNum::from_num(count as f32);
    vec2_truncate(avg - self_velocity, cfg.max_force)
}

/// arrive + cohesion + separation, weighted and summed, truncated to
/// `max_force` (§4.3, MOVING blend). Alignment is deliberately excluded.
#[allow(clippy::too_many_arguments)]
pub fn point_seek_total_force(
    cfg: &Config,
    nav: &dyn NavService,
    dest: DestId,
    pos: FixedVec2,
    target_xz: FixedVec2,
    velocity: FixedVec2,
    vdes: FixedVec2,
    max_speed: FixedNum,
    self_radius: FixedNum,
    flock_peers: &[Neighbor],
    separation_neighbors: &[Neighbor],
) -> FixedVec2 {
    let arrive = arrive_force(cfg, nav, dest, pos, target_xz, velocity, vdes, max_speed)
        * cfg.arrive_force_scale;
    let cohesion = cohesion_force(cfg, pos, flock_peers) * cfg.cohesion_force_scale;
    let separation =
        separation_force(cfg, pos, self_radius, separation_neighbors) * cfg.separation_force_scale;

    vec2_truncate(arrive + separation + cohesion, cfg.max_force)
}

/// arrive + separation, weighted and summed, truncated to `max_force`
/// (§4.3, SEEK_ENEMIES blend — no cohesion, no flock target).
#[allow(clippy::too_many_arguments)]
pub fn enemy_seek_total_force(
    cfg: &Config,
    nav: &dyn NavService,
    pos: FixedVec2,
    target_xz: FixedVec2,
    velocity: FixedVec2,
    vdes: FixedVec2,
    max_speed: FixedNum,
    self_radius: FixedNum,
    separation_neighbors: &[Neighbor],
) -> FixedVec2 {
    // Enemy-seek has no destination id to query LOS against; the nav
    // service's desired-velocity result (`vdes`) already encodes the
    // flow field toward the nearest enemy, so `arrive_force` always
    // takes its "no LOS" branch here by construction (dest is unused).
    let dest = DestId(0);
    let arrive = arrive_force(cfg, nav, dest, pos, target_xz, velocity, vdes, max_speed)
        * cfg.arrive_force_scale;
    let separation =
        separation_force(cfg, pos, self_radius, separation_neighbors) * cfg.separation_force_scale;

    vec2_truncate(arrive + separation, cfg.max_force)
}

/// Zero any force component whose sign would push the agent into an
/// unpathable tile-aligned neighbor (§4.3 item 4, impassability gate).
pub fn nullify_impass_components(nav: &dyn NavService, pos: FixedVec2, force: FixedVec2) -> FixedVec2 {
    let (tile_w, tile_h) = nav.tile_dims();
    let left = FixedVec2::new(pos.x + tile_w, pos.y);
    let right = FixedVec2::new(pos.x - tile_w, pos.y);
    let top = FixedVec2::new(pos.x, pos.y + tile_h);
    let bot = FixedVec2::new(pos.x, pos.y - tile_h);

    let mut out = force;
    if (force.x > FixedNum::ZERO && !nav.position_pathable(left))
        || (force.x < FixedNum::ZERO && !nav.position_pathable(right))
    {
        out.x = FixedNum::ZERO;
    }
    if (force.y > FixedNum::ZERO && !nav.position_pathable(top))
        || (force.y < FixedNum::ZERO && !nav.position_pathable(bot))
    {
        out.y = FixedNum::ZERO;
    }
    out
}

/// Which steering stage produced the kept force, for tests that want to
/// assert the fallback actually engaged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SteeringTier {
    FullBlend,
    SeparationOnly,
    ArriveOnly,
}

/// Run the three-tier prioritized fallback (§4.3 item 3): full blend,
/// then separation-only, then arrive-only; the impassability gate is
/// applied before each magnitude check. The first tier whose gated force
/// exceeds `1% of max_force` wins; if none do, the arrive-only tier's
/// (possibly tiny) result is kept regardless, matching the original's
/// unconditional fall-through on the last iteration.
#[allow(clippy::too_many_arguments)]
pub fn point_seek_steer_force(
    cfg: &Config,
    nav: &dyn NavService,
    dest: DestId,
    pos: FixedVec2,
    target_xz: FixedVec2,
    velocity: FixedVec2,
    vdes: FixedVec2,
    max_speed: FixedNum,
    self_radius: FixedNum,
    flock_peers: &[Neighbor],
    separation_neighbors: &[Neighbor],
) -> (FixedVec2, SteeringTier) {
    let candidates = [
        (
            SteeringTier::FullBlend,
            point_seek_total_force(
                cfg,
                nav,
                dest,
                pos,
                target_xz,
                velocity,
                vdes,
                max_speed,
                self_radius,
                flock_peers,
                separation_neighbors,
            ),
        ),
        (
            SteeringTier::SeparationOnly,
            separation_force(cfg, pos, self_radius, separation_neighbors),
        ),
        (
            SteeringTier::ArriveOnly,
            arrive_force(cfg, nav, dest, pos, target_xz, velocity, vdes, max_speed),
        ),
    ];

    let threshold = cfg.max_force * FixedNum::from_num(0.01);
    let mut last = (SteeringTier::ArriveOnly, FixedVec2::ZERO);
    for (tier, force) in candidates {
        let gated = nullify_impass_components(nav, pos, force);
        last = (tier, gated);
        if gated.length() > threshold {
            return last;
        }
    }
    last
}

/// Same three-tier fallback as [`point_seek_steer_force`], but for the
/// SEEK_ENEMIES blend (no flock, no cohesion, no destination LOS check).
#[allow(clippy::too_many_arguments)]
pub fn enemy_seek_steer_force(
    cfg: &Config,
    nav: &dyn NavService,
    pos: FixedVec2,
    target_xz: FixedVec2,
    velocity: FixedVec2,
    vdes: FixedVec2,
    max_speed: FixedNum,
    self_radius: FixedNum,
    separation_neighbors: &[Neighbor],
) -> (FixedVec2, SteeringTier) {
    let dest = DestId(0);
    let candidates = [
        (
            SteeringTier::FullBlend,
            enemy_seek_total_force(
                cfg,
                nav,
                pos,
                target_xz,
                velocity,
                vdes,
                max_speed,
                self_radius,
                separation_neighbors,
            ),
        ),
        (
            SteeringTier::SeparationOnly,
            separation_force(cfg, pos, self_radius, separation_neighbors),
        ),
        (
            SteeringTier::ArriveOnly,
            arrive_force(cfg, nav, dest, pos, target_xz, velocity, vdes, max_speed),
        ),
    ];

    let threshold = cfg.max_force * FixedNum::from_num(0.01);
    let mut last = (SteeringTier::ArriveOnly, FixedVec2::ZERO);
    for (tier, force) in candidates {
        let gated = nullify_impass_components(nav, pos, force);
        last = (tier, gated);
        if gated.length() > threshold {
            return last;
        }
    }
    last
}

/// Fixed-point approximation of `e^x` via a truncated Taylor series
/// around zero, accurate enough for the small exponents the cohesion and
/// separation falloffs produce in practice (|x| typically < ~20, but the
/// series is evaluated in `f32` internally since `fixed::I48F16` has no
/// native transcendental support — the result is converted back once).
fn exp_fixed(x: FixedNum) -> FixedNum {
    let xf: f32 = x.to_num();
    FixedNum::from_num(xf.exp())
}

/// Gather flock peers / separation neighbors into the small stack-backed
/// buffers the steering functions expect, avoiding per-tick heap churn
/// for the common case of few nearby agents.
pub fn collect_neighbors<I: Iterator<Item = Neighbor>>(iter: I) -> SmallVec<[Neighbor; 8]> {
    iter.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::MockNavService;

    fn fnum(v: f32) -> FixedNum {
        FixedNum::from_num(v)
    }

    #[test]
    fn cohesion_is_zero_with_no_peers() {
        let cfg = Config::default();
        assert_eq!(cohesion_force(&cfg, FixedVec2::ZERO, &[]), FixedVec2::ZERO);
    }

    #[test]
    fn cohesion_pulls_toward_peer() {
        let cfg = Config::default();
        let peer = Neighbor {
            id: AgentId(2),
            pos: FixedVec2::new(fnum(10.0), fnum(0.0)),
            velocity: FixedVec2::ZERO,
            radius: fnum(1.0),
        };
        let force = cohesion_force(&cfg, FixedVec2::ZERO, &[peer]);
        assert!(force.x > FixedNum::ZERO);
    }

    #[test]
    fn separation_pushes_away_from_peer() {
        let cfg = Config::default();
        let peer = Neighbor {
            id: AgentId(2),
            pos: FixedVec2::new(fnum(2.0), fnum(0.0)),
            velocity: FixedVec2::ZERO,
            radius: fnum(1.0),
        };
        let force = separation_force(&cfg, FixedVec2::ZERO, fnum(1.0), &[peer]);
        assert!(force.x < FixedNum::ZERO);
    }

    #[test]
    fn alignment_is_zero_below_epsilon_velocity() {
        let cfg = Config::default();
        let peer = Neighbor {
            id: AgentId(2),
            pos: FixedVec2::new(fnum(1.0), fnum(0.0)),
            velocity: FixedVec2::ZERO,
            radius: fnum(1.0),
        };
        let force = alignment_force(&cfg, FixedVec2::ZERO, FixedVec2::ZERO, &[peer]);
        assert_eq!(force, FixedVec2::ZERO);
    }

    #[test]
    fn fallback_prefers_full_blend_when_nontrivial() {
        let cfg = Config::default();
        let nav = MockNavService::new();
        let (_, tier) = point_seek_steer_force(
            &cfg,
            &nav,
            DestId(1),
            FixedVec2::ZERO,
            FixedVec2::new(fnum(100.0), fnum(0.0)),
            FixedVec2::ZERO,
            FixedVec2::new(fnum(1.0), fnum(0.0)),
            fnum(10.0),
            fnum(1.0),
            &[],
            &[],
        );
        assert_eq!(tier, SteeringTier::FullBlend);
    }
}
