use serde::{Deserialize, Serialize};

use super::FixedNum;

/// A planar (x, z in world terms, but kept as x/y here) vector in
/// deterministic fixed-point. Every simulation quantity — position,
/// velocity, steering force — is one of these, never an `f32`/`f64`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FixedVec2 {
    pub x: FixedNum,
    pub y: FixedNum,
}

impl FixedVec2 {
    pub const ZERO: Self = Self {
        x: FixedNum::ZERO,
        y: FixedNum::ZERO,
    };

    pub fn new(x: FixedNum, y: FixedNum) -> Self {
        Self { x, y }
    }

    pub fn from_f32(x: f32, y: f32) -> Self {
        Self {
            x: FixedNum::from_num(x),
            y: FixedNum::from_num(y),
        }
    }

    pub fn to_f32(self) -> (f32, f32) {
        (self.x.to_num(), self.y.to_num())
    }

    pub fn length(self) -> FixedNum {
        let len_sq = self.length_squared();
        if len_sq == FixedNum::ZERO {
            return FixedNum::ZERO;
        }
        len_sq.sqrt()
    }

    pub fn length_squared(self) -> FixedNum {
        self.x * self.x + self.y * self.y
    }

    pub fn normalize(self) -> Self {
        let len = self.length();
        if len == FixedNum::ZERO {
            Self::ZERO
        } else {
            Self {
                x: self.x / len,
                y: self.y / len,
            }
        }
    }

    pub fn dot(self, other: Self) -> FixedNum {
        self.x * other.x + self.y * other.y
    }

    #[allow(dead_code)]
    pub fn cross(self, other: Self) -> FixedNum {
        self.x * other.y - self.y * other.x
    }

    pub fn distance(self, other: Self) -> FixedNum {
        (self - other).length()
    }

    pub fn distance_squared(self, other: Self) -> FixedNum {
        (self - other).length_squared()
    }
}

impl std::ops::Add for FixedVec2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::AddAssign for FixedVec2 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl std::ops::Sub for FixedVec2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl std::ops::Mul<FixedNum> for FixedVec2 {
    type Output = Self;
    fn mul(self, rhs: FixedNum) -> Self::Output {
        Self {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}

impl std::ops::Div<FixedNum> for FixedVec2 {
    type Output = Self;
    fn div(self, rhs: FixedNum) -> Self::Output {
        Self {
            x: self.x / rhs,
            y: self.y / rhs,
        }
    }
}

impl std::ops::Neg for FixedVec2 {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self {
            x: -self.x,
            y: -self.y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fnum(v: f32) -> FixedNum {
        FixedNum::from_num(v)
    }

    #[test]
    fn zero_length_is_zero() {
        assert_eq!(FixedVec2::ZERO.length(), FixedNum::ZERO);
    }

    #[test]
    fn normalize_zero_stays_zero() {
        assert_eq!(FixedVec2::ZERO.normalize(), FixedVec2::ZERO);
    }

    #[test]
    fn length_matches_pythagoras() {
        let v = FixedVec2::new(fnum(3.0), fnum(4.0));
        assert_eq!(v.length(), fnum(5.0));
    }

    #[test]
    fn normalize_preserves_direction() {
        let v = FixedVec2::new(fnum(3.0), fnum(4.0));
        let n = v.normalize();
        assert_eq!(n.length(), fnum(1.0));
    }

    #[test]
    fn truncate_leaves_short_vectors_alone() {
        let v = FixedVec2::new(fnum(1.0), fnum(0.0));
        assert_eq!(super::super::vec2_truncate(v, fnum(5.0)), v);
    }

    #[test]
    fn truncate_clamps_long_vectors() {
        let v = FixedVec2::new(fnum(10.0), fnum(0.0));
        let t = super::super::vec2_truncate(v, fnum(2.0));
        assert_eq!(t, FixedVec2::new(fnum(2.0), fnum(0.0)));
    }
}
