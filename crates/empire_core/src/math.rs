//! Fixed-point math utilities for deterministic simulation.
//!
//! All tick computation uses fixed-point arithmetic so that two engines fed
//! the same snapshot and seed produce bit-identical deltas on any CPU.
//!
//! Angles are expressed in degrees as [`Fixed`]. The galaxy uses the
//! original navigation convention: heading 0 points "north" (towards
//! decreasing `y`) and heading 90 points "east" (towards increasing `x`).

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
/// Range: approximately -2,147,483,648 to 2,147,483,647
/// Precision: approximately 0.00000000023
pub type Fixed = I32F32;

/// π with 32 fractional bits.
pub const PI: Fixed = Fixed::from_bits(0x3_243F_6A89);

/// A full turn in degrees.
pub const FULL_TURN: Fixed = Fixed::from_bits(360 << 32);

/// A right angle in degrees.
const QUARTER_TURN: Fixed = Fixed::from_bits(90 << 32);

/// Fixed-point 2D vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y coordinate.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Create a vector from whole galactic units.
    #[must_use]
    pub fn from_units(x: i32, y: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Euclidean length.
    ///
    /// Squares are accumulated in 128 bits, so galaxy-scale offsets do not
    /// overflow the 32 integer bits of [`Fixed`].
    #[must_use]
    pub fn length(self) -> Fixed {
        let dx = i128::from(self.x.to_bits());
        let dy = i128::from(self.y.to_bits());
        // 64 fractional bits in, 32 fractional bits out.
        let root = isqrt_u128((dx * dx + dy * dy) as u128);
        Fixed::from_bits(i64::try_from(root).unwrap_or(i64::MAX))
    }

    /// Straight-line distance between two points, ignoring galaxy wrap.
    #[must_use]
    pub fn distance(self, other: Self) -> Fixed {
        (other - self).length()
    }

    /// Offset of `dist` along `heading` degrees.
    #[must_use]
    pub fn along_heading(heading: Fixed, dist: Fixed) -> Self {
        let (sin, cos) = sin_cos_deg(heading);
        Self::new(dist.saturating_mul(sin), -dist.saturating_mul(cos))
    }
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x.saturating_add(rhs.x),
            y: self.y.saturating_add(rhs.y),
        }
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x.saturating_sub(rhs.x),
            y: self.y.saturating_sub(rhs.y),
        }
    }
}

/// Floor square root of a 128-bit integer (Newton iteration).
fn isqrt_u128(n: u128) -> u128 {
    if n < 2 {
        return n;
    }
    let bits = 128 - n.leading_zeros();
    let mut x = 1u128 << (bits / 2 + 1);
    loop {
        let y = (x + n / x) / 2;
        if y >= x {
            return x;
        }
        x = y;
    }
}

/// Square root of a non-negative fixed-point number.
///
/// Negative input yields zero.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }
    let widened = (value.to_bits() as u128) << 32;
    Fixed::from_bits(i64::try_from(isqrt_u128(widened)).unwrap_or(i64::MAX))
}

/// Convert a whole percentage into a fraction.
#[must_use]
pub fn percent(value: i64) -> Fixed {
    Fixed::saturating_from_num(value) / Fixed::from_num(100)
}

/// Clamp a value into `[lo, hi]`.
#[must_use]
pub fn clamp_fixed(value: Fixed, lo: Fixed, hi: Fixed) -> Fixed {
    value.max(lo).min(hi)
}

/// Normalize an angle into `[0, 360)`.
#[must_use]
pub fn normalize_degrees(angle: Fixed) -> Fixed {
    let wrapped = angle % FULL_TURN;
    if wrapped < Fixed::ZERO {
        wrapped + FULL_TURN
    } else {
        wrapped
    }
}

/// Signed shortest rotation from `from` to `to`, in `(-180, 180]`.
#[must_use]
pub fn shortest_turn(from: Fixed, to: Fixed) -> Fixed {
    let half = FULL_TURN / Fixed::from_num(2);
    let diff = normalize_degrees(to - from);
    if diff > half {
        diff - FULL_TURN
    } else {
        diff
    }
}

/// Sine of an angle in `[0, 90]` degrees.
fn sin_first_quadrant(deg: Fixed) -> Fixed {
    if deg >= QUARTER_TURN {
        return Fixed::ONE;
    }
    if deg <= Fixed::ZERO {
        return Fixed::ZERO;
    }
    let x = deg * PI / Fixed::from_num(180);
    let x2 = x * x;
    // Horner form of the Taylor series up to x^11.
    let mut acc = Fixed::ONE - x2 / Fixed::from_num(110);
    acc = Fixed::ONE - x2 / Fixed::from_num(72) * acc;
    acc = Fixed::ONE - x2 / Fixed::from_num(42) * acc;
    acc = Fixed::ONE - x2 / Fixed::from_num(20) * acc;
    acc = Fixed::ONE - x2 / Fixed::from_num(6) * acc;
    (x * acc).min(Fixed::ONE)
}

/// Sine and cosine of an angle given in degrees.
///
/// Exact at multiples of 90 degrees.
#[must_use]
pub fn sin_cos_deg(angle: Fixed) -> (Fixed, Fixed) {
    let a = normalize_degrees(angle);
    let quadrant = (a / QUARTER_TURN).to_num::<i32>();
    let rem = a - QUARTER_TURN * Fixed::from_num(quadrant);
    let s = sin_first_quadrant(rem);
    let c = sin_first_quadrant(QUARTER_TURN - rem);
    match quadrant {
        0 => (s, c),
        1 => (c, -s),
        2 => (-s, -c),
        _ => (-c, s),
    }
}

/// Arctangent of `z` in `[0, 1]`, in degrees.
fn atan_unit_deg(z: Fixed) -> Fixed {
    // atan(z) ~ pi/4 z - z (z - 1)(0.2447 + 0.0663 z), max error ~0.09 degrees.
    let a = Fixed::from_bits(0x3EA4_A8C1); // 0.2447
    let b = Fixed::from_bits(0x10F9_096C); // 0.0663
    let rad = PI / Fixed::from_num(4) * z - z * (z - Fixed::ONE) * (a + b * z);
    rad * Fixed::from_num(180) / PI
}

/// Heading (degrees) that points along `offset`.
///
/// A zero offset yields heading 0.
#[must_use]
pub fn bearing_deg(offset: Vec2Fixed) -> Fixed {
    let ax = offset.x.abs();
    let ay = offset.y.abs();
    if ax == Fixed::ZERO && ay == Fixed::ZERO {
        return Fixed::ZERO;
    }
    // Angle measured from the north axis towards the offset.
    let theta = if ay >= ax {
        atan_unit_deg(ax / ay)
    } else {
        QUARTER_TURN - atan_unit_deg(ay / ax)
    };
    let half = FULL_TURN / Fixed::from_num(2);
    let north = offset.y <= Fixed::ZERO;
    let east = offset.x >= Fixed::ZERO;
    let heading = match (north, east) {
        (true, true) => theta,
        (false, true) => half - theta,
        (false, false) => half + theta,
        (true, false) => FULL_TURN - theta,
    };
    normalize_degrees(heading)
}
