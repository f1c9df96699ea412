//! Numeric primitives shared by the draw routines and the shrinker.
//!
//! All comparisons the engine makes on floats go through the exact bit view
//! here rather than through `==`, so that `-0.0`/`0.0` and NaN payloads are
//! never conflated.

use half::f16;

/// Float widths supported by the bit-level helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatWidth {
    Width16,
    Width32,
    Width64,
}

impl FloatWidth {
    pub fn bits(self) -> u32 {
        match self {
            FloatWidth::Width16 => 16,
            FloatWidth::Width32 => 32,
            FloatWidth::Width64 => 64,
        }
    }

    fn sign_mask(self) -> u64 {
        1u64 << (self.bits() - 1)
    }

    /// Smallest positive normal number representable at this width.
    pub fn smallest_normal(self) -> f64 {
        match self {
            FloatWidth::Width16 => f16::MIN_POSITIVE.to_f64(),
            FloatWidth::Width32 => f32::MIN_POSITIVE as f64,
            FloatWidth::Width64 => f64::MIN_POSITIVE,
        }
    }
}

/// Direction to step in for [`adjacent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

pub fn float_to_bits(value: f64) -> u64 {
    value.to_bits()
}

pub fn bits_to_float(bits: u64) -> f64 {
    f64::from_bits(bits)
}

/// Reinterpret `value`, narrowed to `width`, as an unsigned integer.
pub fn float_to_int(value: f64, width: FloatWidth) -> u64 {
    match width {
        FloatWidth::Width16 => f16::from_f64(value).to_bits() as u64,
        FloatWidth::Width32 => (value as f32).to_bits() as u64,
        FloatWidth::Width64 => value.to_bits(),
    }
}

/// Inverse of [`float_to_int`]; high bits beyond the width are ignored.
pub fn int_to_float(value: u64, width: FloatWidth) -> f64 {
    match width {
        FloatWidth::Width16 => f16::from_bits(value as u16).to_f64(),
        FloatWidth::Width32 => f32::from_bits(value as u32) as f64,
        FloatWidth::Width64 => f64::from_bits(value),
    }
}

/// `1.0` or `-1.0` carrying the sign bit of `value`, so `sign(-0.0) == -1.0`.
pub fn sign(value: f64) -> f64 {
    1.0f64.copysign(value)
}

pub fn is_negative(value: f64) -> bool {
    sign(value) < 0.0
}

/// The next representable float above `value` at `width` (IEEE 754 `nextUp`).
pub fn next_up(value: f64, width: FloatWidth) -> f64 {
    if value.is_nan() || (value.is_infinite() && value > 0.0) {
        return value;
    }
    if value == 0.0 && is_negative(value) {
        return 0.0;
    }
    let bits = float_to_int(value, width);
    // Positive floats grow with their bit pattern, negative floats shrink.
    let stepped = if bits & width.sign_mask() == 0 {
        bits + 1
    } else {
        bits - 1
    };
    int_to_float(stepped, width)
}

pub fn next_down(value: f64, width: FloatWidth) -> f64 {
    -next_up(-value, width)
}

/// Like [`next_down`], but lands on zero or the negative smallest normal
/// instead of a subnormal when subnormals are disallowed.
pub fn next_down_normal(value: f64, width: FloatWidth, allow_subnormal: bool) -> f64 {
    let value = next_down(value, width);
    let smallest = width.smallest_normal();
    if !allow_subnormal && value != 0.0 && value.abs() < smallest {
        return if value > 0.0 { 0.0 } else { -smallest };
    }
    value
}

pub fn next_up_normal(value: f64, width: FloatWidth, allow_subnormal: bool) -> f64 {
    -next_down_normal(-value, width, allow_subnormal)
}

/// Step one representable 64-bit float from `value`.
///
/// NaN maps to NaN, each infinity is fixed in its own direction, and the two
/// zeros are neighbours of each other.
pub fn adjacent(value: f64, direction: Direction) -> f64 {
    match direction {
        Direction::Up => next_up(value, FloatWidth::Width64),
        Direction::Down => next_down(value, FloatWidth::Width64),
    }
}

/// Number of representable floats in `[x, y]`, inclusive.
///
/// Bit patterns are not monotonic across zero, so a range that crosses it
/// is counted as `[x, -0.0]` plus `[0.0, y]`.
pub fn count_between_floats(x: f64, y: f64, width: FloatWidth) -> u64 {
    assert!(x <= y, "count_between_floats requires x <= y, got {} > {}", x, y);
    if is_negative(x) {
        if is_negative(y) {
            float_to_int(x, width) - float_to_int(y, width) + 1
        } else {
            count_between_floats(x, -0.0, width) + count_between_floats(0.0, y, width)
        }
    } else {
        assert!(!is_negative(y));
        float_to_int(y, width) - float_to_int(x, width) + 1
    }
}

/// Compensated summation: the carry term holds the low-order bits lost by
/// each addition, so the error bound does not grow with the number of terms.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KahanSum {
    sum: f64,
    carry: f64,
}

impl KahanSum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: f64) {
        let y = value - self.carry;
        let t = self.sum + y;
        self.carry = (t - self.sum) - y;
        self.sum = t;
    }

    pub fn value(&self) -> f64 {
        self.sum
    }
}

impl std::ops::AddAssign<f64> for KahanSum {
    fn add_assign(&mut self, value: f64) {
        self.add(value);
    }
}

impl Extend<f64> for KahanSum {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for value in iter {
            self.add(value);
        }
    }
}

impl FromIterator<f64> for KahanSum {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut sum = KahanSum::new();
        sum.extend(iter);
        sum
    }
}

/// Length of the other leg of a right triangle, `sqrt(h^2 - a^2)`, without
/// overflowing or underflowing near the limits of the float range.
pub fn cathetus(hypotenuse: f64, side: f64) -> f64 {
    if hypotenuse.is_nan() {
        return f64::NAN;
    }
    if hypotenuse.is_infinite() {
        // A NaN side still yields infinity here.
        return if side.is_infinite() { f64::NAN } else { f64::INFINITY };
    }

    let h = hypotenuse.abs();
    let a = side.abs();
    if h < a {
        return f64::NAN;
    }

    let b = if h > f64::MAX.sqrt() {
        if h > f64::MAX / 2.0 {
            (h - a).sqrt() * (h / 2.0 + a / 2.0).sqrt() * std::f64::consts::SQRT_2
        } else {
            (h - a).sqrt() * (h + a).sqrt()
        }
    } else if h < f64::MIN_POSITIVE.sqrt() {
        (h - a).sqrt() * (h + a).sqrt()
    } else {
        ((h - a) * (h + a)).sqrt()
    };

    // Rounding can push b past h; a NaN from a NaN side must survive.
    if b > h {
        h
    } else {
        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_view_round_trips_exactly() {
        for value in [0.0, -0.0, 1.5, f64::MIN_POSITIVE, f64::MAX, f64::NEG_INFINITY] {
            assert_eq!(bits_to_float(float_to_bits(value)).to_bits(), value.to_bits());
        }
        let nan = bits_to_float(0x7ff8_0000_dead_beef);
        assert_eq!(float_to_bits(nan), 0x7ff8_0000_dead_beef);
    }

    #[test]
    fn test_zeros_count_as_two_floats() {
        assert_eq!(count_between_floats(-0.0, 0.0, FloatWidth::Width64), 2);
        assert_eq!(count_between_floats(0.0, 0.0, FloatWidth::Width64), 1);
        assert_eq!(count_between_floats(-0.0, -0.0, FloatWidth::Width64), 1);
    }

    #[test]
    fn test_count_between_crossing_zero() {
        let tiny = f64::from_bits(1);
        assert_eq!(count_between_floats(-tiny, tiny, FloatWidth::Width64), 4);
        let above_one = next_up(1.0, FloatWidth::Width64);
        assert_eq!(count_between_floats(1.0, above_one, FloatWidth::Width64), 2);
    }

    #[test]
    fn test_count_between_in_narrow_widths() {
        assert_eq!(count_between_floats(-0.0, 0.0, FloatWidth::Width16), 2);
        assert_eq!(count_between_floats(1.0, 2.0, FloatWidth::Width16), 1025);
        assert_eq!(count_between_floats(1.0, 2.0, FloatWidth::Width32), (1 << 23) + 1);
    }

    #[test]
    fn test_adjacent_special_values() {
        assert!(adjacent(f64::NAN, Direction::Up).is_nan());
        assert!(adjacent(f64::NAN, Direction::Down).is_nan());
        assert_eq!(adjacent(f64::INFINITY, Direction::Up), f64::INFINITY);
        assert_eq!(adjacent(f64::NEG_INFINITY, Direction::Down), f64::NEG_INFINITY);
        assert_eq!(adjacent(f64::MAX, Direction::Up), f64::INFINITY);
        assert_eq!(adjacent(f64::INFINITY, Direction::Down), f64::MAX);
    }

    #[test]
    fn test_adjacent_zeros_are_neighbours() {
        let up = adjacent(-0.0, Direction::Up);
        assert_eq!(up.to_bits(), 0.0f64.to_bits());
        let down = adjacent(0.0, Direction::Down);
        assert_eq!(down.to_bits(), (-0.0f64).to_bits());
        assert_eq!(adjacent(0.0, Direction::Up), f64::from_bits(1));
        assert_eq!(adjacent(-0.0, Direction::Down), -f64::from_bits(1));
    }

    #[test]
    fn test_adjacent_steps_negative_values_toward_zero() {
        let x = -1.0;
        let up = adjacent(x, Direction::Up);
        assert!(up > x);
        assert_eq!(adjacent(up, Direction::Down), x);
    }

    #[test]
    fn test_next_down_normal_skips_subnormals() {
        let smallest = FloatWidth::Width64.smallest_normal();
        assert_eq!(next_down_normal(smallest, FloatWidth::Width64, false), 0.0);
        let below_zero = next_down_normal(0.0, FloatWidth::Width64, false);
        assert_eq!(below_zero.to_bits(), (-0.0f64).to_bits());
        assert_eq!(next_down_normal(-0.0, FloatWidth::Width64, false), -smallest);
        assert!(next_down_normal(smallest, FloatWidth::Width64, true) > 0.0);
        assert_eq!(next_up_normal(0.0, FloatWidth::Width64, false), smallest);
    }

    #[test]
    fn test_next_up_at_32_bits() {
        let stepped = next_up(1.0, FloatWidth::Width32);
        assert_eq!(stepped, 1.0 + f32::EPSILON as f64);
    }

    #[test]
    fn test_kahan_beats_naive_summation() {
        let values = std::iter::once(1.0).chain(std::iter::repeat(1e-16).take(10_000));
        let naive: f64 = values.clone().sum();
        let compensated: KahanSum = values.collect();
        assert_eq!(naive, 1.0);
        assert!((compensated.value() - (1.0 + 1e-12)).abs() < 1e-15);
    }

    #[test]
    fn test_kahan_add_assign() {
        let mut sum = KahanSum::new();
        sum += 0.1;
        sum += 0.2;
        sum += 0.3;
        assert!((sum.value() - 0.6).abs() <= f64::EPSILON);
    }

    #[test]
    fn test_cathetus_special_cases() {
        assert!(cathetus(f64::NAN, 1.0).is_nan());
        assert!(cathetus(1.0, 2.0).is_nan());
        assert_eq!(cathetus(f64::INFINITY, 1.0), f64::INFINITY);
        assert_eq!(cathetus(f64::INFINITY, f64::NAN), f64::INFINITY);
        assert!(cathetus(f64::INFINITY, f64::INFINITY).is_nan());
        assert!(cathetus(1.0, f64::NAN).is_nan());
    }

    #[test]
    fn test_cathetus_pythagorean_triples() {
        assert_eq!(cathetus(5.0, 3.0), 4.0);
        assert_eq!(cathetus(5.0, -4.0), 3.0);
        assert_eq!(cathetus(-13.0, 12.0), 5.0);
        assert_eq!(cathetus(1.0, 1.0), 0.0);
    }

    #[test]
    fn test_cathetus_near_range_limits() {
        let b = cathetus(f64::MAX, f64::MAX / 2.0);
        assert!(b.is_finite());
        assert!(b <= f64::MAX);
        let tiny = f64::MIN_POSITIVE;
        let c = cathetus(tiny, 0.0);
        assert_eq!(c, tiny);
        assert!(cathetus(1e300, 1e299).is_finite());
    }
}
