//! Shrinking non-negative integers toward zero.
//!
//! The values shrunk here come from raw buffer blocks and from float bit
//! patterns, so they can be far wider than any machine integer. [`Natural`]
//! is a minimal big-endian arbitrary-precision natural number that supports
//! just the operations the shrinker needs.

use std::cmp::Ordering;
use std::fmt;

use super::common::find_integer;
use super::{ShrinkState, Shrinker};

/// Arbitrary-precision natural number stored as big-endian bytes without
/// leading zeros. Zero is the empty byte string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Natural(Vec<u8>);

impl Natural {
    pub fn zero() -> Self {
        Natural(Vec::new())
    }

    pub fn from_be_bytes(bytes: &[u8]) -> Self {
        let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
        Natural(bytes[first..].to_vec())
    }

    /// Big-endian encoding padded to `size` bytes, or `None` if the value
    /// does not fit.
    pub fn to_be_bytes(&self, size: usize) -> Option<Vec<u8>> {
        if self.0.len() > size {
            return None;
        }
        let mut bytes = vec![0; size - self.0.len()];
        bytes.extend_from_slice(&self.0);
        Some(bytes)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    pub fn bit_length(&self) -> usize {
        match self.0.first() {
            None => 0,
            Some(&top) => (self.0.len() - 1) * 8 + (8 - top.leading_zeros() as usize),
        }
    }

    pub fn to_u64(&self) -> Option<u64> {
        let bytes = self.to_be_bytes(8)?;
        Some(bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
    }

    /// `self >> k`
    pub fn shr(&self, k: usize) -> Natural {
        let byte_shift = k / 8;
        let bit_shift = (k % 8) as u32;
        if byte_shift >= self.0.len() {
            return Natural::zero();
        }
        let kept = &self.0[..self.0.len() - byte_shift];
        if bit_shift == 0 {
            return Natural::from_be_bytes(kept);
        }
        let mut shifted = Vec::with_capacity(kept.len());
        let mut carry = 0u8;
        for &byte in kept {
            shifted.push((byte >> bit_shift) | carry);
            carry = byte << (8 - bit_shift);
        }
        Natural::from_be_bytes(&shifted)
    }

    /// `self & ((1 << n) - 1)`
    pub fn low_bits(&self, n: usize) -> Natural {
        if n >= self.bit_length() {
            return self.clone();
        }
        let rem = n % 8;
        let take = n / 8 + usize::from(rem > 0);
        let mut bytes = self.0[self.0.len() - take..].to_vec();
        if rem > 0 {
            bytes[0] &= (1u8 << rem) - 1;
        }
        Natural::from_be_bytes(&bytes)
    }

    /// `self - other`, or `None` if that would be negative.
    pub fn checked_sub(&self, other: &Natural) -> Option<Natural> {
        if self < other {
            return None;
        }
        let offset = self.0.len() - other.0.len();
        let mut bytes = self.0.clone();
        let mut borrow = 0i16;
        for i in (0..bytes.len()).rev() {
            let subtrahend = if i >= offset { other.0[i - offset] as i16 } else { 0 };
            let mut digit = bytes[i] as i16 - subtrahend - borrow;
            if digit < 0 {
                digit += 256;
                borrow = 1;
            } else {
                borrow = 0;
            }
            bytes[i] = digit as u8;
        }
        Some(Natural::from_be_bytes(&bytes))
    }
}

impl From<u64> for Natural {
    fn from(value: u64) -> Self {
        Natural::from_be_bytes(&value.to_be_bytes())
    }
}

impl From<u128> for Natural {
    fn from(value: u128) -> Self {
        Natural::from_be_bytes(&value.to_be_bytes())
    }
}

impl Ord for Natural {
    fn cmp(&self, other: &Natural) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Natural {
    fn partial_cmp(&self, other: &Natural) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Natural {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_u64() {
            Some(value) => write!(f, "{}", value),
            None => write!(f, "0x{}", hex::encode(&self.0)),
        }
    }
}

/// Shrinks a natural number toward zero.
///
/// At a fixed point neither `current - 1` nor `current - 2` satisfies the
/// predicate, and the number of calls is logarithmic in the starting value
/// for monotone predicates.
pub struct Integer<'p> {
    state: ShrinkState<'p, Natural>,
}

impl<'p> Integer<'p> {
    pub fn new<F>(initial: Natural, predicate: F) -> Self
    where
        F: FnMut(&Natural) -> bool + 'p,
    {
        Integer {
            state: ShrinkState::new(initial, Box::new(predicate), false),
        }
    }

    pub fn shrink<F>(initial: Natural, predicate: F) -> Natural
    where
        F: FnMut(&Natural) -> bool + 'p,
    {
        let mut shrinker = Integer::new(initial, predicate);
        shrinker.run();
        shrinker.into_current()
    }

    pub fn into_current(self) -> Natural {
        self.state.into_current()
    }

    fn size(&self) -> usize {
        self.current().bit_length()
    }

    /// Try clearing the highest bits, most first.
    fn mask_high_bits(&mut self) {
        let base = self.current().clone();
        let n = base.bit_length();
        find_integer(|k| k < n && self.consider(base.low_bits(n - k)));
    }

    fn shift_right(&mut self) {
        let base = self.current().clone();
        find_integer(|k| k <= self.size() && self.consider(base.shr(k)));
    }

    /// Subtract the largest multiple of `k` that keeps the predicate true.
    fn shrink_by_multiples(&mut self, k: u64) {
        let base = self.current().clone();
        find_integer(|n| {
            let delta = match (n as u128).checked_mul(k as u128) {
                Some(delta) => Natural::from(delta),
                None => return false,
            };
            match base.checked_sub(&delta) {
                Some(candidate) => self.consider(candidate),
                None => false,
            }
        });
    }
}

impl<'p> Shrinker<'p> for Integer<'p> {
    type Value = Natural;

    fn state(&self) -> &ShrinkState<'p, Natural> {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ShrinkState<'p, Natural> {
        &mut self.state
    }

    fn left_is_better(&self, left: &Natural, right: &Natural) -> bool {
        left < right
    }

    fn check_invariants(&self, value: &Natural) {
        assert!(value.0.first() != Some(&0), "unnormalized natural {:?}", value);
    }

    fn short_circuit(&mut self) -> bool {
        for i in 0..2u64 {
            if self.consider(Natural::from(i)) {
                return true;
            }
        }
        self.mask_high_bits();
        let size = self.size();
        if size > 8 {
            // Try to squeeze the value into a single byte.
            let high = self.current().shr(size - 8);
            self.consider(high);
            let low = self.current().low_bits(8);
            self.consider(low);
        }
        *self.current() == Natural::from(2u64)
    }

    fn run_step(&mut self) {
        self.shift_right();
        self.shrink_by_multiples(2);
        self.shrink_by_multiples(1);
    }
}

/// Shrink a `u64` toward zero under `predicate`.
pub fn shrink_integer<F>(initial: u64, mut predicate: F) -> u64
where
    F: FnMut(u64) -> bool,
{
    let shrunk = Integer::shrink(Natural::from(initial), |n: &Natural| match n.to_u64() {
        Some(value) => predicate(value),
        None => false,
    });
    shrunk.to_u64().unwrap_or(initial)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn max_float_integer() -> Natural {
        // int(f64::MAX) is 53 one bits followed by 971 zero bits.
        let mut bytes = vec![0xff; 6];
        bytes.push(0xf8);
        bytes.resize(128, 0);
        Natural::from_be_bytes(&bytes)
    }

    #[test]
    fn test_natural_arithmetic() {
        let n = Natural::from(0x0102_0304u64);
        assert_eq!(n.bit_length(), 25);
        assert_eq!(n.shr(8), Natural::from(0x01_0203u64));
        assert_eq!(n.shr(3), Natural::from(0x0102_0304u64 >> 3));
        assert_eq!(n.shr(64), Natural::zero());
        assert_eq!(n.low_bits(12), Natural::from(0x304u64));
        assert_eq!(n.low_bits(100), n);
        assert_eq!(
            n.checked_sub(&Natural::from(5u64)),
            Some(Natural::from(0x0102_0304u64 - 5))
        );
        assert_eq!(
            Natural::from(256u64).checked_sub(&Natural::from(1u64)),
            Some(Natural::from(255u64))
        );
        assert_eq!(Natural::from(3u64).checked_sub(&Natural::from(4u64)), None);
        assert!(Natural::from(255u64) < Natural::from(256u64));
        assert_eq!(Natural::from(0u64).bit_length(), 0);
    }

    #[test]
    fn test_natural_byte_round_trip() {
        let n = Natural::from_be_bytes(&[0, 0, 1, 2]);
        assert_eq!(n.to_be_bytes(4), Some(vec![0, 0, 1, 2]));
        assert_eq!(n.to_be_bytes(1), None);
        assert_eq!(n.to_u64(), Some(258));
    }

    #[test]
    fn test_max_float_integer_has_1024_bits() {
        assert_eq!(max_float_integer().bit_length(), 1024);
    }

    #[test]
    fn test_shrinks_to_zero_in_one_call() {
        let mut shrinker = Integer::new(Natural::from(1000u64), |_: &Natural| true);
        shrinker.run();
        assert!(shrinker.current().is_zero());
        assert_eq!(shrinker.calls(), 1);
    }

    #[test]
    fn test_max_float_integer_is_fixed_point_in_few_calls() {
        let target = max_float_integer();
        let expected = target.clone();
        let mut shrinker = Integer::new(target, move |n: &Natural| *n == expected);
        shrinker.run();
        assert_eq!(shrinker.current(), &max_float_integer());
        assert!(shrinker.calls() <= 10, "took {} calls", shrinker.calls());
    }

    #[test]
    fn test_threshold_predicates_find_the_threshold() {
        for n in [2u64, 3, 5, 100, 12_345, (1 << 40) + 7] {
            assert_eq!(shrink_integer(n * 3 + 1, |x| x >= n), n);
        }
    }

    #[test]
    fn test_fixed_point_rules_out_small_decrements() {
        // Only even values above 50 are acceptable.
        let result = shrink_integer(1000, |x| x > 50 && x % 2 == 0);
        assert_eq!(result, 52);
    }
}
