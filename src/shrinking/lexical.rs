//! Shrinking a fixed-length byte string toward the lexicographically
//! smallest one.

use super::integer::{Integer, Natural};
use super::ordering::Ordering;
use super::{ShrinkState, Shrinker};

pub struct Lexical<'p> {
    state: ShrinkState<'p, Vec<u8>>,
    size: usize,
}

impl<'p> Lexical<'p> {
    pub fn new<F>(initial: Vec<u8>, predicate: F, full: bool) -> Self
    where
        F: FnMut(&Vec<u8>) -> bool + 'p,
    {
        let size = initial.len();
        Lexical {
            state: ShrinkState::new(initial, Box::new(predicate), full),
            size,
        }
    }

    pub fn shrink<F>(initial: Vec<u8>, predicate: F, full: bool) -> Vec<u8>
    where
        F: FnMut(&Vec<u8>) -> bool + 'p,
    {
        let mut shrinker = Lexical::new(initial, predicate, full);
        shrinker.run();
        shrinker.into_current()
    }

    pub fn into_current(self) -> Vec<u8> {
        self.state.into_current()
    }

    /// Lower the bytes read as one big-endian integer.
    fn minimize_as_integer(&mut self) {
        let size = self.size;
        let initial = Natural::from_be_bytes(self.current());
        let mut integer = Integer::new(initial, |n: &Natural| match n.to_be_bytes(size) {
            Some(bytes) => self.consider(bytes),
            None => false,
        });
        integer.run();
    }

    /// Move the bytes toward sorted order.
    fn partial_sort(&mut self) {
        let initial = self.current().clone();
        let full = self.full();
        Ordering::shrink(initial, |v: &Vec<u8>| self.consider(v.clone()), full);
    }
}

impl<'p> Shrinker<'p> for Lexical<'p> {
    type Value = Vec<u8>;

    fn state(&self) -> &ShrinkState<'p, Vec<u8>> {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ShrinkState<'p, Vec<u8>> {
        &mut self.state
    }

    fn left_is_better(&self, left: &Vec<u8>, right: &Vec<u8>) -> bool {
        left < right
    }

    fn check_invariants(&self, value: &Vec<u8>) {
        assert_eq!(value.len(), self.size);
    }

    fn run_step(&mut self) {
        self.minimize_as_integer();
        self.partial_sort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shrinks_to_all_zeros() {
        let mut shrinker = Lexical::new(vec![7, 200, 3], |_: &Vec<u8>| true, false);
        shrinker.run();
        assert_eq!(shrinker.current(), &vec![0, 0, 0]);
    }

    #[test]
    fn test_sum_threshold_packs_into_last_byte() {
        let mut shrinker = Lexical::new(
            vec![255; 8],
            |v: &Vec<u8>| v.iter().map(|&b| b as u32).sum::<u32>() > 10,
            false,
        );
        shrinker.run();
        assert_eq!(shrinker.current(), &vec![0, 0, 0, 0, 0, 0, 0, 11]);
        assert!(shrinker.calls() <= 60, "took {} calls", shrinker.calls());
    }

    #[test]
    fn test_keeps_length() {
        let result = Lexical::shrink(vec![9, 9], |v: &Vec<u8>| v.iter().any(|&b| b == 9), false);
        assert_eq!(result, vec![0, 9]);
    }

    #[test]
    fn test_sorting_finds_smaller_permutation() {
        // The integer pass cannot lower the first byte without breaking the
        // multiset, but sorting can.
        let result = Lexical::shrink(
            vec![5, 1],
            |v: &Vec<u8>| {
                let mut sorted = v.clone();
                sorted.sort();
                sorted == vec![1, 5]
            },
            false,
        );
        assert_eq!(result, vec![1, 5]);
    }
}
