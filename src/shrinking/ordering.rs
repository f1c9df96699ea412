//! Shrinking a sequence toward sorted order.
//!
//! The predicate need not be invariant under permutation, so the shrinker
//! never assumes it can sort everything at once (though it tries that
//! first). Instead it sorts windows that grow while they keep succeeding,
//! which finds a single out-of-place element in a long run in a logarithmic
//! number of calls.

use super::common::find_integer;
use super::{ShrinkState, Shrinker};

pub struct Ordering<'p, T> {
    state: ShrinkState<'p, Vec<T>>,
}

impl<'p, T: Ord + Clone> Ordering<'p, T> {
    /// `full` adds insertion moves at every descent once the window passes
    /// have run.
    pub fn new<F>(initial: Vec<T>, predicate: F, full: bool) -> Self
    where
        F: FnMut(&Vec<T>) -> bool + 'p,
    {
        Ordering {
            state: ShrinkState::new(initial, Box::new(predicate), full),
        }
    }

    pub fn shrink<F>(initial: Vec<T>, predicate: F, full: bool) -> Vec<T>
    where
        F: FnMut(&Vec<T>) -> bool + 'p,
    {
        let mut shrinker = Ordering::new(initial, predicate, full);
        shrinker.run();
        shrinker.into_current()
    }

    pub fn into_current(self) -> Vec<T> {
        self.state.into_current()
    }

    /// For every `i`, tries (at least) swapping `i` with `i + 1`, by sorting
    /// the longest window starting at `i` that can be sorted.
    fn sort_regions(&mut self) {
        let mut i = 0;
        while i + 1 < self.current().len() {
            let k = find_integer(|k| {
                if i + k > self.current().len() {
                    return false;
                }
                let mut candidate = self.current().clone();
                candidate[i..i + k].sort();
                self.consider(candidate)
            });
            i += k;
        }
    }

    /// For every `i`, tries (at least) swapping `i - 1` with `i + 1`, by
    /// sorting windows around `i` with element `i` held in place.
    fn sort_regions_with_gaps(&mut self) {
        let mut i = 1;
        while i + 1 < self.current().len() {
            let current = self.current();
            if current[i - 1] <= current[i] && current[i] <= current[i + 1] {
                i += 1;
                continue;
            }

            let left = i;
            let right = i + 1;
            let right = right + find_integer(|k| self.sort_around(i, left, right + k));
            find_integer(|k| k <= left && self.sort_around(i, left - k, right));
            i += 1;
        }
    }

    /// Sort `current[start..end]` except for the pivot at `i`, which stays put.
    fn sort_around(&mut self, i: usize, start: usize, end: usize) -> bool {
        let current = self.current();
        if end > current.len() {
            return false;
        }
        debug_assert!(start <= i && i < end);
        let split = i - start;
        let mut values: Vec<T> = current[start..i]
            .iter()
            .chain(current[i + 1..end].iter())
            .cloned()
            .collect();
        values.sort();

        let mut candidate = Vec::with_capacity(current.len());
        candidate.extend_from_slice(&current[..start]);
        candidate.extend_from_slice(&values[..split]);
        candidate.push(current[i].clone());
        candidate.extend_from_slice(&values[split..]);
        candidate.extend_from_slice(&current[end..]);
        self.consider(candidate)
    }

    /// At each descent, move the smaller element to its insertion point in
    /// the prefix before it.
    fn insertion_moves(&mut self) {
        let mut j = 0;
        while j + 1 < self.current().len() {
            let current = self.current();
            if current[j] > current[j + 1] {
                let value = current[j + 1].clone();
                let target = current[..=j].partition_point(|x| *x <= value);
                let mut candidate = current.clone();
                candidate.remove(j + 1);
                candidate.insert(target, value);
                self.consider(candidate);
            }
            j += 1;
        }
    }
}

impl<'p, T: Ord + Clone> Shrinker<'p> for Ordering<'p, T> {
    type Value = Vec<T>;

    fn state(&self) -> &ShrinkState<'p, Vec<T>> {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ShrinkState<'p, Vec<T>> {
        &mut self.state
    }

    fn left_is_better(&self, left: &Vec<T>, right: &Vec<T>) -> bool {
        left < right
    }

    fn check_invariants(&self, value: &Vec<T>) {
        assert_eq!(value.len(), self.current().len());
        debug_assert!({
            let mut a = value.clone();
            let mut b = self.current().clone();
            a.sort();
            b.sort();
            a == b
        });
    }

    fn short_circuit(&mut self) -> bool {
        let mut sorted = self.current().clone();
        sorted.sort();
        self.consider(sorted)
    }

    fn run_step(&mut self) {
        self.sort_regions();
        self.sort_regions_with_gaps();
        if self.full() {
            self.insertion_moves();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorts_immediately_when_allowed() {
        let mut shrinker = Ordering::new(vec![5, 3, 9, 1], |_: &Vec<i32>| true, false);
        shrinker.run();
        assert_eq!(shrinker.current(), &vec![1, 3, 5, 9]);
        assert_eq!(shrinker.calls(), 1);
    }

    #[test]
    fn test_one_misplaced_element_in_a_thousand() {
        let mut initial: Vec<u32> = (1..1000).collect();
        initial.push(0);
        let mut shrinker = Ordering::new(initial, |v: &Vec<u32>| v[0] != 0, false);
        shrinker.run();

        let mut expected = vec![1, 0];
        expected.extend(2..1000);
        assert_eq!(shrinker.current(), &expected);
        assert!(shrinker.calls() <= 60, "took {} calls", shrinker.calls());
    }

    #[test]
    fn test_gapped_sort_keeps_pivot() {
        let result = Ordering::shrink(vec![3, 1, 2], |v: &Vec<i32>| v[1] == 1, false);
        assert_eq!(result, vec![2, 1, 3]);
    }

    #[test]
    fn test_full_mode_reaches_same_fixed_point() {
        let mut initial: Vec<u8> = (1..10).collect();
        initial.push(0);
        let result = Ordering::shrink(initial, |v: &Vec<u8>| v[0] != 0, true);
        assert_eq!(result, vec![1, 0, 2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_respects_predicate_on_multiset() {
        let result = Ordering::shrink(vec![9, 8, 7, 1], |v: &Vec<i32>| v[3] != 9, false);
        assert_eq!(result, vec![1, 7, 9, 8]);
    }
}
