//! Shrinking a sequence by deleting elements.

use super::common::find_integer;
use super::{ShrinkState, Shrinker};

/// Deletes elements while the predicate keeps holding. Only the length is
/// compared, so the surviving elements keep their relative order.
pub struct Length<'p, T> {
    state: ShrinkState<'p, Vec<T>>,
}

impl<'p, T: Clone + PartialEq> Length<'p, T> {
    pub fn new<F>(initial: Vec<T>, predicate: F) -> Self
    where
        F: FnMut(&Vec<T>) -> bool + 'p,
    {
        Length {
            state: ShrinkState::new(initial, Box::new(predicate), false),
        }
    }

    pub fn shrink<F>(initial: Vec<T>, predicate: F) -> Vec<T>
    where
        F: FnMut(&Vec<T>) -> bool + 'p,
    {
        let mut shrinker = Length::new(initial, predicate);
        shrinker.run();
        shrinker.into_current()
    }

    pub fn into_current(self) -> Vec<T> {
        self.state.into_current()
    }
}

fn without<T: Clone>(values: &[T], start: usize, end: usize) -> Vec<T> {
    let mut result = Vec::with_capacity(values.len() - (end - start));
    result.extend_from_slice(&values[..start]);
    result.extend_from_slice(&values[end..]);
    result
}

impl<'p, T: Clone + PartialEq> Shrinker<'p> for Length<'p, T> {
    type Value = Vec<T>;

    fn state(&self) -> &ShrinkState<'p, Vec<T>> {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ShrinkState<'p, Vec<T>> {
        &mut self.state
    }

    fn left_is_better(&self, left: &Vec<T>, right: &Vec<T>) -> bool {
        left.len() < right.len()
    }

    fn short_circuit(&mut self) -> bool {
        self.consider(Vec::new()) || self.current().len() <= 1
    }

    fn run_step(&mut self) {
        // `j` counts from the right, so deleting at or left of the cursor
        // leaves the elements still to be visited where they were.
        let mut j = 0;
        while j < self.current().len() {
            let i = self.current().len() - 1 - j;
            let base = self.current().clone();
            let deleted =
                find_integer(|k| k <= i + 1 && self.consider(without(&base, i + 1 - k, i + 1)));
            if deleted == 0 && i >= 1 {
                // Elements that only make sense together.
                self.consider(without(&base, i - 1, i + 1));
            }
            j += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deletes_everything_when_allowed() {
        let mut shrinker = Length::new(vec![1, 2, 3], |_: &Vec<u8>| true);
        shrinker.run();
        assert!(shrinker.current().is_empty());
        assert_eq!(shrinker.calls(), 1);
    }

    #[test]
    fn test_single_element_is_a_fixed_point() {
        let mut shrinker = Length::new(vec![4], |v: &Vec<u8>| !v.is_empty());
        shrinker.run();
        assert_eq!(shrinker.current(), &vec![4]);
    }

    #[test]
    fn test_keeps_required_elements_in_order() {
        let initial: Vec<u32> = (0..20).collect();
        let result = Length::shrink(initial, |v: &Vec<u32>| v.contains(&3) && v.contains(&17));
        assert_eq!(result, vec![3, 17]);
    }

    #[test]
    fn test_deletes_adjacent_pairs() {
        // Any deletion must remove a balanced pair of markers.
        let balanced = |v: &Vec<i8>| {
            let ones = v.iter().filter(|&&x| x == 1).count();
            v.len() >= 2 && ones == v.iter().filter(|&&x| x == -1).count()
        };
        let result = Length::shrink(vec![1, -1, 1, -1, 1, -1], balanced);
        assert_eq!(result.len(), 2);
    }
}
