//! Search helpers shared by the shrinkers and the runner's buffer passes.

/// Find the largest `n` such that `f(n)` holds, assuming `f(0)` holds and
/// `f` is monotonic.
///
/// Small answers are found by a linear probe of `1..=4`, so a shrinker that
/// can only make a small step does not pay for an exponential search. Beyond
/// that the probe doubles from 5 until `f` fails and then bisects the last
/// bracket, which keeps the number of calls logarithmic in the answer.
pub fn find_integer<F>(mut f: F) -> usize
where
    F: FnMut(usize) -> bool,
{
    for i in 1..5 {
        if !f(i) {
            return i - 1;
        }
    }

    let mut lo = 4;
    let mut hi = 5;
    while f(hi) {
        lo = hi;
        hi *= 2;
    }
    while lo + 1 < hi {
        let mid = lo + (hi - lo) / 2;
        if f(mid) {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lo
}

/// Apply `(start, end, replacement)` splices to `buffer` in one left to right
/// pass.
///
/// Replacements must be sorted by `start` and must not overlap; this is not
/// checked.
pub fn replace_all<T: Clone>(buffer: &[T], replacements: &[(usize, usize, Vec<T>)]) -> Vec<T> {
    let mut result = Vec::with_capacity(buffer.len());
    let mut prev = 0;
    for (start, end, replacement) in replacements {
        result.extend_from_slice(&buffer[prev..*start]);
        result.extend_from_slice(replacement);
        prev = *end;
    }
    result.extend_from_slice(&buffer[prev..]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting_find(target: usize) -> (usize, usize) {
        let mut calls = 0;
        let found = find_integer(|n| {
            calls += 1;
            n <= target
        });
        (found, calls)
    }

    #[test]
    fn test_find_integer_small_values_are_linear() {
        assert_eq!(counting_find(0), (0, 1));
        assert_eq!(counting_find(1), (1, 2));
        assert_eq!(counting_find(3), (3, 4));
    }

    #[test]
    fn test_find_integer_is_logarithmic() {
        for target in [4, 5, 17, 1000, 123_456, 1 << 40] {
            let (found, calls) = counting_find(target);
            assert_eq!(found, target);
            let log = (usize::BITS - target.leading_zeros()) as usize;
            assert!(calls <= 4 + 2 * log + 2, "{} took {} calls", target, calls);
        }
    }

    #[test]
    fn test_replace_all_empty_is_identity() {
        let buffer = vec![1u8, 2, 3];
        assert_eq!(replace_all(&buffer, &[]), buffer);
    }

    #[test]
    fn test_replace_all_splices_in_order() {
        let buffer = vec![0u8, 1, 2, 3, 4, 5];
        let result = replace_all(&buffer, &[(1, 3, vec![9]), (4, 4, vec![7, 7])]);
        assert_eq!(result, vec![0, 9, 3, 7, 7, 4, 5]);
    }
}
