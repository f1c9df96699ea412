//! Walker/Vose alias tables for O(1) weighted sampling.
//!
//! The table is kept sorted by `(base, alternate)` with `base < alternate` in
//! every entry. When a sample is driven from a test buffer, lowering the
//! bytes that pick the entry and the coin therefore lowers the returned
//! index, which is the direction the shrinker pushes in.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use rand::Rng;

use crate::error::{EngineError, EngineResult};
use crate::floats::KahanSum;

/// Scaled probabilities within this distance of one are treated as exactly
/// one, so rounding noise does not create spurious alias pairs.
const UNIT_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct AliasEntry {
    pub(crate) base: usize,
    pub(crate) alternate: usize,
    /// Probability of answering `alternate` once this entry is chosen.
    pub(crate) alternate_chance: f64,
}

impl AliasEntry {
    fn single(index: usize) -> Self {
        AliasEntry {
            base: index,
            alternate: index,
            alternate_chance: 0.0,
        }
    }

    fn resolve(&self, coin: f64) -> usize {
        if coin < 1.0 - self.alternate_chance {
            self.base
        } else {
            self.alternate
        }
    }
}

/// Weighted sampler over the indices `0..weights.len()`.
#[derive(Debug, Clone)]
pub struct Sampler {
    table: Vec<AliasEntry>,
    weights: Vec<f64>,
    total: f64,
}

impl Sampler {
    /// Build the alias table in O(n).
    ///
    /// Fails with `InvalidArgument` for an empty weight vector, for negative
    /// or non-finite weights, and when every weight is zero. Indices with
    /// zero weight never enter the table, so they can never be sampled.
    pub fn new(weights: &[f64]) -> EngineResult<Sampler> {
        if weights.is_empty() {
            return Err(EngineError::InvalidArgument(
                "cannot sample from an empty weight vector".to_string(),
            ));
        }
        if let Some((index, weight)) = weights
            .iter()
            .enumerate()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            return Err(EngineError::InvalidArgument(format!(
                "weight {} at index {} must be finite and non-negative",
                weight, index
            )));
        }

        let total = weights.iter().copied().collect::<KahanSum>().value();
        if total <= 0.0 {
            return Err(EngineError::InvalidArgument(
                "at least one weight must be positive".to_string(),
            ));
        }

        let support: Vec<usize> = (0..weights.len()).filter(|&i| weights[i] > 0.0).collect();
        let n = support.len() as f64;

        let mut scaled = vec![0.0; weights.len()];
        let mut table = Vec::with_capacity(support.len());
        let mut small = BinaryHeap::new();
        let mut large = BinaryHeap::new();

        for &i in &support {
            scaled[i] = n * weights[i] / total;
            if (scaled[i] - 1.0).abs() < UNIT_TOLERANCE {
                table.push(AliasEntry::single(i));
            } else if scaled[i] > 1.0 {
                large.push(Reverse(i));
            } else {
                small.push(Reverse(i));
            }
        }

        // Pair each underfull bucket with an overfull one until one side is
        // empty. Ties are broken by lowest index for a deterministic table.
        while let (Some(&Reverse(lo)), Some(&Reverse(hi))) = (small.peek(), large.peek()) {
            small.pop();
            large.pop();

            scaled[hi] = (scaled[hi] + scaled[lo]) - 1.0;
            table.push(AliasEntry {
                base: lo,
                alternate: hi,
                alternate_chance: 1.0 - scaled[lo],
            });

            if (scaled[hi] - 1.0).abs() < UNIT_TOLERANCE {
                table.push(AliasEntry::single(hi));
            } else if scaled[hi] > 1.0 {
                large.push(Reverse(hi));
            } else {
                small.push(Reverse(hi));
            }
        }

        // Whatever is left is off from one only by accumulated rounding.
        table.extend(small.into_iter().map(|Reverse(i)| AliasEntry::single(i)));
        table.extend(large.into_iter().map(|Reverse(i)| AliasEntry::single(i)));

        for entry in table.iter_mut() {
            if entry.alternate < entry.base {
                std::mem::swap(&mut entry.base, &mut entry.alternate);
                entry.alternate_chance = 1.0 - entry.alternate_chance;
            }
        }
        table.sort_by(|a, b| (a.base, a.alternate).cmp(&(b.base, b.alternate)));

        log::trace!(
            "built alias table with {} entries over {} weights",
            table.len(),
            weights.len()
        );

        Ok(Sampler {
            table,
            weights: weights.to_vec(),
            total,
        })
    }

    /// Number of indices this sampler ranges over, including zero-weight ones.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn total_weight(&self) -> f64 {
        self.total
    }

    /// Exact probability of drawing `index`.
    pub fn probability(&self, index: usize) -> f64 {
        self.weights.get(index).map_or(0.0, |w| w / self.total)
    }

    pub(crate) fn table(&self) -> &[AliasEntry] {
        &self.table
    }

    /// Map one uniform value in `[0, 1)` to an index. The integer part of
    /// `u * table_len` picks the entry and the fractional part is the coin.
    pub fn sample_from(&self, u: f64) -> usize {
        let scaled = u.clamp(0.0, 1.0) * self.table.len() as f64;
        let slot = (scaled.floor() as usize).min(self.table.len() - 1);
        let coin = scaled - slot as f64;
        self.table[slot].resolve(coin.min(1.0))
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let slot = rng.gen_range(0..self.table.len());
        let coin: f64 = rng.gen();
        self.table[slot].resolve(coin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn frequencies(sampler: &Sampler, samples: usize) -> Vec<f64> {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut counts = vec![0usize; sampler.len()];
        for _ in 0..samples {
            counts[sampler.sample(&mut rng)] += 1;
        }
        counts.into_iter().map(|c| c as f64 / samples as f64).collect()
    }

    #[test]
    fn test_rejects_bad_weights() {
        assert!(matches!(Sampler::new(&[]), Err(EngineError::InvalidArgument(_))));
        assert!(matches!(Sampler::new(&[0.0, 0.0]), Err(EngineError::InvalidArgument(_))));
        assert!(matches!(Sampler::new(&[1.0, -1.0]), Err(EngineError::InvalidArgument(_))));
        assert!(matches!(Sampler::new(&[1.0, f64::NAN]), Err(EngineError::InvalidArgument(_))));
    }

    #[test]
    fn test_single_nonzero_weight_always_wins() {
        let sampler = Sampler::new(&[0.0, 0.0, 3.0, 0.0]).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..1000 {
            assert_eq!(sampler.sample(&mut rng), 2);
        }
        for u in [0.0, 0.25, 0.5, 0.999_999] {
            assert_eq!(sampler.sample_from(u), 2);
        }
    }

    #[test]
    fn test_equal_weights_degenerate_to_identity() {
        let sampler = Sampler::new(&[1.0; 5]).unwrap();
        for (i, entry) in sampler.table().iter().enumerate() {
            assert_eq!(entry.base, i);
            assert_eq!(entry.alternate, i);
        }
        assert_eq!(sampler.sample_from(0.0), 0);
        assert_eq!(sampler.sample_from(0.5), 2);
        assert_eq!(sampler.sample_from(0.99), 4);
    }

    #[test]
    fn test_table_is_sorted_with_base_below_alternate() {
        let sampler = Sampler::new(&[5.0, 1.0, 0.5, 3.0, 0.0, 2.5]).unwrap();
        let table = sampler.table();
        for entry in table {
            assert!(entry.base <= entry.alternate);
            assert!((0.0..=1.0).contains(&entry.alternate_chance));
        }
        for pair in table.windows(2) {
            assert!((pair[0].base, pair[0].alternate) <= (pair[1].base, pair[1].alternate));
        }
    }

    #[test]
    fn test_zero_weight_is_never_sampled() {
        let sampler = Sampler::new(&[1.0, 0.0, 1.0]).unwrap();
        let freqs = frequencies(&sampler, 20_000);
        assert_eq!(freqs[1], 0.0);
        for step in 0..1000 {
            assert_ne!(sampler.sample_from(step as f64 / 1000.0), 1);
        }
    }

    #[test]
    fn test_empirical_frequencies_converge() {
        let weights = [1.0, 2.0, 3.0, 4.0];
        let sampler = Sampler::new(&weights).unwrap();
        let freqs = frequencies(&sampler, 200_000);
        for (i, w) in weights.iter().enumerate() {
            let expected = w / 10.0;
            assert!(
                (freqs[i] - expected).abs() < 0.01,
                "index {}: expected {}, observed {}",
                i,
                expected,
                freqs[i]
            );
            assert!((sampler.probability(i) - expected).abs() < 1e-12);
        }
    }
}
