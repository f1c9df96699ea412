//! Generation by mutating an earlier example.
//!
//! A mutator rewrites the blocks of a previous result one at a time, each
//! with a strategy drawn from a small set fixed when the mutator is made.
//! The rewritten bytes become a prefix that a fresh execution replays before
//! falling back to random bytes, so most of them land on the same draws
//! they came from.

use rand::seq::SliceRandom;
use rand::{Rng, RngCore};

use crate::data::{ConjectureResult, Status};

/// Strategies a mutator picks from for each block. Reuse is listed twice so
/// that it comes up more often.
const STRATEGIES: [BlockMutation; 9] = [
    BlockMutation::Fresh,
    BlockMutation::Keep,
    BlockMutation::Smaller,
    BlockMutation::Larger,
    BlockMutation::Reuse,
    BlockMutation::Reuse,
    BlockMutation::FlipBit,
    BlockMutation::Zero,
    BlockMutation::Constant,
];

/// Strategies each mutator carries.
const STRATEGIES_PER_MUTATOR: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockMutation {
    /// Random bytes.
    Fresh,
    /// The block as it was.
    Keep,
    /// Bytes no larger than the block.
    Smaller,
    /// Bytes no smaller than the block.
    Larger,
    /// The contents of some block of the same width.
    Reuse,
    /// The block with one bit flipped.
    FlipBit,
    Zero,
    /// One random byte repeated across the block.
    Constant,
}

impl BlockMutation {
    fn apply<R: Rng + ?Sized>(
        self,
        existing: &[u8],
        base: &ConjectureResult,
        rng: &mut R,
    ) -> Vec<u8> {
        let n = existing.len();
        match self {
            BlockMutation::Fresh => random_bytes(rng, n),
            BlockMutation::Keep => existing.to_vec(),
            BlockMutation::Smaller => {
                let candidate = random_bytes(rng, n);
                if candidate.as_slice() <= existing {
                    candidate
                } else {
                    existing.iter().map(|&b| rng.gen_range(0..=b)).collect()
                }
            }
            BlockMutation::Larger => {
                let candidate = random_bytes(rng, n);
                if candidate.as_slice() >= existing {
                    candidate
                } else {
                    existing.iter().map(|&b| rng.gen_range(b..=u8::MAX)).collect()
                }
            }
            BlockMutation::Reuse => {
                let same_width: Vec<&[u8]> = base
                    .blocks
                    .iter()
                    .filter(|block| block.len() == n)
                    .map(|block| &base.buffer[block.start..block.end])
                    .collect();
                same_width
                    .choose(rng)
                    .map_or_else(|| existing.to_vec(), |bytes| bytes.to_vec())
            }
            BlockMutation::FlipBit => {
                let mut bytes = existing.to_vec();
                if n > 0 {
                    let i = rng.gen_range(0..n);
                    bytes[i] ^= 1 << rng.gen_range(0..8u32);
                }
                bytes
            }
            BlockMutation::Zero => vec![0; n],
            BlockMutation::Constant => vec![rng.gen::<u8>(); n],
        }
    }
}

fn random_bytes<R: RngCore + ?Sized>(rng: &mut R, n: usize) -> Vec<u8> {
    let mut bytes = vec![0; n];
    rng.fill_bytes(&mut bytes);
    bytes
}

#[derive(Debug, Clone)]
pub(crate) struct Mutator {
    strategies: Vec<BlockMutation>,
}

impl Mutator {
    pub(crate) fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let strategies = (0..STRATEGIES_PER_MUTATOR)
            .filter_map(|_| STRATEGIES.choose(rng).copied())
            .collect();
        Mutator { strategies }
    }

    #[cfg(test)]
    fn with_strategies(strategies: Vec<BlockMutation>) -> Self {
        Mutator { strategies }
    }

    /// A prefix with the block layout of `base` and rewritten contents.
    pub(crate) fn prefix<R: Rng + ?Sized>(&self, base: &ConjectureResult, rng: &mut R) -> Vec<u8> {
        let mut prefix = Vec::with_capacity(base.buffer.len());
        for block in &base.blocks {
            let existing = &base.buffer[block.start..block.end];
            let strategy = self.strategies.choose(rng).copied().unwrap_or(BlockMutation::Fresh);
            prefix.extend(strategy.apply(existing, base, rng));
        }
        prefix
    }
}

/// Whether generation should continue from `candidate` instead of `current`.
///
/// Status never goes down. At equal status a valid example is always taken,
/// an invalid one only if it got at least as far through the buffer.
pub(crate) fn is_progress(candidate: &ConjectureResult, current: &ConjectureResult) -> bool {
    if candidate.buffer == current.buffer || candidate.status < current.status {
        return false;
    }
    if candidate.status > current.status {
        return true;
    }
    match candidate.status {
        Status::Valid => true,
        Status::Invalid => candidate.buffer.len() >= current.buffer.len(),
        Status::Overrun | Status::Interesting => false,
    }
}
