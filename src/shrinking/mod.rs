//! Local-search shrinkers.
//!
//! Each shrinker reduces one value along one axis while a black-box
//! predicate keeps holding. They share the [`Shrinker`] interface: a
//! strict order saying which of two values is better, cheap
//! `short_circuit` moves tried first, and a `run_step` pass repeated until
//! it stops making progress.
//!
//! The runner works on raw buffers, so it drives every shrinker through the
//! closed [`Minimizer`] enum, which adapts each one to byte strings.

pub mod common;
pub mod integer;
pub mod length;
pub mod lexical;
pub mod ordering;

use std::fmt;

pub use common::{find_integer, replace_all};
pub use integer::{Integer, Natural};
pub use length::Length;
pub use lexical::Lexical;
pub use ordering::Ordering;

/// Predicate a shrinker keeps true. Called once per considered candidate.
pub type Predicate<'p, T> = Box<dyn FnMut(&T) -> bool + 'p>;

/// The mutable state every shrinker carries.
pub struct ShrinkState<'p, T> {
    current: T,
    calls: usize,
    changes: usize,
    full: bool,
    predicate: Predicate<'p, T>,
}

impl<'p, T> ShrinkState<'p, T> {
    /// The initial value is assumed to satisfy the predicate.
    pub fn new(initial: T, predicate: Predicate<'p, T>, full: bool) -> Self {
        ShrinkState {
            current: initial,
            calls: 0,
            changes: 0,
            full,
            predicate,
        }
    }

    pub fn current(&self) -> &T {
        &self.current
    }

    pub fn into_current(self) -> T {
        self.current
    }
}

impl<'p, T: fmt::Debug> fmt::Debug for ShrinkState<'p, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShrinkState")
            .field("current", &self.current)
            .field("calls", &self.calls)
            .field("changes", &self.changes)
            .field("full", &self.full)
            .finish()
    }
}

/// Common interface of the concrete shrinkers.
pub trait Shrinker<'p> {
    type Value: Clone + PartialEq;

    fn state(&self) -> &ShrinkState<'p, Self::Value>;

    fn state_mut(&mut self) -> &mut ShrinkState<'p, Self::Value>;

    /// Strict order: is `left` a strict improvement on `right`?
    fn left_is_better(&self, left: &Self::Value, right: &Self::Value) -> bool;

    /// Panics if `value` is not a structurally valid candidate.
    fn check_invariants(&self, _value: &Self::Value) {}

    /// Cheap moves tried before the main loop. Returning true skips it.
    fn short_circuit(&mut self) -> bool {
        false
    }

    /// One full pass of this shrinker's moves.
    fn run_step(&mut self);

    fn current<'s>(&'s self) -> &'s Self::Value
    where
        'p: 's,
    {
        ShrinkState::current(self.state())
    }

    /// Number of predicate invocations so far.
    fn calls(&self) -> usize {
        self.state().calls
    }

    /// Number of accepted improvements so far.
    fn changes(&self) -> usize {
        self.state().changes
    }

    /// Whether the slower exhaustive moves are enabled.
    fn full(&self) -> bool {
        self.state().full
    }

    /// Try to replace the current value with `candidate`.
    ///
    /// A candidate equal to the current value is accepted without calling the
    /// predicate, so passes can probe "no-op" moves for free. Anything that is
    /// not strictly better is rejected without a call.
    fn consider(&mut self, candidate: Self::Value) -> bool {
        if candidate == self.state().current {
            return true;
        }
        self.incorporate(candidate)
    }

    /// Test a candidate against the predicate, adopting it on success.
    fn incorporate(&mut self, candidate: Self::Value) -> bool {
        if !self.left_is_better(&candidate, &self.state().current) {
            return false;
        }
        self.check_invariants(&candidate);
        let state = self.state_mut();
        state.calls += 1;
        if (state.predicate)(&candidate) {
            state.current = candidate;
            state.changes += 1;
            true
        } else {
            false
        }
    }

    /// Shrink to a fixed point of `run_step`.
    fn run(&mut self) {
        if self.short_circuit() {
            return;
        }
        let current = self.current().clone();
        self.check_invariants(&current);
        loop {
            let prev = self.changes();
            self.run_step();
            if self.changes() == prev {
                break;
            }
        }
    }
}

/// The shrinkers the runner can apply to a slice of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Minimizer {
    /// Treat the bytes as a big-endian unsigned integer and lower it.
    Integer,
    /// Lower the bytes as an integer, then sort them.
    Lexical,
    /// Move the bytes toward sorted order.
    Ordering,
    /// Delete bytes.
    Length,
}

impl Minimizer {
    /// Shrink `initial` under `predicate`, returning the best value found.
    ///
    /// Every variant except `Length` keeps the length of `initial`. `full`
    /// enables the exhaustive moves of the shrinkers that have them.
    pub fn shrink<F>(self, initial: &[u8], predicate: F, full: bool) -> Vec<u8>
    where
        F: FnMut(&[u8]) -> bool,
    {
        match self {
            Minimizer::Integer => {
                let size = initial.len();
                let mut predicate = predicate;
                let mut shrinker = Integer::new(
                    Natural::from_be_bytes(initial),
                    move |n: &Natural| match n.to_be_bytes(size) {
                        Some(bytes) => predicate(bytes.as_slice()),
                        None => false,
                    },
                );
                shrinker.run();
                shrinker
                    .current()
                    .to_be_bytes(size)
                    .unwrap_or_else(|| initial.to_vec())
            }
            Minimizer::Lexical => {
                let mut predicate = predicate;
                let mut shrinker = Lexical::new(
                    initial.to_vec(),
                    move |v: &Vec<u8>| predicate(v.as_slice()),
                    full,
                );
                shrinker.run();
                shrinker.into_current()
            }
            Minimizer::Ordering => {
                let mut predicate = predicate;
                let mut shrinker = Ordering::new(
                    initial.to_vec(),
                    move |v: &Vec<u8>| predicate(v.as_slice()),
                    full,
                );
                shrinker.run();
                shrinker.into_current()
            }
            Minimizer::Length => {
                let mut predicate = predicate;
                let mut shrinker =
                    Length::new(initial.to_vec(), move |v: &Vec<u8>| predicate(v.as_slice()));
                shrinker.run();
                shrinker.into_current()
            }
        }
    }
}
