//! ConjectureRunner - the main test execution engine
//!
//! A runner drives one campaign against one test function:
//!
//! 1. **Reuse**: replay the buffers saved in the example database, dropping
//!    those that no longer fail.
//! 2. **Generate**: feed the test random buffers, and mutations of the last
//!    one it accepted, until a budget runs out or a failure is found.
//! 3. **Shrink**: for each distinct interesting origin, search for a smaller
//!    buffer that fails the same way, persisting every improvement.
//!
//! Every execution goes through a buffer-keyed cache, so no buffer is run
//! twice in one campaign. Panics raised by the test are not caught: they
//! unwind straight through the runner.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::time::{Duration, Instant};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::{Phase, RunnerConfig};
use crate::data::{
    sort_key, ConjectureData, ConjectureResult, Draw, Example, InterestingOrigin, Status,
};
use crate::database::{DatabaseKey, ExampleDatabase};
use crate::error::EngineResult;
use crate::mutator::{is_progress, Mutator};
use crate::shrinking::{self, find_integer, replace_all, Minimizer};

/// The test under run. It draws from the data and either returns normally
/// (valid), or stops via `mark_interesting`/`mark_invalid` and `?`.
pub type TestFunction<'t> = dyn FnMut(&mut ConjectureData) -> Draw<()> + 't;

/// Why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    MaxExamples,
    MaxInvalid,
    MaxTime,
    /// No new interesting origin for `max_stale_examples` executions.
    Stale,
    /// Generation ended because a failure was found, or was skipped.
    Finished,
}

/// Statistics about test execution
#[derive(Debug, Clone, Default)]
pub struct RunnerStats {
    /// Buffers generated, whether random or mutated
    pub examples_generated: u64,

    pub valid_examples: u64,
    pub invalid_examples: u64,
    pub overrun_examples: u64,
    pub interesting_examples: u64,

    /// Executions skipped because the buffer was already known
    pub cache_hits: u64,

    /// Test executions spent while shrinking
    pub shrink_calls: u64,

    /// Improvements accepted while shrinking
    pub shrinks: u64,

    pub generation_time: Duration,
    pub shrinking_time: Duration,

    pub exit_reason: Option<ExitReason>,
}

impl RunnerStats {
    pub fn total_executions(&self) -> u64 {
        self.valid_examples
            + self.invalid_examples
            + self.overrun_examples
            + self.interesting_examples
    }

    /// Executions that ran the test to a verdict: valid or interesting.
    pub fn completed_examples(&self) -> u64 {
        self.valid_examples + self.interesting_examples
    }
}

/// Result of running the entire campaign
#[derive(Debug)]
pub enum RunResult {
    /// No counterexample found
    Passed,
    /// The minimal example of each interesting origin, smallest first
    Failed(Vec<ConjectureResult>),
    /// Every execution was invalid or overran
    Unsatisfiable,
}

/// Per-origin predicate call budget for shrinking.
#[derive(Debug)]
struct ShrinkBudget {
    origin: InterestingOrigin,
    calls: u64,
    limit: u64,
    exhausted: bool,
}

impl ShrinkBudget {
    fn new(origin: InterestingOrigin, limit: u64) -> Self {
        ShrinkBudget {
            origin,
            calls: 0,
            limit,
            exhausted: false,
        }
    }

    /// Take one call from the budget, if any is left.
    fn spend(&mut self) -> bool {
        if self.calls >= self.limit {
            if !self.exhausted {
                log::warn!(
                    "shrink budget of {} calls exhausted for {}; keeping best example so far",
                    self.limit,
                    self.origin
                );
                self.exhausted = true;
            }
            return false;
        }
        self.calls += 1;
        true
    }
}

fn same_origin(result: &ConjectureResult, origin: &InterestingOrigin) -> bool {
    result.status == Status::Interesting && result.origin.as_ref() == Some(origin)
}

/// End offsets of the run of adjacent examples that starts at `examples[j]`
/// and stays at its depth.
fn sibling_run(examples: &[Example], j: usize) -> Vec<usize> {
    let first = &examples[j];
    let mut ends = vec![first.end];
    let mut last = first.end;
    for example in &examples[j + 1..] {
        if example.start < last {
            continue;
        }
        if example.start > last || example.depth < first.depth {
            break;
        }
        if example.depth == first.depth && !example.is_empty() {
            ends.push(example.end);
            last = example.end;
        }
    }
    ends
}

fn without(buffer: &[u8], start: usize, end: usize) -> Vec<u8> {
    let mut result = Vec::with_capacity(buffer.len() - (end - start));
    result.extend_from_slice(&buffer[..start]);
    result.extend_from_slice(&buffer[end..]);
    result
}

fn fetch_sorted(database: &dyn ExampleDatabase, key: &DatabaseKey) -> Vec<Vec<u8>> {
    match database.fetch(key) {
        Ok(values) => {
            let mut values: Vec<Vec<u8>> = values.collect();
            values.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
            values
        }
        Err(e) => {
            log::warn!("could not read examples for {}: {}", key.to_hex(), e);
            Vec::new()
        }
    }
}

/// Main test execution engine
pub struct ConjectureRunner {
    config: RunnerConfig,
    database: Option<Box<dyn ExampleDatabase>>,
    key: DatabaseKey,
    rng: ChaCha8Rng,
    stats: RunnerStats,
    cache: HashMap<Vec<u8>, ConjectureResult>,
    interesting: BTreeMap<InterestingOrigin, ConjectureResult>,
}

impl fmt::Debug for ConjectureRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConjectureRunner")
            .field("config", &self.config)
            .field("database", &self.database.as_ref().map(|_| "<database>"))
            .field("stats", &self.stats)
            .field("cached", &self.cache.len())
            .field("interesting", &self.interesting.len())
            .finish()
    }
}

impl ConjectureRunner {
    /// Create a runner. Without a database every run starts from scratch.
    pub fn new(
        config: RunnerConfig,
        database: Option<Box<dyn ExampleDatabase>>,
    ) -> EngineResult<Self> {
        config.validate()?;
        Ok(ConjectureRunner {
            key: DatabaseKey::new(&config.database_key),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            database,
            stats: RunnerStats::default(),
            cache: HashMap::new(),
            interesting: BTreeMap::new(),
        })
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn stats(&self) -> &RunnerStats {
        &self.stats
    }

    pub fn database_key(&self) -> &DatabaseKey {
        &self.key
    }

    pub fn database(&self) -> Option<&dyn ExampleDatabase> {
        self.database.as_deref()
    }

    pub fn into_database(self) -> Option<Box<dyn ExampleDatabase>> {
        self.database
    }

    /// Best example found so far for each origin.
    pub fn interesting_examples(&self) -> impl Iterator<Item = &ConjectureResult> {
        self.interesting.values()
    }

    /// Run the configured phases against `test`.
    pub fn run<F>(&mut self, mut test: F) -> RunResult
    where
        F: FnMut(&mut ConjectureData) -> Draw<()>,
    {
        log::info!(
            "starting run with seed {} and phases {:?}",
            self.config.seed,
            self.config.phases
        );

        if self.config.has_phase(Phase::Reuse) {
            self.reuse_existing_examples(&mut test);
        }

        if self.config.has_phase(Phase::Generate) {
            let start = Instant::now();
            self.generate_new_examples(&mut test);
            self.stats.generation_time += start.elapsed();
        }
        if self.stats.exit_reason.is_none() {
            self.stats.exit_reason = Some(ExitReason::Finished);
        }

        if self.interesting.is_empty() {
            if self.stats.valid_examples == 0 && self.stats.total_executions() > 0 {
                log::info!(
                    "unsatisfiable: {} invalid and {} overrun executions, none valid",
                    self.stats.invalid_examples,
                    self.stats.overrun_examples
                );
                return RunResult::Unsatisfiable;
            }
            log::info!("passed after {} valid examples", self.stats.valid_examples);
            return RunResult::Passed;
        }

        if self.config.has_phase(Phase::Shrink) {
            let start = Instant::now();
            self.shrink_interesting_examples(&mut test);
            self.stats.shrinking_time += start.elapsed();
        }

        let mut results: Vec<ConjectureResult> = self.interesting.values().cloned().collect();
        results.sort();
        log::info!(
            "failed with {} distinct origin(s) after {} executions",
            results.len(),
            self.stats.total_executions()
        );
        RunResult::Failed(results)
    }

    /// Run `buffer` through the test unless its outcome is already cached.
    pub fn test_buffer(
        &mut self,
        test: &mut TestFunction<'_>,
        buffer: &[u8],
    ) -> ConjectureResult {
        if let Some(result) = self.cache.get(buffer) {
            self.stats.cache_hits += 1;
            return result.clone();
        }
        let result = self.execute(test, ConjectureData::for_buffer(buffer));
        self.cache.insert(buffer.to_vec(), result.clone());
        result
    }

    fn execute(
        &mut self,
        test: &mut TestFunction<'_>,
        mut data: ConjectureData,
    ) -> ConjectureResult {
        if test(&mut data).is_err() && !data.is_frozen() {
            log::warn!("test stopped without setting a status; treating it as invalid");
            let _ = data.mark_invalid::<()>();
        }
        let result = data.into_result();
        log::debug!("{:?} after {} bytes", result.status, result.buffer.len());

        match result.status {
            Status::Valid => self.stats.valid_examples += 1,
            Status::Invalid => self.stats.invalid_examples += 1,
            Status::Overrun => self.stats.overrun_examples += 1,
            Status::Interesting => {
                self.stats.interesting_examples += 1;
                self.record_interesting(&result);
            }
        }
        // A deterministic test replays its consumed prefix identically.
        self.cache
            .entry(result.buffer.clone())
            .or_insert_with(|| result.clone());
        result
    }

    /// Keep `result` if it is the first or the smallest example of its
    /// origin, persisting it and retiring the one it replaces.
    fn record_interesting(&mut self, result: &ConjectureResult) {
        let origin = match &result.origin {
            Some(origin) => origin.clone(),
            None => return,
        };
        let replaced = match self.interesting.get(&origin) {
            Some(best) if best.sort_key() <= result.sort_key() => return,
            Some(best) => Some(best.buffer.clone()),
            None => {
                log::info!("new interesting origin {} ({} bytes)", origin, result.buffer.len());
                None
            }
        };

        self.save_example(&result.buffer);
        if let Some(old) = replaced {
            self.stats.shrinks += 1;
            log::debug!("{} shrunk from {} to {} bytes", origin, old.len(), result.buffer.len());
            self.retire_example(&old);
        }
        self.interesting.insert(origin, result.clone());
    }

    fn save_example(&mut self, buffer: &[u8]) {
        if let Some(database) = self.database.as_mut() {
            if let Err(e) = database.save(&self.key, buffer) {
                log::warn!("could not save example: {}", e);
            }
        }
    }

    /// Move a superseded example to the secondary corpus.
    fn retire_example(&mut self, buffer: &[u8]) {
        if let Some(database) = self.database.as_mut() {
            if let Err(e) = database.move_value(&self.key, &self.key.secondary(), buffer) {
                log::warn!("could not retire example: {}", e);
            }
        }
    }

    /// Replay the primary corpus, and the secondary one if the primary
    /// reproduced nothing. Examples that no longer fail are deleted; secondary
    /// examples that still fail move back to the primary corpus.
    fn reuse_existing_examples(&mut self, test: &mut TestFunction<'_>) {
        let primary_key = self.key.clone();
        let secondary_key = self.key.secondary();
        for key in [&primary_key, &secondary_key] {
            if *key == secondary_key && !self.interesting.is_empty() {
                return;
            }
            let buffers = match self.database.as_deref() {
                Some(database) => fetch_sorted(database, key),
                None => return,
            };
            log::info!("reusing {} examples from {}", buffers.len(), key.to_hex());

            for buffer in buffers {
                let result = self.test_buffer(test, &buffer);
                let database = match self.database.as_mut() {
                    Some(database) => database,
                    None => return,
                };
                let outcome = if !result.is_interesting() {
                    log::debug!("dropping stale example of {} bytes", buffer.len());
                    database.delete(key, &buffer)
                } else if *key == secondary_key {
                    database.move_value(key, &primary_key, &buffer)
                } else {
                    Ok(())
                };
                if let Err(e) = outcome {
                    log::warn!("could not update stored example: {}", e);
                }
            }
        }
    }

    fn generation_exit(&self, start: Instant, stale: u64) -> Option<ExitReason> {
        if !self.interesting.is_empty() && !self.config.report_multiple_bugs {
            return Some(ExitReason::Finished);
        }
        if self.stats.completed_examples() >= self.config.max_examples {
            return Some(ExitReason::MaxExamples);
        }
        let invalid = self.stats.invalid_examples + self.stats.overrun_examples;
        if invalid >= self.config.invalid_limit() {
            return Some(ExitReason::MaxInvalid);
        }
        if let Some(max_time) = self.config.max_time {
            if start.elapsed() >= max_time {
                return Some(ExitReason::MaxTime);
            }
        }
        if let Some(max_stale) = self.config.max_stale_examples {
            if stale >= max_stale {
                return Some(ExitReason::Stale);
            }
        }
        None
    }

    fn generate_new_examples(&mut self, test: &mut TestFunction<'_>) {
        let start = Instant::now();
        let mut stale = 0;
        let mut tried_zeros = false;
        let max_mutations = self.config.max_mutations;
        let mut last: Option<ConjectureResult> = None;
        let mut mutator = Mutator::new(&mut self.rng);
        let mut mutations = 0;
        loop {
            if let Some(reason) = self.generation_exit(start, stale) {
                log::info!(
                    "generation stopped ({:?}) after {} examples",
                    reason,
                    self.stats.examples_generated
                );
                self.stats.exit_reason = Some(reason);
                return;
            }

            let origins = self.interesting.len();
            self.stats.examples_generated += 1;
            if !tried_zeros {
                // The simplest possible input goes first. If it fails, there
                // is nothing left to shrink.
                tried_zeros = true;
                let zeros = vec![0; self.config.buffer_size];
                let result = self.test_buffer(test, &zeros);
                if result.status == Status::Overrun {
                    log::warn!(
                        "test overran a zero buffer of {} bytes; generated inputs will too",
                        self.config.buffer_size
                    );
                }
            } else if let Some(base) = last.as_ref().filter(|_| mutations < max_mutations) {
                mutations += 1;
                let prefix = mutator.prefix(base, &mut self.rng);
                let rng = ChaCha8Rng::seed_from_u64(self.rng.next_u64());
                let data = ConjectureData::with_prefix(prefix, rng, self.config.buffer_size);
                let result = self.execute(test, data);
                if is_progress(&result, base) {
                    if result.status > base.status {
                        mutations = 0;
                    }
                    last = Some(result);
                } else {
                    mutator = Mutator::new(&mut self.rng);
                }
            } else {
                let rng = ChaCha8Rng::seed_from_u64(self.rng.next_u64());
                let data = ConjectureData::from_rng(rng, self.config.buffer_size);
                last = Some(self.execute(test, data));
                mutator = Mutator::new(&mut self.rng);
                mutations = 0;
            }
            if self.interesting.len() > origins {
                stale = 0;
            } else {
                stale += 1;
            }
        }
    }

    fn shrink_interesting_examples(&mut self, test: &mut TestFunction<'_>) {
        // Shrinking one origin can discover another; keep going until every
        // known origin has had its turn.
        let mut done: HashSet<InterestingOrigin> = HashSet::new();
        loop {
            let next = self
                .interesting
                .keys()
                .find(|origin| !done.contains(*origin))
                .cloned();
            let origin = match next {
                Some(origin) => origin,
                None => return,
            };
            self.shrink_origin(test, &origin);
            done.insert(origin);
        }
    }

    fn target(&self, origin: &InterestingOrigin) -> Option<ConjectureResult> {
        self.interesting.get(origin).cloned()
    }

    fn target_buffer(&self, origin: &InterestingOrigin) -> Vec<u8> {
        self.interesting
            .get(origin)
            .map(|result| result.buffer.clone())
            .unwrap_or_default()
    }

    fn shrink_origin(&mut self, test: &mut TestFunction<'_>, origin: &InterestingOrigin) {
        let mut budget = ShrinkBudget::new(origin.clone(), self.config.max_shrinks);
        let initial_len = self.target_buffer(origin).len();
        log::info!("shrinking {} from {} bytes", origin, initial_len);

        loop {
            let before = self.target_buffer(origin);
            self.adaptive_delete(test, &mut budget);
            self.minimize_blocks(test, &mut budget);
            self.minimize_duplicated_blocks(test, &mut budget);
            if budget.exhausted {
                break;
            }
            if self.target_buffer(origin) == before {
                self.expensive_passes(test, &mut budget);
                if budget.exhausted || self.target_buffer(origin) == before {
                    break;
                }
            }
        }

        log::info!(
            "shrunk {} from {} to {} bytes in {} calls",
            origin,
            initial_len,
            self.target_buffer(origin).len(),
            budget.calls
        );
    }

    /// Execute a shrink candidate for `budget.origin`, or `None` if it can
    /// be ruled out without running the test.
    fn attempt(
        &mut self,
        test: &mut TestFunction<'_>,
        budget: &mut ShrinkBudget,
        candidate: &[u8],
    ) -> Option<ConjectureResult> {
        let target = self.interesting.get(&budget.origin)?;
        if candidate == target.buffer.as_slice() {
            return Some(target.clone());
        }
        if sort_key(candidate) >= target.sort_key() {
            return None;
        }
        // The test would read the same bytes and then run out.
        if target.buffer.starts_with(candidate) {
            return None;
        }
        if let Some(cached) = self.cache.get(candidate) {
            self.stats.cache_hits += 1;
            return Some(cached.clone());
        }
        if !budget.spend() {
            return None;
        }
        self.stats.shrink_calls += 1;
        let result = self.execute(test, ConjectureData::for_buffer(candidate));
        self.cache.insert(candidate.to_vec(), result.clone());
        Some(result)
    }

    /// Does `candidate` still fail with the origin being shrunk?
    fn consider(
        &mut self,
        test: &mut TestFunction<'_>,
        budget: &mut ShrinkBudget,
        candidate: &[u8],
    ) -> bool {
        match self.attempt(test, budget, candidate) {
            Some(result) => same_origin(&result, &budget.origin),
            None => false,
        }
    }

    /// Delete runs of adjacent sibling examples, then runs of consecutive
    /// blocks. Run lengths are found with `find_integer`.
    fn adaptive_delete(&mut self, test: &mut TestFunction<'_>, budget: &mut ShrinkBudget) {
        let mut j = 0;
        loop {
            if budget.exhausted {
                return;
            }
            let target = match self.target(&budget.origin) {
                Some(target) => target,
                None => return,
            };
            let start = match target.examples.get(j) {
                Some(example) if !example.is_empty() => example.start,
                Some(_) => {
                    j += 1;
                    continue;
                }
                None => break,
            };
            let ends = sibling_run(&target.examples, j);
            let base = &target.buffer;
            let deleted = find_integer(|k| {
                k <= ends.len() && self.consider(test, budget, &without(base, start, ends[k - 1]))
            });
            // On success later examples have shifted into slot `j`.
            if deleted == 0 {
                j += 1;
            }
        }

        let mut i = 0;
        loop {
            if budget.exhausted {
                return;
            }
            let target = match self.target(&budget.origin) {
                Some(target) => target,
                None => return,
            };
            if i >= target.blocks.len() {
                return;
            }
            let blocks = &target.blocks;
            let base = &target.buffer;
            let deleted = find_integer(|k| {
                i + k <= blocks.len()
                    && self.consider(
                        test,
                        budget,
                        &without(base, blocks[i].start, blocks[i + k - 1].end),
                    )
            });
            if deleted == 0 {
                i += 1;
            }
        }
    }

    /// Lower each block lexicographically, in place.
    fn minimize_blocks(&mut self, test: &mut TestFunction<'_>, budget: &mut ShrinkBudget) {
        let mut i = 0;
        loop {
            if budget.exhausted {
                return;
            }
            let target = match self.target(&budget.origin) {
                Some(target) => target,
                None => return,
            };
            let block = match target.blocks.get(i) {
                Some(block) => *block,
                None => return,
            };
            let base = target.buffer;
            let original = &base[block.start..block.end];
            if original.iter().any(|&b| b != 0) {
                Minimizer::Lexical.shrink(
                    original,
                    |bytes| {
                        let mut candidate = base.clone();
                        candidate[block.start..block.end].copy_from_slice(bytes);
                        self.try_lowered_block(test, budget, &candidate, block.end)
                    },
                    false,
                );
            }
            i += 1;
        }
    }

    /// A lowered block can make the test read fewer bytes after it. If so,
    /// retry with the bytes it lost deleted.
    fn try_lowered_block(
        &mut self,
        test: &mut TestFunction<'_>,
        budget: &mut ShrinkBudget,
        candidate: &[u8],
        block_end: usize,
    ) -> bool {
        let target_len = match self.interesting.get(&budget.origin) {
            Some(target) => target.buffer.len(),
            None => return false,
        };
        let result = match self.attempt(test, budget, candidate) {
            Some(result) => result,
            None => return false,
        };
        if same_origin(&result, &budget.origin) {
            return true;
        }
        if result.status == Status::Overrun {
            return false;
        }
        let lost = target_len.saturating_sub(result.buffer.len());
        if lost == 0 || block_end + lost > candidate.len() {
            return false;
        }
        self.consider(test, budget, &without(candidate, block_end, block_end + lost))
    }

    /// Lower blocks holding identical bytes together, as one integer.
    fn minimize_duplicated_blocks(
        &mut self,
        test: &mut TestFunction<'_>,
        budget: &mut ShrinkBudget,
    ) {
        let snapshot = match self.target(&budget.origin) {
            Some(target) => target,
            None => return,
        };
        let mut groups: BTreeMap<Vec<u8>, Vec<(usize, usize)>> = BTreeMap::new();
        for block in &snapshot.blocks {
            let bytes = &snapshot.buffer[block.start..block.end];
            if bytes.iter().any(|&b| b != 0) {
                groups.entry(bytes.to_vec()).or_default().push((block.start, block.end));
            }
        }

        for (value, positions) in groups {
            if positions.len() < 2 {
                continue;
            }
            if budget.exhausted {
                return;
            }
            let base = self.target_buffer(&budget.origin);
            // An earlier group may have changed the layout.
            let intact = positions
                .iter()
                .all(|&(start, end)| base.get(start..end) == Some(value.as_slice()));
            if !intact {
                continue;
            }
            Minimizer::Integer.shrink(
                &value,
                |bytes| {
                    let replacements: Vec<(usize, usize, Vec<u8>)> = positions
                        .iter()
                        .map(|&(start, end)| (start, end, bytes.to_vec()))
                        .collect();
                    self.consider(test, budget, &replace_all(&base, &replacements))
                },
                false,
            );
        }
    }

    /// Sort blocks of each length into ascending order, as far as the test
    /// still fails with them moved.
    fn reorder_blocks(&mut self, test: &mut TestFunction<'_>, budget: &mut ShrinkBudget) {
        let lengths: BTreeSet<usize> = match self.target(&budget.origin) {
            Some(target) => target.blocks.iter().map(|block| block.end - block.start).collect(),
            None => return,
        };
        for length in lengths {
            if budget.exhausted {
                return;
            }
            let target = match self.target(&budget.origin) {
                Some(target) => target,
                None => return,
            };
            let positions: Vec<(usize, usize)> = target
                .blocks
                .iter()
                .filter(|block| block.end - block.start == length)
                .map(|block| (block.start, block.end))
                .collect();
            let base = target.buffer;
            let values: Vec<Vec<u8>> = positions
                .iter()
                .map(|&(start, end)| base[start..end].to_vec())
                .collect();
            if values.windows(2).all(|pair| pair[0] <= pair[1]) {
                continue;
            }
            shrinking::Ordering::shrink(
                values,
                |reordered: &Vec<Vec<u8>>| {
                    let replacements: Vec<(usize, usize, Vec<u8>)> = positions
                        .iter()
                        .zip(reordered.iter())
                        .map(|(&(start, end), value)| (start, end, value.clone()))
                        .collect();
                    self.consider(test, budget, &replace_all(&base, &replacements))
                },
                false,
            );
        }
    }

    /// Block reordering, then whole-buffer byte sorting and deletion, for
    /// when the structured passes have stalled.
    fn expensive_passes(&mut self, test: &mut TestFunction<'_>, budget: &mut ShrinkBudget) {
        self.reorder_blocks(test, budget);
        for minimizer in [Minimizer::Ordering, Minimizer::Length] {
            if budget.exhausted {
                return;
            }
            let base = self.target_buffer(&budget.origin);
            log::debug!("{:?} pass over {} bytes", minimizer, base.len());
            minimizer.shrink(&base, |bytes| self.consider(test, budget, bytes), false);
        }
    }
}
