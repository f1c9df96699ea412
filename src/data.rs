//! # ConjectureData: a single test-case execution
//!
//! A `ConjectureData` wraps the byte buffer one execution of a test draws
//! from. Bytes come either from a recorded buffer being replayed (shrinking,
//! database reuse) or from a seeded `ChaCha8Rng` (generation). Either way the
//! buffer is append-only while the test runs, and every draw is logged with
//! its offset, length and decoded value so that a buffer can later be
//! replayed or explained.
//!
//! Once a status is set the instance is frozen: further draws fail with
//! [`StopTest`] without touching the buffer. Frozen data decays into a
//! [`ConjectureResult`], which is what the runner caches and shrinks.
//!
//! ```
//! use conjecture_engine::data::{ConjectureData, IntegerRange, Status};
//!
//! let mut data = ConjectureData::for_buffer(&[0, 7]);
//! let n = data.draw(&IntegerRange::new(0, 1000)).unwrap();
//! assert_eq!(n, 7);
//! let result = data.into_result();
//! assert_eq!(result.status, Status::Valid);
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::panic::Location;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::codec::{self, Field, Value};
use crate::floats::{count_between_floats, float_to_int, int_to_float, is_negative, FloatWidth};
use crate::sampler::Sampler;

/// Default generation cap, in bytes.
pub const BUFFER_SIZE: usize = 8 * 1024;

/// Outcome of a finished test execution.
///
/// Ordered from least to most useful: `Overrun < Invalid < Valid < Interesting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Status {
    /// The test tried to read past the end of its buffer.
    Overrun = 0,
    /// A precondition of the test was not satisfied.
    Invalid = 1,
    /// The test ran to completion without anything of note happening.
    Valid = 2,
    /// The test failed. Carries an origin on the data that produced it.
    Interesting = 3,
}

/// Control-flow marker unwinding a test function back to the runner.
///
/// Not an error in the usual sense: the reason the test stopped is the
/// status recorded on the [`ConjectureData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StopTest;

impl fmt::Display for StopTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "test execution stopped")
    }
}

impl std::error::Error for StopTest {}

/// Result of a draw or of a whole test function.
pub type Draw<T> = Result<T, StopTest>;

/// Identity of a distinct failure class. Failures with different origins are
/// shrunk independently and reported separately.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InterestingOrigin {
    pub label: String,
    pub file: String,
    pub line: u32,
}

impl InterestingOrigin {
    /// An origin labelled `label` at the caller's source location.
    #[track_caller]
    pub fn new(label: impl Into<String>) -> Self {
        let location = Location::caller();
        InterestingOrigin {
            label: label.into(),
            file: location.file().to_string(),
            line: location.line(),
        }
    }

    pub fn at(label: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        InterestingOrigin {
            label: label.into(),
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for InterestingOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}:{}", self.label, self.file, self.line)
    }
}

/// Decoded value of one logged draw.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawValue {
    Integer(u64),
    Index(usize),
    Boolean(bool),
    Float(f64),
    Bytes(Vec<u8>),
    Fixed(Vec<Value>),
}

impl From<u64> for DrawValue {
    fn from(value: u64) -> Self {
        DrawValue::Integer(value)
    }
}

impl From<usize> for DrawValue {
    fn from(value: usize) -> Self {
        DrawValue::Index(value)
    }
}

impl From<bool> for DrawValue {
    fn from(value: bool) -> Self {
        DrawValue::Boolean(value)
    }
}

impl From<f64> for DrawValue {
    fn from(value: f64) -> Self {
        DrawValue::Float(value)
    }
}

impl From<Vec<u8>> for DrawValue {
    fn from(value: Vec<u8>) -> Self {
        DrawValue::Bytes(value)
    }
}

impl From<Vec<Value>> for DrawValue {
    fn from(value: Vec<Value>) -> Self {
        DrawValue::Fixed(value)
    }
}

/// One entry of the draw log.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub offset: usize,
    pub length: usize,
    pub value: DrawValue,
}

/// A run of bytes read by one primitive read. Blocks are the unit the
/// buffer-level shrink passes lower and deduplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Block {
    pub start: usize,
    pub end: usize,
}

impl Block {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A labelled interval of the buffer opened by `start_example`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Example {
    pub label: String,
    pub start: usize,
    pub end: usize,
    pub depth: usize,
}

impl Example {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// The `(length, bytes)` key buffers are compared by. Any shorter buffer is
/// smaller than any longer one.
pub fn sort_key(buffer: &[u8]) -> (usize, &[u8]) {
    (buffer.len(), buffer)
}

#[derive(Debug, Clone)]
enum ByteSource {
    Replay(Vec<u8>),
    Random(ChaCha8Rng),
    /// Replay the prefix, then continue with random bytes.
    Prefixed(Vec<u8>, ChaCha8Rng),
}

/// A single test-case instance.
#[derive(Debug, Clone)]
pub struct ConjectureData {
    source: ByteSource,
    max_length: usize,
    buffer: Vec<u8>,
    status: Option<Status>,
    origin: Option<InterestingOrigin>,
    draws: Vec<DrawRecord>,
    draw_depth: usize,
    blocks: Vec<Block>,
    examples: Vec<Example>,
    open_examples: Vec<(String, usize)>,
    events: Vec<String>,
}

impl ConjectureData {
    fn with_source(source: ByteSource, max_length: usize) -> Self {
        ConjectureData {
            source,
            max_length,
            buffer: Vec::new(),
            status: None,
            origin: None,
            draws: Vec::new(),
            draw_depth: 0,
            blocks: Vec::new(),
            examples: Vec::new(),
            open_examples: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Fresh random data seeded from `seed`, capped at [`BUFFER_SIZE`] bytes.
    pub fn new(seed: u64) -> Self {
        Self::from_rng(ChaCha8Rng::seed_from_u64(seed), BUFFER_SIZE)
    }

    pub fn from_rng(rng: ChaCha8Rng, max_length: usize) -> Self {
        Self::with_source(ByteSource::Random(rng), max_length)
    }

    /// Replay `prefix` for as long as it lasts, then draw from `rng`.
    pub fn with_prefix(prefix: Vec<u8>, rng: ChaCha8Rng, max_length: usize) -> Self {
        Self::with_source(ByteSource::Prefixed(prefix, rng), max_length)
    }

    /// Replay `buffer` exactly. Reading past its end is an overrun.
    pub fn for_buffer(buffer: &[u8]) -> Self {
        Self::with_source(ByteSource::Replay(buffer.to_vec()), buffer.len())
    }

    /// Bytes drawn so far.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn index(&self) -> usize {
        self.buffer.len()
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// `None` while the test is still running.
    pub fn status(&self) -> Option<Status> {
        self.status
    }

    pub fn is_frozen(&self) -> bool {
        self.status.is_some()
    }

    pub fn interesting_origin(&self) -> Option<&InterestingOrigin> {
        self.origin.as_ref()
    }

    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn events(&self) -> &[String] {
        &self.events
    }

    fn conclude(&mut self, status: Status) {
        if self.status.is_some() {
            return;
        }
        let end = self.buffer.len();
        while let Some((label, start)) = self.open_examples.pop() {
            let depth = self.open_examples.len();
            self.examples.push(Example {
                label,
                start,
                end,
                depth,
            });
        }
        self.status = Some(status);
    }

    /// Read `n` raw bytes. This is the primitive every other draw is built on.
    pub fn draw_bytes(&mut self, n: usize) -> Draw<Vec<u8>> {
        if self.is_frozen() {
            return Err(StopTest);
        }
        let start = self.buffer.len();
        let end = start + n;
        if end > self.max_length {
            log::trace!("overrun: {} bytes requested at {} of {}", n, start, self.max_length);
            self.conclude(Status::Overrun);
            return Err(StopTest);
        }

        let bytes = match &mut self.source {
            ByteSource::Replay(prefix) => prefix[start..end].to_vec(),
            ByteSource::Random(rng) => {
                let mut bytes = vec![0; n];
                rng.fill_bytes(&mut bytes);
                bytes
            }
            ByteSource::Prefixed(prefix, rng) => {
                let replayed = prefix.get(start..).unwrap_or_default();
                let replayed = &replayed[..replayed.len().min(n)];
                let mut bytes = vec![0; n];
                bytes[..replayed.len()].copy_from_slice(replayed);
                rng.fill_bytes(&mut bytes[replayed.len()..]);
                bytes
            }
        };
        self.buffer.extend_from_slice(&bytes);
        if n > 0 {
            self.blocks.push(Block { start, end });
        }
        Ok(bytes)
    }

    /// Read an `n`-bit unsigned integer from `ceil(n / 8)` big-endian bytes.
    pub fn draw_bits(&mut self, n: u32) -> Draw<u64> {
        assert!(n <= 64, "cannot draw {} bits into a u64", n);
        let bytes = self.draw_bytes(((n + 7) / 8) as usize)?;
        let value = bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64);
        Ok(if n < 64 { value & ((1u64 << n) - 1) } else { value })
    }

    /// Read a fixed-width format through the codec.
    pub fn draw_fixed(&mut self, format: &[Field]) -> Draw<Vec<Value>> {
        let bytes = self.draw_bytes(codec::format_size(format))?;
        match codec::read(&bytes, 0, format) {
            Ok(values) => Ok(values),
            Err(error) => {
                log::error!("codec rejected a correctly sized block: {}", error);
                self.conclude(Status::Overrun);
                Err(StopTest)
            }
        }
    }

    /// Decode the next structured value and log it.
    pub fn draw<D: Decoder>(&mut self, decoder: &D) -> Draw<D::Output> {
        let offset = self.buffer.len();
        self.draw_depth += 1;
        let result = decoder.decode(self);
        self.draw_depth -= 1;
        let value = result?;
        // Decoders built from other decoders are logged once, at the top.
        if self.draw_depth == 0 {
            self.draws.push(DrawRecord {
                offset,
                length: self.buffer.len() - offset,
                value: value.clone().into(),
            });
        }
        Ok(value)
    }

    pub fn start_example(&mut self, label: &str) {
        if self.is_frozen() {
            return;
        }
        self.open_examples.push((label.to_string(), self.buffer.len()));
    }

    pub fn stop_example(&mut self) {
        if self.is_frozen() {
            return;
        }
        if let Some((label, start)) = self.open_examples.pop() {
            let depth = self.open_examples.len();
            self.examples.push(Example {
                label,
                start,
                end: self.buffer.len(),
                depth,
            });
        }
    }

    /// Record a free-form event on the eventual result.
    pub fn note(&mut self, event: impl Into<String>) {
        self.events.push(event.into());
    }

    /// Mark this execution as a failure of class `origin` and stop.
    pub fn mark_interesting<T>(&mut self, origin: InterestingOrigin) -> Draw<T> {
        if self.status.is_none() {
            log::debug!("interesting: {} after {} bytes", origin, self.buffer.len());
            self.origin = Some(origin);
            self.conclude(Status::Interesting);
        }
        Err(StopTest)
    }

    /// Mark this execution as not satisfying the test's preconditions.
    pub fn mark_invalid<T>(&mut self) -> Draw<T> {
        self.conclude(Status::Invalid);
        Err(StopTest)
    }

    pub fn reject<T>(&mut self) -> Draw<T> {
        self.mark_invalid()
    }

    /// Reject unless `condition` holds.
    pub fn assume(&mut self, condition: bool) -> Draw<()> {
        if condition {
            Ok(())
        } else {
            self.mark_invalid()
        }
    }

    /// Finish the test. Running to completion without a status means Valid.
    pub fn into_result(mut self) -> ConjectureResult {
        self.conclude(Status::Valid);
        let mut examples = self.examples;
        examples.sort_by_key(|ex| (ex.start, std::cmp::Reverse(ex.end), ex.depth));
        ConjectureResult {
            buffer: self.buffer,
            status: self.status.unwrap_or(Status::Valid),
            origin: self.origin,
            draws: self.draws,
            blocks: self.blocks,
            examples,
            events: self.events,
        }
    }
}

/// Frozen record of one execution. Results compare by the sort key of their
/// buffer, and are equal exactly when their buffers are.
#[derive(Debug, Clone)]
pub struct ConjectureResult {
    pub buffer: Vec<u8>,
    pub status: Status,
    pub origin: Option<InterestingOrigin>,
    pub draws: Vec<DrawRecord>,
    pub blocks: Vec<Block>,
    pub examples: Vec<Example>,
    pub events: Vec<String>,
}

impl ConjectureResult {
    pub fn sort_key(&self) -> (usize, &[u8]) {
        sort_key(&self.buffer)
    }

    pub fn is_interesting(&self) -> bool {
        self.status == Status::Interesting
    }
}

impl Ord for ConjectureResult {
    fn cmp(&self, other: &ConjectureResult) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for ConjectureResult {
    fn partial_cmp(&self, other: &ConjectureResult) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ConjectureResult {
    fn eq(&self, other: &ConjectureResult) -> bool {
        self.buffer == other.buffer
    }
}

impl Eq for ConjectureResult {}

/// Turns bytes drawn from a [`ConjectureData`] into a structured value.
///
/// Decoders should be shrink-friendly: lowering the bytes they read should
/// lower (or simplify) the value they produce.
pub trait Decoder {
    type Output: Clone + Into<DrawValue>;

    fn decode(&self, data: &mut ConjectureData) -> Draw<Self::Output>;
}

/// An unsigned integer of the given bit width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bits(pub u32);

impl Decoder for Bits {
    type Output = u64;

    fn decode(&self, data: &mut ConjectureData) -> Draw<u64> {
        data.draw_bits(self.0)
    }
}

/// A uniform integer in `lo..=hi`, by rejection sampling over the smallest
/// bit width that covers the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegerRange {
    lo: u64,
    hi: u64,
}

impl IntegerRange {
    pub fn new(lo: u64, hi: u64) -> Self {
        assert!(lo <= hi, "empty integer range {}..={}", lo, hi);
        IntegerRange { lo, hi }
    }
}

impl Decoder for IntegerRange {
    type Output = u64;

    fn decode(&self, data: &mut ConjectureData) -> Draw<u64> {
        let range = self.hi - self.lo;
        if range == 0 {
            return Ok(self.lo);
        }
        let bits = 64 - range.leading_zeros();
        loop {
            let probe = data.draw_bits(bits)?;
            if probe <= range {
                return Ok(self.lo + probe);
            }
        }
    }
}

/// A biased coin. Smaller bytes mean `false`, and certain outcomes consume
/// nothing.
///
/// The coin is a 64-bit fraction read one byte at a time, most significant
/// first, and compared against the point where `true` begins. Reading stops
/// at the first byte that settles the comparison, so most coins cost one
/// byte while a probability far below 1/256 is still honoured exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boolean(pub f64);

const TWO_TO_64: f64 = 18_446_744_073_709_551_616.0;

impl Decoder for Boolean {
    type Output = bool;

    fn decode(&self, data: &mut ConjectureData) -> Draw<bool> {
        let p = self.0;
        if p <= 0.0 {
            return Ok(false);
        }
        if p >= 1.0 {
            return Ok(true);
        }
        // Out of 2^64 equally likely fractions, this many are true.
        let truthy = ((p * TWO_TO_64) as u64).max(1);
        let threshold = truthy.wrapping_neg();
        for expected in threshold.to_be_bytes() {
            let byte = data.draw_bits(8)? as u8;
            match byte.cmp(&expected) {
                Ordering::Less => return Ok(false),
                Ordering::Greater => return Ok(true),
                Ordering::Equal => {}
            }
        }
        Ok(true)
    }
}

/// A float in `lo..=hi`, chosen uniformly among the representable values and
/// ordered from `lo` upwards so that shrinking moves toward `lo`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloatRange {
    lo: f64,
    hi: f64,
}

impl FloatRange {
    pub fn new(lo: f64, hi: f64) -> Self {
        assert!(lo <= hi, "invalid float range {}..={}", lo, hi);
        FloatRange { lo, hi }
    }

    fn nth(&self, index: u64) -> f64 {
        let width = FloatWidth::Width64;
        let negatives = if is_negative(self.lo) {
            let top = if is_negative(self.hi) { self.hi } else { -0.0 };
            count_between_floats(self.lo, top, width)
        } else {
            0
        };
        if index < negatives {
            // Negative bit patterns shrink as the value grows.
            int_to_float(float_to_int(self.lo, width) - index, width)
        } else {
            let start = if is_negative(self.lo) { 0.0 } else { self.lo };
            int_to_float(float_to_int(start, width) + (index - negatives), width)
        }
    }
}

impl Decoder for FloatRange {
    type Output = f64;

    fn decode(&self, data: &mut ConjectureData) -> Draw<f64> {
        let count = count_between_floats(self.lo, self.hi, FloatWidth::Width64);
        let index = IntegerRange::new(0, count - 1).decode(data)?;
        Ok(self.nth(index))
    }
}

/// An index drawn from an alias [`Sampler`]: one integer picks the table
/// entry, one biased coin picks between its base and alternate.
#[derive(Debug, Clone, Copy)]
pub struct Weighted<'a>(pub &'a Sampler);

impl<'a> Decoder for Weighted<'a> {
    type Output = usize;

    fn decode(&self, data: &mut ConjectureData) -> Draw<usize> {
        let table = self.0.table();
        let slot = IntegerRange::new(0, table.len() as u64 - 1).decode(data)? as usize;
        let entry = table[slot];
        let use_alternate = Boolean(entry.alternate_chance).decode(data)?;
        Ok(if use_alternate { entry.alternate } else { entry.base })
    }
}

/// Drives variable-length collections: call `should_continue` before each
/// element, and `reject` when an element turns out to be unusable.
#[derive(Debug, Clone)]
pub struct Repeat {
    min_count: u64,
    max_count: u64,
    p_continue: f64,
    current_count: u64,
}

impl Repeat {
    pub fn new(min_count: u64, max_count: u64, expected_count: f64) -> Repeat {
        Repeat {
            min_count,
            max_count,
            p_continue: 1.0 - 1.0 / (1.0 + expected_count),
            current_count: 0,
        }
    }

    pub fn count(&self) -> u64 {
        self.current_count
    }

    pub fn reject(&mut self) {
        assert!(self.current_count > 0);
        self.current_count -= 1;
    }

    pub fn should_continue(&mut self, data: &mut ConjectureData) -> Draw<bool> {
        if self.current_count < self.min_count {
            self.current_count += 1;
            return Ok(true);
        }
        if self.current_count >= self.max_count {
            return Ok(false);
        }
        let result = data.draw(&Boolean(self.p_continue))?;
        if result {
            self.current_count += 1;
        }
        Ok(result)
    }
}
