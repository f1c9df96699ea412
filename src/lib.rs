//! # Conjecture engine
//!
//! The generation, execution and shrinking core of a Hypothesis-style
//! property-based testing library.
//!
//! Every test case is a byte buffer. Strategies decode structured values
//! from the buffer through [`ConjectureData`], the runner feeds the test
//! random buffers until one fails, and the shrinkers then search for the
//! smallest buffer (shortest, then lexicographically least) that still
//! fails in the same way. Failing buffers are kept in an
//! [`ExampleDatabase`] and replayed on the next run.
//!
//! ```
//! use conjecture_engine::{
//!     ConjectureRunner, IntegerRange, InterestingOrigin, RunResult, RunnerConfig,
//! };
//!
//! let mut runner = ConjectureRunner::new(RunnerConfig::default(), None).unwrap();
//! let result = runner.run(|data| {
//!     let n = data.draw(&IntegerRange::new(0, 1000))?;
//!     if n >= 10 {
//!         data.mark_interesting(InterestingOrigin::new("n >= 10"))
//!     } else {
//!         Ok(())
//!     }
//! });
//! match result {
//!     RunResult::Failed(examples) => assert_eq!(examples[0].buffer, vec![0, 10]),
//!     _ => panic!("expected a failure"),
//! }
//! ```

pub mod codec;
pub mod config;
pub mod data;
pub mod database;
pub mod engine;
pub mod error;
pub mod floats;
mod mutator;
pub mod sampler;
pub mod shrinking;

pub use codec::{BufferReader, CodecError, Field, Value};
pub use config::{Phase, RunnerConfig};
pub use data::{
    sort_key, Bits, Block, Boolean, ConjectureData, ConjectureResult, Decoder, Draw, DrawRecord,
    DrawValue, Example, FloatRange, IntegerRange, InterestingOrigin, Repeat, Status, StopTest,
    Weighted, BUFFER_SIZE,
};
pub use database::{
    DatabaseError, DatabaseKey, DatabaseResult, DatabaseStats, DirectoryDatabase, ExampleDatabase,
    InMemoryDatabase, ReadOnlyDatabase,
};
pub use engine::{ConjectureRunner, ExitReason, RunResult, RunnerStats, TestFunction};
pub use error::{EngineError, EngineResult};
pub use floats::{
    count_between_floats, float_to_int, int_to_float, next_down, next_up, FloatWidth, KahanSum,
};
pub use sampler::Sampler;
pub use shrinking::{find_integer, replace_all, Minimizer, Shrinker};
